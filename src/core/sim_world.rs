//! In-memory reference world.
//!
//! `SimWorld` implements [`World`] on top of persistent `im` structures so
//! that a snapshot is an O(1) clone. Tests use snapshots to compare the
//! world before and after an aborted execution.
//!
//! ## Example
//!
//! ```
//! use spellcode::core::{Entity, SimWorld, World};
//!
//! let mut world = SimWorld::new();
//! let hero = world.spawn_with(|id| Entity::new(id, "hero").with_health(10.0, 10.0));
//!
//! let snapshot = world.clone();
//! world.entity_mut(hero).unwrap().health_mut().unwrap().damage(4.0);
//!
//! assert_eq!(snapshot.entity(hero).unwrap().stat_value("health"), 10.0);
//! assert_eq!(world.entity(hero).unwrap().stat_value("health"), 6.0);
//! ```

use im::{OrdMap, Vector};
use serde::{Deserialize, Serialize};

use super::component::names;
use super::entity::{Entity, EntityId};
use super::position::Bounds;
use super::world::{World, WorldEvent};

/// What lapsed during a tick advance.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    /// The tick that was reached.
    pub tick: u64,
    /// Statuses that expired, per entity.
    pub expired_statuses: Vec<(EntityId, String)>,
    /// Number of temporary stat modifiers that lapsed.
    pub lapsed_modifiers: usize,
    /// Entities whose timed transformation reverted.
    pub reverted: Vec<EntityId>,
}

/// In-memory world with persistent storage.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimWorld {
    entities: OrdMap<EntityId, Entity>,
    next_id: u32,
    tick: u64,
    bounds: Bounds,
    events: Vector<WorldEvent>,
    /// Maximum events the sink accepts. `None` = unbounded.
    event_capacity: Option<usize>,
}

impl SimWorld {
    /// Create an empty world at tick 0 with default bounds.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: OrdMap::new(),
            next_id: 1,
            tick: 0,
            bounds: Bounds::default(),
            events: Vector::new(),
            event_capacity: None,
        }
    }

    /// Set world bounds (builder pattern).
    #[must_use]
    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = bounds;
        self
    }

    /// Limit how many events the sink accepts (builder pattern).
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = Some(capacity);
        self
    }

    /// Set the current tick (builder pattern).
    #[must_use]
    pub fn at_tick(mut self, tick: u64) -> Self {
        self.tick = tick;
        self
    }

    /// Allocate an id and insert the entity built for it.
    pub fn spawn_with(&mut self, build: impl FnOnce(EntityId) -> Entity) -> EntityId {
        let id = self.alloc_id();
        let mut entity = build(id);
        entity.id = id;
        self.entities.insert(id, entity);
        id
    }

    /// Insert an entity under its own id, replacing any existing one.
    pub fn insert_entity(&mut self, entity: Entity) {
        self.next_id = self.next_id.max(entity.id.0.saturating_add(1));
        self.entities.insert(entity.id, entity);
    }

    /// Events emitted so far, oldest first.
    #[must_use]
    pub fn events(&self) -> &Vector<WorldEvent> {
        &self.events
    }

    /// Advance one tick and lapse everything that expires at the new tick.
    pub fn advance_tick(&mut self) -> TickReport {
        self.tick += 1;
        let tick = self.tick;
        let mut report = TickReport {
            tick,
            ..TickReport::default()
        };

        let ids: Vec<EntityId> = self.entities.keys().copied().collect();
        for id in ids {
            let Some(entity) = self.entities.get_mut(&id) else {
                continue;
            };

            if entity.statuses().is_some() {
                for status in entity.statuses_mut().expire(tick) {
                    report.expired_statuses.push((id, status));
                }
            }

            if entity.stats().is_some() {
                report.lapsed_modifiers += entity.stats_mut().expire(tick);
            }
            if let Some(health) = entity.health_mut() {
                report.lapsed_modifiers += health.expire(tick);
            }

            let revert = entity
                .transformation()
                .filter(|t| t.expires_at.is_some_and(|at| at <= tick))
                .map(|t| t.original_type.clone());
            if let Some(original) = revert {
                entity.entity_type = original;
                entity.remove_component(names::TRANSFORMED);
                report.reverted.push(id);
            }
        }

        report
    }

    fn alloc_id(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl World for SimWorld {
    fn tick(&self) -> u64 {
        self.tick
    }

    fn bounds(&self) -> Bounds {
        self.bounds
    }

    fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    fn entity_ids(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    fn entity_count(&self) -> usize {
        self.entities.len()
    }

    fn create_entity(&mut self, entity_type: &str) -> EntityId {
        let id = self.alloc_id();
        self.entities.insert(id, Entity::new(id, entity_type));
        id
    }

    fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    fn emit_event(&mut self, event: WorldEvent) -> bool {
        if self.event_capacity.is_some_and(|cap| self.events.len() >= cap) {
            return false;
        }
        self.events.push_back(event);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::component::{Component, Transformation};
    use crate::core::Position;

    #[test]
    fn test_ids_are_ascending() {
        let mut world = SimWorld::new();
        let a = world.create_entity("a");
        let b = world.create_entity("b");
        let c = world.create_entity("c");
        assert_eq!(world.entity_ids(), vec![a, b, c]);
        assert!(a < b && b < c);
    }

    #[test]
    fn test_insert_entity_bumps_allocator() {
        let mut world = SimWorld::new();
        world.insert_entity(Entity::new(EntityId(50), "statue"));
        let next = world.create_entity("rat");
        assert_eq!(next, EntityId(51));
    }

    #[test]
    fn test_snapshot_isolation() {
        let mut world = SimWorld::new();
        let id = world.spawn_with(|id| Entity::new(id, "hero").with_position(0.0, 0.0));
        let snapshot = world.clone();

        world.entity_mut(id).unwrap().set_position(Position::new(5.0, 5.0));

        assert_eq!(snapshot.entity(id).unwrap().position(), Some(Position::new(0.0, 0.0)));
        assert_eq!(world.entity(id).unwrap().position(), Some(Position::new(5.0, 5.0)));
    }

    #[test]
    fn test_event_capacity() {
        let mut world = SimWorld::new().with_event_capacity(1);
        assert!(world.emit_event(WorldEvent::new("a", 0)));
        assert!(!world.emit_event(WorldEvent::new("b", 0)));
        assert_eq!(world.events().len(), 1);
    }

    #[test]
    fn test_query_within() {
        let mut world = SimWorld::new();
        let near = world.spawn_with(|id| Entity::new(id, "a").with_position(1.0, 0.0));
        let _far = world.spawn_with(|id| Entity::new(id, "b").with_position(9.0, 0.0));
        let edge = world.spawn_with(|id| Entity::new(id, "c").with_position(0.0, 3.0));
        let _nowhere = world.create_entity("d");

        assert_eq!(world.query_within(Position::new(0.0, 0.0), 3.0), vec![near, edge]);
    }

    #[test]
    fn test_advance_tick_expires() {
        let mut world = SimWorld::new();
        let id = world.spawn_with(|id| Entity::new(id, "frog"));
        {
            let entity = world.entity_mut(id).unwrap();
            entity.statuses_mut().apply("slowed", 1, Some(2));
            entity.stats_mut().add_modifier("speed", -2.0, Some(2));
            entity.entity_type = "prince".to_string();
            entity.add_component(
                names::TRANSFORMED,
                Component::Transformed(Transformation {
                    original_type: "frog".to_string(),
                    expires_at: Some(2),
                }),
            );
        }

        let first = world.advance_tick();
        assert!(first.expired_statuses.is_empty());
        assert!(first.reverted.is_empty());

        let second = world.advance_tick();
        assert_eq!(second.tick, 2);
        assert_eq!(second.expired_statuses, vec![(id, "slowed".to_string())]);
        assert_eq!(second.lapsed_modifiers, 1);
        assert_eq!(second.reverted, vec![id]);
        assert_eq!(world.entity(id).unwrap().entity_type, "frog");
    }
}
