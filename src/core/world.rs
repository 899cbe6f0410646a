//! The world query/mutation surface.
//!
//! The interpreter observes and changes simulation state exclusively through
//! the [`World`] trait. Games implement it over their own ECS storage; the
//! crate ships [`SimWorld`](super::SimWorld) as an in-memory implementation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::component::Component;
use super::entity::{Entity, EntityId};
use super::position::{Bounds, Position};
use crate::expr::Value;

/// An observational event emitted into the world's event sink.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldEvent {
    /// Event type identifier (e.g. "spell_cast", "explosion").
    pub event_type: String,

    /// The entity that caused the event.
    pub source: Option<EntityId>,

    /// The entity the event concerns.
    pub target: Option<EntityId>,

    /// Tick at which the event was emitted.
    pub tick: u64,

    /// Resolved payload values.
    #[serde(default)]
    pub payload: BTreeMap<String, Value>,
}

impl WorldEvent {
    /// Create an event with an empty payload.
    pub fn new(event_type: impl Into<String>, tick: u64) -> Self {
        Self {
            event_type: event_type.into(),
            source: None,
            target: None,
            tick,
            payload: BTreeMap::new(),
        }
    }

    /// Set the source entity (builder pattern).
    #[must_use]
    pub fn with_source(mut self, source: EntityId) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the target entity (builder pattern).
    #[must_use]
    pub fn with_target(mut self, target: EntityId) -> Self {
        self.target = Some(target);
        self
    }

    /// Add a payload value (builder pattern).
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }
}

/// World query and mutation surface.
///
/// ## Ordering
///
/// `entity_ids` must return a stable order (the crate's target resolution
/// breaks ties with it). `SimWorld` uses ascending id order.
pub trait World {
    /// Current simulation tick (monotonically increasing).
    fn tick(&self) -> u64;

    /// World bounds for movement and spawn validation.
    fn bounds(&self) -> Bounds;

    /// Look up an entity.
    fn entity(&self, id: EntityId) -> Option<&Entity>;

    /// Look up an entity for mutation.
    fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity>;

    /// All entity ids in stable iteration order.
    fn entity_ids(&self) -> Vec<EntityId>;

    /// Create an entity of the given type and return its id.
    fn create_entity(&mut self, entity_type: &str) -> EntityId;

    /// Remove an entity, returning it if it existed.
    fn remove_entity(&mut self, id: EntityId) -> Option<Entity>;

    /// Push an event into the sink. Returns `false` if the sink refused it.
    fn emit_event(&mut self, event: WorldEvent) -> bool;

    /// Number of entities.
    fn entity_count(&self) -> usize {
        self.entity_ids().len()
    }

    /// Add or replace a component. Returns `false` if the entity is missing.
    fn add_component(&mut self, id: EntityId, name: &str, component: Component) -> bool {
        match self.entity_mut(id) {
            Some(entity) => {
                entity.add_component(name, component);
                true
            }
            None => false,
        }
    }

    /// Remove a component from an entity.
    fn remove_component(&mut self, id: EntityId, name: &str) -> Option<Component> {
        self.entity_mut(id).and_then(|e| e.remove_component(name))
    }

    /// Spatial query: entities with a position within `radius` of `center`
    /// (inclusive), in stable iteration order.
    fn query_within(&self, center: Position, radius: f64) -> Vec<EntityId> {
        self.entity_ids()
            .into_iter()
            .filter(|id| {
                self.entity(*id)
                    .and_then(Entity::position)
                    .is_some_and(|p| p.distance_to(center) <= radius)
            })
            .collect()
    }

    /// Entities carrying a component, in stable iteration order.
    fn query_component(&self, name: &str) -> Vec<EntityId> {
        self.entity_ids()
            .into_iter()
            .filter(|id| self.entity(*id).is_some_and(|e| e.has_component(name)))
            .collect()
    }
}
