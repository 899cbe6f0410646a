//! Entity identification and the entity surface.
//!
//! Every simulation object (creature, item, terrain tile, projectile) has a
//! unique `EntityId` and a component map keyed by component-type string.
//!
//! ## Usage
//!
//! ```
//! use spellcode::core::{Entity, EntityId};
//!
//! let goblin = Entity::new(EntityId(7), "goblin")
//!     .with_position(3.0, 4.0)
//!     .with_health(20.0, 20.0)
//!     .with_faction("raiders");
//!
//! assert!(goblin.has_component("position"));
//! assert_eq!(goblin.faction(), Some("raiders"));
//! assert_eq!(goblin.stat_value("health"), 20.0);
//! ```

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::component::{
    names, Component, Health, ItemStack, StatBlock, StatusSet, Transformation,
};
use super::position::Position;

/// Unique identifier for any world entity.
///
/// IDs are allocated by the world and are stable for the lifetime of the
/// entity, including across transformations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl EntityId {
    /// Create a new entity ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl From<u32> for EntityId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

/// A world entity: an id, a type tag and a component map.
///
/// Components are keyed by their type string. The well-known components
/// (`position`, `health`, `stats`, ...) have typed accessors; any other key
/// is an opaque marker used by `hasComponents` filters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Stable identity.
    pub id: EntityId,

    /// Entity type tag (e.g. "goblin", "wolf", "torch").
    pub entity_type: String,

    #[serde(default)]
    components: FxHashMap<String, Component>,
}

impl Entity {
    /// Create an entity with no components.
    #[must_use]
    pub fn new(id: EntityId, entity_type: impl Into<String>) -> Self {
        Self {
            id,
            entity_type: entity_type.into(),
            components: FxHashMap::default(),
        }
    }

    // === Builders ===

    /// Add a component (builder pattern).
    #[must_use]
    pub fn with_component(mut self, name: impl Into<String>, component: Component) -> Self {
        self.components.insert(name.into(), component);
        self
    }

    /// Add a position component (builder pattern).
    #[must_use]
    pub fn with_position(self, x: f64, y: f64) -> Self {
        self.with_component(names::POSITION, Component::Position(Position::new(x, y)))
    }

    /// Add a facing component in degrees (builder pattern).
    #[must_use]
    pub fn with_facing(self, degrees: f64) -> Self {
        self.with_component(names::FACING, Component::Facing { degrees })
    }

    /// Add a health component (builder pattern).
    #[must_use]
    pub fn with_health(self, current: f64, max: f64) -> Self {
        self.with_component(names::HEALTH, Component::Health(Health::new(current, max)))
    }

    /// Add a faction component (builder pattern).
    #[must_use]
    pub fn with_faction(self, faction: impl Into<String>) -> Self {
        self.with_component(names::FACTION, Component::Faction { name: faction.into() })
    }

    /// Set a base stat value (builder pattern).
    #[must_use]
    pub fn with_stat(mut self, stat: impl Into<String>, value: f64) -> Self {
        self.stats_mut().set_base(stat, value);
        self
    }

    /// Add a material component (builder pattern).
    #[must_use]
    pub fn with_material(self, material: impl Into<String>) -> Self {
        self.with_component(names::MATERIAL, Component::Material { name: material.into() })
    }

    /// Add an opaque marker component (builder pattern).
    #[must_use]
    pub fn with_marker(self, name: impl Into<String>) -> Self {
        self.with_component(name, Component::Marker)
    }

    // === Component Map ===

    /// Get a component by type string.
    #[must_use]
    pub fn get_component(&self, name: &str) -> Option<&Component> {
        self.components.get(name)
    }

    /// Get a mutable component by type string.
    pub fn get_component_mut(&mut self, name: &str) -> Option<&mut Component> {
        self.components.get_mut(name)
    }

    /// Check whether a component is present.
    #[must_use]
    pub fn has_component(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    /// Insert or replace a component, returning the previous one.
    pub fn add_component(&mut self, name: impl Into<String>, component: Component) -> Option<Component> {
        self.components.insert(name.into(), component)
    }

    /// Remove a component.
    pub fn remove_component(&mut self, name: &str) -> Option<Component> {
        self.components.remove(name)
    }

    /// Iterate over component type strings.
    pub fn component_names(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    // === Typed Accessors ===

    /// Current position, if the entity has one.
    #[must_use]
    pub fn position(&self) -> Option<Position> {
        match self.components.get(names::POSITION) {
            Some(Component::Position(p)) => Some(*p),
            _ => None,
        }
    }

    /// Move the entity. Adds a position component if missing.
    pub fn set_position(&mut self, position: Position) {
        self.components.insert(names::POSITION.to_string(), Component::Position(position));
    }

    /// Facing direction in degrees (0° = +x). Defaults to 0.
    #[must_use]
    pub fn facing(&self) -> f64 {
        match self.components.get(names::FACING) {
            Some(Component::Facing { degrees }) => *degrees,
            _ => 0.0,
        }
    }

    /// Health component, if present.
    #[must_use]
    pub fn health(&self) -> Option<&Health> {
        match self.components.get(names::HEALTH) {
            Some(Component::Health(h)) => Some(h),
            _ => None,
        }
    }

    /// Mutable health component, if present.
    pub fn health_mut(&mut self) -> Option<&mut Health> {
        match self.components.get_mut(names::HEALTH) {
            Some(Component::Health(h)) => Some(h),
            _ => None,
        }
    }

    /// Faction name, if present.
    #[must_use]
    pub fn faction(&self) -> Option<&str> {
        match self.components.get(names::FACTION) {
            Some(Component::Faction { name }) => Some(name),
            _ => None,
        }
    }

    /// Stats component, if present.
    #[must_use]
    pub fn stats(&self) -> Option<&StatBlock> {
        match self.components.get(names::STATS) {
            Some(Component::Stats(s)) => Some(s),
            _ => None,
        }
    }

    /// Stats component, inserting an empty one if missing.
    pub fn stats_mut(&mut self) -> &mut StatBlock {
        let slot = self
            .components
            .entry(names::STATS.to_string())
            .or_insert_with(|| Component::Stats(StatBlock::default()));
        if !matches!(slot, Component::Stats(_)) {
            *slot = Component::Stats(StatBlock::default());
        }
        match slot {
            Component::Stats(s) => s,
            _ => unreachable!("stats slot was just normalized"),
        }
    }

    /// Status component, if present.
    #[must_use]
    pub fn statuses(&self) -> Option<&StatusSet> {
        match self.components.get(names::STATUSES) {
            Some(Component::Statuses(s)) => Some(s),
            _ => None,
        }
    }

    /// Status component, inserting an empty one if missing.
    pub fn statuses_mut(&mut self) -> &mut StatusSet {
        let slot = self
            .components
            .entry(names::STATUSES.to_string())
            .or_insert_with(|| Component::Statuses(StatusSet::default()));
        if !matches!(slot, Component::Statuses(_)) {
            *slot = Component::Statuses(StatusSet::default());
        }
        match slot {
            Component::Statuses(s) => s,
            _ => unreachable!("statuses slot was just normalized"),
        }
    }

    /// Stack count of a status (0 if absent).
    #[must_use]
    pub fn status_stacks(&self, status: &str) -> u32 {
        self.statuses().map_or(0, |s| s.stacks(status))
    }

    /// Active transformation record, if the entity is transformed.
    #[must_use]
    pub fn transformation(&self) -> Option<&Transformation> {
        match self.components.get(names::TRANSFORMED) {
            Some(Component::Transformed(t)) => Some(t),
            _ => None,
        }
    }

    /// Item stack, if this entity is an item.
    #[must_use]
    pub fn item(&self) -> Option<&ItemStack> {
        match self.components.get(names::ITEM) {
            Some(Component::Item(i)) => Some(i),
            _ => None,
        }
    }

    /// Material name, if present.
    #[must_use]
    pub fn material(&self) -> Option<&str> {
        match self.components.get(names::MATERIAL) {
            Some(Component::Material { name }) => Some(name),
            _ => None,
        }
    }

    /// Effective value of a stat.
    ///
    /// `health` and `maxHealth` read the health component; every other stat
    /// reads the stats component (base plus active modifiers). Missing → 0.
    #[must_use]
    pub fn stat_value(&self, stat: &str) -> f64 {
        match stat {
            "health" => self.health().map_or(0.0, |h| h.current),
            "maxHealth" => self.health().map_or(0.0, |h| h.max),
            _ => self.stats().map_or(0.0, |s| s.effective(stat)),
        }
    }
}
