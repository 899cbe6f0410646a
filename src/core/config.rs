//! Interpreter configuration.
//!
//! Configuration is construct-time and immutable per interpreter:
//! - `Registries`: the vocabularies effects may reference (statuses, entity
//!   types, items, materials, damage types) and the fixed stat whitelist
//! - `InterpreterConfig`: registries, governor limits, shape defaults, RNG seed
//!
//! Configs deserialize from JSON with every field optional:
//!
//! ```
//! use spellcode::core::InterpreterConfig;
//!
//! let config = InterpreterConfig::from_json(r#"{
//!     "limits": { "maxOperations": 200, "maxChainDepth": 3 },
//!     "lineWidth": 2.0
//! }"#).unwrap();
//!
//! assert_eq!(config.limits.max_operations, Some(200));
//! assert_eq!(config.line_width, 2.0);
//! assert!(config.registries.check_status("burning").is_ok());
//! ```

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::error::EffectError;
use crate::governor::{sanitize_identifier, GovernorLimits};

/// The fixed stat whitelist.
///
/// `health` and `maxHealth` address the health component; the rest live in
/// the stats component.
pub const KNOWN_STATS: &[&str] = &[
    "health",
    "maxHealth",
    "mana",
    "maxMana",
    "stamina",
    "strength",
    "agility",
    "intelligence",
    "wisdom",
    "constitution",
    "speed",
    "armor",
    "magicResist",
    "attackPower",
    "spellPower",
    "critChance",
    "luck",
];

const DEFAULT_STATUSES: &[&str] = &[
    "burning", "frozen", "slowed", "stunned", "poisoned", "bleeding", "blessed", "cursed",
    "silenced", "hasted", "shielded", "invisible", "rooted", "regenerating", "feared",
    "charmed", "weakened", "empowered", "confused", "sleeping", "petrified", "ethereal",
];

const DEFAULT_ENTITY_TYPES: &[&str] = &[
    "wolf", "skeleton", "zombie", "elemental", "golem", "spirit", "slime", "treant", "imp",
    "familiar", "sheep", "frog", "rat", "crow", "illusion", "totem", "wall", "statue",
];

const DEFAULT_ITEMS: &[&str] = &[
    "health_potion", "mana_potion", "torch", "rope", "arrow", "gem", "scroll", "bread",
    "herb", "crystal_shard",
];

const DEFAULT_MATERIALS: &[&str] = &[
    "stone", "wood", "iron", "ice", "water", "lava", "sand", "glass", "gold", "dirt", "mud",
    "crystal", "grass", "obsidian",
];

const DEFAULT_DAMAGE_TYPES: &[&str] = &[
    "physical", "fire", "cold", "lightning", "poison", "psychic", "void", "holy", "necrotic",
    "acid", "force", "arcane",
];

fn owned_set(names: &[&str]) -> FxHashSet<String> {
    names.iter().map(|s| (*s).to_string()).collect()
}

/// Vocabularies effects are allowed to reference.
///
/// Every check sanitizes the identifier first and only then consults the
/// whitelist, so reflective or injection-style names are rejected before
/// any lookup happens.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Registries {
    pub statuses: FxHashSet<String>,
    pub entity_types: FxHashSet<String>,
    pub items: FxHashSet<String>,
    pub materials: FxHashSet<String>,
    pub damage_types: FxHashSet<String>,
}

impl Default for Registries {
    fn default() -> Self {
        Self {
            statuses: owned_set(DEFAULT_STATUSES),
            entity_types: owned_set(DEFAULT_ENTITY_TYPES),
            items: owned_set(DEFAULT_ITEMS),
            materials: owned_set(DEFAULT_MATERIALS),
            damage_types: owned_set(DEFAULT_DAMAGE_TYPES),
        }
    }
}

impl Registries {
    /// Registries with no entries (stats stay fixed).
    #[must_use]
    pub fn empty() -> Self {
        Self {
            statuses: FxHashSet::default(),
            entity_types: FxHashSet::default(),
            items: FxHashSet::default(),
            materials: FxHashSet::default(),
            damage_types: FxHashSet::default(),
        }
    }

    // === Builders ===

    /// Register a status (builder pattern).
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.statuses.insert(status.into());
        self
    }

    /// Register an entity type (builder pattern).
    #[must_use]
    pub fn with_entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_types.insert(entity_type.into());
        self
    }

    /// Register an item id (builder pattern).
    #[must_use]
    pub fn with_item(mut self, item: impl Into<String>) -> Self {
        self.items.insert(item.into());
        self
    }

    /// Register a material (builder pattern).
    #[must_use]
    pub fn with_material(mut self, material: impl Into<String>) -> Self {
        self.materials.insert(material.into());
        self
    }

    /// Register a damage type (builder pattern).
    #[must_use]
    pub fn with_damage_type(mut self, damage_type: impl Into<String>) -> Self {
        self.damage_types.insert(damage_type.into());
        self
    }

    // === Checks ===

    /// Check a stat name against the fixed whitelist.
    pub fn check_stat(&self, name: &str) -> Result<(), EffectError> {
        let invalid = |reason: String| EffectError::InvalidStat {
            name: name.to_string(),
            reason,
        };
        sanitize_identifier(name).map_err(|r| invalid(r.to_string()))?;
        if KNOWN_STATS.contains(&name) {
            Ok(())
        } else {
            Err(invalid("not a known stat".to_string()))
        }
    }

    /// Check a status identifier.
    pub fn check_status(&self, name: &str) -> Result<(), EffectError> {
        let invalid = |reason: String| EffectError::InvalidStatus {
            name: name.to_string(),
            reason,
        };
        sanitize_identifier(name).map_err(|r| invalid(r.to_string()))?;
        if self.statuses.contains(name) {
            Ok(())
        } else {
            Err(invalid("not a registered status".to_string()))
        }
    }

    /// Check an entity type for spawning or transformation.
    pub fn check_entity_type(&self, name: &str) -> Result<(), EffectError> {
        let invalid = |reason: String| EffectError::InvalidEntityType {
            name: name.to_string(),
            reason,
        };
        sanitize_identifier(name).map_err(|r| invalid(r.to_string()))?;
        if self.entity_types.contains(name) {
            Ok(())
        } else {
            Err(invalid("not a registered entity type".to_string()))
        }
    }

    /// Check an item id. Unknown items report as invalid entity types.
    pub fn check_item(&self, name: &str) -> Result<(), EffectError> {
        let invalid = |reason: String| EffectError::InvalidEntityType {
            name: name.to_string(),
            reason,
        };
        sanitize_identifier(name).map_err(|r| invalid(r.to_string()))?;
        if self.items.contains(name) {
            Ok(())
        } else {
            Err(invalid("not a registered item".to_string()))
        }
    }

    /// Check a material.
    pub fn check_material(&self, name: &str) -> Result<(), EffectError> {
        let invalid = |reason: String| EffectError::InvalidMaterial {
            name: name.to_string(),
            reason,
        };
        sanitize_identifier(name).map_err(|r| invalid(r.to_string()))?;
        if self.materials.contains(name) {
            Ok(())
        } else {
            Err(invalid("not a registered material".to_string()))
        }
    }

    /// Check a damage type.
    pub fn check_damage_type(&self, name: &str) -> Result<(), EffectError> {
        sanitize_identifier(name)
            .map_err(|r| EffectError::validation(format!("damage type '{name}': {r}")))?;
        if self.damage_types.contains(name) {
            Ok(())
        } else {
            Err(EffectError::validation(format!("unknown damage type '{name}'")))
        }
    }

    /// Check a free-form identifier (event types, payload keys, component
    /// names). These vocabularies are open, so only the sanitizer applies.
    pub fn check_identifier(&self, what: &str, name: &str) -> Result<(), EffectError> {
        sanitize_identifier(name)
            .map(|_| ())
            .map_err(|r| EffectError::validation(format!("{what} '{name}': {r}")))
    }
}

/// Default width of `line` target shapes, in world units.
pub const DEFAULT_LINE_WIDTH: f64 = 1.0;

/// Complete interpreter configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InterpreterConfig {
    /// Governor ceilings.
    pub limits: GovernorLimits,

    /// Allowed vocabularies.
    pub registries: Registries,

    /// Width of `line` shapes that don't specify one.
    pub line_width: f64,

    /// Base seed for expression RNG streams.
    pub rng_seed: u64,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            limits: GovernorLimits::default(),
            registries: Registries::default(),
            line_width: DEFAULT_LINE_WIDTH,
            rng_seed: 0x5EED_CAFE,
        }
    }
}

impl InterpreterConfig {
    /// Production preset: every governor ceiling set.
    #[must_use]
    pub fn production() -> Self {
        Self {
            limits: GovernorLimits::production(),
            ..Self::default()
        }
    }

    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, EffectError> {
        serde_json::from_str(json)
            .map_err(|e| EffectError::validation(format!("interpreter config: {e}")))
    }

    /// Set governor limits (builder pattern).
    #[must_use]
    pub fn with_limits(mut self, limits: GovernorLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Set registries (builder pattern).
    #[must_use]
    pub fn with_registries(mut self, registries: Registries) -> Self {
        self.registries = registries;
        self
    }

    /// Set the RNG seed (builder pattern).
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng_seed = seed;
        self
    }
}
