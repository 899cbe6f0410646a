//! Effect registry for `chain_effect` / `trigger_effect` lookup.
//!
//! The `EffectRegistry` stores named effects by id. Lookups sanitize the
//! requested id before touching the map.

use rustc_hash::FxHashMap;

use crate::error::EffectError;
use crate::governor::sanitize_identifier;

use super::effect::EffectExpression;

/// Registry of effects addressable by id.
///
/// ## Example
///
/// ```
/// use spellcode::effects::{EffectExpression, EffectOperation, EffectRegistry, TargetSelector};
///
/// let mut registry = EffectRegistry::new();
/// let spark = EffectExpression::new(TargetSelector::single())
///     .with_id("spark")
///     .with_operation(EffectOperation::deal_damage("lightning", 8.0));
///
/// registry.register(spark).unwrap();
///
/// assert!(registry.get("spark").is_some());
/// assert!(registry.require("storm").is_err());
/// ```
#[derive(Clone, Debug, Default)]
pub struct EffectRegistry {
    effects: FxHashMap<String, EffectExpression>,
}

impl EffectRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an effect under its id.
    ///
    /// Fails if the effect has no id, the id is not a valid identifier, or
    /// the id is already taken.
    pub fn register(&mut self, effect: EffectExpression) -> Result<(), EffectError> {
        let Some(id) = effect.id.clone() else {
            return Err(EffectError::validation("registered effects need an id"));
        };
        sanitize_identifier(&id).map_err(|r| EffectError::validation(format!("effect id '{id}': {r}")))?;
        if self.effects.contains_key(&id) {
            return Err(EffectError::validation(format!("effect '{id}' already registered")));
        }
        self.effects.insert(id, effect);
        Ok(())
    }

    /// Parse a JSON array of effects and register each one.
    pub fn load_json(&mut self, json: &str) -> Result<usize, EffectError> {
        let effects: Vec<EffectExpression> = serde_json::from_str(json)
            .map_err(|e| EffectError::validation(format!("effect list: {e}")))?;
        let count = effects.len();
        for effect in effects {
            self.register(effect)?;
        }
        Ok(count)
    }

    /// Get an effect by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&EffectExpression> {
        self.effects.get(id)
    }

    /// Get an effect by id, failing with `UnknownEffect` if absent.
    pub fn require(&self, id: &str) -> Result<&EffectExpression, EffectError> {
        if sanitize_identifier(id).is_err() {
            return Err(EffectError::UnknownEffect(id.to_string()));
        }
        self.effects
            .get(id)
            .ok_or_else(|| EffectError::UnknownEffect(id.to_string()))
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.effects.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Iterate over registered effects in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &EffectExpression> {
        self.effects.values()
    }
}
