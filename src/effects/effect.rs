//! Effect definitions.
//!
//! An [`EffectExpression`] is the unit of spellcode: a target selector, an
//! ordered list of operations, a timing and optional conditions. Effects are
//! authored as JSON (by designers or the generation pipeline) and are never
//! mutated by the interpreter.
//!
//! ## Example
//!
//! ```
//! use spellcode::effects::{EffectExpression, EffectOperation, EffectTiming};
//!
//! let fireball = EffectExpression::from_json(r#"{
//!     "id": "fireball",
//!     "target": {"type": "area", "radius": 10, "count": 3, "excludeSelf": true},
//!     "operations": [
//!         {"op": "deal_damage", "damageType": "fire", "amount": 40},
//!         {"op": "apply_status", "status": "burning", "duration": 3}
//!     ]
//! }"#).unwrap();
//!
//! assert_eq!(fireball.id.as_deref(), Some("fireball"));
//! assert_eq!(fireball.target.max_targets, Some(3));
//! assert_eq!(fireball.timing, EffectTiming::Immediate);
//! assert!(matches!(fireball.operations[0], EffectOperation::DealDamage { .. }));
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::Registries;
use crate::error::EffectError;
use crate::expr::Expression;

use super::targeting::TargetSelector;
use super::validation;

/// A point or vector given as two expressions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: Expression,
    pub y: Expression,
}

impl Coordinates {
    #[must_use]
    pub fn new(x: impl Into<Expression>, y: impl Into<Expression>) -> Self {
        Self { x: x.into(), y: y.into() }
    }
}

/// The literal `"all"` accepted by `remove_status`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllStacks {
    #[serde(rename = "all")]
    All,
}

/// How many stacks `remove_status` removes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StackCount {
    All(AllStacks),
    Count(Expression),
}

impl Default for StackCount {
    fn default() -> Self {
        Self::All(AllStacks::All)
    }
}

fn one() -> Expression {
    Expression::Number(1.0)
}

/// One operation within an effect.
///
/// Tagged by `"op"` in the authoring format. Numeric parameters are
/// expressions evaluated against the current caster and target when the
/// operation runs; identifiers (stats, statuses, types) are literal and
/// checked against the registries before anything executes.
///
/// ## Control Flow
///
/// `Conditional`, `Repeat` and `Delay` carry nested operation lists.
/// `ChainEffect` and `TriggerEffect` re-enter the interpreter by effect id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum EffectOperation {
    // === Health ===

    /// Damage the target. A negative amount heals instead.
    DealDamage {
        damage_type: String,
        amount: Expression,
    },

    /// Heal the target. Negative amounts are rejected.
    Heal { amount: Expression },

    // === Statuses ===

    /// Add stacks of a status. Absent or zero duration is permanent.
    ApplyStatus {
        status: String,
        #[serde(default)]
        duration: Option<Expression>,
        #[serde(default = "one")]
        stacks: Expression,
    },

    /// Remove stacks of a status, or all of them.
    RemoveStatus {
        status: String,
        #[serde(default)]
        stacks: StackCount,
    },

    // === Stats ===

    /// Add to a stat. With a duration the change is a temporary modifier.
    ModifyStat {
        stat: String,
        amount: Expression,
        #[serde(default)]
        duration: Option<Expression>,
    },

    /// Overwrite a stat's base value.
    SetStat { stat: String, value: Expression },

    // === Movement ===

    Teleport {
        #[serde(alias = "location")]
        destination: Coordinates,
    },

    /// Move along `direction`, or away from the caster when absent.
    Push {
        #[serde(default)]
        direction: Option<Coordinates>,
        distance: Expression,
    },

    /// Move toward a point, or toward the caster when absent.
    Pull {
        #[serde(default)]
        toward: Option<Coordinates>,
        distance: Expression,
    },

    // === Spawning ===

    SpawnEntity {
        entity_type: String,
        #[serde(default = "one")]
        count: Expression,
        #[serde(default)]
        at: Option<Coordinates>,
    },

    SpawnItem {
        item_id: String,
        #[serde(default = "one")]
        count: Expression,
        #[serde(default)]
        at: Option<Coordinates>,
    },

    // === Transformation ===

    TransformEntity {
        to_type: String,
        #[serde(default)]
        duration: Option<Expression>,
    },

    TransformMaterial { from: String, to: String },

    // === Events ===

    EmitEvent {
        event_type: String,
        #[serde(default)]
        payload: BTreeMap<String, Expression>,
    },

    // === Re-entry ===

    /// Run a registered effect against freshly resolved targets.
    ChainEffect {
        effect_id: String,
        new_target: TargetSelector,
    },

    /// Run a registered effect against the current target.
    TriggerEffect { effect_id: String },

    // === Control Flow ===

    Conditional {
        condition: Expression,
        then: Vec<EffectOperation>,
        #[serde(default, rename = "else")]
        otherwise: Option<Vec<EffectOperation>>,
    },

    Repeat {
        times: Expression,
        operations: Vec<EffectOperation>,
    },

    /// Schedule `then` for `tick + ticks` against the current target.
    Delay {
        ticks: Expression,
        then: Vec<EffectOperation>,
    },
}

impl EffectOperation {
    /// The operation's tag, as written in the authoring format.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::DealDamage { .. } => "deal_damage",
            Self::Heal { .. } => "heal",
            Self::ApplyStatus { .. } => "apply_status",
            Self::RemoveStatus { .. } => "remove_status",
            Self::ModifyStat { .. } => "modify_stat",
            Self::SetStat { .. } => "set_stat",
            Self::Teleport { .. } => "teleport",
            Self::Push { .. } => "push",
            Self::Pull { .. } => "pull",
            Self::SpawnEntity { .. } => "spawn_entity",
            Self::SpawnItem { .. } => "spawn_item",
            Self::TransformEntity { .. } => "transform_entity",
            Self::TransformMaterial { .. } => "transform_material",
            Self::EmitEvent { .. } => "emit_event",
            Self::ChainEffect { .. } => "chain_effect",
            Self::TriggerEffect { .. } => "trigger_effect",
            Self::Conditional { .. } => "conditional",
            Self::Repeat { .. } => "repeat",
            Self::Delay { .. } => "delay",
        }
    }

    // === Constructors ===

    #[must_use]
    pub fn deal_damage(damage_type: impl Into<String>, amount: impl Into<Expression>) -> Self {
        Self::DealDamage {
            damage_type: damage_type.into(),
            amount: amount.into(),
        }
    }

    #[must_use]
    pub fn heal(amount: impl Into<Expression>) -> Self {
        Self::Heal { amount: amount.into() }
    }

    #[must_use]
    pub fn apply_status(status: impl Into<String>, stacks: u32, duration: Option<f64>) -> Self {
        Self::ApplyStatus {
            status: status.into(),
            duration: duration.map(Expression::Number),
            stacks: Expression::Number(f64::from(stacks)),
        }
    }

    #[must_use]
    pub fn modify_stat(stat: impl Into<String>, amount: impl Into<Expression>) -> Self {
        Self::ModifyStat {
            stat: stat.into(),
            amount: amount.into(),
            duration: None,
        }
    }

    #[must_use]
    pub fn repeat(times: impl Into<Expression>, operations: Vec<EffectOperation>) -> Self {
        Self::Repeat {
            times: times.into(),
            operations,
        }
    }
}

/// When an effect's operations run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EffectTiming {
    /// Run now.
    #[default]
    Immediate,

    /// Run once, `ticks` after the cast.
    Delayed { ticks: u64 },

    /// Run every `interval` ticks for `duration` ticks after the cast.
    #[serde(alias = "over_time")]
    Periodic { interval: u64, duration: u64 },
}

/// A complete effect.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectExpression {
    /// Identity for chain lookup and cycle detection.
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    pub target: TargetSelector,

    pub operations: Vec<EffectOperation>,

    #[serde(default)]
    pub timing: EffectTiming,

    /// Boolean expressions, ANDed. Unmet conditions are not an error.
    #[serde(default)]
    pub conditions: Vec<Expression>,
}

impl EffectExpression {
    /// Create an immediate effect with no operations.
    #[must_use]
    pub fn new(target: TargetSelector) -> Self {
        Self {
            id: None,
            name: None,
            description: None,
            target,
            operations: Vec::new(),
            timing: EffectTiming::Immediate,
            conditions: Vec::new(),
        }
    }

    /// Parse an effect from the JSON authoring format.
    pub fn from_json(json: &str) -> Result<Self, EffectError> {
        serde_json::from_str(json).map_err(|e| EffectError::validation(format!("effect: {e}")))
    }

    /// Serialize to the JSON authoring format.
    pub fn to_json(&self) -> Result<String, EffectError> {
        serde_json::to_string(self).map_err(|e| EffectError::validation(format!("effect: {e}")))
    }

    /// Static checks run before execution: identifiers against the
    /// registries, literal parameters, shape parameters, timing.
    pub fn validate(&self, registries: &Registries) -> Result<(), EffectError> {
        validation::validate_effect(self, registries)
    }

    // === Builders ===

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_operation(mut self, op: EffectOperation) -> Self {
        self.operations.push(op);
        self
    }

    #[must_use]
    pub fn with_timing(mut self, timing: EffectTiming) -> Self {
        self.timing = timing;
        self
    }

    #[must_use]
    pub fn with_condition(mut self, condition: Expression) -> Self {
        self.conditions.push(condition);
        self
    }
}
