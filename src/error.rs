//! Error types for effect execution.
//!
//! Every failure the interpreter can raise is a distinct `EffectError`
//! variant so callers can tell a malformed effect from a governor abort.
//!
//! ```
//! use spellcode::EffectError;
//!
//! let err = EffectError::OperationLimitExceeded { limit: 100 };
//! assert!(err.is_governor_abort());
//! assert_eq!(err.to_string(), "operation limit of 100 exceeded");
//! ```

use std::time::Duration;

use thiserror::Error;

use crate::effects::EffectResult;

/// Why a chain or trigger was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainViolation {
    /// The effect is already on the active chain path.
    Cycle,
    /// Entering the chain would exceed `maxChainDepth`.
    DepthLimit { limit: u32 },
}

impl std::fmt::Display for ChainViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cycle => write!(f, "effect re-entered itself"),
            Self::DepthLimit { limit } => write!(f, "chain depth limit of {limit} reached"),
        }
    }
}

/// Errors that can occur while validating or executing an effect.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EffectError {
    // === Shape ===

    /// Structural problem with the effect (missing field, bad literal, ...).
    /// Raised before execution starts.
    #[error("validation error: {0}")]
    Validation(String),

    /// Expression evaluation failed (unresolvable path, type mismatch,
    /// unknown function, non-finite arithmetic).
    #[error("evaluation error: {0}")]
    Evaluation(String),

    // === Domain Whitelists ===

    /// Stat name is forbidden or not a known stat.
    #[error("invalid stat '{name}': {reason}")]
    InvalidStat { name: String, reason: String },

    /// Status name is forbidden or not registered.
    #[error("invalid status '{name}': {reason}")]
    InvalidStatus { name: String, reason: String },

    /// Entity type or item id is forbidden or not registered.
    #[error("invalid entity type '{name}': {reason}")]
    InvalidEntityType { name: String, reason: String },

    /// Material is forbidden or not registered.
    #[error("invalid material '{name}': {reason}")]
    InvalidMaterial { name: String, reason: String },

    /// Coordinates are non-finite, out of bounds, or missing.
    #[error("invalid position: {0}")]
    InvalidPosition(String),

    /// `chain_effect`/`trigger_effect` referenced an unregistered effect.
    #[error("unknown effect '{0}'")]
    UnknownEffect(String),

    /// The world's event sink refused an event.
    #[error("event '{0}' rejected by the world's event sink")]
    EventRejected(String),

    // === Governor ===

    #[error("operation limit of {limit} exceeded")]
    OperationLimitExceeded { limit: u32 },

    #[error("nesting depth limit of {limit} exceeded")]
    DepthLimitExceeded { limit: u32 },

    #[error("chain limit exceeded at '{effect_id}': {reason}")]
    ChainLimitExceeded { effect_id: String, reason: ChainViolation },

    #[error("entity limit of {limit} exceeded")]
    EntityLimitExceeded { limit: u32 },

    #[error("timeout of {budget:?} exceeded")]
    TimeoutExceeded { budget: Duration },
}

impl EffectError {
    /// True for structural-ceiling aborts raised by the safety governor.
    #[must_use]
    pub fn is_governor_abort(&self) -> bool {
        matches!(
            self,
            Self::OperationLimitExceeded { .. }
                | Self::DepthLimitExceeded { .. }
                | Self::ChainLimitExceeded { .. }
                | Self::EntityLimitExceeded { .. }
                | Self::TimeoutExceeded { .. }
        )
    }

    /// Short machine-readable kind, used in logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Evaluation(_) => "evaluation",
            Self::InvalidStat { .. } => "invalid_stat",
            Self::InvalidStatus { .. } => "invalid_status",
            Self::InvalidEntityType { .. } => "invalid_entity_type",
            Self::InvalidMaterial { .. } => "invalid_material",
            Self::InvalidPosition(_) => "invalid_position",
            Self::UnknownEffect(_) => "unknown_effect",
            Self::EventRejected(_) => "event_rejected",
            Self::OperationLimitExceeded { .. } => "operation_limit",
            Self::DepthLimitExceeded { .. } => "depth_limit",
            Self::ChainLimitExceeded { .. } => "chain_limit",
            Self::EntityLimitExceeded { .. } => "entity_limit",
            Self::TimeoutExceeded { .. } => "timeout",
        }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub(crate) fn evaluation(msg: impl Into<String>) -> Self {
        Self::Evaluation(msg.into())
    }
}

/// A failed execution: the error plus everything that happened before it.
///
/// The interpreter has no rollback. `partial` reports the mutations that
/// were already committed to the world when the call aborted.
#[derive(Debug, Error)]
#[error("effect fizzled: {error}")]
pub struct EffectFailure {
    #[source]
    pub error: EffectError,
    pub partial: Box<EffectResult>,
}

impl EffectFailure {
    pub(crate) fn new(error: EffectError, partial: EffectResult) -> Self {
        Self {
            error,
            partial: Box::new(partial),
        }
    }
}
