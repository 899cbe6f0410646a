//! Execution reports.
//!
//! An [`EffectResult`] is built up while an effect runs and handed back by
//! value. On failure the same structure travels inside
//! [`EffectFailure`](crate::EffectFailure) as the partial report of what
//! had already been applied.

use serde::{Deserialize, Serialize};

use crate::core::{EntityId, Position, WorldEvent};
use crate::governor::GovernorClamp;

use super::effect::{EffectExpression, EffectOperation, EffectTiming};

/// Why a successful call did not run its operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultReason {
    /// A top-level condition evaluated false. Nothing was mutated.
    ConditionsNotMet,
    /// The effect is delayed or periodic; see `scheduled`.
    Scheduled,
    /// A scheduled request fired after its caster or fixed target left the world.
    ParticipantGone,
}

/// A status application recorded in the report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedStatus {
    pub target: EntityId,
    pub status: String,
    /// Stacks added by this application.
    pub stacks: u32,
    /// Total stacks afterwards.
    pub total: u32,
}

/// One world mutation, in the order it was applied.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Modification {
    Health {
        target: EntityId,
        before: f64,
        after: f64,
    },
    MaxHealth {
        target: EntityId,
        before: f64,
        after: f64,
        expires_at: Option<u64>,
    },
    Stat {
        target: EntityId,
        stat: String,
        before: f64,
        after: f64,
        expires_at: Option<u64>,
    },
    StatusRemoved {
        target: EntityId,
        status: String,
        stacks: u32,
    },
    Moved {
        target: EntityId,
        from: Option<Position>,
        to: Position,
    },
    Spawned {
        entity: EntityId,
        entity_type: String,
        at: Position,
    },
    Transformed {
        target: EntityId,
        from_type: String,
        to_type: String,
        expires_at: Option<u64>,
    },
    Material {
        target: EntityId,
        from: String,
        to: String,
    },
}

/// Work a scheduling request carries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ScheduledWork {
    /// A delayed or periodic effect: resolve its selector and run it.
    Effect { effect: Box<EffectExpression> },
    /// A `delay` operation: run `operations` against a fixed target.
    Operations {
        target: EntityId,
        operations: Vec<EffectOperation>,
    },
}

/// A request for the game loop to call back later.
///
/// The interpreter never waits. The caller stores these and hands each one
/// back to [`EffectInterpreter::run_scheduled`](super::EffectInterpreter::run_scheduled)
/// at every tick listed by [`due_ticks`](Self::due_ticks).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledExecution {
    pub caster: EntityId,
    pub target: Option<EntityId>,
    /// First tick the work is due.
    pub due_tick: u64,
    /// Repeat interval for periodic effects.
    pub period: Option<u64>,
    /// Last tick a periodic effect may run on.
    pub last_tick: Option<u64>,
    pub work: ScheduledWork,
}

impl ScheduledExecution {
    /// Every tick this request should run on, in order.
    #[must_use]
    pub fn due_ticks(&self) -> Vec<u64> {
        match (self.period, self.last_tick) {
            (Some(period), Some(last)) if period > 0 => {
                (self.due_tick..=last).step_by(period as usize).collect()
            }
            _ => vec![self.due_tick],
        }
    }

    /// Whether the request has a run due at `tick`.
    #[must_use]
    pub fn is_due_at(&self, tick: u64) -> bool {
        match (self.period, self.last_tick) {
            (Some(period), Some(last)) if period > 0 => {
                tick >= self.due_tick && tick <= last && (tick - self.due_tick) % period == 0
            }
            _ => tick == self.due_tick,
        }
    }
}

/// The outcome of one `execute` call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectResult {
    pub success: bool,
    pub reason: Option<ResultReason>,
    pub effect_id: Option<String>,

    // === Entities ===
    /// Every entity an operation list ran on, first-seen order, no repeats.
    pub affected_entities: Vec<EntityId>,
    pub entities_spawned: u32,
    pub spawned_entities: Vec<EntityId>,

    // === Totals ===
    /// Damage dispatched after governor clamping.
    pub damage_dealt: f64,
    pub healing_done: f64,
    pub chain_count: u32,
    pub operations_executed: u32,

    // === Details ===
    pub statuses_applied: Vec<AppliedStatus>,
    pub events_emitted: Vec<WorldEvent>,
    pub modifications: Vec<Modification>,
    pub clamps: Vec<GovernorClamp>,
    pub scheduled: Vec<ScheduledExecution>,

    // === Timing ===
    pub timing: EffectTiming,
    pub elapsed_micros: u64,
}

impl EffectResult {
    /// An empty report for an effect.
    #[must_use]
    pub fn new(effect_id: Option<String>, timing: EffectTiming) -> Self {
        Self {
            effect_id,
            timing,
            ..Self::default()
        }
    }

    /// Whether any governor clamp applied.
    #[must_use]
    pub fn was_clamped(&self) -> bool {
        !self.clamps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(due: u64, period: Option<u64>, last: Option<u64>) -> ScheduledExecution {
        ScheduledExecution {
            caster: EntityId(1),
            target: None,
            due_tick: due,
            period,
            last_tick: last,
            work: ScheduledWork::Operations {
                target: EntityId(1),
                operations: vec![EffectOperation::heal(1.0)],
            },
        }
    }

    #[test]
    fn test_due_ticks_once() {
        let req = request(12, None, None);
        assert_eq!(req.due_ticks(), vec![12]);
        assert!(req.is_due_at(12));
        assert!(!req.is_due_at(13));
    }

    #[test]
    fn test_due_ticks_periodic() {
        let req = request(12, Some(2), Some(18));
        assert_eq!(req.due_ticks(), vec![12, 14, 16, 18]);
        assert!(req.is_due_at(16));
        assert!(!req.is_due_at(15));
        assert!(!req.is_due_at(20));
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(EffectResult::default()).unwrap();
        assert!(json.get("damageDealt").is_some());
        assert!(json.get("affectedEntities").is_some());
    }
}
