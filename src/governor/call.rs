//! Per-call governor state.
//!
//! A `GovernorCall` is created at the start of one top-level execution and
//! dropped at its end. It is never shared between calls, so counters cannot
//! leak from one cast into the next.

use std::time::{Duration, Instant};

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::core::EntityId;
use crate::error::{ChainViolation, EffectError};

use super::limits::GovernorLimits;

/// Resource a clamp applied to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClampedResource {
    Damage,
    Spawns,
}

/// A resource ceiling reduced an operation's effect.
///
/// Not an error: the operation still succeeds with `granted` instead of
/// `requested`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernorClamp {
    pub resource: ClampedResource,
    pub requested: f64,
    pub granted: f64,
    pub target: Option<EntityId>,
}

/// Running counters for one execution.
#[derive(Debug)]
pub struct GovernorCall<'l> {
    limits: &'l GovernorLimits,
    started: Instant,
    operations: u32,
    depth: u32,
    chain_depth: u32,
    affected: FxHashSet<EntityId>,
    damage: f64,
    spawns: u32,
    /// Effect ids on the active chain/trigger path.
    visited: FxHashSet<String>,
}

impl<'l> GovernorCall<'l> {
    /// Start a call. The wall-clock budget starts now.
    #[must_use]
    pub fn new(limits: &'l GovernorLimits) -> Self {
        Self {
            limits,
            started: Instant::now(),
            operations: 0,
            depth: 0,
            chain_depth: 0,
            affected: FxHashSet::default(),
            damage: 0.0,
            spawns: 0,
            visited: FxHashSet::default(),
        }
    }

    /// Mark the top-level effect as visited so it cannot chain into itself.
    pub fn seed_visited(&mut self, effect_id: &str) {
        self.visited.insert(effect_id.to_string());
    }

    // === Structural Ceilings ===

    /// Timeout checkpoint. The budget is spent once elapsed time reaches it.
    pub fn checkpoint(&self) -> Result<(), EffectError> {
        if let Some(budget) = self.limits.timeout() {
            if self.started.elapsed() >= budget {
                return Err(EffectError::TimeoutExceeded { budget });
            }
        }
        Ok(())
    }

    /// Permit one operation dispatch.
    ///
    /// Runs the timeout checkpoint, then counts the operation. The dispatch
    /// that would exceed `max_operations` is refused before it runs.
    pub fn permit_operation(&mut self) -> Result<(), EffectError> {
        self.checkpoint()?;
        self.operations += 1;
        match self.limits.max_operations {
            Some(limit) if self.operations > limit => {
                Err(EffectError::OperationLimitExceeded { limit })
            }
            _ => Ok(()),
        }
    }

    /// Enter a nested operation list.
    pub fn enter_nested(&mut self) -> Result<(), EffectError> {
        let next = self.depth + 1;
        if let Some(limit) = self.limits.max_depth {
            if next > limit {
                return Err(EffectError::DepthLimitExceeded { limit });
            }
        }
        self.depth = next;
        Ok(())
    }

    /// Leave a nested operation list.
    pub fn exit_nested(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Enter a `chain_effect` body: cycle check, chain depth, then nesting.
    pub fn enter_chain(&mut self, effect_id: &str) -> Result<(), EffectError> {
        self.check_cycle(effect_id)?;
        let next = self.chain_depth + 1;
        if let Some(limit) = self.limits.max_chain_depth {
            if next > limit {
                return Err(EffectError::ChainLimitExceeded {
                    effect_id: effect_id.to_string(),
                    reason: ChainViolation::DepthLimit { limit },
                });
            }
        }
        self.enter_nested()?;
        self.chain_depth = next;
        self.visited.insert(effect_id.to_string());
        Ok(())
    }

    /// Leave a `chain_effect` body.
    pub fn exit_chain(&mut self, effect_id: &str) {
        self.visited.remove(effect_id);
        self.chain_depth = self.chain_depth.saturating_sub(1);
        self.exit_nested();
    }

    /// Enter a `trigger_effect` body: cycle check, then nesting.
    pub fn enter_trigger(&mut self, effect_id: &str) -> Result<(), EffectError> {
        self.check_cycle(effect_id)?;
        self.enter_nested()?;
        self.visited.insert(effect_id.to_string());
        Ok(())
    }

    /// Leave a `trigger_effect` body.
    pub fn exit_trigger(&mut self, effect_id: &str) {
        self.visited.remove(effect_id);
        self.exit_nested();
    }

    fn check_cycle(&self, effect_id: &str) -> Result<(), EffectError> {
        if self.visited.contains(effect_id) {
            Err(EffectError::ChainLimitExceeded {
                effect_id: effect_id.to_string(),
                reason: ChainViolation::Cycle,
            })
        } else {
            Ok(())
        }
    }

    /// Admit an entity into the affected set.
    ///
    /// Returns `true` the first time an entity is admitted.
    pub fn admit_entity(&mut self, id: EntityId) -> Result<bool, EffectError> {
        if self.affected.contains(&id) {
            return Ok(false);
        }
        if let Some(limit) = self.limits.max_entities_affected {
            if self.affected.len() >= limit as usize {
                return Err(EffectError::EntityLimitExceeded { limit });
            }
        }
        self.affected.insert(id);
        Ok(true)
    }

    // === Resource Ceilings ===

    /// Grant as much of `requested` damage as the remaining budget allows.
    pub fn grant_damage(&mut self, requested: f64) -> f64 {
        let granted = match self.limits.max_damage_per_effect {
            Some(limit) => requested.min((limit - self.damage).max(0.0)),
            None => requested,
        };
        self.damage += granted;
        granted
    }

    /// Grant as many of `requested` spawns as the remaining budget allows.
    pub fn grant_spawns(&mut self, requested: u32) -> u32 {
        let granted = match self.limits.max_spawns_per_effect {
            Some(limit) => requested.min(limit.saturating_sub(self.spawns)),
            None => requested,
        };
        self.spawns += granted;
        granted
    }

    // === Introspection ===

    #[must_use]
    pub fn operations(&self) -> u32 {
        self.operations
    }

    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    #[must_use]
    pub fn chain_depth(&self) -> u32 {
        self.chain_depth
    }

    #[must_use]
    pub fn affected(&self) -> &FxHashSet<EntityId> {
        &self.affected
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_limit() {
        let limits = GovernorLimits::default().with_max_operations(2);
        let mut call = GovernorCall::new(&limits);
        assert!(call.permit_operation().is_ok());
        assert!(call.permit_operation().is_ok());
        assert_eq!(
            call.permit_operation(),
            Err(EffectError::OperationLimitExceeded { limit: 2 })
        );
    }

    #[test]
    fn test_depth_limit() {
        let limits = GovernorLimits::default().with_max_depth(1);
        let mut call = GovernorCall::new(&limits);
        assert!(call.enter_nested().is_ok());
        assert_eq!(call.enter_nested(), Err(EffectError::DepthLimitExceeded { limit: 1 }));
        call.exit_nested();
        assert_eq!(call.depth(), 0);
    }

    #[test]
    fn test_chain_cycle_detected() {
        let limits = GovernorLimits::default();
        let mut call = GovernorCall::new(&limits);
        call.seed_visited("nova");
        let err = call.enter_chain("nova").unwrap_err();
        assert!(matches!(
            err,
            EffectError::ChainLimitExceeded { reason: ChainViolation::Cycle, .. }
        ));
    }

    #[test]
    fn test_chain_path_is_scoped() {
        let limits = GovernorLimits::default();
        let mut call = GovernorCall::new(&limits);
        call.enter_chain("bounce").unwrap();
        call.exit_chain("bounce");
        assert!(call.enter_chain("bounce").is_ok());
        assert_eq!(call.chain_depth(), 1);
    }

    #[test]
    fn test_chain_depth_limit() {
        let limits = GovernorLimits::default().with_max_chain_depth(2);
        let mut call = GovernorCall::new(&limits);
        call.enter_chain("a").unwrap();
        call.enter_chain("b").unwrap();
        let err = call.enter_chain("c").unwrap_err();
        assert!(matches!(
            err,
            EffectError::ChainLimitExceeded { reason: ChainViolation::DepthLimit { limit: 2 }, .. }
        ));
    }

    #[test]
    fn test_trigger_does_not_count_chain_depth() {
        let limits = GovernorLimits::default().with_max_chain_depth(0);
        let mut call = GovernorCall::new(&limits);
        assert!(call.enter_trigger("echo").is_ok());
        assert_eq!(call.chain_depth(), 0);
        assert_eq!(call.depth(), 1);
        assert!(call.enter_trigger("echo").is_err());
    }

    #[test]
    fn test_entity_limit() {
        let limits = GovernorLimits::default().with_max_entities_affected(1);
        let mut call = GovernorCall::new(&limits);
        assert_eq!(call.admit_entity(EntityId(1)), Ok(true));
        assert_eq!(call.admit_entity(EntityId(1)), Ok(false));
        assert_eq!(
            call.admit_entity(EntityId(2)),
            Err(EffectError::EntityLimitExceeded { limit: 1 })
        );
    }

    #[test]
    fn test_damage_budget_is_cumulative() {
        let limits = GovernorLimits::default().with_max_damage(50.0);
        let mut call = GovernorCall::new(&limits);
        assert_eq!(call.grant_damage(30.0), 30.0);
        assert_eq!(call.grant_damage(30.0), 20.0);
        assert_eq!(call.grant_damage(30.0), 0.0);
    }

    #[test]
    fn test_spawn_budget() {
        let limits = GovernorLimits::default().with_max_spawns(3);
        let mut call = GovernorCall::new(&limits);
        assert_eq!(call.grant_spawns(2), 2);
        assert_eq!(call.grant_spawns(5), 1);
        assert_eq!(call.grant_spawns(1), 0);
    }

    #[test]
    fn test_zero_timeout_trips_immediately() {
        let limits = GovernorLimits::default().with_timeout(Duration::ZERO);
        let mut call = GovernorCall::new(&limits);
        assert!(matches!(
            call.permit_operation(),
            Err(EffectError::TimeoutExceeded { .. })
        ));
    }
}
