//! Effect execution.
//!
//! The `EffectInterpreter` runs effects against a [`World`]. Each call owns
//! a private `Execution`: a fresh [`GovernorCall`], an RNG stream and the
//! report being built. Nothing survives from one call to the next.
//!
//! ## Order of Work
//!
//! 1. Static validation (identifiers, literals, shapes, timing)
//! 2. Top-level conditions; unmet means success with no side effects
//! 3. Timing: delayed and periodic effects only return a scheduling request
//! 4. Target resolution, then every operation against every target in order
//!
//! Every dispatch passes the governor first. A structural ceiling aborts the
//! whole call; mutations already applied stay applied and are reported in
//! [`EffectFailure::partial`].

use tracing::{debug, info, warn};

use crate::core::{
    names, Component, EffectRng, Entity, EntityId, InterpreterConfig, ItemStack, Position,
    Transformation, World, WorldEvent,
};
use crate::error::{EffectError, EffectFailure};
use crate::expr::{EvalContext, Expression, ExpressionEvaluator, Value};
use crate::governor::{ClampedResource, GovernorCall, GovernorClamp};

use super::effect::{Coordinates, EffectExpression, EffectOperation, EffectTiming, StackCount};
use super::registry::EffectRegistry;
use super::result::{
    AppliedStatus, EffectResult, Modification, ResultReason, ScheduledExecution, ScheduledWork,
};
use super::targeting::{TargetResolver, TargetScope, TargetSelector};

/// Who is casting and at whom.
///
/// The tick is read from the world when the call starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EffectContext {
    pub caster: EntityId,
    /// The designated target used by `single` selectors and `target.*` paths
    /// in top-level conditions.
    pub target: Option<EntityId>,
    /// Overrides the interpreter's RNG seed for this call.
    pub seed: Option<u64>,
}

impl EffectContext {
    #[must_use]
    pub fn new(caster: EntityId) -> Self {
        Self {
            caster,
            target: None,
            seed: None,
        }
    }

    /// Set the designated target (builder pattern).
    #[must_use]
    pub fn with_target(mut self, target: EntityId) -> Self {
        self.target = Some(target);
        self
    }

    /// Set the RNG seed (builder pattern).
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Executes effects.
///
/// Configuration and the effect registry are fixed per interpreter; all
/// counters live in the per-call execution.
///
/// ## Example
///
/// ```
/// use spellcode::core::{Entity, SimWorld};
/// use spellcode::effects::{EffectContext, EffectExpression, EffectInterpreter};
///
/// let mut world = SimWorld::new();
/// let caster = world.spawn_with(|id| Entity::new(id, "cleric").with_health(50.0, 100.0));
///
/// let mend = EffectExpression::from_json(r#"{
///     "target": {"type": "self"},
///     "operations": [{"op": "heal", "amount": 10}],
///     "timing": {"type": "immediate"}
/// }"#).unwrap();
///
/// let interpreter = EffectInterpreter::production();
/// let result = interpreter.execute(&mend, &mut world, &EffectContext::new(caster)).unwrap();
///
/// assert!(result.success);
/// assert_eq!(result.affected_entities, vec![caster]);
/// assert_eq!(result.healing_done, 10.0);
/// ```
#[derive(Clone, Debug, Default)]
pub struct EffectInterpreter {
    config: InterpreterConfig,
    effects: EffectRegistry,
}

impl EffectInterpreter {
    #[must_use]
    pub fn new(config: InterpreterConfig) -> Self {
        Self {
            config,
            effects: EffectRegistry::new(),
        }
    }

    /// An interpreter with every governor ceiling set.
    #[must_use]
    pub fn production() -> Self {
        Self::new(InterpreterConfig::production())
    }

    /// Replace the effect registry (builder pattern).
    #[must_use]
    pub fn with_effects(mut self, effects: EffectRegistry) -> Self {
        self.effects = effects;
        self
    }

    /// Validate an effect against this interpreter's registries and make it
    /// available to `chain_effect` and `trigger_effect`.
    pub fn register_effect(&mut self, effect: EffectExpression) -> Result<(), EffectError> {
        effect.validate(&self.config.registries)?;
        self.effects.register(effect)
    }

    #[must_use]
    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    #[must_use]
    pub fn effects(&self) -> &EffectRegistry {
        &self.effects
    }

    /// Execute an effect.
    ///
    /// Runs to completion before returning. On failure the error comes with
    /// the partial report; there is no rollback.
    pub fn execute(
        &self,
        effect: &EffectExpression,
        world: &mut dyn World,
        ctx: &EffectContext,
    ) -> Result<EffectResult, EffectFailure> {
        let report = EffectResult::new(effect.id.clone(), effect.timing.clone());
        let mut exec = Execution::new(self, ctx.caster, ctx.seed, world.tick(), report);
        let outcome = exec.run_top_level(effect, world, ctx.target);
        exec.finish(outcome)
    }

    /// Execute a scheduling request previously returned in
    /// [`EffectResult::scheduled`].
    ///
    /// Runs under a fresh governor call at the world's current tick. The
    /// effect's conditions are not checked again.
    pub fn run_scheduled(
        &self,
        request: &ScheduledExecution,
        world: &mut dyn World,
    ) -> Result<EffectResult, EffectFailure> {
        let report = match &request.work {
            ScheduledWork::Effect { effect } => EffectResult::new(effect.id.clone(), effect.timing.clone()),
            ScheduledWork::Operations { .. } => EffectResult::new(None, EffectTiming::Immediate),
        };
        let mut exec = Execution::new(self, request.caster, None, world.tick(), report);
        let outcome = exec.run_request(request, world);
        exec.finish(outcome)
    }
}

/// Per-call state.
struct Execution<'i> {
    interp: &'i EffectInterpreter,
    governor: GovernorCall<'i>,
    rng: EffectRng,
    result: EffectResult,
    caster: EntityId,
    tick: u64,
}

impl<'i> Execution<'i> {
    fn new(
        interp: &'i EffectInterpreter,
        caster: EntityId,
        seed: Option<u64>,
        tick: u64,
        result: EffectResult,
    ) -> Self {
        let rng = EffectRng::new(seed.unwrap_or(interp.config.rng_seed))
            .for_context(&format!("{}@{tick}", caster.raw()));
        Self {
            interp,
            governor: GovernorCall::new(&interp.config.limits),
            rng,
            result,
            caster,
            tick,
        }
    }

    fn finish(mut self, outcome: Result<(), EffectError>) -> Result<EffectResult, EffectFailure> {
        self.result.elapsed_micros =
            u64::try_from(self.governor.elapsed().as_micros()).unwrap_or(u64::MAX);

        match outcome {
            Ok(()) => {
                self.result.success = true;
                info!(
                    effect = ?self.result.effect_id,
                    affected = self.result.affected_entities.len(),
                    damage = self.result.damage_dealt,
                    healing = self.result.healing_done,
                    operations = self.result.operations_executed,
                    "effect executed"
                );
                Ok(self.result)
            }
            Err(error) => {
                self.result.success = false;
                warn!(
                    effect = ?self.result.effect_id,
                    kind = error.kind(),
                    operations = self.result.operations_executed,
                    %error,
                    "effect fizzled"
                );
                Err(EffectFailure::new(error, self.result))
            }
        }
    }

    // === Entry Points ===

    fn run_top_level(
        &mut self,
        effect: &EffectExpression,
        world: &mut dyn World,
        target: Option<EntityId>,
    ) -> Result<(), EffectError> {
        effect.validate(&self.interp.config.registries)?;
        if world.entity(self.caster).is_none() {
            return Err(EffectError::validation(format!("caster {} does not exist", self.caster)));
        }
        if let Some(id) = &effect.id {
            self.governor.seed_visited(id);
        }

        if !self.conditions_met(&*world, &effect.conditions, target)? {
            self.result.reason = Some(ResultReason::ConditionsNotMet);
            return Ok(());
        }

        let (due_tick, period, last_tick) = match effect.timing {
            EffectTiming::Immediate => return self.run_effect(world, effect, self.caster, target),
            EffectTiming::Delayed { ticks } => (self.tick.saturating_add(ticks), None, None),
            EffectTiming::Periodic { interval, duration } => (
                self.tick.saturating_add(interval),
                Some(interval),
                Some(self.tick.saturating_add(duration)),
            ),
        };

        self.result.reason = Some(ResultReason::Scheduled);
        self.result.scheduled.push(ScheduledExecution {
            caster: self.caster,
            target,
            due_tick,
            period,
            last_tick,
            work: ScheduledWork::Effect {
                effect: Box::new(effect.clone()),
            },
        });
        Ok(())
    }

    fn run_request(&mut self, request: &ScheduledExecution, world: &mut dyn World) -> Result<(), EffectError> {
        match &request.work {
            ScheduledWork::Effect { effect } => {
                effect.validate(&self.interp.config.registries)?;
                if world.entity(self.caster).is_none() {
                    self.result.reason = Some(ResultReason::ParticipantGone);
                    return Ok(());
                }
                if let Some(id) = &effect.id {
                    self.governor.seed_visited(id);
                }
                self.run_effect(world, effect, self.caster, request.target)
            }
            ScheduledWork::Operations { target, operations } => {
                if world.entity(*target).is_none() {
                    self.result.reason = Some(ResultReason::ParticipantGone);
                    return Ok(());
                }
                self.run_on_target(world, operations, *target)
            }
        }
    }

    // === Traversal ===

    fn conditions_met(
        &mut self,
        world: &dyn World,
        conditions: &[Expression],
        target: Option<EntityId>,
    ) -> Result<bool, EffectError> {
        for condition in conditions {
            let mut ctx = EvalContext::new(world, self.caster, &mut self.rng).with_target(target);
            if !ExpressionEvaluator::evaluate_bool(condition, &mut ctx)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn resolve(
        &mut self,
        world: &dyn World,
        selector: &TargetSelector,
        origin: EntityId,
        designated: Option<EntityId>,
    ) -> Result<Vec<EntityId>, EffectError> {
        let scope = TargetScope {
            caster: self.caster,
            origin,
            designated,
            excluded: self.governor.affected(),
        };
        TargetResolver::resolve(selector, world, &scope, self.interp.config.line_width, &mut self.rng)
    }

    /// Resolve an effect's own selector and run its operations.
    fn run_effect(
        &mut self,
        world: &mut dyn World,
        effect: &EffectExpression,
        origin: EntityId,
        designated: Option<EntityId>,
    ) -> Result<(), EffectError> {
        let targets = self.resolve(&*world, &effect.target, origin, designated)?;
        for target in targets {
            self.run_on_target(world, &effect.operations, target)?;
        }
        Ok(())
    }

    /// Admit a target and run an operation list on it.
    fn run_on_target(
        &mut self,
        world: &mut dyn World,
        ops: &[EffectOperation],
        target: EntityId,
    ) -> Result<(), EffectError> {
        if self.governor.admit_entity(target)? {
            self.result.affected_entities.push(target);
        }
        self.run_operations(world, ops, target)
    }

    fn run_operations(
        &mut self,
        world: &mut dyn World,
        ops: &[EffectOperation],
        target: EntityId,
    ) -> Result<(), EffectError> {
        for op in ops {
            self.dispatch(world, op, target)?;
        }
        Ok(())
    }

    /// Run a nested operation list one level deeper.
    fn run_nested(
        &mut self,
        world: &mut dyn World,
        ops: &[EffectOperation],
        target: EntityId,
    ) -> Result<(), EffectError> {
        self.governor.enter_nested()?;
        let outcome = self.run_operations(world, ops, target);
        self.governor.exit_nested();
        outcome
    }

    // === Dispatch ===

    fn dispatch(
        &mut self,
        world: &mut dyn World,
        op: &EffectOperation,
        target: EntityId,
    ) -> Result<(), EffectError> {
        self.governor.permit_operation()?;
        self.result.operations_executed += 1;
        debug!(
            op = op.name(),
            target = target.raw(),
            depth = self.governor.depth(),
            "dispatch"
        );

        match op {
            EffectOperation::DealDamage { damage_type, amount } => {
                self.deal_damage(world, target, damage_type, amount)
            }
            EffectOperation::Heal { amount } => {
                let amount = self.eval_number(&*world, amount, target)?;
                if amount < 0.0 {
                    return Err(EffectError::validation(format!(
                        "heal amount must not be negative, got {amount}"
                    )));
                }
                self.apply_healing(world, target, amount);
                Ok(())
            }
            EffectOperation::ApplyStatus { status, duration, stacks } => {
                self.apply_status(world, target, status, duration.as_ref(), stacks)
            }
            EffectOperation::RemoveStatus { status, stacks } => {
                self.remove_status(world, target, status, stacks)
            }
            EffectOperation::ModifyStat { stat, amount, duration } => {
                self.modify_stat(world, target, stat, amount, duration.as_ref())
            }
            EffectOperation::SetStat { stat, value } => self.set_stat(world, target, stat, value),
            EffectOperation::Teleport { destination } => {
                let to = self.eval_point(&*world, destination, target)?;
                check_bounds(&*world, to, "teleport")?;
                self.move_entity(world, target, to);
                Ok(())
            }
            EffectOperation::Push { direction, distance } => {
                self.push(world, target, direction.as_ref(), distance)
            }
            EffectOperation::Pull { toward, distance } => {
                self.pull(world, target, toward.as_ref(), distance)
            }
            EffectOperation::SpawnEntity { entity_type, count, at } => {
                self.interp.config.registries.check_entity_type(entity_type)?;
                self.spawn(world, target, entity_type, None, count, at.as_ref())
            }
            EffectOperation::SpawnItem { item_id, count, at } => {
                self.interp.config.registries.check_item(item_id)?;
                self.spawn(world, target, names::ITEM, Some(item_id), count, at.as_ref())
            }
            EffectOperation::TransformEntity { to_type, duration } => {
                self.transform_entity(world, target, to_type, duration.as_ref())
            }
            EffectOperation::TransformMaterial { from, to } => {
                self.transform_material(world, target, from, to)
            }
            EffectOperation::EmitEvent { event_type, payload } => {
                self.emit_event(world, target, event_type, payload)
            }
            EffectOperation::ChainEffect { effect_id, new_target } => {
                self.chain_effect(world, target, effect_id, new_target)
            }
            EffectOperation::TriggerEffect { effect_id } => {
                self.trigger_effect(world, target, effect_id)
            }
            EffectOperation::Conditional { condition, then, otherwise } => {
                let met = {
                    let mut ctx =
                        EvalContext::new(&*world, self.caster, &mut self.rng).with_target(Some(target));
                    ExpressionEvaluator::evaluate_bool(condition, &mut ctx)?
                };
                match if met { Some(then) } else { otherwise.as_ref() } {
                    Some(branch) => self.run_nested(world, branch, target),
                    None => Ok(()),
                }
            }
            EffectOperation::Repeat { times, operations } => {
                let times = self.eval_count(&*world, times, target, "repeat.times")?;
                if times == 0 {
                    return Ok(());
                }
                self.governor.enter_nested()?;
                let outcome =
                    (0..times).try_for_each(|_| self.run_operations(world, operations, target));
                self.governor.exit_nested();
                outcome
            }
            EffectOperation::Delay { ticks, then } => {
                let ticks = self.eval_count(&*world, ticks, target, "delay.ticks")?;
                self.result.scheduled.push(ScheduledExecution {
                    caster: self.caster,
                    target: Some(target),
                    due_tick: self.tick.saturating_add(u64::from(ticks)),
                    period: None,
                    last_tick: None,
                    work: ScheduledWork::Operations {
                        target,
                        operations: then.clone(),
                    },
                });
                Ok(())
            }
        }
    }

    // === Health ===

    fn deal_damage(
        &mut self,
        world: &mut dyn World,
        target: EntityId,
        damage_type: &str,
        amount: &Expression,
    ) -> Result<(), EffectError> {
        self.interp.config.registries.check_damage_type(damage_type)?;
        let requested = self.eval_number(&*world, amount, target)?;

        // Negative damage heals by the same magnitude.
        if requested < 0.0 {
            self.apply_healing(world, target, -requested);
            return Ok(());
        }

        let granted = self.governor.grant_damage(requested);
        if granted < requested {
            self.record_clamp(ClampedResource::Damage, requested, granted, target);
        }
        self.result.damage_dealt += granted;

        if let Some(health) = world.entity_mut(target).and_then(Entity::health_mut) {
            let before = health.current;
            let after = health.damage(granted);
            self.result.modifications.push(Modification::Health { target, before, after });
        }
        Ok(())
    }

    fn apply_healing(&mut self, world: &mut dyn World, target: EntityId, amount: f64) {
        self.result.healing_done += amount;
        if let Some(health) = world.entity_mut(target).and_then(Entity::health_mut) {
            let before = health.current;
            let after = health.heal(amount);
            self.result.modifications.push(Modification::Health { target, before, after });
        }
    }

    // === Statuses ===

    fn apply_status(
        &mut self,
        world: &mut dyn World,
        target: EntityId,
        status: &str,
        duration: Option<&Expression>,
        stacks: &Expression,
    ) -> Result<(), EffectError> {
        self.interp.config.registries.check_status(status)?;
        let stacks = self.eval_count(&*world, stacks, target, "apply_status.stacks")?;
        let expires_at = self.expiry(&*world, duration, target, "apply_status.duration")?;
        if stacks == 0 {
            return Ok(());
        }

        let Some(entity) = world.entity_mut(target) else {
            return Ok(());
        };
        let total = entity.statuses_mut().apply(status, stacks, expires_at);
        self.result.statuses_applied.push(AppliedStatus {
            target,
            status: status.to_string(),
            stacks,
            total,
        });
        Ok(())
    }

    fn remove_status(
        &mut self,
        world: &mut dyn World,
        target: EntityId,
        status: &str,
        stacks: &StackCount,
    ) -> Result<(), EffectError> {
        self.interp.config.registries.check_status(status)?;
        let requested = match stacks {
            StackCount::All(_) => None,
            StackCount::Count(expr) => {
                let n = self.eval_number(&*world, expr, target)?;
                // Negative counts remove nothing.
                Some(if n > 0.0 { n.floor() as u32 } else { 0 })
            }
        };
        if requested == Some(0) {
            return Ok(());
        }

        let Some(entity) = world.entity_mut(target) else {
            return Ok(());
        };
        if entity.statuses().is_none() {
            return Ok(());
        }
        let removed = entity.statuses_mut().remove(status, requested);
        if removed > 0 {
            self.result.modifications.push(Modification::StatusRemoved {
                target,
                status: status.to_string(),
                stacks: removed,
            });
        }
        Ok(())
    }

    // === Stats ===

    fn modify_stat(
        &mut self,
        world: &mut dyn World,
        target: EntityId,
        stat: &str,
        amount: &Expression,
        duration: Option<&Expression>,
    ) -> Result<(), EffectError> {
        self.interp.config.registries.check_stat(stat)?;
        let amount = self.eval_number(&*world, amount, target)?;
        let expires_at = self.expiry(&*world, duration, target, "modify_stat.duration")?;
        if stat == "health" && expires_at.is_some() {
            return Err(EffectError::validation(
                "modify_stat: current health cannot change temporarily; use maxHealth",
            ));
        }

        let Some(entity) = world.entity_mut(target) else {
            return Ok(());
        };
        let modification = match stat {
            "health" => entity.health_mut().map(|h| {
                let before = h.current;
                h.current = (h.current + amount).clamp(0.0, h.max);
                Modification::Health { target, before, after: h.current }
            }),
            "maxHealth" => entity.health_mut().map(|h| {
                let before = h.max;
                let after = h.adjust_max(amount, expires_at);
                Modification::MaxHealth { target, before, after, expires_at }
            }),
            _ => {
                let block = entity.stats_mut();
                let before = block.effective(stat);
                match expires_at {
                    Some(_) => block.add_modifier(stat, amount, expires_at),
                    None => *block.base.entry(stat.to_string()).or_insert(0.0) += amount,
                }
                Some(Modification::Stat {
                    target,
                    stat: stat.to_string(),
                    before,
                    after: block.effective(stat),
                    expires_at,
                })
            }
        };
        self.result.modifications.extend(modification);
        Ok(())
    }

    fn set_stat(
        &mut self,
        world: &mut dyn World,
        target: EntityId,
        stat: &str,
        value: &Expression,
    ) -> Result<(), EffectError> {
        self.interp.config.registries.check_stat(stat)?;
        let value = self.eval_number(&*world, value, target)?;

        let Some(entity) = world.entity_mut(target) else {
            return Ok(());
        };
        let modification = match stat {
            "health" => entity.health_mut().map(|h| {
                let before = h.current;
                h.current = value.clamp(0.0, h.max);
                Modification::Health { target, before, after: h.current }
            }),
            "maxHealth" => entity.health_mut().map(|h| {
                let before = h.max;
                let after = h.set_max(value);
                Modification::MaxHealth {
                    target,
                    before,
                    after,
                    expires_at: None,
                }
            }),
            _ => {
                let block = entity.stats_mut();
                let before = block.effective(stat);
                block.set_base(stat, value);
                Some(Modification::Stat {
                    target,
                    stat: stat.to_string(),
                    before,
                    after: value,
                    expires_at: None,
                })
            }
        };
        self.result.modifications.extend(modification);
        Ok(())
    }

    // === Movement ===

    fn push(
        &mut self,
        world: &mut dyn World,
        target: EntityId,
        direction: Option<&Coordinates>,
        distance: &Expression,
    ) -> Result<(), EffectError> {
        let distance = self.eval_number(&*world, distance, target)?;
        let Some(from) = world.entity(target).and_then(Entity::position) else {
            return Ok(());
        };

        let dir = match direction {
            Some(coords) => self
                .eval_point(&*world, coords, target)?
                .normalized()
                .ok_or_else(|| EffectError::InvalidPosition("push direction is a zero vector".to_string()))?,
            None => {
                let caster = world.entity(self.caster);
                let anchor = caster.and_then(Entity::position).ok_or_else(|| {
                    EffectError::InvalidPosition("caster has no position to push away from".to_string())
                })?;
                (from - anchor)
                    .normalized()
                    .unwrap_or_else(|| Position::from_degrees(caster.map_or(0.0, Entity::facing)))
            }
        };

        let to = from + dir.scaled(distance);
        check_bounds(&*world, to, "push")?;
        self.move_entity(world, target, to);
        Ok(())
    }

    fn pull(
        &mut self,
        world: &mut dyn World,
        target: EntityId,
        toward: Option<&Coordinates>,
        distance: &Expression,
    ) -> Result<(), EffectError> {
        let distance = self.eval_number(&*world, distance, target)?;
        let Some(from) = world.entity(target).and_then(Entity::position) else {
            return Ok(());
        };

        let anchor = match toward {
            Some(coords) => self.eval_point(&*world, coords, target)?,
            None => world.entity(self.caster).and_then(Entity::position).ok_or_else(|| {
                EffectError::InvalidPosition("caster has no position to pull toward".to_string())
            })?,
        };

        let offset = anchor - from;
        let Some(dir) = offset.normalized() else {
            // Already at the anchor.
            return Ok(());
        };
        // A pull never carries the target past the anchor.
        let step = if distance > 0.0 { distance.min(offset.length()) } else { distance };

        let to = from + dir.scaled(step);
        check_bounds(&*world, to, "pull")?;
        self.move_entity(world, target, to);
        Ok(())
    }

    fn move_entity(&mut self, world: &mut dyn World, target: EntityId, to: Position) {
        if let Some(entity) = world.entity_mut(target) {
            let from = entity.position();
            entity.set_position(to);
            self.result.modifications.push(Modification::Moved { target, from, to });
        }
    }

    // === Spawning and Transformation ===

    fn spawn(
        &mut self,
        world: &mut dyn World,
        target: EntityId,
        entity_type: &str,
        item_id: Option<&str>,
        count: &Expression,
        at: Option<&Coordinates>,
    ) -> Result<(), EffectError> {
        let requested = self.eval_count(&*world, count, target, "spawn.count")?;
        let at = match at {
            Some(coords) => self.eval_point(&*world, coords, target)?,
            None => world.entity(self.caster).and_then(Entity::position).ok_or_else(|| {
                EffectError::InvalidPosition("caster has no position to spawn at".to_string())
            })?,
        };
        check_bounds(&*world, at, "spawn")?;

        let granted = self.governor.grant_spawns(requested);
        if granted < requested {
            self.record_clamp(ClampedResource::Spawns, f64::from(requested), f64::from(granted), target);
        }

        for _ in 0..granted {
            let id = world.create_entity(entity_type);
            if let Some(entity) = world.entity_mut(id) {
                entity.set_position(at);
                if let Some(item_id) = item_id {
                    entity.add_component(
                        names::ITEM,
                        Component::Item(ItemStack {
                            item_id: item_id.to_string(),
                            count: 1,
                        }),
                    );
                }
            }
            self.result.spawned_entities.push(id);
            self.result.entities_spawned += 1;
            self.result.modifications.push(Modification::Spawned {
                entity: id,
                entity_type: entity_type.to_string(),
                at,
            });
        }
        Ok(())
    }

    fn transform_entity(
        &mut self,
        world: &mut dyn World,
        target: EntityId,
        to_type: &str,
        duration: Option<&Expression>,
    ) -> Result<(), EffectError> {
        self.interp.config.registries.check_entity_type(to_type)?;
        let expires_at = self.expiry(&*world, duration, target, "transform_entity.duration")?;

        let Some(entity) = world.entity_mut(target) else {
            return Ok(());
        };
        let from_type = std::mem::replace(&mut entity.entity_type, to_type.to_string());
        // Stacked transformations still revert to the first form.
        let original_type = entity
            .transformation()
            .map_or_else(|| from_type.clone(), |t| t.original_type.clone());
        entity.add_component(
            names::TRANSFORMED,
            Component::Transformed(Transformation { original_type, expires_at }),
        );
        self.result.modifications.push(Modification::Transformed {
            target,
            from_type,
            to_type: to_type.to_string(),
            expires_at,
        });
        Ok(())
    }

    fn transform_material(
        &mut self,
        world: &mut dyn World,
        target: EntityId,
        from: &str,
        to: &str,
    ) -> Result<(), EffectError> {
        let interp = self.interp;
        let registries = &interp.config.registries;
        registries.check_material(from)?;
        registries.check_material(to)?;

        let Some(entity) = world.entity_mut(target) else {
            return Ok(());
        };
        if entity.material() != Some(from) {
            return Ok(());
        }
        entity.add_component(names::MATERIAL, Component::Material { name: to.to_string() });
        self.result.modifications.push(Modification::Material {
            target,
            from: from.to_string(),
            to: to.to_string(),
        });
        Ok(())
    }

    // === Events ===

    fn emit_event(
        &mut self,
        world: &mut dyn World,
        target: EntityId,
        event_type: &str,
        payload: &std::collections::BTreeMap<String, Expression>,
    ) -> Result<(), EffectError> {
        let interp = self.interp;
        let registries = &interp.config.registries;
        registries.check_identifier("event type", event_type)?;

        let mut event = WorldEvent::new(event_type, self.tick)
            .with_source(self.caster)
            .with_target(target);
        for (key, expr) in payload {
            registries.check_identifier("payload key", key)?;
            let value = self.eval(&*world, expr, target)?;
            event = event.with_value(key.clone(), value);
        }

        if !world.emit_event(event.clone()) {
            return Err(EffectError::EventRejected(event_type.to_string()));
        }
        self.result.events_emitted.push(event);
        Ok(())
    }

    // === Re-entry ===

    fn chain_effect(
        &mut self,
        world: &mut dyn World,
        target: EntityId,
        effect_id: &str,
        new_target: &TargetSelector,
    ) -> Result<(), EffectError> {
        let interp = self.interp;
        let chained = interp.effects.require(effect_id)?;
        self.governor.enter_chain(effect_id)?;
        self.result.chain_count += 1;

        let outcome = self.run_chained(world, target, chained, new_target);
        self.governor.exit_chain(effect_id);
        outcome
    }

    fn run_chained(
        &mut self,
        world: &mut dyn World,
        target: EntityId,
        chained: &EffectExpression,
        new_target: &TargetSelector,
    ) -> Result<(), EffectError> {
        chained.validate(&self.interp.config.registries)?;
        if !self.conditions_met(&*world, &chained.conditions, Some(target))? {
            return Ok(());
        }
        let targets = self.resolve(&*world, new_target, target, Some(target))?;
        for next in targets {
            self.run_on_target(world, &chained.operations, next)?;
        }
        Ok(())
    }

    fn trigger_effect(
        &mut self,
        world: &mut dyn World,
        target: EntityId,
        effect_id: &str,
    ) -> Result<(), EffectError> {
        let interp = self.interp;
        let triggered = interp.effects.require(effect_id)?;
        self.governor.enter_trigger(effect_id)?;

        let outcome = self.run_triggered(world, target, triggered);
        self.governor.exit_trigger(effect_id);
        outcome
    }

    fn run_triggered(
        &mut self,
        world: &mut dyn World,
        target: EntityId,
        triggered: &EffectExpression,
    ) -> Result<(), EffectError> {
        triggered.validate(&self.interp.config.registries)?;
        if !self.conditions_met(&*world, &triggered.conditions, Some(target))? {
            return Ok(());
        }
        self.run_operations(world, &triggered.operations, target)
    }

    // === Evaluation Helpers ===

    fn eval(&mut self, world: &dyn World, expr: &Expression, target: EntityId) -> Result<Value, EffectError> {
        let mut ctx = EvalContext::new(world, self.caster, &mut self.rng).with_target(Some(target));
        ExpressionEvaluator::evaluate(expr, &mut ctx)
    }

    fn eval_number(&mut self, world: &dyn World, expr: &Expression, target: EntityId) -> Result<f64, EffectError> {
        let mut ctx = EvalContext::new(world, self.caster, &mut self.rng).with_target(Some(target));
        ExpressionEvaluator::evaluate_number(expr, &mut ctx)
    }

    /// A non-negative whole number. Values past `u32::MAX` saturate.
    fn eval_count(
        &mut self,
        world: &dyn World,
        expr: &Expression,
        target: EntityId,
        what: &str,
    ) -> Result<u32, EffectError> {
        let mut ctx = EvalContext::new(world, self.caster, &mut self.rng).with_target(Some(target));
        let n = ExpressionEvaluator::evaluate_integer(expr, &mut ctx)?;
        if n < 0.0 {
            return Err(EffectError::validation(format!("{what} must not be negative, got {n}")));
        }
        Ok(n as u32)
    }

    /// Expiry tick for an optional duration. Absent or zero is permanent.
    fn expiry(
        &mut self,
        world: &dyn World,
        duration: Option<&Expression>,
        target: EntityId,
        what: &str,
    ) -> Result<Option<u64>, EffectError> {
        let Some(expr) = duration else {
            return Ok(None);
        };
        let ticks = self.eval_number(world, expr, target)?;
        if ticks < 0.0 {
            return Err(EffectError::validation(format!("{what} must not be negative, got {ticks}")));
        }
        if ticks == 0.0 {
            return Ok(None);
        }
        Ok(Some(self.tick.saturating_add(ticks.ceil() as u64)))
    }

    fn eval_point(
        &mut self,
        world: &dyn World,
        coords: &Coordinates,
        target: EntityId,
    ) -> Result<Position, EffectError> {
        let x = self.eval_number(world, &coords.x, target)?;
        let y = self.eval_number(world, &coords.y, target)?;
        let point = Position::new(x, y);
        if point.is_finite() {
            Ok(point)
        } else {
            Err(EffectError::InvalidPosition(format!("{point} is not finite")))
        }
    }

    fn record_clamp(&mut self, resource: ClampedResource, requested: f64, granted: f64, target: EntityId) {
        warn!(?resource, requested, granted, target = target.raw(), "governor clamp");
        self.result.clamps.push(GovernorClamp {
            resource,
            requested,
            granted,
            target: Some(target),
        });
    }
}

fn check_bounds(world: &dyn World, point: Position, op: &str) -> Result<(), EffectError> {
    if world.bounds().contains(point) {
        Ok(())
    } else {
        Err(EffectError::InvalidPosition(format!("{op}: {point} is outside the world bounds")))
    }
}
