//! Static effect validation.
//!
//! Runs before anything executes, so a malformed or hostile effect fails
//! without touching the world. Checks identifiers against the sanitizer and
//! the registries, and literal parameters against each operation's domain
//! rules. Expression-valued parameters are checked again when they are
//! evaluated.

use crate::core::Registries;
use crate::error::EffectError;
use crate::expr::Expression;

use super::effect::{EffectExpression, EffectOperation, EffectTiming, StackCount};
use super::targeting::TargetSelector;

pub(crate) fn validate_effect(effect: &EffectExpression, registries: &Registries) -> Result<(), EffectError> {
    if let Some(id) = &effect.id {
        registries.check_identifier("effect id", id)?;
    }
    validate_selector(&effect.target, registries)?;

    match effect.timing {
        EffectTiming::Immediate | EffectTiming::Delayed { .. } => {}
        EffectTiming::Periodic { interval, duration } => {
            if interval == 0 {
                return Err(EffectError::validation("periodic interval must be at least 1"));
            }
            if duration < interval {
                return Err(EffectError::validation(format!(
                    "periodic duration {duration} is shorter than interval {interval}"
                )));
            }
        }
    }

    validate_operations(&effect.operations, registries, "operations")
}

fn validate_selector(selector: &TargetSelector, registries: &Registries) -> Result<(), EffectError> {
    selector.check_shape()?;
    if let Some(filter) = &selector.filter {
        for name in &filter.entity_types {
            registries.check_identifier("filter entity type", name)?;
        }
        for name in &filter.factions {
            registries.check_identifier("filter faction", name)?;
        }
        for name in &filter.has_components {
            registries.check_identifier("filter component", name)?;
        }
    }
    Ok(())
}

fn validate_operations(
    ops: &[EffectOperation],
    registries: &Registries,
    list: &str,
) -> Result<(), EffectError> {
    if ops.is_empty() {
        return Err(EffectError::validation(format!("'{list}' must not be empty")));
    }
    ops.iter().try_for_each(|op| validate_operation(op, registries))
}

fn validate_operation(op: &EffectOperation, registries: &Registries) -> Result<(), EffectError> {
    let name = op.name();
    match op {
        EffectOperation::DealDamage { damage_type, amount } => {
            registries.check_damage_type(damage_type)?;
            literal(amount, name, "amount", Domain::Any)
        }
        EffectOperation::Heal { amount } => literal(amount, name, "amount", Domain::NonNegative),
        EffectOperation::ApplyStatus { status, duration, stacks } => {
            registries.check_status(status)?;
            literal(stacks, name, "stacks", Domain::Count)?;
            optional(duration.as_ref(), name, "duration", Domain::NonNegative)
        }
        EffectOperation::RemoveStatus { status, stacks } => {
            registries.check_status(status)?;
            match stacks {
                // Negative counts remove nothing; they are not an error.
                StackCount::Count(expr) => literal(expr, name, "stacks", Domain::Any),
                StackCount::All(_) => Ok(()),
            }
        }
        EffectOperation::ModifyStat { stat, amount, duration } => {
            registries.check_stat(stat)?;
            literal(amount, name, "amount", Domain::Any)?;
            optional(duration.as_ref(), name, "duration", Domain::NonNegative)
        }
        EffectOperation::SetStat { stat, value } => {
            registries.check_stat(stat)?;
            literal(value, name, "value", Domain::Any)
        }
        EffectOperation::Teleport { destination } => {
            position_literal(&destination.x, name)?;
            position_literal(&destination.y, name)
        }
        EffectOperation::Push { direction, distance } => {
            if let Some(dir) = direction {
                position_literal(&dir.x, name)?;
                position_literal(&dir.y, name)?;
            }
            literal(distance, name, "distance", Domain::Any)
        }
        EffectOperation::Pull { toward, distance } => {
            if let Some(point) = toward {
                position_literal(&point.x, name)?;
                position_literal(&point.y, name)?;
            }
            literal(distance, name, "distance", Domain::Any)
        }
        EffectOperation::SpawnEntity { entity_type, count, at } => {
            registries.check_entity_type(entity_type)?;
            literal(count, name, "count", Domain::Count)?;
            if let Some(at) = at {
                position_literal(&at.x, name)?;
                position_literal(&at.y, name)?;
            }
            Ok(())
        }
        EffectOperation::SpawnItem { item_id, count, at } => {
            registries.check_item(item_id)?;
            literal(count, name, "count", Domain::Count)?;
            if let Some(at) = at {
                position_literal(&at.x, name)?;
                position_literal(&at.y, name)?;
            }
            Ok(())
        }
        EffectOperation::TransformEntity { to_type, duration } => {
            registries.check_entity_type(to_type)?;
            optional(duration.as_ref(), name, "duration", Domain::NonNegative)
        }
        EffectOperation::TransformMaterial { from, to } => {
            registries.check_material(from)?;
            registries.check_material(to)
        }
        EffectOperation::EmitEvent { event_type, payload } => {
            registries.check_identifier("event type", event_type)?;
            payload
                .keys()
                .try_for_each(|key| registries.check_identifier("payload key", key))
        }
        EffectOperation::ChainEffect { effect_id, new_target } => {
            registries.check_identifier("effect id", effect_id)?;
            validate_selector(new_target, registries)
        }
        EffectOperation::TriggerEffect { effect_id } => {
            registries.check_identifier("effect id", effect_id)
        }
        EffectOperation::Conditional { then, otherwise, .. } => {
            validate_operations(then, registries, "then")?;
            match otherwise {
                Some(ops) => validate_operations(ops, registries, "else"),
                None => Ok(()),
            }
        }
        EffectOperation::Repeat { times, operations } => {
            literal(times, name, "times", Domain::Count)?;
            validate_operations(operations, registries, "operations")
        }
        EffectOperation::Delay { ticks, then } => {
            literal(ticks, name, "ticks", Domain::Count)?;
            validate_operations(then, registries, "then")
        }
    }
}

/// What a literal number must satisfy.
#[derive(Clone, Copy)]
enum Domain {
    /// Any finite number.
    Any,
    /// Finite and `>= 0`.
    NonNegative,
    /// A whole number `>= 0`.
    Count,
}

/// Check a literal parameter. Non-literal expressions pass; they are
/// checked when evaluated.
fn literal(expr: &Expression, op: &str, field: &str, domain: Domain) -> Result<(), EffectError> {
    let Some(n) = expr.literal_number() else {
        return Ok(());
    };
    let ok = n.is_finite()
        && match domain {
            Domain::Any => true,
            Domain::NonNegative => n >= 0.0,
            Domain::Count => n >= 0.0 && n.fract() == 0.0,
        };
    if ok {
        Ok(())
    } else {
        let expected = match domain {
            Domain::Any => "a finite number",
            Domain::NonNegative => "a non-negative number",
            Domain::Count => "a non-negative whole number",
        };
        Err(EffectError::validation(format!("{op}.{field} must be {expected}, got {n}")))
    }
}

fn optional(expr: Option<&Expression>, op: &str, field: &str, domain: Domain) -> Result<(), EffectError> {
    expr.map_or(Ok(()), |e| literal(e, op, field, domain))
}

fn position_literal(expr: &Expression, op: &str) -> Result<(), EffectError> {
    match expr.literal_number() {
        Some(n) if !n.is_finite() => Err(EffectError::InvalidPosition(format!(
            "{op}: coordinate {n} is not finite"
        ))),
        _ => Ok(()),
    }
}
