//! Expression evaluation.
//!
//! The evaluator reads the world through `&dyn World` and never mutates it.
//! The only state it advances is the caller's RNG stream, which
//! `random_int` and `random` draw from.
//!
//! ## Errors
//!
//! Every failure is an [`EffectError::Evaluation`]: unresolvable paths
//! (missing target, missing entity, missing position), operand type
//! mismatches, unknown functions, division by zero and non-finite results.

use crate::core::{EffectRng, EntityId, World};
use crate::error::EffectError;
use crate::governor::sanitize_identifier;

use super::ast::{BinaryOp, Expression, UnaryOp};
use super::function::Function;
use super::path::{EntityField, EntityRoot, PathAccess, VarPath, WorldField};
use super::value::Value;

/// Bindings an expression is evaluated against.
pub struct EvalContext<'a> {
    pub world: &'a dyn World,
    pub caster: EntityId,
    pub target: Option<EntityId>,
    pub rng: &'a mut EffectRng,
}

impl<'a> EvalContext<'a> {
    pub fn new(world: &'a dyn World, caster: EntityId, rng: &'a mut EffectRng) -> Self {
        Self {
            world,
            caster,
            target: None,
            rng,
        }
    }

    /// Bind `target` (builder pattern).
    #[must_use]
    pub fn with_target(mut self, target: Option<EntityId>) -> Self {
        self.target = target;
        self
    }
}

/// Evaluates expressions.
pub struct ExpressionEvaluator;

impl ExpressionEvaluator {
    /// Evaluate an expression to a value.
    pub fn evaluate(expr: &Expression, ctx: &mut EvalContext<'_>) -> Result<Value, EffectError> {
        match expr {
            Expression::Number(n) => finite(*n, "literal").map(Value::Number),
            Expression::Bool(b) => Ok(Value::Bool(*b)),
            Expression::Text { text } => Ok(Value::Text(text.clone())),
            Expression::Path(path) => Self::resolve_path(path, ctx),
            Expression::Unary { op, operand } => {
                let value = Self::evaluate(operand, ctx)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!value.truthy())),
                    UnaryOp::Neg => Ok(Value::Number(-number(&value, "neg")?)),
                }
            }
            Expression::Binary { op, left, right } => Self::binary(*op, left, right, ctx),
            Expression::Call { function, args } => Self::call(function, args, ctx),
        }
    }

    /// Evaluate an expression that must produce a finite number.
    pub fn evaluate_number(expr: &Expression, ctx: &mut EvalContext<'_>) -> Result<f64, EffectError> {
        let value = Self::evaluate(expr, ctx)?;
        number(&value, "expression")
    }

    /// Evaluate an expression for its truthiness.
    pub fn evaluate_bool(expr: &Expression, ctx: &mut EvalContext<'_>) -> Result<bool, EffectError> {
        Self::evaluate(expr, ctx).map(|v| v.truthy())
    }

    /// Evaluate an expression that must produce a whole number.
    ///
    /// Returns the number unchanged; callers decide how negatives are treated.
    pub fn evaluate_integer(expr: &Expression, ctx: &mut EvalContext<'_>) -> Result<f64, EffectError> {
        let n = Self::evaluate_number(expr, ctx)?;
        if n.fract() != 0.0 {
            return Err(EffectError::evaluation(format!("expected a whole number, got {n}")));
        }
        Ok(n)
    }

    // === Paths ===

    fn resolve_path(path: &VarPath, ctx: &EvalContext<'_>) -> Result<Value, EffectError> {
        match path.access() {
            PathAccess::World(WorldField::Tick) => Ok(Value::Number(ctx.world.tick() as f64)),
            PathAccess::World(WorldField::EntityCount) => {
                Ok(Value::Number(ctx.world.entity_count() as f64))
            }
            PathAccess::Entity { root, field } => {
                let id = match root {
                    EntityRoot::Caster => ctx.caster,
                    EntityRoot::Target => ctx.target.ok_or_else(|| {
                        EffectError::evaluation(format!("'{path}': no target is bound"))
                    })?,
                };
                let entity = ctx.world.entity(id).ok_or_else(|| {
                    EffectError::evaluation(format!("'{path}': {id} does not exist"))
                })?;

                let value = match field {
                    EntityField::Ref => Value::Entity(id),
                    EntityField::Id => Value::Number(f64::from(id.raw())),
                    EntityField::Health => Value::Number(entity.stat_value("health")),
                    EntityField::MaxHealth => Value::Number(entity.stat_value("maxHealth")),
                    EntityField::PositionX | EntityField::PositionY => {
                        let pos = entity.position().ok_or_else(|| {
                            EffectError::evaluation(format!("'{path}': {id} has no position"))
                        })?;
                        if matches!(field, EntityField::PositionX) {
                            Value::Number(pos.x)
                        } else {
                            Value::Number(pos.y)
                        }
                    }
                    EntityField::Facing => Value::Number(entity.facing()),
                    EntityField::Faction => Value::Text(entity.faction().unwrap_or_default().to_string()),
                    EntityField::Type => Value::Text(entity.entity_type.clone()),
                    EntityField::Stat(stat) => Value::Number(entity.stat_value(stat)),
                    EntityField::Status(status) => Value::Number(f64::from(entity.status_stacks(status))),
                };
                Ok(value)
            }
        }
    }

    // === Operators ===

    fn binary(
        op: BinaryOp,
        left: &Expression,
        right: &Expression,
        ctx: &mut EvalContext<'_>,
    ) -> Result<Value, EffectError> {
        let l = Self::evaluate(left, ctx)?;

        // Logical operators short-circuit: the right side is only evaluated
        // when the left side does not decide the result.
        match op {
            BinaryOp::And if !l.truthy() => return Ok(Value::Bool(false)),
            BinaryOp::Or if l.truthy() => return Ok(Value::Bool(true)),
            _ => {}
        }

        let r = Self::evaluate(right, ctx)?;
        let sym = op.symbol();

        match op {
            BinaryOp::And | BinaryOp::Or => Ok(Value::Bool(r.truthy())),
            BinaryOp::Eq | BinaryOp::Ne => {
                if std::mem::discriminant(&l) != std::mem::discriminant(&r) {
                    return Err(type_mismatch(sym, &l, &r));
                }
                let equal = l == r;
                Ok(Value::Bool(if op == BinaryOp::Eq { equal } else { !equal }))
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let (a, b) = numbers(sym, &l, &r)?;
                let result = match op {
                    BinaryOp::Lt => a < b,
                    BinaryOp::Le => a <= b,
                    BinaryOp::Gt => a > b,
                    _ => a >= b,
                };
                Ok(Value::Bool(result))
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
                let (a, b) = numbers(sym, &l, &r)?;
                if matches!(op, BinaryOp::Div | BinaryOp::Rem) && b == 0.0 {
                    return Err(EffectError::evaluation(format!("'{sym}' by zero")));
                }
                let result = match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    _ => a % b,
                };
                finite(result, sym).map(Value::Number)
            }
        }
    }

    // === Functions ===

    fn call(name: &str, args: &[Expression], ctx: &mut EvalContext<'_>) -> Result<Value, EffectError> {
        let function = Function::from_name(name)?;
        function.check_arity(args.len())?;

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(Self::evaluate(arg, ctx)?);
        }
        let fname = function.name();

        let result = match function {
            Function::RandomInt => {
                let lo = number(&values[0], fname)?.round() as i64;
                let hi = number(&values[1], fname)?.round() as i64;
                Value::Number(ctx.rng.gen_range_inclusive(lo, hi) as f64)
            }
            Function::Random => Value::Number(ctx.rng.gen_unit()),
            Function::Min | Function::Max => {
                let mut acc = number(&values[0], fname)?;
                for value in &values[1..] {
                    let n = number(value, fname)?;
                    acc = if function == Function::Min { acc.min(n) } else { acc.max(n) };
                }
                Value::Number(acc)
            }
            Function::Abs => Value::Number(number(&values[0], fname)?.abs()),
            Function::Floor => Value::Number(number(&values[0], fname)?.floor()),
            Function::Ceil => Value::Number(number(&values[0], fname)?.ceil()),
            Function::Round => Value::Number(number(&values[0], fname)?.round()),
            Function::Sqrt => {
                let n = number(&values[0], fname)?;
                if n < 0.0 {
                    return Err(EffectError::evaluation(format!("sqrt of negative number {n}")));
                }
                Value::Number(n.sqrt())
            }
            Function::Clamp => {
                let x = number(&values[0], fname)?;
                let lo = number(&values[1], fname)?;
                let hi = number(&values[2], fname)?;
                if lo > hi {
                    return Err(EffectError::evaluation(format!("clamp bounds {lo} > {hi}")));
                }
                Value::Number(x.clamp(lo, hi))
            }
            Function::Distance => {
                let a = entity_position(ctx, &values[0], fname)?;
                let b = entity_position(ctx, &values[1], fname)?;
                Value::Number(a.distance_to(b))
            }
            Function::HasStatus | Function::Stacks => {
                let id = entity(&values[0], fname)?;
                let status = key(&values[1], fname)?;
                let stacks = ctx.world.entity(id).map_or(0, |e| e.status_stacks(status));
                if function == Function::HasStatus {
                    Value::Bool(stacks > 0)
                } else {
                    Value::Number(f64::from(stacks))
                }
            }
            Function::HasComponent => {
                let id = entity(&values[0], fname)?;
                let component = key(&values[1], fname)?;
                Value::Bool(ctx.world.entity(id).is_some_and(|e| e.has_component(component)))
            }
        };

        if let Value::Number(n) = result {
            finite(n, fname)?;
        }
        Ok(result)
    }
}

// === Helpers ===

fn finite(n: f64, what: &str) -> Result<f64, EffectError> {
    if n.is_finite() {
        Ok(n)
    } else {
        Err(EffectError::evaluation(format!("'{what}' produced non-finite number {n}")))
    }
}

fn number(value: &Value, what: &str) -> Result<f64, EffectError> {
    value.as_number().ok_or_else(|| {
        EffectError::evaluation(format!("'{what}' expects a number, got {}", value.type_name()))
    })
}

fn numbers(sym: &str, l: &Value, r: &Value) -> Result<(f64, f64), EffectError> {
    match (l, r) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        _ => Err(type_mismatch(sym, l, r)),
    }
}

fn type_mismatch(sym: &str, l: &Value, r: &Value) -> EffectError {
    EffectError::evaluation(format!(
        "operator '{sym}' cannot combine {} and {}",
        l.type_name(),
        r.type_name()
    ))
}

fn entity(value: &Value, what: &str) -> Result<EntityId, EffectError> {
    value.as_entity().ok_or_else(|| {
        EffectError::evaluation(format!("'{what}' expects an entity, got {}", value.type_name()))
    })
}

/// A text argument used as a lookup key, sanitized before use.
fn key<'v>(value: &'v Value, what: &str) -> Result<&'v str, EffectError> {
    let text = value.as_text().ok_or_else(|| {
        EffectError::evaluation(format!("'{what}' expects text, got {}", value.type_name()))
    })?;
    sanitize_identifier(text).map_err(|r| EffectError::evaluation(format!("'{what}' key '{text}': {r}")))
}

fn entity_position(
    ctx: &EvalContext<'_>,
    value: &Value,
    what: &str,
) -> Result<crate::core::Position, EffectError> {
    let id = entity(value, what)?;
    ctx.world
        .entity(id)
        .and_then(|e| e.position())
        .ok_or_else(|| EffectError::evaluation(format!("'{what}': {id} has no position")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Entity, SimWorld};

    fn world() -> (SimWorld, EntityId, EntityId) {
        let mut world = SimWorld::new().at_tick(7);
        let caster = world.spawn_with(|id| {
            Entity::new(id, "wizard")
                .with_position(0.0, 0.0)
                .with_health(40.0, 100.0)
                .with_stat("mana", 25.0)
                .with_faction("order")
        });
        let target = world.spawn_with(|id| {
            Entity::new(id, "goblin").with_position(3.0, 4.0).with_health(10.0, 10.0)
        });
        (world, caster, target)
    }

    fn eval(world: &SimWorld, caster: EntityId, target: Option<EntityId>, json: &str) -> Result<Value, EffectError> {
        let mut rng = EffectRng::new(1);
        let mut ctx = EvalContext::new(world, caster, &mut rng).with_target(target);
        let expr = Expression::from_json(json)?;
        ExpressionEvaluator::evaluate(&expr, &mut ctx)
    }

    #[test]
    fn test_arithmetic() {
        let (w, c, _) = world();
        assert_eq!(eval(&w, c, None, r#"{"op":"+","left":2,"right":3}"#), Ok(Value::Number(5.0)));
        assert_eq!(eval(&w, c, None, r#"{"op":"%","left":7,"right":4}"#), Ok(Value::Number(3.0)));
        assert_eq!(
            eval(&w, c, None, r#"{"op":"neg","operand":"caster.mana"}"#),
            Ok(Value::Number(-25.0))
        );
    }

    #[test]
    fn test_paths() {
        let (w, c, t) = world();
        assert_eq!(eval(&w, c, Some(t), r#""target.position.y""#), Ok(Value::Number(4.0)));
        assert_eq!(eval(&w, c, Some(t), r#""caster.faction""#), Ok(Value::Text("order".into())));
        assert_eq!(eval(&w, c, Some(t), r#""target.faction""#), Ok(Value::Text(String::new())));
        assert_eq!(eval(&w, c, Some(t), r#""target""#), Ok(Value::Entity(t)));
        assert_eq!(eval(&w, c, None, r#""tick""#), Ok(Value::Number(7.0)));
        assert_eq!(eval(&w, c, None, r#""world.entityCount""#), Ok(Value::Number(2.0)));
        assert_eq!(eval(&w, c, None, r#""caster.status.burning""#), Ok(Value::Number(0.0)));
    }

    #[test]
    fn test_missing_target_is_evaluation_error() {
        let (w, c, _) = world();
        assert!(matches!(
            eval(&w, c, None, r#""target.health""#),
            Err(EffectError::Evaluation(_))
        ));
    }

    #[test]
    fn test_division_by_zero() {
        let (w, c, _) = world();
        assert!(matches!(
            eval(&w, c, None, r#"{"op":"/","left":1,"right":0}"#),
            Err(EffectError::Evaluation(_))
        ));
    }

    #[test]
    fn test_no_string_concatenation() {
        let (w, c, _) = world();
        assert!(matches!(
            eval(&w, c, None, r#"{"op":"+","left":{"text":"a"},"right":{"text":"b"}}"#),
            Err(EffectError::Evaluation(_))
        ));
    }

    #[test]
    fn test_short_circuit_skips_errors() {
        let (w, c, _) = world();
        // The right side would fail: no target is bound.
        assert_eq!(
            eval(&w, c, None, r#"{"op":"&&","left":false,"right":"target.health"}"#),
            Ok(Value::Bool(false))
        );
        assert_eq!(
            eval(&w, c, None, r#"{"op":"||","left":1,"right":"target.health"}"#),
            Ok(Value::Bool(true))
        );
    }

    #[test]
    fn test_functions() {
        let (w, c, t) = world();
        assert_eq!(
            eval(&w, c, Some(t), r#"{"fn":"distance","args":["caster","target"]}"#),
            Ok(Value::Number(5.0))
        );
        assert_eq!(
            eval(&w, c, None, r#"{"fn":"clamp","args":[15,0,10]}"#),
            Ok(Value::Number(10.0))
        );
        assert_eq!(
            eval(&w, c, None, r#"{"fn":"max","args":[1,9,3]}"#),
            Ok(Value::Number(9.0))
        );
        assert_eq!(
            eval(&w, c, Some(t), r#"{"fn":"has_status","args":["target",{"text":"burning"}]}"#),
            Ok(Value::Bool(false))
        );
        assert!(matches!(
            eval(&w, c, None, r#"{"fn":"system","args":[]}"#),
            Err(EffectError::Evaluation(_))
        ));
    }

    #[test]
    fn test_random_int_is_deterministic_and_bounded() {
        let (w, c, _) = world();
        let first = eval(&w, c, None, r#"{"fn":"random_int","args":[1,6]}"#).unwrap();
        let second = eval(&w, c, None, r#"{"fn":"random_int","args":[1,6]}"#).unwrap();
        assert_eq!(first, second);
        let n = first.as_number().unwrap();
        assert!((1.0..=6.0).contains(&n));
    }

    #[test]
    fn test_lookup_key_is_sanitized() {
        let (w, c, _) = world();
        assert!(matches!(
            eval(&w, c, None, r#"{"fn":"has_component","args":["caster",{"text":"__proto__"}]}"#),
            Err(EffectError::Evaluation(_))
        ));
    }
}
