//! Expression language integration tests.

use proptest::prelude::*;

use spellcode::core::{EffectRng, Entity, EntityId, SimWorld};
use spellcode::expr::{EvalContext, Expression, ExpressionEvaluator, Value};
use spellcode::{EffectError, World};

fn arena() -> (SimWorld, EntityId, EntityId) {
    let mut world = SimWorld::new().at_tick(42);
    let caster = world.spawn_with(|id| {
        Entity::new(id, "wizard")
            .with_position(1.0, 1.0)
            .with_facing(180.0)
            .with_health(60.0, 120.0)
            .with_stat("spellPower", 12.0)
            .with_faction("order")
            .with_marker("channeling")
    });
    let target = world.spawn_with(|id| {
        Entity::new(id, "troll")
            .with_position(4.0, 5.0)
            .with_health(200.0, 200.0)
            .with_stat("armor", 8.0)
    });
    (world, caster, target)
}

fn eval_with(world: &SimWorld, caster: EntityId, target: Option<EntityId>, json: &str) -> Result<Value, EffectError> {
    let expr = Expression::from_json(json)?;
    let mut rng = EffectRng::new(99);
    let mut ctx = EvalContext::new(world, caster, &mut rng).with_target(target);
    ExpressionEvaluator::evaluate(&expr, &mut ctx)
}

fn eval(json: &str) -> Result<Value, EffectError> {
    let (world, caster, target) = arena();
    eval_with(&world, caster, Some(target), json)
}

#[test]
fn test_scaling_formula() {
    // 10 + spellPower * 1.5, reduced by the target's armor.
    let value = eval(
        r#"{"op": "-",
            "left": {"op": "+", "left": 10, "right": {"op": "*", "left": "caster.spellPower", "right": 1.5}},
            "right": "target.stats.armor"}"#,
    )
    .unwrap();
    assert_eq!(value, Value::Number(20.0));
}

#[test]
fn test_entity_accessors() {
    assert_eq!(eval(r#""caster.facing""#).unwrap(), Value::Number(180.0));
    assert_eq!(eval(r#""caster.maxHealth""#).unwrap(), Value::Number(120.0));
    assert_eq!(eval(r#""target.type""#).unwrap(), Value::Text("troll".to_string()));
    assert_eq!(eval(r#""target.position.x""#).unwrap(), Value::Number(4.0));
    assert_eq!(eval(r#""target.luck""#).unwrap(), Value::Number(0.0));
    assert_eq!(eval(r#""world.tick""#).unwrap(), Value::Number(42.0));
}

#[test]
fn test_comparison_and_equality() {
    assert_eq!(
        eval(r#"{"op": "<=", "left": "caster.health", "right": {"op": "/", "left": "caster.maxHealth", "right": 2}}"#).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        eval(r#"{"op": "==", "left": "caster.faction", "right": {"text": "order"}}"#).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        eval(r#"{"op": "!=", "left": "caster", "right": "target"}"#).unwrap(),
        Value::Bool(true)
    );
    // Mixed types do not coerce.
    assert!(matches!(
        eval(r#"{"op": "==", "left": 1, "right": true}"#),
        Err(EffectError::Evaluation(_))
    ));
    assert!(matches!(
        eval(r#"{"op": "<", "left": {"text": "a"}, "right": 1}"#),
        Err(EffectError::Evaluation(_))
    ));
}

#[test]
fn test_truthiness() {
    assert_eq!(eval(r#"{"op": "!", "operand": 0}"#).unwrap(), Value::Bool(true));
    assert_eq!(eval(r#"{"op": "!", "operand": {"text": ""}}"#).unwrap(), Value::Bool(true));
    assert_eq!(eval(r#"{"op": "!", "operand": "target"}"#).unwrap(), Value::Bool(false));
    assert_eq!(eval(r#"{"op": "||", "left": 0, "right": {"text": "x"}}"#).unwrap(), Value::Bool(true));
}

#[test]
fn test_component_functions() {
    assert_eq!(
        eval(r#"{"fn": "has_component", "args": ["caster", {"text": "channeling"}]}"#).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        eval(r#"{"fn": "stacks", "args": ["target", {"text": "poisoned"}]}"#).unwrap(),
        Value::Number(0.0)
    );
    assert_eq!(
        eval(r#"{"fn": "round", "args": [{"fn": "sqrt", "args": [50]}]}"#).unwrap(),
        Value::Number(7.0)
    );
}

#[test]
fn test_function_errors() {
    for json in [
        r#"{"fn": "sqrt", "args": [-1]}"#,
        r#"{"fn": "abs", "args": [1, 2]}"#,
        r#"{"fn": "clamp", "args": [1, 5, 2]}"#,
        r#"{"fn": "eval", "args": [{"text": "1+1"}]}"#,
        r#"{"fn": "__import__", "args": []}"#,
        r#"{"fn": "distance", "args": [1, 2]}"#,
    ] {
        assert!(
            matches!(eval(json), Err(EffectError::Evaluation(_))),
            "{json} should fail evaluation"
        );
    }
}

#[test]
fn test_forbidden_paths_fail_before_evaluation() {
    for path in [
        "caster.__proto__",
        "caster.constructor",
        "target.stats.prototype",
        "caster.hitpoints",
        "window.location",
        "caster.position.x.y",
        "caster.health.value.a.b",
        "caster..health",
        "../caster",
    ] {
        let json = serde_json::to_string(path).unwrap();
        assert!(
            matches!(Expression::from_json(&json), Err(EffectError::Validation(_))),
            "'{path}' should be rejected"
        );
    }
}

#[test]
fn test_unknown_operator_is_rejected() {
    assert!(matches!(
        Expression::from_json(r#"{"op": "**", "left": 2, "right": 3}"#),
        Err(EffectError::Validation(_))
    ));
}

#[test]
fn test_evaluation_does_not_touch_world() {
    let (world, caster, target) = arena();
    let snapshot = world.clone();
    eval_with(
        &world,
        caster,
        Some(target),
        r#"{"op": "&&", "left": {"fn": "random", "args": []}, "right": "target.health"}"#,
    )
    .unwrap();
    for id in [caster, target] {
        assert_eq!(snapshot.entity(id), world.entity(id));
    }
    assert_eq!(snapshot.events(), world.events());
}

proptest! {
    #[test]
    fn prop_arithmetic_matches_f64(a in -1.0e6f64..1.0e6, b in -1.0e6f64..1.0e6) {
        let (world, caster, _) = arena();
        let sum = Expression::binary(spellcode::expr::BinaryOp::Add, a.into(), b.into());
        let mut rng = EffectRng::new(0);
        let mut ctx = EvalContext::new(&world, caster, &mut rng);
        prop_assert_eq!(ExpressionEvaluator::evaluate_number(&sum, &mut ctx).unwrap(), a + b);
    }

    #[test]
    fn prop_random_int_stays_in_range(lo in -100i64..100, span in 0i64..100, seed in any::<u64>()) {
        let (world, caster, _) = arena();
        let hi = lo + span;
        let call = Expression::call("random_int", vec![(lo as f64).into(), (hi as f64).into()]);
        let mut rng = EffectRng::new(seed);
        let mut ctx = EvalContext::new(&world, caster, &mut rng);
        let n = ExpressionEvaluator::evaluate_number(&call, &mut ctx).unwrap();
        prop_assert!(n >= lo as f64 && n <= hi as f64);
        prop_assert_eq!(n.fract(), 0.0);
    }
}
