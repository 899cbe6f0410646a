//! Operation dispatch integration tests.
//!
//! One or two tests per operation kind, covering the domain rules each
//! handler enforces before it touches the world.

use spellcode::core::{names, Bounds, Component, Entity, EntityId, Position, SimWorld};
use spellcode::effects::{
    EffectContext, EffectExpression, EffectInterpreter, EffectResult, Modification,
};
use spellcode::{EffectError, EffectFailure, World};

struct Arena {
    world: SimWorld,
    caster: EntityId,
    target: EntityId,
}

impl Arena {
    fn new() -> Self {
        let mut world = SimWorld::new().with_bounds(Bounds::new(
            Position::new(-50.0, -50.0),
            Position::new(50.0, 50.0),
        ));
        let caster = world.spawn_with(|id| {
            Entity::new(id, "wizard")
                .with_position(0.0, 0.0)
                .with_health(80.0, 100.0)
                .with_stat("mana", 40.0)
        });
        let target = world.spawn_with(|id| {
            Entity::new(id, "goblin")
                .with_position(4.0, 0.0)
                .with_health(30.0, 30.0)
                .with_stat("strength", 10.0)
                .with_material("wood")
        });
        Self { world, caster, target }
    }

    fn cast(&mut self, operations: &str) -> Result<EffectResult, EffectFailure> {
        let json = format!(r#"{{"target": {{"type": "single"}}, "operations": [{operations}]}}"#);
        let effect = EffectExpression::from_json(&json).unwrap();
        EffectInterpreter::production().execute(
            &effect,
            &mut self.world,
            &EffectContext::new(self.caster).with_target(self.target),
        )
    }

    fn target(&self) -> &Entity {
        self.world.entity(self.target).unwrap()
    }
}

// === Health ===

#[test]
fn test_negative_damage_heals() {
    let mut arena = Arena::new();
    arena.cast(r#"{"op": "deal_damage", "damageType": "fire", "amount": 12}"#).unwrap();
    assert_eq!(arena.target().stat_value("health"), 18.0);

    let result = arena
        .cast(r#"{"op": "deal_damage", "damageType": "holy", "amount": -12}"#)
        .unwrap();
    assert_eq!(result.healing_done, 12.0);
    assert_eq!(result.damage_dealt, 0.0);
    assert_eq!(arena.target().stat_value("health"), 30.0);
}

#[test]
fn test_negative_heal_is_rejected() {
    let mut arena = Arena::new();
    let failure = arena
        .cast(r#"{"op": "heal", "amount": {"op": "-", "left": 0, "right": 5}}"#)
        .unwrap_err();
    assert!(matches!(failure.error, EffectError::Validation(_)));
    assert_eq!(arena.target().stat_value("health"), 30.0);
}

#[test]
fn test_damage_floors_at_zero_but_totals_dispatched() {
    let mut arena = Arena::new();
    let result = arena
        .cast(r#"{"op": "deal_damage", "damageType": "physical", "amount": 45}"#)
        .unwrap();
    assert_eq!(result.damage_dealt, 45.0);
    assert_eq!(arena.target().stat_value("health"), 0.0);
}

#[test]
fn test_unknown_damage_type_is_validation_error() {
    let mut arena = Arena::new();
    let failure = arena
        .cast(r#"{"op": "deal_damage", "damageType": "sonic", "amount": 5}"#)
        .unwrap_err();
    assert!(matches!(failure.error, EffectError::Validation(_)));
}

// === Statuses ===

#[test]
fn test_status_stacks_accumulate_and_remove() {
    let mut arena = Arena::new();
    arena.cast(r#"{"op": "apply_status", "status": "poisoned", "stacks": 2}"#).unwrap();
    let result = arena
        .cast(r#"{"op": "apply_status", "status": "poisoned", "stacks": 3, "duration": 5}"#)
        .unwrap();
    assert_eq!(result.statuses_applied[0].total, 5);
    assert_eq!(arena.target().status_stacks("poisoned"), 5);

    arena.cast(r#"{"op": "remove_status", "status": "poisoned", "stacks": 2}"#).unwrap();
    assert_eq!(arena.target().status_stacks("poisoned"), 3);

    // Over-removal clamps at zero; negative removal removes nothing.
    arena.cast(r#"{"op": "remove_status", "status": "poisoned", "stacks": -4}"#).unwrap();
    assert_eq!(arena.target().status_stacks("poisoned"), 3);
    arena.cast(r#"{"op": "remove_status", "status": "poisoned", "stacks": 10}"#).unwrap();
    assert_eq!(arena.target().status_stacks("poisoned"), 0);
}

#[test]
fn test_remove_all_stacks() {
    let mut arena = Arena::new();
    arena.cast(r#"{"op": "apply_status", "status": "burning", "stacks": 4}"#).unwrap();
    let result = arena.cast(r#"{"op": "remove_status", "status": "burning", "stacks": "all"}"#).unwrap();
    assert_eq!(arena.target().status_stacks("burning"), 0);
    assert!(matches!(
        result.modifications[0],
        Modification::StatusRemoved { stacks: 4, .. }
    ));
}

#[test]
fn test_timed_status_expires() {
    let mut arena = Arena::new();
    arena
        .cast(r#"{"op": "apply_status", "status": "stunned", "duration": 1}"#)
        .unwrap();
    assert_eq!(arena.target().status_stacks("stunned"), 1);
    arena.world.advance_tick();
    assert_eq!(arena.target().status_stacks("stunned"), 0);
}

#[test]
fn test_unknown_status_mutates_nothing() {
    let mut arena = Arena::new();
    let failure = arena
        .cast(
            r#"{"op": "heal", "amount": 5},
               {"op": "apply_status", "status": "constructor"}"#,
        )
        .unwrap_err();
    assert!(matches!(failure.error, EffectError::InvalidStatus { .. }));
    assert_eq!(failure.partial.operations_executed, 0);
    assert_eq!(arena.target().stat_value("health"), 30.0);
}

// === Stats ===

#[test]
fn test_modify_and_set_stat() {
    let mut arena = Arena::new();
    arena.cast(r#"{"op": "modify_stat", "stat": "strength", "amount": 4}"#).unwrap();
    assert_eq!(arena.target().stat_value("strength"), 14.0);

    arena
        .cast(r#"{"op": "modify_stat", "stat": "strength", "amount": 6, "duration": 3}"#)
        .unwrap();
    assert_eq!(arena.target().stat_value("strength"), 20.0);

    // Overwrites the base and discards the temporary modifier.
    arena.cast(r#"{"op": "set_stat", "stat": "strength", "value": 7}"#).unwrap();
    assert_eq!(arena.target().stat_value("strength"), 7.0);
}

#[test]
fn test_health_stats_route_to_health_component() {
    let mut arena = Arena::new();
    arena.cast(r#"{"op": "set_stat", "stat": "maxHealth", "value": 20}"#).unwrap();
    assert_eq!(arena.target().stat_value("maxHealth"), 20.0);
    assert_eq!(arena.target().stat_value("health"), 20.0);

    arena.cast(r#"{"op": "modify_stat", "stat": "health", "amount": -25}"#).unwrap();
    assert_eq!(arena.target().stat_value("health"), 0.0);
}

#[test]
fn test_timed_max_health_lapses() {
    let mut arena = Arena::new();
    let result = arena
        .cast(r#"{"op": "modify_stat", "stat": "maxHealth", "amount": 50, "duration": 2}"#)
        .unwrap();
    assert_eq!(
        result.modifications,
        vec![Modification::MaxHealth {
            target: arena.target,
            before: 30.0,
            after: 80.0,
            expires_at: Some(2),
        }]
    );
    arena.cast(r#"{"op": "heal", "amount": 40}"#).unwrap();
    assert_eq!(arena.target().stat_value("health"), 70.0);

    arena.world.advance_tick();
    assert_eq!(arena.target().stat_value("maxHealth"), 80.0);
    let report = arena.world.advance_tick();
    assert_eq!(report.lapsed_modifiers, 1);
    assert_eq!(arena.target().stat_value("maxHealth"), 30.0);
    assert_eq!(arena.target().stat_value("health"), 30.0);

    for _ in 0..3 {
        arena.world.advance_tick();
    }
    assert_eq!(arena.target().stat_value("maxHealth"), 30.0);
}

#[test]
fn test_timed_current_health_is_rejected() {
    let mut arena = Arena::new();
    let failure = arena
        .cast(r#"{"op": "modify_stat", "stat": "health", "amount": 10, "duration": 2}"#)
        .unwrap_err();
    assert!(matches!(failure.error, EffectError::Validation(_)));
    assert_eq!(arena.target().stat_value("health"), 30.0);
}

#[test]
fn test_reflective_stat_names_are_rejected() {
    for stat in ["__proto__", "constructor", "prototype", "toString", "hitpoints"] {
        let mut arena = Arena::new();
        let ops = format!(r#"{{"op": "modify_stat", "stat": "{stat}", "amount": 100}}"#);
        let failure = arena.cast(&ops).unwrap_err();
        assert!(
            matches!(failure.error, EffectError::InvalidStat { .. }),
            "'{stat}' should be rejected, got {:?}",
            failure.error
        );
        assert_eq!(arena.target().stat_value("strength"), 10.0);
        assert!(arena.target().stats().unwrap().base.get(stat).is_none());
    }
}

// === Movement ===

#[test]
fn test_teleport_checks_bounds() {
    let mut arena = Arena::new();
    arena
        .cast(r#"{"op": "teleport", "destination": {"x": 10, "y": -5}}"#)
        .unwrap();
    assert_eq!(arena.target().position(), Some(Position::new(10.0, -5.0)));

    let failure = arena
        .cast(r#"{"op": "teleport", "destination": {"x": 500, "y": 0}}"#)
        .unwrap_err();
    assert!(matches!(failure.error, EffectError::InvalidPosition(_)));
    assert_eq!(arena.target().position(), Some(Position::new(10.0, -5.0)));
}

#[test]
fn test_teleport_accepts_location_alias() {
    let mut arena = Arena::new();
    arena
        .cast(r#"{"op": "teleport", "location": {"x": "caster.position.x", "y": 3}}"#)
        .unwrap();
    assert_eq!(arena.target().position(), Some(Position::new(0.0, 3.0)));
}

#[test]
fn test_negative_push_pulls() {
    let mut arena = Arena::new();
    arena.cast(r#"{"op": "push", "distance": 2}"#).unwrap();
    assert_eq!(arena.target().position(), Some(Position::new(6.0, 0.0)));

    arena.cast(r#"{"op": "push", "distance": -3}"#).unwrap();
    assert_eq!(arena.target().position(), Some(Position::new(3.0, 0.0)));
}

#[test]
fn test_push_along_explicit_direction() {
    let mut arena = Arena::new();
    arena
        .cast(r#"{"op": "push", "direction": {"x": 0, "y": 2}, "distance": 5}"#)
        .unwrap();
    assert_eq!(arena.target().position(), Some(Position::new(4.0, 5.0)));

    let failure = arena
        .cast(r#"{"op": "push", "direction": {"x": 0, "y": 0}, "distance": 5}"#)
        .unwrap_err();
    assert!(matches!(failure.error, EffectError::InvalidPosition(_)));
}

#[test]
fn test_pull_toward_point() {
    let mut arena = Arena::new();
    arena
        .cast(r#"{"op": "pull", "toward": {"x": 4, "y": 10}, "distance": 4}"#)
        .unwrap();
    assert_eq!(arena.target().position(), Some(Position::new(4.0, 4.0)));

    arena
        .cast(r#"{"op": "pull", "toward": {"x": 4, "y": 10}, "distance": 100}"#)
        .unwrap();
    assert_eq!(arena.target().position(), Some(Position::new(4.0, 10.0)));
}

// === Spawning ===

#[test]
fn test_spawn_entities_at_caster() {
    let mut arena = Arena::new();
    let before = arena.world.entity_count();
    let result = arena
        .cast(r#"{"op": "spawn_entity", "entityType": "wolf", "count": 2}"#)
        .unwrap();

    assert_eq!(result.entities_spawned, 2);
    assert_eq!(arena.world.entity_count(), before + 2);
    for id in &result.spawned_entities {
        let wolf = arena.world.entity(*id).unwrap();
        assert_eq!(wolf.entity_type, "wolf");
        assert_eq!(wolf.position(), Some(Position::new(0.0, 0.0)));
    }
}

#[test]
fn test_spawn_item_at_point() {
    let mut arena = Arena::new();
    let result = arena
        .cast(r#"{"op": "spawn_item", "itemId": "health_potion", "count": 1, "at": {"x": 2, "y": 2}}"#)
        .unwrap();

    let potion = arena.world.entity(result.spawned_entities[0]).unwrap();
    assert_eq!(potion.item().map(|i| i.item_id.as_str()), Some("health_potion"));
    assert_eq!(potion.position(), Some(Position::new(2.0, 2.0)));
}

#[test]
fn test_spawn_validation() {
    let mut arena = Arena::new();
    let failure = arena
        .cast(r#"{"op": "spawn_entity", "entityType": "dragon"}"#)
        .unwrap_err();
    assert!(matches!(failure.error, EffectError::InvalidEntityType { .. }));

    let failure = arena
        .cast(r#"{"op": "spawn_entity", "entityType": "wolf", "count": {"op": "neg", "operand": 1}}"#)
        .unwrap_err();
    assert!(matches!(failure.error, EffectError::Validation(_)));

    // A computed count must land on a whole number.
    let before = arena.world.entity_count();
    let failure = arena
        .cast(r#"{"op": "spawn_entity", "entityType": "wolf", "count": {"op": "/", "left": 3, "right": 2}}"#)
        .unwrap_err();
    assert!(matches!(failure.error, EffectError::Evaluation(_)));
    assert_eq!(arena.world.entity_count(), before);
}

// === Transformation ===

#[test]
fn test_transform_entity_keeps_id_and_reverts() {
    let mut arena = Arena::new();
    arena
        .cast(r#"{"op": "transform_entity", "toType": "sheep", "duration": 2}"#)
        .unwrap();
    assert_eq!(arena.target().entity_type, "sheep");
    assert_eq!(arena.target().id, arena.target);
    assert_eq!(arena.target().stat_value("health"), 30.0);

    arena.world.advance_tick();
    arena.world.advance_tick();
    assert_eq!(arena.target().entity_type, "goblin");
    assert!(!arena.target().has_component(names::TRANSFORMED));
}

#[test]
fn test_transform_material() {
    let mut arena = Arena::new();
    arena
        .cast(r#"{"op": "transform_material", "from": "stone", "to": "glass"}"#)
        .unwrap();
    assert_eq!(arena.target().material(), Some("wood"));

    arena
        .cast(r#"{"op": "transform_material", "from": "wood", "to": "stone"}"#)
        .unwrap();
    assert_eq!(arena.target().get_component(names::MATERIAL), Some(&Component::Material {
        name: "stone".to_string()
    }));
}

// === Events ===

#[test]
fn test_emit_event_resolves_payload() {
    let mut arena = Arena::new();
    let result = arena
        .cast(
            r#"{"op": "emit_event", "eventType": "spell_cast",
                "payload": {"power": {"op": "*", "left": "caster.mana", "right": 2}, "victim": "target"}}"#,
        )
        .unwrap();

    let event = &arena.world.events()[0];
    assert_eq!(event.event_type, "spell_cast");
    assert_eq!(event.source, Some(arena.caster));
    assert_eq!(event.payload.get("power"), Some(&spellcode::Value::Number(80.0)));
    assert_eq!(event.payload.get("victim"), Some(&spellcode::Value::Entity(arena.target)));
    assert_eq!(result.events_emitted.len(), 1);
}

#[test]
fn test_rejected_event() {
    let mut arena = Arena::new();
    arena.world = arena.world.clone().with_event_capacity(0);
    let failure = arena
        .cast(r#"{"op": "emit_event", "eventType": "spell_cast", "payload": {}}"#)
        .unwrap_err();
    assert_eq!(failure.error, EffectError::EventRejected("spell_cast".to_string()));
}

// === Control Flow ===

#[test]
fn test_conditional_branches() {
    let mut arena = Arena::new();
    let ops = r#"{"op": "conditional",
                  "condition": {"op": ">", "left": "target.health", "right": 20},
                  "then": [{"op": "deal_damage", "damageType": "physical", "amount": 15}],
                  "else": [{"op": "heal", "amount": 1}]}"#;

    let first = arena.cast(ops).unwrap();
    assert_eq!(first.damage_dealt, 15.0);
    let second = arena.cast(ops).unwrap();
    assert_eq!(second.damage_dealt, 0.0);
    assert_eq!(second.healing_done, 1.0);
    assert_eq!(arena.target().stat_value("health"), 16.0);
}

#[test]
fn test_repeat_zero_is_noop() {
    let mut arena = Arena::new();
    let result = arena
        .cast(
            r#"{"op": "repeat", "times": 0,
                "operations": [{"op": "deal_damage", "damageType": "fire", "amount": 10}]}"#,
        )
        .unwrap();
    assert!(result.success);
    assert_eq!(result.damage_dealt, 0.0);
    assert_eq!(result.healing_done, 0.0);
    assert_eq!(arena.target().stat_value("health"), 30.0);
}

#[test]
fn test_repeat_counts_each_operation() {
    let mut arena = Arena::new();
    let result = arena
        .cast(
            r#"{"op": "repeat", "times": 3,
                "operations": [{"op": "deal_damage", "damageType": "fire", "amount": 2},
                               {"op": "heal", "amount": 1}]}"#,
        )
        .unwrap();
    assert_eq!(result.operations_executed, 7);
    assert_eq!(result.damage_dealt, 6.0);
    assert_eq!(arena.target().stat_value("health"), 27.0);
}

#[test]
fn test_trigger_effect_runs_on_same_target() {
    let mut arena = Arena::new();
    let mut interpreter = EffectInterpreter::production();
    interpreter
        .register_effect(
            EffectExpression::from_json(
                r#"{"id": "ignite", "target": {"type": "self"},
                    "operations": [{"op": "apply_status", "status": "burning", "stacks": 2}]}"#,
            )
            .unwrap(),
        )
        .unwrap();

    let effect = EffectExpression::from_json(
        r#"{"target": {"type": "single"},
            "operations": [{"op": "trigger_effect", "effectId": "ignite"}]}"#,
    )
    .unwrap();
    interpreter
        .execute(&effect, &mut arena.world, &EffectContext::new(arena.caster).with_target(arena.target))
        .unwrap();

    assert_eq!(arena.target().status_stacks("burning"), 2);
    assert_eq!(arena.world.entity(arena.caster).unwrap().status_stacks("burning"), 0);
}

#[test]
fn test_unknown_effect_id() {
    let mut arena = Arena::new();
    let failure = arena
        .cast(r#"{"op": "trigger_effect", "effectId": "meteor"}"#)
        .unwrap_err();
    assert_eq!(failure.error, EffectError::UnknownEffect("meteor".to_string()));
}
