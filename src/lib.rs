//! # spellcode
//!
//! A sandboxed interpreter for declarative spell and ability effects.
//!
//! ## Design Principles
//!
//! 1. **Effects Are Data**: An effect is a JSON document naming a target
//!    selector, a list of operations and a timing. Nothing in it is ever
//!    executed as code.
//!
//! 2. **Untrusted Input**: Every identifier is sanitized and checked against
//!    a registry before it touches a lookup. Expressions can only read
//!    whitelisted paths and call whitelisted functions.
//!
//! 3. **Bounded Work**: The Safety Governor caps operations, nesting, chain
//!    depth, affected entities, wall-clock time, damage and spawns for every
//!    call.
//!
//! 4. **No Rollback**: A failure aborts the call and reports the mutations
//!    already applied alongside the error.
//!
//! ## Modules
//!
//! - `core`: Entities, components, positions, the `World` surface, RNG, configuration
//! - `expr`: Expression AST, variable paths, whitelisted functions, evaluator
//! - `governor`: Per-call limits, identifier sanitization
//! - `effects`: Effect definitions, targeting, registry, interpreter, results
//!
//! ## Example
//!
//! ```
//! use spellcode::prelude::*;
//!
//! let mut world = SimWorld::new();
//! let caster = world.spawn_with(|id| Entity::new(id, "wizard").with_position(0.0, 0.0));
//! let goblin = world.spawn_with(|id| {
//!     Entity::new(id, "goblin").with_position(3.0, 0.0).with_health(20.0, 20.0)
//! });
//!
//! let fireball = EffectExpression::new(TargetSelector::area(5.0).excluding_self())
//!     .with_id("fireball")
//!     .with_operation(EffectOperation::deal_damage("fire", 15.0))
//!     .with_operation(EffectOperation::apply_status("burning", 1, Some(3.0)));
//!
//! let interpreter = EffectInterpreter::production();
//! let result = interpreter
//!     .execute(&fireball, &mut world, &EffectContext::new(caster))
//!     .unwrap();
//!
//! assert_eq!(result.affected_entities, vec![goblin]);
//! assert_eq!(result.damage_dealt, 15.0);
//! assert_eq!(world.entity(goblin).unwrap().status_stacks("burning"), 1);
//! ```

pub mod core;
pub mod expr;
pub mod governor;
pub mod effects;
pub mod error;

pub use crate::error::{ChainViolation, EffectError, EffectFailure};

pub use crate::core::{
    Entity, EntityId, Position, Bounds,
    World, WorldEvent, SimWorld,
    InterpreterConfig, Registries,
};

pub use crate::expr::{Expression, ExpressionEvaluator, Value, VarPath};

pub use crate::governor::{GovernorLimits, GovernorClamp};

pub use crate::effects::{
    EffectContext, EffectExpression, EffectInterpreter, EffectOperation, EffectRegistry,
    EffectResult, EffectTiming, TargetSelector,
};

/// Everything needed to define and run effects.
pub mod prelude {
    pub use crate::core::{Entity, EntityId, Position, SimWorld, World, InterpreterConfig, Registries};
    pub use crate::effects::{
        EffectContext, EffectExpression, EffectInterpreter, EffectOperation, EffectRegistry,
        EffectResult, EffectTiming, TargetFilter, TargetSelector,
    };
    pub use crate::error::{EffectError, EffectFailure};
    pub use crate::expr::{Expression, Value};
    pub use crate::governor::GovernorLimits;
}
