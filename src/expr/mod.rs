//! The expression language.
//!
//! Expressions are small trees of literals, variable paths, operators and
//! whitelisted function calls. They appear wherever an operation takes a
//! number, in conditions, and in custom target predicates.
//!
//! ## Usage
//!
//! ```
//! use spellcode::core::{EffectRng, Entity, SimWorld};
//! use spellcode::expr::{EvalContext, Expression, ExpressionEvaluator, Value};
//!
//! let mut world = SimWorld::new();
//! let caster = world.spawn_with(|id| Entity::new(id, "wizard").with_health(30.0, 100.0));
//!
//! let expr = Expression::from_json(
//!     r#"{"op": "<", "left": "caster.health", "right": {"op": "*", "left": "caster.maxHealth", "right": 0.5}}"#,
//! ).unwrap();
//!
//! let mut rng = EffectRng::new(0);
//! let mut ctx = EvalContext::new(&world, caster, &mut rng);
//! assert_eq!(ExpressionEvaluator::evaluate(&expr, &mut ctx).unwrap(), Value::Bool(true));
//! ```

pub mod value;
pub mod path;
pub mod ast;
pub mod function;
pub mod evaluator;

pub use value::Value;
pub use path::{EntityField, EntityRoot, PathAccess, VarPath, WorldField, MAX_PATH_SEGMENTS};
pub use ast::{BinaryOp, Expression, UnaryOp};
pub use function::Function;
pub use evaluator::{EvalContext, ExpressionEvaluator};
