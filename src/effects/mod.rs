//! Effect definitions and execution.
//!
//! - `EffectExpression`: a declarative effect (selector, operations, timing)
//! - `TargetSelector`: how an effect picks the entities it acts on
//! - `EffectRegistry`: named effects for `chain_effect` / `trigger_effect`
//! - `EffectInterpreter`: runs effects under the governor
//! - `EffectResult`: what a run did
//!
//! ## Data, Not Code
//!
//! Effects arrive as JSON written by players or content tools. Nothing in an
//! effect is executed as code: operation names map to a closed enum, names
//! are checked against registries, and expressions are evaluated by a small
//! whitelisted evaluator.

mod effect;
mod interpreter;
mod registry;
mod result;
mod targeting;
mod validation;

pub use effect::{AllStacks, Coordinates, EffectExpression, EffectOperation, EffectTiming, StackCount};
pub use interpreter::{EffectContext, EffectInterpreter};
pub use registry::EffectRegistry;
pub use result::{
    AppliedStatus, EffectResult, Modification, ResultReason, ScheduledExecution, ScheduledWork,
};
pub use targeting::{
    TargetFilter, TargetResolver, TargetScope, TargetSelector, TargetShape, EDGE_TOLERANCE,
};
