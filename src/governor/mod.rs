//! Safety governor.
//!
//! Enforces resource and structural ceilings during one execution:
//! - [`GovernorLimits`]: construct-time ceilings, shared by every call of
//!   one interpreter
//! - [`GovernorCall`]: per-call counters and the visited-effect set
//! - [`sanitize_identifier`]: rejects dangerous lookup keys before any lookup
//!
//! ## Clamp vs. Abort
//!
//! Structural ceilings (operations, depth, chain depth, entities, timeout)
//! abort the whole call. Resource ceilings (damage, spawns) clamp the
//! operation and record a [`GovernorClamp`] instead. Aborts do not roll back
//! mutations already applied.

mod limits;
mod call;
mod sanitize;

pub use limits::GovernorLimits;
pub use call::{ClampedResource, GovernorCall, GovernorClamp};
pub use sanitize::{check_fragments, sanitize_identifier, Rejection, MAX_IDENTIFIER_LEN};
