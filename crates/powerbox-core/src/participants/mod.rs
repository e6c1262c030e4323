#![forbid(unsafe_code)]

//! Ready-made participants.

mod bounds;
mod change_log;
mod default_value;
mod not_null;

pub use bounds::{Bound, BoundsError, EnsureBounds, RequireBounds};
pub use change_log::{ChangeLogger, describe_change};
pub use default_value::DefaultValue;
pub use not_null::{Nullable, RejectNull};
