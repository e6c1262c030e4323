#![forbid(unsafe_code)]

//! Derived and self-valued boxes.
//!
//! - [`DependentRegistry`]: weak association from a box to the dependents
//!   that must hear about its changes.
//! - [`View`]: a box whose value is calculated from other boxes and cached
//!   until one of them changes.
//! - [`WrapperBox`]: a box that *is* a mutable composite value and announces
//!   its own mutations.
//!
//! # Architecture
//!
//! Depending on a box adds the registry's notifier to the box's family
//! change observers. After every committed set of that box, the notifier
//! looks up the box's dependents and calls each of them in registration
//! order. A dependent failure fails the source's set, which rolls it back.

pub mod dependents;
pub mod view;
pub mod wrapper;

pub use dependents::{Dependent, DependentRegistry, SourceChange};
pub use view::View;
pub use wrapper::{WrapperBox, WrapperCell};
