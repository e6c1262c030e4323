#![forbid(unsafe_code)]

//! Reactive value boxes.
//!
//! A box holds one value. Boxes that share a [`Family`] share four ordered
//! participant lists that run on every read and write:
//!
//! - get transforms and get observers ([`GetMiddleware`], [`GetObserver`]),
//! - change transforms and change observers ([`ChangeMiddleware`],
//!   [`ChangeObserver`]).
//!
//! A change observer failure rolls the write back. [`View`]s derive cached
//! values from other boxes, and [`WrapperBox`]es turn in-place mutation of a
//! composite value into change notifications.
//!
//! # Example
//!
//! ```
//! use powerbox_core::{Boxes, Scope, participants::RequireBounds};
//! use std::sync::Arc;
//!
//! let boxes = Boxes::new();
//! let volume = boxes.cell(Scope::new("Settings"), "volume", 3);
//! volume.add_change_observer(Arc::new(RequireBounds::between(0, 10).unwrap())).unwrap();
//! assert!(volume.set(15).is_err());
//! assert_eq!(volume.get().unwrap(), 3);
//! ```

pub mod context;
pub mod error;
pub mod family;
pub mod participant;
pub mod participant_list;
pub mod participants;
mod pipeline;
pub mod power_box;
pub mod reactive;
pub mod registry;
pub mod value;

pub use context::{Boxes, BoxesConfig};
pub use error::{
    BoxError, ParticipantFailure, ParticipantFault, ParticipationDetails, Result, Unsupported,
};
pub use family::{Family, Scope};
pub use participant::{
    BoxRef, ChangeMiddleware, ChangeObserver, GetMiddleware, GetObserver, Participant,
    ParticipantKind, change_middleware, change_observer, get_middleware, get_observer, same_value,
};
pub use participant_list::ParticipantList;
pub use power_box::{Delegate, PowerBox, RawStorage, SwapCell};
pub use reactive::{Dependent, DependentRegistry, SourceChange, View, WrapperBox, WrapperCell};
pub use registry::FamilyRegistry;
pub use value::{BoxId, BoxValue, ChangeSource, Tracked, ValueBox};
