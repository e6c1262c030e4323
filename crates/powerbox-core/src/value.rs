#![forbid(unsafe_code)]

//! Value and identity contracts shared by every kind of box.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::error::BoxError;
use crate::family::Family;

/// Anything a box can hold.
///
/// `Debug` is the rendering used by [`Display`](fmt::Display) impls and by
/// participant failure messages.
pub trait BoxValue: Clone + fmt::Debug + Send + Sync + 'static {}

impl<T: Clone + fmt::Debug + Send + Sync + 'static> BoxValue for T {}

static NEXT_BOX_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique box identity. Ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoxId(u64);

impl BoxId {
    pub(crate) fn next() -> Self {
        Self(NEXT_BOX_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[cfg(test)]
    pub(crate) const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BoxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "box#{}", self.0)
    }
}

/// The minimal container contract: read the value, replace the value.
///
/// Plain holders implement this directly; [`PowerBox::upgrade`] lifts any
/// implementation into a pipelined box.
///
/// [`PowerBox::upgrade`]: crate::PowerBox::upgrade
pub trait ValueBox<T>: Send + Sync {
    fn get(&self) -> Result<T, BoxError>;

    fn set(&self, value: T) -> Result<(), BoxError>;
}

impl<T, B: ValueBox<T> + ?Sized> ValueBox<T> for Arc<B> {
    fn get(&self) -> Result<T, BoxError> {
        (**self).get()
    }

    fn set(&self, value: T) -> Result<(), BoxError> {
        (**self).set(value)
    }
}

/// A box the dependent registry can key on.
pub trait Tracked: Send + Sync {
    fn box_id(&self) -> BoxId;

    /// Weak handle that dies with the box's shared state.
    fn liveness(&self) -> Weak<dyn Any + Send + Sync>;
}

/// A tracked box whose family's change observers can be extended.
pub trait ChangeSource<T>: Tracked {
    fn family(&self) -> &Arc<Family<T>>;
}
