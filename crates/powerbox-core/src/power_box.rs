#![forbid(unsafe_code)]

//! [`PowerBox`]: a value box whose reads and writes run through its family's
//! participant pipelines.
//!
//! # Design
//!
//! A `PowerBox` is a cheap-clone handle. The shared state holds the box id,
//! its family, and a [`RawStorage`] that does the actual reading and writing
//! with no pipeline involvement: a lock-free cell, a delegate to another
//! [`ValueBox`], or a view cache.
//!
//! # Invariants
//!
//! 1. `get` = raw read, get transforms in order, get observers in order.
//! 2. `set(v)` = raw read (original), change transforms in order starting
//!    from `v`, raw write of the final value, change observers in order.
//! 3. If a change observer fails, raw storage holds `original` again before
//!    `set` returns the failure.
//!
//! # Failure Modes
//!
//! - **Change transform fails**: nothing was written, the failure propagates
//!   and raw storage is untouched.
//! - **Rollback write fails**: logged at WARN; the observer failure is still
//!   the one returned.
//! - **Concurrent sets on one box**: writers are not serialized. Readers
//!   never see a torn value but one of the writes may be lost.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use arc_swap::ArcSwap;

use crate::error::BoxError;
use crate::family::Family;
use crate::participant::{BoxRef, ChangeMiddleware, ChangeObserver, GetMiddleware, GetObserver};
use crate::participants::Nullable;
use crate::pipeline;
use crate::value::{BoxId, BoxValue, ChangeSource, Tracked, ValueBox};

/// Pipeline-free storage behind a [`PowerBox`].
pub trait RawStorage<T>: Send + Sync + 'static {
    fn raw_get(&self) -> Result<T, BoxError>;

    fn raw_set(&self, value: T) -> Result<(), BoxError>;
}

/// Lock-free single-value storage.
pub struct SwapCell<T> {
    value: ArcSwap<T>,
}

impl<T> SwapCell<T> {
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            value: ArcSwap::from_pointee(value),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> RawStorage<T> for SwapCell<T> {
    fn raw_get(&self) -> Result<T, BoxError> {
        Ok(T::clone(&self.value.load()))
    }

    fn raw_set(&self, value: T) -> Result<(), BoxError> {
        self.value.store(Arc::new(value));
        Ok(())
    }
}

/// Storage that forwards to another box.
pub struct Delegate<B> {
    inner: B,
}

impl<B> Delegate<B> {
    #[must_use]
    pub fn new(inner: B) -> Self {
        Self { inner }
    }
}

impl<T, B: ValueBox<T> + 'static> RawStorage<T> for Delegate<B> {
    fn raw_get(&self) -> Result<T, BoxError> {
        self.inner.get()
    }

    fn raw_set(&self, value: T) -> Result<(), BoxError> {
        self.inner.set(value)
    }
}

struct BoxInner<T> {
    id: BoxId,
    family: Arc<Family<T>>,
    storage: Arc<dyn RawStorage<T>>,
}

/// A pipelined value box. Clones share the same value.
pub struct PowerBox<T> {
    inner: Arc<BoxInner<T>>,
}

impl<T> Clone for PowerBox<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: BoxValue> PowerBox<T> {
    /// A box in `family` holding `initial`.
    #[must_use]
    pub fn new(family: Arc<Family<T>>, initial: T) -> Self {
        Self::with_storage(family, Arc::new(SwapCell::new(initial)))
    }

    /// A box in `family` whose raw reads and writes go to `inner`.
    #[must_use]
    pub fn upgrade(family: Arc<Family<T>>, inner: impl ValueBox<T> + 'static) -> Self {
        Self::with_storage(family, Arc::new(Delegate::new(inner)))
    }

    #[must_use]
    pub fn with_storage(family: Arc<Family<T>>, storage: Arc<dyn RawStorage<T>>) -> Self {
        Self {
            inner: Arc::new(BoxInner {
                id: BoxId::next(),
                family,
                storage,
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> BoxId {
        self.inner.id
    }

    #[must_use]
    pub fn family(&self) -> &Arc<Family<T>> {
        &self.inner.family
    }

    pub(crate) fn subject(&self) -> BoxRef<'_, T> {
        BoxRef::new(self.inner.id, &self.inner.family)
    }

    /// Raw storage, bypassing every pipeline.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn RawStorage<T>> {
        &self.inner.storage
    }

    /// Reads the value through the get pipeline.
    pub fn get(&self) -> Result<T, BoxError> {
        let subject = self.subject();
        let original = self.inner.storage.raw_get()?;
        let final_value = pipeline::apply_get_middleware(&subject, &original)?;
        pipeline::notify_get_observers(&subject, &original, &final_value)?;
        Ok(final_value)
    }

    /// Writes `requested` through the change pipeline, rolling back if a
    /// change observer fails.
    pub fn set(&self, requested: T) -> Result<&Self, BoxError> {
        let subject = self.subject();
        let storage = &self.inner.storage;
        let original = storage.raw_get()?;
        let final_value = pipeline::apply_change_middleware(&subject, &original, &requested)?;
        storage.raw_set(final_value.clone())?;
        if let Err(err) =
            pipeline::notify_change_observers(&subject, &original, &final_value, &requested)
        {
            tracing::debug!(
                box_id = self.inner.id.raw(),
                family = self.inner.family.description(),
                "change observer failed, rolling back"
            );
            if let Err(rollback) = storage.raw_set(original) {
                tracing::warn!(
                    box_id = self.inner.id.raw(),
                    family = self.inner.family.description(),
                    "rollback failed: {rollback}"
                );
            }
            return Err(err);
        }
        tracing::trace!(
            box_id = self.inner.id.raw(),
            family = self.inner.family.description(),
            "box value changed"
        );
        Ok(self)
    }

    pub fn add_get_middleware(&self, middleware: Arc<dyn GetMiddleware<T>>) -> Result<&Self, BoxError> {
        self.inner.family.add_get_middleware(middleware)?;
        Ok(self)
    }

    pub fn add_get_observer(&self, observer: Arc<dyn GetObserver<T>>) -> Result<&Self, BoxError> {
        self.inner.family.add_get_observer(observer)?;
        Ok(self)
    }

    pub fn add_change_middleware(
        &self,
        middleware: Arc<dyn ChangeMiddleware<T>>,
    ) -> Result<&Self, BoxError> {
        self.inner.family.add_change_middleware(middleware)?;
        Ok(self)
    }

    pub fn add_change_observer(&self, observer: Arc<dyn ChangeObserver<T>>) -> Result<&Self, BoxError> {
        self.inner.family.add_change_observer(observer)?;
        Ok(self)
    }

    pub fn add_get_middlewares<I>(&self, middlewares: I) -> Result<&Self, BoxError>
    where
        I: IntoIterator<Item = Arc<dyn GetMiddleware<T>>>,
    {
        self.inner.family.add_get_middlewares(middlewares)?;
        Ok(self)
    }

    pub fn add_get_observers<I>(&self, observers: I) -> Result<&Self, BoxError>
    where
        I: IntoIterator<Item = Arc<dyn GetObserver<T>>>,
    {
        self.inner.family.add_get_observers(observers)?;
        Ok(self)
    }

    pub fn add_change_middlewares<I>(&self, middlewares: I) -> Result<&Self, BoxError>
    where
        I: IntoIterator<Item = Arc<dyn ChangeMiddleware<T>>>,
    {
        self.inner.family.add_change_middlewares(middlewares)?;
        Ok(self)
    }

    pub fn add_change_observers<I>(&self, observers: I) -> Result<&Self, BoxError>
    where
        I: IntoIterator<Item = Arc<dyn ChangeObserver<T>>>,
    {
        self.inner.family.add_change_observers(observers)?;
        Ok(self)
    }

    /// Rejects sets to `None` for every box of the family.
    pub fn not_null(&self) -> Result<&Self, BoxError>
    where
        T: Nullable,
    {
        self.inner.family.not_null()?;
        Ok(self)
    }

    /// The value as a string (read through the pipeline), or the hidden
    /// placeholder.
    pub fn render(&self) -> Result<String, BoxError> {
        if !self.inner.family.shows_value_strings() {
            return Ok(self.inner.family.hidden_placeholder());
        }
        Ok(format!("{:?}", self.get()?))
    }
}

impl<T: BoxValue> ValueBox<T> for PowerBox<T> {
    fn get(&self) -> Result<T, BoxError> {
        PowerBox::get(self)
    }

    fn set(&self, value: T) -> Result<(), BoxError> {
        PowerBox::set(self, value).map(|_| ())
    }
}

impl<T: BoxValue> Tracked for PowerBox<T> {
    fn box_id(&self) -> BoxId {
        self.inner.id
    }

    fn liveness(&self) -> Weak<dyn Any + Send + Sync> {
        let weak: Weak<BoxInner<T>> = Arc::downgrade(&self.inner);
        weak
    }
}

impl<T: BoxValue> ChangeSource<T> for PowerBox<T> {
    fn family(&self) -> &Arc<Family<T>> {
        &self.inner.family
    }
}

impl<T: BoxValue> fmt::Display for PowerBox<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.render() {
            Ok(rendered) => f.write_str(&rendered),
            Err(err) => write!(f, "[unreadable {}: {err}]", self.inner.family.description()),
        }
    }
}

impl<T> fmt::Debug for PowerBox<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PowerBox")
            .field("id", &self.inner.id)
            .field("family", &self.inner.family.description())
            .finish()
    }
}
