#![forbid(unsafe_code)]

//! Cached values calculated from other boxes.
//!
//! # Design
//!
//! A [`View<T>`] is a pipelined box whose raw storage is a cache. Reading an
//! invalid cache runs the calculation and stores the result; reading a valid
//! cache returns the stored value. The view registers itself with the
//! [`DependentRegistry`](crate::DependentRegistry) for each box it depends
//! on and reacts to their changes:
//!
//! - if the view's family has change observers, it recalculates at once and
//!   notifies them with `(previous, new, new)`;
//! - otherwise it only invalidates, and the next read recalculates.
//!
//! Which of the two happens is decided per change, so adding an observer
//! later switches a lazy view to eager from then on. A view that another view
//! depends on always has the registry's notifier among its observers and is
//! therefore eager.
//!
//! # Invariants
//!
//! 1. While valid, the cache equals the last calculated result.
//! 2. The calculation runs only when a read finds the cache invalid or when
//!    an observed view hears about a change.
//! 3. `version()` increases by exactly 1 per calculation.
//! 4. A view cannot be set, and its family accepts no change transforms.
//!
//! # Failure Modes
//!
//! - **Calculation fails**: the cache stays invalid and the failure
//!   propagates (to the reader, or to the source's set, which rolls back).
//! - **Observer fails after an eager recalculation**: the previous cached
//!   value is restored, the cache is marked invalid, and the failure
//!   propagates to the source's set.
//! - **Concurrent invalidation during a lazy recalculation**: the result may
//!   be stored as valid although a source changed meanwhile.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::context::Boxes;
use crate::error::{BoxError, Unsupported};
use crate::family::Family;
use crate::participant::{ChangeObserver, GetMiddleware, GetObserver};
use crate::pipeline;
use crate::power_box::{PowerBox, RawStorage};
use crate::reactive::dependents::{Dependent, SourceChange, WeakDependentRegistry};
use crate::value::{BoxId, BoxValue, ChangeSource, Tracked, ValueBox};

type Calculation<T> = Box<dyn Fn() -> Result<T, BoxError> + Send + Sync>;

struct CacheState<T> {
    cached: Option<T>,
    valid: bool,
}

struct ViewCache<T> {
    family: Arc<str>,
    calculate: Calculation<T>,
    state: Mutex<CacheState<T>>,
    version: AtomicU64,
}

impl<T: BoxValue> ViewCache<T> {
    fn lock(&self) -> MutexGuard<'_, CacheState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn calculate(&self) -> Result<T, BoxError> {
        let value = (self.calculate)()?;
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::trace!(family = %self.family, version, "view recalculated");
        Ok(value)
    }

    fn invalidate(&self) {
        self.lock().valid = false;
    }
}

impl<T: BoxValue> RawStorage<T> for ViewCache<T> {
    fn raw_get(&self) -> Result<T, BoxError> {
        {
            let state = self.lock();
            if state.valid {
                if let Some(cached) = &state.cached {
                    return Ok(cached.clone());
                }
            }
        }
        let value = self.calculate()?;
        let mut state = self.lock();
        state.cached = Some(value.clone());
        state.valid = true;
        Ok(value)
    }

    fn raw_set(&self, _value: T) -> Result<(), BoxError> {
        Err(Unsupported::SetOnView {
            family: self.family.to_string(),
        }
        .into())
    }
}

struct ViewInner<T> {
    output: PowerBox<T>,
    cache: Arc<ViewCache<T>>,
    // The registry owns this view once it depends on something.
    dependents: WeakDependentRegistry,
}

impl<T: BoxValue> Dependent for ViewInner<T> {
    fn dependent_id(&self) -> BoxId {
        self.output.id()
    }

    fn source_changed(&self, _change: &SourceChange<'_>) -> Result<(), BoxError> {
        if self.output.family().change_observers().is_empty() {
            self.cache.invalidate();
            return Ok(());
        }

        let value = match self.cache.calculate() {
            Ok(value) => value,
            Err(err) => {
                self.cache.invalidate();
                return Err(err);
            }
        };
        let previous = {
            let mut state = self.cache.lock();
            let previous = state.cached.replace(value.clone());
            state.valid = true;
            previous
        };
        let original = previous.clone().unwrap_or_else(|| value.clone());
        let subject = self.output.subject();
        if let Err(err) = pipeline::notify_change_observers(&subject, &original, &value, &value) {
            let mut state = self.cache.lock();
            state.cached = previous;
            state.valid = false;
            return Err(err);
        }
        Ok(())
    }
}

/// A box whose value is calculated from other boxes and cached.
///
/// Cloning a `View` creates a new handle to the **same** cache.
pub struct View<T> {
    inner: Arc<ViewInner<T>>,
}

impl<T> Clone for View<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: BoxValue> View<T> {
    /// A view in `family` computing its value with `calculate`.
    ///
    /// Disables the family's change transforms. Call
    /// [`depends_on`](Self::depends_on) for each box `calculate` reads.
    pub fn new<F>(boxes: &Boxes, family: Arc<Family<T>>, calculate: F) -> Self
    where
        F: Fn() -> Result<T, BoxError> + Send + Sync + 'static,
    {
        family.change_middlewares().disable();
        let cache = Arc::new(ViewCache {
            family: family.shared_description(),
            calculate: Box::new(calculate),
            state: Mutex::new(CacheState {
                cached: None,
                valid: false,
            }),
            version: AtomicU64::new(0),
        });
        let storage: Arc<dyn RawStorage<T>> = Arc::clone(&cache) as _;
        Self {
            inner: Arc::new(ViewInner {
                output: PowerBox::with_storage(family, storage),
                cache,
                dependents: boxes.dependents().downgrade(),
            }),
        }
    }

    /// Recalculate (or invalidate) whenever `source` changes.
    ///
    /// # Errors
    ///
    /// [`BoxError::Detached`] once the [`Boxes`] this view was built in is
    /// dropped.
    pub fn depends_on<S, B>(&self, source: &B) -> Result<&Self, BoxError>
    where
        S: 'static,
        B: ChangeSource<S> + ?Sized,
    {
        let registry = self.inner.dependents.upgrade().ok_or_else(|| BoxError::Detached {
            family: self.family().description().to_owned(),
        })?;
        let dependent: Arc<dyn Dependent> = Arc::clone(&self.inner) as _;
        registry.register(source, dependent)?;
        Ok(self)
    }

    #[must_use]
    pub fn id(&self) -> BoxId {
        self.inner.output.id()
    }

    #[must_use]
    pub fn family(&self) -> &Arc<Family<T>> {
        self.inner.output.family()
    }

    /// Reads the (possibly recalculated) value through the get pipeline.
    pub fn get(&self) -> Result<T, BoxError> {
        self.inner.output.get()
    }

    /// Always fails: a view's value must be calculated.
    pub fn set(&self, _value: T) -> Result<&Self, BoxError> {
        Err(Unsupported::SetOnView {
            family: self.family().description().to_owned(),
        }
        .into())
    }

    /// Whether the next read can be served from the cache.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.inner.cache.lock().valid
    }

    /// Forces the next read to recalculate.
    pub fn invalidate(&self) {
        self.inner.cache.invalidate();
    }

    /// Number of calculations so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.cache.version.load(Ordering::Acquire)
    }

    pub fn add_get_middleware(&self, middleware: Arc<dyn GetMiddleware<T>>) -> Result<&Self, BoxError> {
        self.inner.output.add_get_middleware(middleware)?;
        Ok(self)
    }

    pub fn add_get_observer(&self, observer: Arc<dyn GetObserver<T>>) -> Result<&Self, BoxError> {
        self.inner.output.add_get_observer(observer)?;
        Ok(self)
    }

    pub fn add_change_observer(&self, observer: Arc<dyn ChangeObserver<T>>) -> Result<&Self, BoxError> {
        self.inner.output.add_change_observer(observer)?;
        Ok(self)
    }

    pub fn render(&self) -> Result<String, BoxError> {
        self.inner.output.render()
    }
}

impl<T: BoxValue> ValueBox<T> for View<T> {
    fn get(&self) -> Result<T, BoxError> {
        View::get(self)
    }

    fn set(&self, value: T) -> Result<(), BoxError> {
        View::set(self, value).map(|_| ())
    }
}

impl<T: BoxValue> Tracked for View<T> {
    fn box_id(&self) -> BoxId {
        self.id()
    }

    fn liveness(&self) -> Weak<dyn Any + Send + Sync> {
        let weak: Weak<ViewInner<T>> = Arc::downgrade(&self.inner);
        weak
    }
}

impl<T: BoxValue> ChangeSource<T> for View<T> {
    fn family(&self) -> &Arc<Family<T>> {
        self.inner.output.family()
    }
}

impl<T: BoxValue> fmt::Display for View<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner.output, f)
    }
}

impl<T: BoxValue> fmt::Debug for View<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.cache.lock();
        f.debug_struct("View")
            .field("id", &self.id())
            .field("family", &self.family().description())
            .field("cached", &state.cached)
            .field("valid", &state.valid)
            .field("version", &self.version())
            .finish()
    }
}
