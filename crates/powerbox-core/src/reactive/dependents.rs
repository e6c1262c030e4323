#![forbid(unsafe_code)]

//! The weak dependent registry.
//!
//! # Design
//!
//! Entries are keyed by [`BoxId`] and hold the box's liveness handle weakly
//! and its dependents strongly. Ids are never reused, so an entry whose box
//! died can never be attributed to a new box; dead entries are pruned on
//! notification, periodically on registration, and by [`prune`]. Wrapper
//! cells remove their own entry when dropped.
//!
//! Views and wrapper cells hold the registry weakly. The application root
//! ([`Boxes`](crate::Boxes)) is the only long-lived strong owner, so dropping
//! it frees the registry and every dependent in it.
//!
//! # Invariants
//!
//! 1. The registry never keeps a box alive.
//! 2. Dependents of one box are notified in registration order, each once
//!    per change.
//! 3. A dependent is registered at most once per box (by
//!    [`Dependent::dependent_id`]).
//! 4. Callbacks run on a snapshot, outside the registry lock, so a
//!    dependent may register or notify re-entrantly.
//! 5. Removed entries are dropped after the lock is released; dropping a
//!    dependent may drop a wrapper cell, which re-enters the registry.
//!
//! [`prune`]: DependentRegistry::prune

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use ahash::AHashMap;

use crate::error::{BoxError, ParticipantFailure};
use crate::participant::{BoxRef, ChangeObserver, Participant};
use crate::value::{BoxId, ChangeSource};

const MIN_PRUNE_THRESHOLD: usize = 64;

/// What changed, as seen by a dependent.
#[derive(Debug, Clone, Copy)]
pub struct SourceChange<'a> {
    source: BoxId,
    family: &'a str,
}

impl<'a> SourceChange<'a> {
    #[must_use]
    pub fn source(&self) -> BoxId {
        self.source
    }

    /// Description of the changed box's family.
    #[must_use]
    pub fn family(&self) -> &'a str {
        self.family
    }
}

/// Something that reacts to changes of the boxes it depends on.
pub trait Dependent: Send + Sync + 'static {
    /// Identity used to register a dependent only once per box.
    fn dependent_id(&self) -> BoxId;

    fn source_changed(&self, change: &SourceChange<'_>) -> Result<(), BoxError>;
}

struct Entry {
    liveness: Weak<dyn Any + Send + Sync>,
    dependents: Vec<Arc<dyn Dependent>>,
}

impl Entry {
    fn is_live(&self) -> bool {
        self.liveness.strong_count() > 0
    }
}

struct Entries {
    map: AHashMap<BoxId, Entry>,
    prune_at: usize,
}

impl Entries {
    /// Takes out the entries of dead boxes. The caller drops them after
    /// releasing the lock.
    fn take_dead(&mut self) -> Vec<Entry> {
        let dead: Vec<BoxId> = self
            .map
            .iter()
            .filter(|(_, entry)| !entry.is_live())
            .map(|(id, _)| *id)
            .collect();
        let taken: Vec<Entry> = dead.iter().filter_map(|id| self.map.remove(id)).collect();
        if !taken.is_empty() {
            tracing::trace!(pruned = taken.len(), remaining = self.map.len(), "pruned dependent entries");
        }
        taken
    }
}

struct DependentsInner {
    entries: Mutex<Entries>,
}

impl DependentsInner {
    fn lock(&self) -> std::sync::MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, source: BoxId, family: &str) -> Result<(), BoxError> {
        let dependents = {
            let mut entries = self.lock();
            match entries.map.get(&source) {
                Some(entry) if entry.is_live() => entry.dependents.clone(),
                Some(_) => {
                    let dead = entries.map.remove(&source);
                    drop(entries);
                    drop(dead);
                    return Ok(());
                }
                None => return Ok(()),
            }
        };
        let change = SourceChange { source, family };
        for dependent in dependents {
            dependent.source_changed(&change)?;
        }
        Ok(())
    }
}

/// Cheap-clone handle to a shared dependent registry.
#[derive(Clone)]
pub struct DependentRegistry {
    inner: Arc<DependentsInner>,
}

impl DependentRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DependentsInner {
                entries: Mutex::new(Entries {
                    map: AHashMap::new(),
                    prune_at: MIN_PRUNE_THRESHOLD,
                }),
            }),
        }
    }

    /// Makes `dependent` hear about every change of `source`.
    ///
    /// # Errors
    ///
    /// Fails if the source family's change observers are disabled.
    pub fn register<S, B>(&self, source: &B, dependent: Arc<dyn Dependent>) -> Result<(), BoxError>
    where
        S: 'static,
        B: ChangeSource<S> + ?Sized,
    {
        source
            .family()
            .add_change_observer(Arc::new(DependentNotifier {
                registry: Arc::downgrade(&self.inner),
            }))?;

        let mut entries = self.inner.lock();
        let mut dead = Vec::new();
        if entries.map.len() >= entries.prune_at {
            dead = entries.take_dead();
            entries.prune_at = (entries.map.len() * 2).max(MIN_PRUNE_THRESHOLD);
        }
        let entry = entries.map.entry(source.box_id()).or_insert_with(|| Entry {
            liveness: source.liveness(),
            dependents: Vec::new(),
        });
        let id = dependent.dependent_id();
        if !entry.dependents.iter().any(|existing| existing.dependent_id() == id) {
            entry.dependents.push(dependent);
        }
        drop(entries);
        drop(dead);
        Ok(())
    }

    /// Calls every dependent of `source`, stopping at the first failure.
    pub fn notify(&self, source: BoxId, family: &str) -> Result<(), BoxError> {
        self.inner.notify(source, family)
    }

    /// Number of dependents registered for a live `source`.
    #[must_use]
    pub fn dependent_count(&self, source: BoxId) -> usize {
        self.inner
            .lock()
            .map
            .get(&source)
            .filter(|entry| entry.is_live())
            .map_or(0, |entry| entry.dependents.len())
    }

    /// Number of boxes with registered dependents, dead ones included until
    /// pruned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops entries whose box is gone. Returns how many were dropped.
    pub fn prune(&self) -> usize {
        let dead = self.inner.lock().take_dead();
        dead.len()
    }

    /// Drops the entry of `source` and its dependents, whether or not the
    /// box is still alive. Returns whether there was one.
    pub fn forget(&self, source: BoxId) -> bool {
        let removed = self.inner.lock().map.remove(&source);
        removed.is_some()
    }

    pub(crate) fn downgrade(&self) -> WeakDependentRegistry {
        WeakDependentRegistry {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

/// Non-owning handle to a [`DependentRegistry`].
#[derive(Clone)]
pub(crate) struct WeakDependentRegistry {
    inner: Weak<DependentsInner>,
}

impl WeakDependentRegistry {
    pub(crate) fn upgrade(&self) -> Option<DependentRegistry> {
        self.inner.upgrade().map(|inner| DependentRegistry { inner })
    }
}

impl Default for DependentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DependentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependentRegistry")
            .field("entries", &self.len())
            .finish()
    }
}

/// Change observer that forwards a box's changes to its registered
/// dependents. One per registry per family.
struct DependentNotifier {
    registry: Weak<DependentsInner>,
}

impl Participant for DependentNotifier {
    fn same_as(&self, other: &dyn Any) -> bool {
        other
            .downcast_ref::<Self>()
            .is_some_and(|other| Weak::ptr_eq(&other.registry, &self.registry))
    }
}

impl<T> ChangeObserver<T> for DependentNotifier {
    fn on_change(
        &self,
        subject: &BoxRef<'_, T>,
        _original: &T,
        _final_value: &T,
        _requested: &T,
    ) -> Result<(), ParticipantFailure> {
        let Some(registry) = self.registry.upgrade() else {
            return Ok(());
        };
        registry
            .notify(subject.id(), subject.description())
            .map_err(ParticipantFailure::from)
    }
}
