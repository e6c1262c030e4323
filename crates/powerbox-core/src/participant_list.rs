#![forbid(unsafe_code)]

//! Append-only, duplicate-rejecting participant lists.
//!
//! # Design
//!
//! The entries live behind an [`ArcSwap`]: readers take a snapshot `Arc` and
//! iterate it without locking, writers copy the vector, append, and swap the
//! new vector in while holding a writer mutex. A pipeline therefore never
//! observes a list changing underneath it.
//!
//! # Invariants
//!
//! 1. Insertion order is preserved.
//! 2. No two entries are the same participant ([`Participant::same_as`]).
//! 3. Appending is the only mutation. There is no remove, insert-at, or clear.
//! 4. Once disabled the list is empty forever and every add fails.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;

use crate::error::Unsupported;
use crate::participant::{Participant, ParticipantKind};

/// An ordered set of participants of one [`ParticipantKind`].
pub struct ParticipantList<P: ?Sized> {
    kind: ParticipantKind,
    owner: Arc<str>,
    entries: ArcSwap<Vec<Arc<P>>>,
    disabled: AtomicBool,
    writer: Mutex<()>,
}

impl<P: ?Sized + Participant + 'static> ParticipantList<P> {
    pub(crate) fn new(kind: ParticipantKind, owner: Arc<str>) -> Self {
        Self {
            kind,
            owner,
            entries: ArcSwap::from_pointee(Vec::new()),
            disabled: AtomicBool::new(false),
            writer: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ParticipantKind {
        self.kind
    }

    /// Appends `participant` unless an equal one is already present.
    ///
    /// Returns whether the list changed.
    ///
    /// # Errors
    ///
    /// [`Unsupported::DisabledParticipants`] once the list is disabled.
    pub fn add(&self, participant: Arc<P>) -> Result<bool, Unsupported> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if self.disabled.load(Ordering::Acquire) {
            return Err(Unsupported::DisabledParticipants {
                kind: self.kind,
                family: self.owner.to_string(),
            });
        }
        let current = self.entries.load_full();
        let candidate = (*participant).as_any();
        if current.iter().any(|existing| existing.same_as(candidate)) {
            return Ok(false);
        }
        let mut next = Vec::with_capacity(current.len() + 1);
        next.extend(current.iter().cloned());
        next.push(participant);
        self.entries.store(Arc::new(next));
        Ok(true)
    }

    /// Empties the list and rejects all future adds.
    pub fn disable(&self) {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.disabled.swap(true, Ordering::AcqRel) {
            self.entries.store(Arc::new(Vec::new()));
            tracing::debug!(family = %self.owner, kind = %self.kind, "participant list disabled");
        }
    }

    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }

    /// The current entries. Later adds do not affect the returned snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Vec<Arc<P>>> {
        self.entries.load_full()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Arc<P>> {
        self.entries.load().get(index).cloned()
    }

    /// Whether `participant` (or an equal one) is in the list.
    #[must_use]
    pub fn contains(&self, participant: &P) -> bool {
        let candidate = participant.as_any();
        self.entries
            .load()
            .iter()
            .any(|existing| existing.same_as(candidate))
    }

    /// Iterates over a snapshot.
    pub fn iter(&self) -> impl Iterator<Item = Arc<P>> + use<P> {
        let snapshot = self.snapshot();
        (0..snapshot.len()).map(move |index| Arc::clone(&snapshot[index]))
    }
}

impl<P: ?Sized> fmt::Debug for ParticipantList<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParticipantList")
            .field("kind", &self.kind)
            .field("owner", &self.owner)
            .field("len", &self.entries.load().len())
            .field("disabled", &self.disabled.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;
    use std::sync::Barrier;
    use std::thread;

    use super::*;
    use crate::participant::{ChangeObserver, change_observer, same_value};

    fn list() -> ParticipantList<dyn ChangeObserver<i32>> {
        ParticipantList::new(ParticipantKind::ChangeObserver, Arc::from("Tests.list"))
    }

    fn noop() -> Arc<dyn ChangeObserver<i32>> {
        change_observer(|_, _, _, _| Ok(()))
    }

    #[derive(PartialEq)]
    struct Tag(u8);

    impl Participant for Tag {
        fn same_as(&self, other: &dyn Any) -> bool {
            same_value(self, other)
        }
    }

    impl ChangeObserver<i32> for Tag {
        fn on_change(
            &self,
            _: &crate::participant::BoxRef<'_, i32>,
            _: &i32,
            _: &i32,
            _: &i32,
        ) -> Result<(), crate::error::ParticipantFailure> {
            Ok(())
        }
    }

    #[test]
    fn add_preserves_order_and_rejects_duplicates() {
        let list = list();
        let a = noop();
        let b = noop();
        assert!(list.add(Arc::clone(&a)).unwrap());
        assert!(list.add(Arc::clone(&b)).unwrap());
        assert!(!list.add(Arc::clone(&a)).unwrap());
        assert_eq!(list.len(), 2);
        assert!(Arc::ptr_eq(&list.get(0).unwrap(), &a));
        assert!(Arc::ptr_eq(&list.get(1).unwrap(), &b));
    }

    #[test]
    fn equal_values_are_duplicates() {
        let list = list();
        assert!(list.add(Arc::new(Tag(1))).unwrap());
        assert!(!list.add(Arc::new(Tag(1))).unwrap());
        assert!(list.add(Arc::new(Tag(2))).unwrap());
        assert!(list.contains(&Tag(2)));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn disable_is_final() {
        let list = list();
        list.add(noop()).unwrap();
        list.disable();
        assert!(list.is_empty());
        assert!(list.is_disabled());
        let err = list.add(noop()).unwrap_err();
        assert_eq!(
            err,
            Unsupported::DisabledParticipants {
                kind: ParticipantKind::ChangeObserver,
                family: "Tests.list".into(),
            }
        );
        list.disable();
        assert!(list.is_empty());
    }

    #[test]
    fn snapshot_is_unaffected_by_later_adds() {
        let list = list();
        list.add(noop()).unwrap();
        let snapshot = list.snapshot();
        list.add(noop()).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(list.iter().count(), 2);
    }

    #[test]
    fn concurrent_adds_and_reads() {
        let list = Arc::new(list());
        let barrier = Arc::new(Barrier::new(4));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let list = Arc::clone(&list);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..50 {
                        list.add(noop()).unwrap();
                        let seen = list.iter().count();
                        assert!(seen >= 1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(list.len(), 200);
    }
}
