#![forbid(unsafe_code)]

//! Boxes that are their own value.
//!
//! A wrapper box owns a mutable composite value (a list, a set, a map, a
//! window onto one of those) and is itself what a read returns. Instead of
//! set-then-notify, every mutating operation of the wrapper changes the raw
//! value in place and then calls [`WrapperBox::change`], which runs the
//! family's change observers with the wrapper as original, final and
//! requested value.
//!
//! # Invariants
//!
//! 1. A wrapper family has no get transforms or get observers. Those lists
//!    are disabled when the first cell is built.
//! 2. `change()` is called after the raw lock is released, so observers may
//!    read or mutate the wrapper.
//! 3. A failing observer does not undo an in-place mutation. Only
//!    [`WrapperBox::assign`] runs change transforms, and it rolls the raw
//!    value back when an observer fails.
//! 4. Sub-views register their parent as a dependent, so a mutation through
//!    a sub-view is also a change of the parent. A cell removes its own
//!    dependents when dropped.
//! 5. A cell holds the dependent registry weakly.

use std::fmt;
use std::mem;
use std::sync::{Arc, PoisonError, RwLock};

use crate::context::Boxes;
use crate::error::BoxError;
use crate::family::{Family, Scope};
use crate::participant::{BoxRef, ChangeObserver, Reveal};
use crate::pipeline;
use crate::reactive::dependents::{Dependent, DependentRegistry, SourceChange, WeakDependentRegistry};
use crate::registry::FamilyRegistry;
use crate::value::{BoxId, BoxValue, ChangeSource};

/// Shared state of a wrapper box: the raw value and its family.
pub struct WrapperCell<R, W> {
    id: BoxId,
    raw: RwLock<R>,
    family: Arc<Family<W>>,
    families: FamilyRegistry,
    dependents: WeakDependentRegistry,
}

impl<R, W: 'static> WrapperCell<R, W> {
    /// A cell holding `raw`. Disables the get-side pipelines of `family`.
    pub fn new(boxes: &Boxes, family: Arc<Family<W>>, raw: R) -> Self {
        Self::with_registries(
            family,
            raw,
            boxes.families().clone(),
            boxes.dependents().downgrade(),
        )
    }

    fn with_registries(
        family: Arc<Family<W>>,
        raw: R,
        families: FamilyRegistry,
        dependents: WeakDependentRegistry,
    ) -> Self {
        family.get_middlewares().disable();
        family.get_observers().disable();
        Self {
            id: BoxId::next(),
            raw: RwLock::new(raw),
            family,
            families,
            dependents,
        }
    }

    /// A cell for a sub-view of this wrapper, in the family `name` scoped
    /// to `W` and sharing this cell's registries.
    pub fn sub_cell<Q, S>(&self, name: &str, raw: Q) -> WrapperCell<Q, S>
    where
        S: Send + Sync + 'static,
    {
        let family = self.families.family(Scope::of::<W>(), name);
        WrapperCell::with_registries(family, raw, self.families.clone(), self.dependents.clone())
    }

    #[must_use]
    pub fn id(&self) -> BoxId {
        self.id
    }

    #[must_use]
    pub fn family(&self) -> &Arc<Family<W>> {
        &self.family
    }

    /// The family registry of the root this cell was built in, for
    /// creating sub-view families.
    #[must_use]
    pub fn families(&self) -> &FamilyRegistry {
        &self.families
    }

    /// The dependent registry of the root this cell was built in.
    ///
    /// # Errors
    ///
    /// [`BoxError::Detached`] once that root has been dropped.
    pub fn dependents(&self) -> Result<DependentRegistry, BoxError> {
        self.dependents.upgrade().ok_or_else(|| BoxError::Detached {
            family: self.family.description().to_owned(),
        })
    }

    /// Runs `f` with shared access to the raw value.
    pub fn read<X>(&self, f: impl FnOnce(&R) -> X) -> X {
        f(&self.raw.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Runs `f` with exclusive access to the raw value. Does not notify.
    pub fn write<X>(&self, f: impl FnOnce(&mut R) -> X) -> X {
        f(&mut self.raw.write().unwrap_or_else(PoisonError::into_inner))
    }

    /// Swaps in a new raw value. Does not notify.
    pub fn replace(&self, raw: R) -> R {
        self.write(|current| mem::replace(current, raw))
    }

    /// `Debug` rendering of the raw value, regardless of the hide flag.
    #[must_use]
    pub fn revealed_string(&self) -> String
    where
        R: fmt::Debug,
    {
        self.read(|raw| format!("{raw:?}"))
    }
}

impl<R, W> Drop for WrapperCell<R, W> {
    fn drop(&mut self) {
        if let Some(registry) = self.dependents.upgrade() {
            registry.forget(self.id);
        }
    }
}

impl<R, W> Reveal for WrapperCell<R, W>
where
    R: fmt::Debug + Send + Sync,
    W: Send + Sync + 'static,
{
    fn revealed_string(&self) -> String {
        WrapperCell::revealed_string(self)
    }
}

impl<R: fmt::Debug, W> fmt::Debug for WrapperCell<R, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = self.raw.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("WrapperCell")
            .field("id", &self.id)
            .field("family", &self.family.description())
            .field("raw", &*raw)
            .finish()
    }
}

/// A box that is its own value.
///
/// Implementors provide [`cell`](Self::cell); everything else has a default.
pub trait WrapperBox: ChangeSource<Self> + BoxValue {
    type Raw: fmt::Debug + Send + Sync + 'static;

    fn cell(&self) -> &WrapperCell<Self::Raw, Self>;

    /// Tells the family's change observers that this box mutated.
    fn change(&self) -> Result<(), BoxError> {
        let cell = self.cell();
        let subject = BoxRef::self_valued(cell.id(), cell.family(), cell);
        pipeline::notify_change_observers(&subject, self, self, self)
    }

    /// [`change`](Self::change), then hands back `result`.
    fn change_with<X>(&self, result: X) -> Result<X, BoxError> {
        self.change()?;
        Ok(result)
    }

    /// [`change`](Self::change) only if `changed`; returns `changed`.
    fn change_if(&self, changed: bool) -> Result<bool, BoxError> {
        if changed {
            self.change()?;
        }
        Ok(changed)
    }

    /// Swaps in a new raw value and notifies. Returns the old raw value.
    fn replace(&self, raw: Self::Raw) -> Result<Self::Raw, BoxError> {
        let previous = self.cell().replace(raw);
        self.change_with(previous)
    }

    /// Sets this wrapper's contents from `requested`, the way a plain box
    /// is set: change transforms turn `requested` into the final wrapper,
    /// its raw value is copied in, and the change observers run with
    /// `(self, self, requested)`. An observer failure restores the previous
    /// raw value.
    fn assign(&self, requested: Self) -> Result<(), BoxError>
    where
        Self::Raw: Clone,
    {
        let cell = self.cell();
        let subject = BoxRef::self_valued(cell.id(), cell.family(), cell);
        let final_value = pipeline::apply_change_middleware(&subject, self, &requested)?;
        let raw = final_value.cell().read(Clone::clone);
        let previous = cell.replace(raw);
        if let Err(err) = pipeline::notify_change_observers(&subject, self, self, &requested) {
            tracing::debug!(family = %cell.family().description(), error = %err, "change observer failed, rolling back");
            cell.replace(previous);
            return Err(err);
        }
        Ok(())
    }

    fn revealed_string(&self) -> String {
        self.cell().revealed_string()
    }

    /// The raw value as a string, or the hidden placeholder.
    fn render(&self) -> String {
        let family = self.cell().family();
        if family.shows_value_strings() {
            self.revealed_string()
        } else {
            family.hidden_placeholder()
        }
    }

    fn add_change_observer(&self, observer: Arc<dyn ChangeObserver<Self>>) -> Result<&Self, BoxError> {
        self.cell().family().add_change_observer(observer)?;
        Ok(self)
    }

    /// Makes every change of `sub_view` a change of this box too.
    fn watch<S: WrapperBox>(&self, sub_view: &S) -> Result<(), BoxError> {
        let dependent: Arc<dyn Dependent> = Arc::new(ChangeOnSourceChange(self.clone()));
        self.cell().dependents()?.register(sub_view, dependent)
    }
}

/// Dependent that re-announces a source change as a change of the wrapper.
struct ChangeOnSourceChange<W>(W);

impl<W: WrapperBox> Dependent for ChangeOnSourceChange<W> {
    fn dependent_id(&self) -> BoxId {
        self.0.cell().id()
    }

    fn source_changed(&self, _change: &SourceChange<'_>) -> Result<(), BoxError> {
        self.0.change()
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;
    use std::sync::Mutex;
    use std::sync::Weak;

    use super::*;
    use crate::error::ParticipantFailure;
    use crate::family::Scope;
    use crate::participant::{change_middleware, change_observer};
    use crate::value::Tracked;

    /// Minimal wrapper around a `Vec<u8>`.
    #[derive(Clone)]
    struct Bytes(Arc<WrapperCell<Vec<u8>, Bytes>>);

    impl fmt::Debug for Bytes {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.revealed_string())
        }
    }

    impl Bytes {
        fn new(boxes: &Boxes, name: &str) -> Self {
            let family = boxes.family(Scope::new("tests::Bytes"), name);
            Self(Arc::new(WrapperCell::new(boxes, family, Vec::new())))
        }

        fn push(&self, byte: u8) -> Result<(), BoxError> {
            self.0.write(|raw| raw.push(byte));
            self.change()
        }
    }

    impl Tracked for Bytes {
        fn box_id(&self) -> BoxId {
            self.0.id()
        }

        fn liveness(&self) -> Weak<dyn Any + Send + Sync> {
            let weak: Weak<WrapperCell<Vec<u8>, Bytes>> = Arc::downgrade(&self.0);
            weak
        }
    }

    impl ChangeSource<Bytes> for Bytes {
        fn family(&self) -> &Arc<Family<Bytes>> {
            self.0.family()
        }
    }

    impl WrapperBox for Bytes {
        type Raw = Vec<u8>;

        fn cell(&self) -> &WrapperCell<Vec<u8>, Bytes> {
            &self.0
        }
    }

    #[test]
    fn mutation_notifies_with_self() {
        let boxes = Boxes::new();
        let bytes = Bytes::new(&boxes, "self");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        bytes
            .add_change_observer(change_observer(move |subject, original: &Bytes, final_value, requested| {
                assert!(subject.is_self_valued());
                assert!(Arc::ptr_eq(&original.0, &final_value.0));
                assert!(Arc::ptr_eq(&final_value.0, &requested.0));
                log.lock().unwrap().push(final_value.revealed_string());
                Ok(())
            }))
            .unwrap();
        bytes.push(1).unwrap();
        bytes.push(2).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["[1]", "[1, 2]"]);
    }

    #[test]
    fn get_side_pipelines_are_disabled() {
        let boxes = Boxes::new();
        let bytes = Bytes::new(&boxes, "disabled");
        let family = bytes.cell().family();
        assert!(family.get_middlewares().is_disabled());
        assert!(family.get_observers().is_disabled());
        assert!(!family.change_middlewares().is_disabled());
        assert!(!family.change_observers().is_disabled());
    }

    #[test]
    fn observer_failure_keeps_mutation_and_reveals_raw() {
        let boxes = Boxes::new();
        let bytes = Bytes::new(&boxes, "failing");
        bytes
            .add_change_observer(change_observer(|_, _, _, _| {
                Err(ParticipantFailure::validation("no"))
            }))
            .unwrap();
        let err = bytes.push(7).unwrap_err();
        assert_eq!(
            err.to_string(),
            "error in ChangeObserver 1 out of 1 of Bytes.failing: value = [7]"
        );
        assert_eq!(bytes.revealed_string(), "[7]");
    }

    #[test]
    fn conditional_change_only_when_changed() {
        let boxes = Boxes::new();
        let bytes = Bytes::new(&boxes, "conditional");
        let count = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&count);
        bytes
            .add_change_observer(change_observer(move |_, _, _, _| {
                *counter.lock().unwrap() += 1;
                Ok(())
            }))
            .unwrap();
        assert!(!bytes.change_if(false).unwrap());
        assert!(bytes.change_if(true).unwrap());
        assert_eq!(bytes.change_with("done").unwrap(), "done");
        assert_eq!(bytes.replace(vec![9]).unwrap(), Vec::<u8>::new());
        assert_eq!(*count.lock().unwrap(), 3);
    }

    #[test]
    fn hidden_wrapper_renders_placeholder_but_reveals() {
        let boxes = Boxes::new();
        let bytes = Bytes::new(&boxes, "hidden");
        bytes.push(3).unwrap();
        bytes.cell().family().hide_value_strings();
        assert_eq!(bytes.render(), "[hidden value of Bytes.hidden]");
        assert_eq!(bytes.revealed_string(), "[3]");
    }

    #[test]
    fn watched_sub_view_changes_parent() {
        let boxes = Boxes::new();
        let parent = Bytes::new(&boxes, "parent");
        let child = Bytes::new(&boxes, "child");
        parent.watch(&child).unwrap();
        let parent_changes = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&parent_changes);
        parent
            .add_change_observer(change_observer(move |_, _, _, _| {
                *counter.lock().unwrap() += 1;
                Ok(())
            }))
            .unwrap();
        child.push(1).unwrap();
        assert_eq!(*parent_changes.lock().unwrap(), 1);
        parent.push(2).unwrap();
        assert_eq!(*parent_changes.lock().unwrap(), 2);
        assert_eq!(child.revealed_string(), "[1]");
    }

    #[test]
    fn assign_transforms_then_rolls_back_on_observer_failure() {
        let boxes = Boxes::new();
        let bytes = Bytes::new(&boxes, "assigned");
        let family = bytes.cell().family();
        family
            .add_change_middleware(change_middleware(|_, original: &Bytes, _, requested: &Bytes| {
                let oversized = requested.cell().read(|raw| raw.len() > 2);
                Ok(if oversized { original.clone() } else { requested.clone() })
            }))
            .unwrap();
        family
            .add_change_observer(change_observer(|_, _, final_value: &Bytes, _| {
                if final_value.cell().read(|raw| raw.contains(&0)) {
                    Err(ParticipantFailure::validation("zero byte"))
                } else {
                    Ok(())
                }
            }))
            .unwrap();

        let input = Bytes::new(&boxes, "input");
        input.cell().replace(vec![4, 5]);
        bytes.assign(input.clone()).unwrap();
        assert_eq!(bytes.revealed_string(), "[4, 5]");

        input.cell().replace(vec![1, 2, 3]);
        bytes.assign(input.clone()).unwrap();
        assert_eq!(bytes.revealed_string(), "[4, 5]");

        input.cell().replace(vec![0]);
        assert!(bytes.assign(input).is_err());
        assert_eq!(bytes.revealed_string(), "[4, 5]");
    }
}
