#![forbid(unsafe_code)]

use std::collections::HashSet;
use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::Arc;

use ahash::AHashSet;
use powerbox_core::{BoxError, BoxValue, Boxes, Family, Scope, ValueBox, WrapperBox, WrapperCell};

/// A box that is a hash set.
///
/// Mutators return whether the set changed and notify only if it did,
/// except [`clear`](Self::clear), which always notifies.
pub struct SetBox<E> {
    cell: Arc<WrapperCell<AHashSet<E>, SetBox<E>>>,
}

wrapper_plumbing!(SetBox<E>, raw = AHashSet<E>, where E: BoxValue + Eq + Hash);

impl<E: BoxValue + Eq + Hash> SetBox<E> {
    #[must_use]
    pub fn new(boxes: &Boxes, family: Arc<Family<Self>>) -> Self {
        Self::from_iter_in(boxes, family, [])
    }

    #[must_use]
    pub fn from_iter_in(
        boxes: &Boxes,
        family: Arc<Family<Self>>,
        items: impl IntoIterator<Item = E>,
    ) -> Self {
        Self {
            cell: Arc::new(WrapperCell::new(boxes, family, items.into_iter().collect())),
        }
    }

    #[must_use]
    pub fn named(boxes: &Boxes, scope: Scope, name: &str) -> Self {
        Self::new(boxes, boxes.family(scope, name))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cell.read(|items| items.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cell.read(|items| items.is_empty())
    }

    #[must_use]
    pub fn contains(&self, item: &E) -> bool {
        self.cell.read(|items| items.contains(item))
    }

    #[must_use]
    pub fn is_subset_of(&self, other: &[E]) -> bool {
        self.cell.read(|items| items.iter().all(|item| other.contains(item)))
    }

    /// A snapshot of the elements, in no particular order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<E> {
        self.cell.read(|items| items.iter().cloned().collect())
    }

    pub fn iter(&self) -> std::vec::IntoIter<E> {
        self.to_vec().into_iter()
    }

    pub fn insert(&self, item: E) -> Result<bool, BoxError> {
        let inserted = self.cell.write(|items| items.insert(item));
        self.change_if(inserted)
    }

    pub fn remove(&self, item: &E) -> Result<bool, BoxError> {
        let removed = self.cell.write(|items| items.remove(item));
        self.change_if(removed)
    }

    /// Inserts every item; notifies once if any was new.
    pub fn extend(&self, items: impl IntoIterator<Item = E>) -> Result<bool, BoxError> {
        let added = self.cell.write(|current| {
            let before = current.len();
            current.extend(items);
            current.len() > before
        });
        self.change_if(added)
    }

    pub fn retain(&self, keep: impl FnMut(&E) -> bool) -> Result<bool, BoxError> {
        let removed = self.cell.write(|items| {
            let before = items.len();
            items.retain(keep);
            items.len() < before
        });
        self.change_if(removed)
    }

    pub fn remove_all(&self, other: &[E]) -> Result<bool, BoxError> {
        self.retain(|item| !other.contains(item))
    }

    pub fn retain_all(&self, other: &[E]) -> Result<bool, BoxError> {
        self.retain(|item| other.contains(item))
    }

    pub fn clear(&self) -> Result<(), BoxError> {
        self.cell.write(|items| items.clear());
        self.change()
    }
}

impl<E: BoxValue + Eq + Hash> ValueBox<SetBox<E>> for SetBox<E> {
    fn get(&self) -> Result<SetBox<E>, BoxError> {
        Ok(self.clone())
    }

    /// Copies the contents of `value` in, through the change transforms.
    fn set(&self, value: SetBox<E>) -> Result<(), BoxError> {
        self.assign(value)
    }
}

impl<E: BoxValue + Eq + Hash> PartialEq for SetBox<E> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
            || other.cell.read(|theirs| self.cell.read(|ours| ours == theirs))
    }
}

impl<E: BoxValue + Eq + Hash> Eq for SetBox<E> {}

impl<E, S> PartialEq<HashSet<E, S>> for SetBox<E>
where
    E: BoxValue + Eq + Hash,
    S: BuildHasher,
{
    fn eq(&self, other: &HashSet<E, S>) -> bool {
        self.cell.read(|items| {
            items.len() == other.len() && items.iter().all(|item| other.contains(item))
        })
    }
}

impl<E: BoxValue + Eq + Hash> Hash for SetBox<E> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.cell.read(|items| {
            state.write_usize(items.len());
            state.write_u64(crate::unordered_hash(items.iter()));
        });
    }
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::RandomState;
    use std::sync::Mutex;

    use powerbox_core::change_observer;

    use super::*;

    const SCOPE: Scope = Scope::new("tests::Sets");

    #[test]
    fn only_real_changes_notify() {
        let boxes = Boxes::new();
        let set = SetBox::named(&boxes, SCOPE, "tags");
        let changes = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&changes);
        set.add_change_observer(change_observer(move |_, _, final_value: &SetBox<&'static str>, _| {
            log.lock().unwrap().push(final_value.len());
            Ok(())
        }))
        .unwrap();

        assert!(set.insert("a").unwrap());
        assert!(!set.insert("a").unwrap());
        assert!(set.extend(["b", "c"]).unwrap());
        assert!(!set.extend(["b"]).unwrap());
        assert!(!set.remove(&"z").unwrap());
        assert!(set.remove_all(&["a"]).unwrap());
        assert!(!set.retain_all(&["b", "c"]).unwrap());
        assert_eq!(*changes.lock().unwrap(), vec![1, 3, 2]);
    }

    #[test]
    fn compares_with_std_sets() {
        let boxes = Boxes::new();
        let set = SetBox::from_iter_in(&boxes, boxes.family(SCOPE, "cmp"), [1, 2, 3]);
        let std_set: HashSet<i32> = [3, 2, 1].into_iter().collect();
        assert_eq!(set, std_set);
        assert!(set.is_subset_of(&[1, 2, 3, 4]));
        let other = SetBox::from_iter_in(&boxes, boxes.family(SCOPE, "cmp"), [1, 2]);
        assert_ne!(set, other);
        ValueBox::set(&other, set.clone()).unwrap();
        assert_eq!(set, other);
    }

    #[test]
    fn hash_ignores_insertion_order() {
        let boxes = Boxes::new();
        let family = boxes.family(SCOPE, "order");
        let forward = SetBox::from_iter_in(&boxes, Arc::clone(&family), 1..=40);
        let backward = SetBox::from_iter_in(&boxes, Arc::clone(&family), (1..=40).rev());
        let state = RandomState::new();
        assert_eq!(forward, backward);
        assert_eq!(state.hash_one(&forward), state.hash_one(&backward));

        let shorter = SetBox::from_iter_in(&boxes, family, 1..40);
        assert_ne!(state.hash_one(&forward), state.hash_one(&shorter));

        let mut distinct = HashSet::new();
        assert!(distinct.insert(forward));
        assert!(!distinct.insert(backward));
        assert!(distinct.insert(shorter));
        assert_eq!(distinct.len(), 2);
    }
}
