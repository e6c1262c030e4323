#![forbid(unsafe_code)]

//! [`ListBox`] and its windows, [`SubList`] and [`ListCursor`].
//!
//! # Invariants
//!
//! 1. Every method that mutates the list notifies once, after the mutation.
//!    Methods that turn out not to mutate (out-of-range index, nothing
//!    matched) do not notify.
//! 2. A mutation through a window notifies the window's family and the
//!    list's family, once each.
//! 3. Index-based methods never panic. Out-of-range access returns `None` or
//!    `false`.
//!
//! A window does not track structural changes made to the list behind its
//! back; its range is clamped to the current list length on every access.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Range;
use std::sync::Arc;

use powerbox_core::{BoxError, BoxValue, Boxes, Family, Scope, ValueBox, WrapperBox, WrapperCell};

/// A box that is a `Vec<E>`.
pub struct ListBox<E> {
    cell: Arc<WrapperCell<Vec<E>, ListBox<E>>>,
}

wrapper_plumbing!(ListBox<E>, raw = Vec<E>, where E: BoxValue);

impl<E: BoxValue> ListBox<E> {
    #[must_use]
    pub fn new(boxes: &Boxes, family: Arc<Family<Self>>) -> Self {
        Self::from_vec(boxes, family, Vec::new())
    }

    #[must_use]
    pub fn from_vec(boxes: &Boxes, family: Arc<Family<Self>>, items: Vec<E>) -> Self {
        Self {
            cell: Arc::new(WrapperCell::new(boxes, family, items)),
        }
    }

    /// An empty list in the family `(scope, name)`.
    #[must_use]
    pub fn named(boxes: &Boxes, scope: Scope, name: &str) -> Self {
        Self::new(boxes, boxes.family(scope, name))
    }

    // ── Reads ───────────────────────────────────────────────────────────

    #[must_use]
    pub fn len(&self) -> usize {
        self.cell.read(Vec::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cell.read(Vec::is_empty)
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<E> {
        self.cell.read(|items| items.get(index).cloned())
    }

    #[must_use]
    pub fn first(&self) -> Option<E> {
        self.cell.read(|items| items.first().cloned())
    }

    #[must_use]
    pub fn last(&self) -> Option<E> {
        self.cell.read(|items| items.last().cloned())
    }

    #[must_use]
    pub fn contains(&self, item: &E) -> bool
    where
        E: PartialEq,
    {
        self.cell.read(|items| items.contains(item))
    }

    #[must_use]
    pub fn index_of(&self, item: &E) -> Option<usize>
    where
        E: PartialEq,
    {
        self.cell.read(|items| items.iter().position(|candidate| candidate == item))
    }

    #[must_use]
    pub fn last_index_of(&self, item: &E) -> Option<usize>
    where
        E: PartialEq,
    {
        self.cell.read(|items| items.iter().rposition(|candidate| candidate == item))
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<E> {
        self.cell.read(Vec::clone)
    }

    /// Iterates over a snapshot of the current elements.
    pub fn iter(&self) -> std::vec::IntoIter<E> {
        self.to_vec().into_iter()
    }

    /// Runs `f` over the elements without copying them.
    pub fn with_slice<X>(&self, f: impl FnOnce(&[E]) -> X) -> X {
        self.cell.read(|items| f(items))
    }

    // ── Mutations ───────────────────────────────────────────────────────

    pub fn push(&self, item: E) -> Result<(), BoxError> {
        self.cell.write(|items| items.push(item));
        self.change()
    }

    pub fn pop(&self) -> Result<Option<E>, BoxError> {
        let popped = self.cell.write(Vec::pop);
        self.change_if(popped.is_some())?;
        Ok(popped)
    }

    /// Inserts at `index`; `false` if `index > len`.
    pub fn insert(&self, index: usize, item: E) -> Result<bool, BoxError> {
        let inserted = self.cell.write(|items| {
            if index > items.len() {
                return false;
            }
            items.insert(index, item);
            true
        });
        self.change_if(inserted)
    }

    pub fn remove(&self, index: usize) -> Result<Option<E>, BoxError> {
        let removed = self
            .cell
            .write(|items| (index < items.len()).then(|| items.remove(index)));
        self.change_if(removed.is_some())?;
        Ok(removed)
    }

    /// Replaces the element at `index`, returning the previous one.
    pub fn replace_at(&self, index: usize, item: E) -> Result<Option<E>, BoxError> {
        let previous = self.cell.write(|items| {
            items
                .get_mut(index)
                .map(|slot| std::mem::replace(slot, item))
        });
        self.change_if(previous.is_some())?;
        Ok(previous)
    }

    /// Appends every item; notifies once if anything was appended.
    pub fn extend(&self, items: impl IntoIterator<Item = E>) -> Result<bool, BoxError> {
        let added = self.cell.write(|current| {
            let before = current.len();
            current.extend(items);
            current.len() > before
        });
        self.change_if(added)
    }

    /// Keeps only the elements matching `keep`.
    pub fn retain(&self, keep: impl FnMut(&E) -> bool) -> Result<bool, BoxError> {
        let removed = self.cell.write(|items| {
            let before = items.len();
            items.retain(keep);
            items.len() < before
        });
        self.change_if(removed)
    }

    /// Removes the first element equal to `item`.
    pub fn remove_item(&self, item: &E) -> Result<bool, BoxError>
    where
        E: PartialEq,
    {
        let removed = self.cell.write(|items| {
            match items.iter().position(|candidate| candidate == item) {
                Some(index) => {
                    items.remove(index);
                    true
                }
                None => false,
            }
        });
        self.change_if(removed)
    }

    /// Removes every element contained in `other`.
    pub fn remove_all(&self, other: &[E]) -> Result<bool, BoxError>
    where
        E: PartialEq,
    {
        self.retain(|item| !other.contains(item))
    }

    /// Removes every element not contained in `other`.
    pub fn retain_all(&self, other: &[E]) -> Result<bool, BoxError>
    where
        E: PartialEq,
    {
        self.retain(|item| other.contains(item))
    }

    pub fn truncate(&self, len: usize) -> Result<bool, BoxError> {
        let shortened = self.cell.write(|items| {
            let before = items.len();
            items.truncate(len);
            items.len() < before
        });
        self.change_if(shortened)
    }

    pub fn sort_by(&self, compare: impl FnMut(&E, &E) -> std::cmp::Ordering) -> Result<(), BoxError> {
        self.cell.write(|items| items.sort_by(compare));
        self.change()
    }

    /// Empties the list. Always notifies.
    pub fn clear(&self) -> Result<(), BoxError> {
        self.cell.write(Vec::clear);
        self.change()
    }

    // ── Windows ─────────────────────────────────────────────────────────

    /// A window onto `range` (clamped to the current length). Mutations
    /// through the window are changes of this list too.
    pub fn sub_list(&self, range: Range<usize>) -> Result<SubList<E>, BoxError> {
        let len = self.len();
        let end = range.end.min(len);
        let start = range.start.min(end);
        let window = Window {
            list: self.clone(),
            start,
            end,
        };
        let sub_list = SubList {
            cell: Arc::new(self.cell.sub_cell("subList", window)),
        };
        self.watch(&sub_list)?;
        tracing::trace!(list = %self.cell.id(), start, end, "sub-list created");
        Ok(sub_list)
    }

    /// A cursor positioned before the first element.
    pub fn cursor(&self) -> Result<ListCursor<E>, BoxError> {
        let state = CursorState {
            list: self.clone(),
            next: 0,
            last: None,
        };
        let cursor = ListCursor {
            cell: Arc::new(self.cell.sub_cell("cursor", state)),
        };
        self.watch(&cursor)?;
        Ok(cursor)
    }
}

impl<E: BoxValue> ValueBox<ListBox<E>> for ListBox<E> {
    /// The list itself.
    fn get(&self) -> Result<ListBox<E>, BoxError> {
        Ok(self.clone())
    }

    /// Copies the elements of `value` into this list, through the change
    /// transforms of the list's family.
    fn set(&self, value: ListBox<E>) -> Result<(), BoxError> {
        self.assign(value)
    }
}

impl<E: BoxValue + PartialEq> PartialEq for ListBox<E> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
            || other.cell.read(|theirs| self.cell.read(|ours| ours == theirs))
    }
}

impl<E: BoxValue + Eq> Eq for ListBox<E> {}

impl<E: BoxValue + PartialEq> PartialEq<Vec<E>> for ListBox<E> {
    fn eq(&self, other: &Vec<E>) -> bool {
        self.cell.read(|items| items == other)
    }
}

impl<E: BoxValue + PartialEq> PartialEq<[E]> for ListBox<E> {
    fn eq(&self, other: &[E]) -> bool {
        self.cell.read(|items| items.as_slice() == other)
    }
}

impl<E: BoxValue + Hash> Hash for ListBox<E> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.cell.read(|items| items.hash(state));
    }
}

// ─── SubList ────────────────────────────────────────────────────────────────

/// Raw value of [`SubList`].
pub struct Window<E> {
    list: ListBox<E>,
    start: usize,
    end: usize,
}

impl<E> Window<E> {
    fn range(&self, len: usize) -> Range<usize> {
        let end = self.end.min(len);
        self.start.min(end)..end
    }
}

impl<E: BoxValue> fmt::Debug for Window<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.list
            .with_slice(|items| f.debug_list().entries(&items[self.range(items.len())]).finish())
    }
}

/// A window onto a range of a [`ListBox`].
pub struct SubList<E> {
    cell: Arc<WrapperCell<Window<E>, SubList<E>>>,
}

wrapper_plumbing!(SubList<E>, raw = Window<E>, where E: BoxValue);

impl<E: BoxValue> SubList<E> {
    /// Runs `f` over the window's slice of the list and the window itself.
    fn with_items<X>(&self, f: impl FnOnce(&mut Vec<E>, &mut Window<E>) -> X) -> X {
        self.cell.write(|window| {
            let list = window.list.clone();
            list.cell.write(|items| f(items, window))
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cell
            .read(|window| window.list.with_slice(|items| window.range(items.len()).len()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<E> {
        self.cell.read(|window| {
            window.list.with_slice(|items| {
                window
                    .range(items.len())
                    .nth(index)
                    .map(|at| items[at].clone())
            })
        })
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<E> {
        self.cell.read(|window| {
            window
                .list
                .with_slice(|items| items[window.range(items.len())].to_vec())
        })
    }

    pub fn iter(&self) -> std::vec::IntoIter<E> {
        self.to_vec().into_iter()
    }

    /// The list this is a window onto.
    #[must_use]
    pub fn list(&self) -> ListBox<E> {
        self.cell.read(|window| window.list.clone())
    }

    /// Appends at the end of the window.
    pub fn push(&self, item: E) -> Result<(), BoxError> {
        self.with_items(|items, window| {
            let range = window.range(items.len());
            items.insert(range.end, item);
            window.start = range.start;
            window.end = range.end + 1;
        });
        self.change()
    }

    pub fn insert(&self, index: usize, item: E) -> Result<bool, BoxError> {
        let inserted = self.with_items(|items, window| {
            let range = window.range(items.len());
            if index > range.len() {
                return false;
            }
            items.insert(range.start + index, item);
            window.start = range.start;
            window.end = range.end + 1;
            true
        });
        self.change_if(inserted)
    }

    pub fn remove(&self, index: usize) -> Result<Option<E>, BoxError> {
        let removed = self.with_items(|items, window| {
            let range = window.range(items.len());
            if index >= range.len() {
                return None;
            }
            window.start = range.start;
            window.end = range.end - 1;
            Some(items.remove(range.start + index))
        });
        self.change_if(removed.is_some())?;
        Ok(removed)
    }

    pub fn replace_at(&self, index: usize, item: E) -> Result<Option<E>, BoxError> {
        let previous = self.with_items(|items, window| {
            let range = window.range(items.len());
            (index < range.len())
                .then(|| std::mem::replace(&mut items[range.start + index], item))
        });
        self.change_if(previous.is_some())?;
        Ok(previous)
    }

    /// Removes the window's elements from the list. Always notifies.
    pub fn clear(&self) -> Result<(), BoxError> {
        self.with_items(|items, window| {
            let range = window.range(items.len());
            items.drain(range.clone());
            window.start = range.start;
            window.end = range.start;
        });
        self.change()
    }
}

impl<E: BoxValue + PartialEq> PartialEq for SubList<E> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell) || self.to_vec() == other.to_vec()
    }
}

impl<E: BoxValue + Eq> Eq for SubList<E> {}

impl<E: BoxValue + PartialEq> PartialEq<Vec<E>> for SubList<E> {
    fn eq(&self, other: &Vec<E>) -> bool {
        self.to_vec() == *other
    }
}

impl<E: BoxValue + Hash> Hash for SubList<E> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_vec().hash(state);
    }
}

// ─── ListCursor ─────────────────────────────────────────────────────────────

/// Raw value of [`ListCursor`].
pub struct CursorState<E> {
    list: ListBox<E>,
    next: usize,
    last: Option<usize>,
}

impl<E> fmt::Debug for CursorState<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListCursor")
            .field("next", &self.next)
            .field("last", &self.last)
            .finish()
    }
}

/// A forward cursor over a [`ListBox`] that can remove, replace and insert
/// at its position.
///
/// Iterating yields clones of the elements.
pub struct ListCursor<E> {
    cell: Arc<WrapperCell<CursorState<E>, ListCursor<E>>>,
}

wrapper_plumbing!(ListCursor<E>, raw = CursorState<E>, where E: BoxValue);

impl<E: BoxValue> ListCursor<E> {
    /// Index of the element the next call to `next` returns.
    #[must_use]
    pub fn position(&self) -> usize {
        self.cell.read(|state| state.next)
    }

    /// Removes the element last returned by `next`.
    ///
    /// Returns `None` without notifying if nothing was returned since the
    /// last structural change through this cursor.
    pub fn remove(&self) -> Result<Option<E>, BoxError> {
        let removed = self.cell.write(|state| {
            let at = state.last.take()?;
            let list = state.list.clone();
            let removed = list
                .cell
                .write(|items| (at < items.len()).then(|| items.remove(at)))?;
            if at < state.next {
                state.next -= 1;
            }
            Some(removed)
        });
        self.change_if(removed.is_some())?;
        Ok(removed)
    }

    /// Replaces the element last returned by `next`.
    pub fn set(&self, item: E) -> Result<Option<E>, BoxError> {
        let previous = self.cell.write(|state| {
            let at = state.last?;
            let list = state.list.clone();
            list.cell.write(|items| {
                items
                    .get_mut(at)
                    .map(|slot| std::mem::replace(slot, item))
            })
        });
        self.change_if(previous.is_some())?;
        Ok(previous)
    }

    /// Inserts before the element `next` would return.
    pub fn insert(&self, item: E) -> Result<(), BoxError> {
        self.cell.write(|state| {
            let list = state.list.clone();
            list.cell.write(|items| {
                let at = state.next.min(items.len());
                items.insert(at, item);
                state.next = at + 1;
            });
            state.last = None;
        });
        self.change()
    }
}

impl<E: BoxValue> Iterator for ListCursor<E> {
    type Item = E;

    fn next(&mut self) -> Option<E> {
        self.cell.write(|state| {
            let item = state.list.get(state.next)?;
            state.last = Some(state.next);
            state.next += 1;
            Some(item)
        })
    }
}
