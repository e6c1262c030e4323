#![forbid(unsafe_code)]

//! [`MapBox`] and its two views, [`KeySet`] and [`Entries`].
//!
//! Both views read and write the map's raw value directly, so they always
//! reflect the current map. Removing through a view is a change of the view
//! and then a change of the map.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::Arc;

use ahash::AHashMap;
use powerbox_core::{BoxError, BoxValue, Boxes, Family, Scope, ValueBox, WrapperBox, WrapperCell};

/// A box that is a hash map.
pub struct MapBox<K, V> {
    cell: Arc<WrapperCell<AHashMap<K, V>, MapBox<K, V>>>,
}

wrapper_plumbing!(MapBox<K, V>, raw = AHashMap<K, V>, where K: BoxValue + Eq + Hash, V: BoxValue);

impl<K, V> MapBox<K, V>
where
    K: BoxValue + Eq + Hash,
    V: BoxValue,
{
    #[must_use]
    pub fn new(boxes: &Boxes, family: Arc<Family<Self>>) -> Self {
        Self::from_iter_in(boxes, family, [])
    }

    #[must_use]
    pub fn from_iter_in(
        boxes: &Boxes,
        family: Arc<Family<Self>>,
        entries: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        Self {
            cell: Arc::new(WrapperCell::new(boxes, family, entries.into_iter().collect())),
        }
    }

    #[must_use]
    pub fn named(boxes: &Boxes, scope: Scope, name: &str) -> Self {
        Self::new(boxes, boxes.family(scope, name))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cell.read(|map| map.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cell.read(|map| map.is_empty())
    }

    #[must_use]
    pub fn get(&self, key: &K) -> Option<V> {
        self.cell.read(|map| map.get(key).cloned())
    }

    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.cell.read(|map| map.contains_key(key))
    }

    #[must_use]
    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.cell.read(|map| map.values().any(|candidate| candidate == value))
    }

    #[must_use]
    pub fn keys(&self) -> Vec<K> {
        self.cell.read(|map| map.keys().cloned().collect())
    }

    #[must_use]
    pub fn values(&self) -> Vec<V> {
        self.cell.read(|map| map.values().cloned().collect())
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<(K, V)> {
        self.cell.read(|map| {
            map.iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        })
    }

    /// Inserts or overwrites; always notifies. Returns the previous value.
    pub fn insert(&self, key: K, value: V) -> Result<Option<V>, BoxError> {
        let previous = self.cell.write(|map| map.insert(key, value));
        self.change_with(previous)
    }

    pub fn remove(&self, key: &K) -> Result<Option<V>, BoxError> {
        let removed = self.cell.write(|map| map.remove(key));
        self.change_if(removed.is_some())?;
        Ok(removed)
    }

    /// Inserts every entry; notifies once if there was at least one.
    pub fn extend(&self, entries: impl IntoIterator<Item = (K, V)>) -> Result<bool, BoxError> {
        let mut entries = entries.into_iter().peekable();
        if entries.peek().is_none() {
            return Ok(false);
        }
        self.cell.write(|map| map.extend(entries));
        self.change_with(true)
    }

    pub fn retain(&self, keep: impl FnMut(&K, &mut V) -> bool) -> Result<bool, BoxError> {
        let removed = self.cell.write(|map| {
            let before = map.len();
            map.retain(keep);
            map.len() < before
        });
        self.change_if(removed)
    }

    pub fn clear(&self) -> Result<(), BoxError> {
        self.cell.write(|map| map.clear());
        self.change()
    }

    /// The keys as a set view. Removing a key removes its entry.
    pub fn key_set(&self) -> Result<KeySet<K, V>, BoxError> {
        let key_set = KeySet {
            cell: Arc::new(
                self.cell
                    .sub_cell("keySet", KeysOf(MapView { map: self.clone() })),
            ),
        };
        self.watch(&key_set)?;
        Ok(key_set)
    }

    /// The entries as a view that can overwrite values in place.
    pub fn entries(&self) -> Result<Entries<K, V>, BoxError> {
        let entries = Entries {
            cell: Arc::new(self.cell.sub_cell("entries", MapView { map: self.clone() })),
        };
        self.watch(&entries)?;
        Ok(entries)
    }
}

impl<K, V> ValueBox<MapBox<K, V>> for MapBox<K, V>
where
    K: BoxValue + Eq + Hash,
    V: BoxValue,
{
    fn get(&self) -> Result<MapBox<K, V>, BoxError> {
        Ok(self.clone())
    }

    /// Copies the contents of `value` in, through the change transforms.
    fn set(&self, value: MapBox<K, V>) -> Result<(), BoxError> {
        self.assign(value)
    }
}

impl<K, V> PartialEq for MapBox<K, V>
where
    K: BoxValue + Eq + Hash,
    V: BoxValue + PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
            || other.cell.read(|theirs| self.cell.read(|ours| ours == theirs))
    }
}

impl<K, V, S> PartialEq<HashMap<K, V, S>> for MapBox<K, V>
where
    K: BoxValue + Eq + Hash,
    V: BoxValue + PartialEq,
    S: BuildHasher,
{
    fn eq(&self, other: &HashMap<K, V, S>) -> bool {
        self.cell.read(|map| {
            map.len() == other.len()
                && map
                    .iter()
                    .all(|(key, value)| other.get(key).is_some_and(|theirs| theirs == value))
        })
    }
}

impl<K, V> Eq for MapBox<K, V>
where
    K: BoxValue + Eq + Hash,
    V: BoxValue + Eq,
{
}

impl<K, V> Hash for MapBox<K, V>
where
    K: BoxValue + Eq + Hash,
    V: BoxValue + Hash,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.cell.read(|map| hash_entries(map, state));
    }
}

fn hash_entries<K: Hash, V: Hash, H: Hasher>(map: &AHashMap<K, V>, state: &mut H) {
    state.write_usize(map.len());
    state.write_u64(crate::unordered_hash(map.iter()));
}

// ─── Views ──────────────────────────────────────────────────────────────────

/// Raw value of the map views: the viewed map.
pub struct MapView<K, V> {
    map: MapBox<K, V>,
}

impl<K, V> MapView<K, V>
where
    K: BoxValue + Eq + Hash,
    V: BoxValue,
{
    fn write<X>(&self, f: impl FnOnce(&mut AHashMap<K, V>) -> X) -> X {
        self.map.cell.write(f)
    }
}

/// Raw value of [`KeySet`]; renders as the keys only.
pub struct KeysOf<K, V>(MapView<K, V>);

impl<K, V> fmt::Debug for KeysOf<K, V>
where
    K: BoxValue + Eq + Hash,
    V: BoxValue,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.map.cell.read(|map| f.debug_set().entries(map.keys()).finish())
    }
}

impl<K, V> fmt::Debug for MapView<K, V>
where
    K: BoxValue + Eq + Hash,
    V: BoxValue,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.map.cell.read(|map| f.debug_list().entries(map.iter()).finish())
    }
}

/// The keys of a [`MapBox`].
pub struct KeySet<K, V> {
    cell: Arc<WrapperCell<KeysOf<K, V>, KeySet<K, V>>>,
}

wrapper_plumbing!(KeySet<K, V>, raw = KeysOf<K, V>, where K: BoxValue + Eq + Hash, V: BoxValue);

/// The entries of a [`MapBox`].
pub struct Entries<K, V> {
    cell: Arc<WrapperCell<MapView<K, V>, Entries<K, V>>>,
}

wrapper_plumbing!(Entries<K, V>, raw = MapView<K, V>, where K: BoxValue + Eq + Hash, V: BoxValue);

impl<K, V> KeySet<K, V>
where
    K: BoxValue + Eq + Hash,
    V: BoxValue,
{
    #[must_use]
    pub fn len(&self) -> usize {
        self.map().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }

    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.map().contains_key(key)
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<K> {
        self.map().keys()
    }

    #[must_use]
    pub fn map(&self) -> MapBox<K, V> {
        self.cell.read(|keys| keys.0.map.clone())
    }

    /// Removes `key` and its value from the map.
    pub fn remove(&self, key: &K) -> Result<bool, BoxError> {
        let removed = self.cell.write(|keys| keys.0.write(|map| map.remove(key).is_some()));
        self.change_if(removed)
    }

    pub fn retain(&self, mut keep: impl FnMut(&K) -> bool) -> Result<bool, BoxError> {
        let removed = self.cell.write(|keys| {
            keys.0.write(|map| {
                let before = map.len();
                map.retain(|key, _| keep(key));
                map.len() < before
            })
        });
        self.change_if(removed)
    }

    pub fn clear(&self) -> Result<(), BoxError> {
        self.cell.write(|keys| keys.0.write(|map| map.clear()));
        self.change()
    }
}

impl<K, V> Entries<K, V>
where
    K: BoxValue + Eq + Hash,
    V: BoxValue,
{
    #[must_use]
    pub fn len(&self) -> usize {
        self.map().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<(K, V)> {
        self.map().to_vec()
    }

    #[must_use]
    pub fn map(&self) -> MapBox<K, V> {
        self.cell.read(|view| view.map.clone())
    }

    /// Overwrites the value of an existing entry. Returns the previous value,
    /// or `None` without notifying if `key` has no entry.
    pub fn set_value(&self, key: &K, value: V) -> Result<Option<V>, BoxError> {
        let previous = self.cell.write(|view| {
            view.write(|map| map.get_mut(key).map(|slot| std::mem::replace(slot, value)))
        });
        self.change_if(previous.is_some())?;
        Ok(previous)
    }

    pub fn remove(&self, key: &K) -> Result<Option<V>, BoxError> {
        let removed = self.cell.write(|view| view.write(|map| map.remove(key)));
        self.change_if(removed.is_some())?;
        Ok(removed)
    }

    pub fn retain(&self, keep: impl FnMut(&K, &mut V) -> bool) -> Result<bool, BoxError> {
        let removed = self.cell.write(|view| {
            view.write(|map| {
                let before = map.len();
                map.retain(keep);
                map.len() < before
            })
        });
        self.change_if(removed)
    }

    pub fn clear(&self) -> Result<(), BoxError> {
        self.cell.write(|view| view.write(|map| map.clear()));
        self.change()
    }
}

impl<K, V> PartialEq for KeySet<K, V>
where
    K: BoxValue + Eq + Hash,
    V: BoxValue,
{
    fn eq(&self, other: &Self) -> bool {
        let (ours, theirs) = (self.map(), other.map());
        Arc::ptr_eq(&ours.cell, &theirs.cell)
            || theirs.cell.read(|theirs| {
                ours.cell.read(|ours| {
                    ours.len() == theirs.len() && ours.keys().all(|key| theirs.contains_key(key))
                })
            })
    }
}

impl<K, V> Eq for KeySet<K, V>
where
    K: BoxValue + Eq + Hash,
    V: BoxValue,
{
}

impl<K, V, S> PartialEq<HashSet<K, S>> for KeySet<K, V>
where
    K: BoxValue + Eq + Hash,
    V: BoxValue,
    S: BuildHasher,
{
    fn eq(&self, other: &HashSet<K, S>) -> bool {
        self.map().cell.read(|map| {
            map.len() == other.len() && map.keys().all(|key| other.contains(key))
        })
    }
}

impl<K, V> Hash for KeySet<K, V>
where
    K: BoxValue + Eq + Hash,
    V: BoxValue,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.map().cell.read(|map| {
            state.write_usize(map.len());
            state.write_u64(crate::unordered_hash(map.keys()));
        });
    }
}

impl<K, V> PartialEq for Entries<K, V>
where
    K: BoxValue + Eq + Hash,
    V: BoxValue + PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.map() == other.map()
    }
}

impl<K, V> Eq for Entries<K, V>
where
    K: BoxValue + Eq + Hash,
    V: BoxValue + Eq,
{
}

impl<K, V, S> PartialEq<HashMap<K, V, S>> for Entries<K, V>
where
    K: BoxValue + Eq + Hash,
    V: BoxValue + PartialEq,
    S: BuildHasher,
{
    fn eq(&self, other: &HashMap<K, V, S>) -> bool {
        self.map() == *other
    }
}

impl<K, V> Hash for Entries<K, V>
where
    K: BoxValue + Eq + Hash,
    V: BoxValue + Hash,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.map().cell.read(|map| hash_entries(map, state));
    }
}
