#![forbid(unsafe_code)]

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use ahash::AHashMap;
use powerbox_core::{BoxError, BoxValue, Boxes, Family, PowerBox, Scope, ValueBox};

#[derive(Debug, thiserror::Error)]
pub enum BoxesMapError {
    #[error("no box for key {key}; add one with put_box or allow boxless keys")]
    MissingBox { key: String },

    #[error(transparent)]
    Box(#[from] BoxError),
}

/// A map whose values live in boxes.
///
/// Each key maps to a shared [`ValueBox`]. Reading a key reads its box and
/// writing a key writes its box, so the box's pipelines run. Structural
/// changes (adding or removing boxes) take `&mut self`; reads and writes
/// through the boxes only need `&self`.
pub struct BoxesMap<K, V> {
    entries: AHashMap<K, Arc<dyn ValueBox<V>>>,
    cells: Arc<Family<V>>,
    allows_boxless_keys: PowerBox<bool>,
}

impl<K, V> BoxesMap<K, V>
where
    K: Eq + Hash + fmt::Debug + 'static,
    V: BoxValue,
{
    /// An empty map. Boxes created for boxless keys join the family
    /// `(scope, name)`.
    #[must_use]
    pub fn new(boxes: &Boxes, scope: Scope, name: &str) -> Self {
        Self {
            entries: AHashMap::new(),
            cells: boxes.family(scope, name),
            allows_boxless_keys: boxes.cell(Scope::of::<Self>(), "allowsBoxlessKeys", false),
        }
    }

    /// Whether [`put`](Self::put) creates a box for a key that has none.
    /// Defaults to `false`.
    #[must_use]
    pub fn allows_boxless_keys(&self) -> &PowerBox<bool> {
        &self.allows_boxless_keys
    }

    /// Maps `key` to `value_box`, returning the box it replaces.
    pub fn put_box(
        &mut self,
        key: K,
        value_box: Arc<dyn ValueBox<V>>,
    ) -> Option<Arc<dyn ValueBox<V>>> {
        self.entries.insert(key, value_box)
    }

    #[must_use]
    pub fn get_box(&self, key: &K) -> Option<Arc<dyn ValueBox<V>>> {
        self.entries.get(key).cloned()
    }

    /// Reads the box of `key`; `None` if there is none.
    pub fn get(&self, key: &K) -> Result<Option<V>, BoxError> {
        self.entries.get(key).map(|value_box| value_box.get()).transpose()
    }

    /// Writes `value` through the box of `key`.
    ///
    /// A key without a box is an error unless boxless keys are allowed, in
    /// which case a fresh cell box holding `value` is added.
    pub fn put(&mut self, key: K, value: V) -> Result<(), BoxesMapError> {
        if let Some(value_box) = self.entries.get(&key) {
            return value_box.set(value).map_err(BoxesMapError::from);
        }
        if !self.allows_boxless_keys.get()? {
            return Err(BoxesMapError::MissingBox {
                key: format!("{key:?}"),
            });
        }
        tracing::debug!(key = ?key, family = %self.cells.description(), "creating box for boxless key");
        let cell: Arc<dyn ValueBox<V>> = Arc::new(PowerBox::new(Arc::clone(&self.cells), value));
        self.entries.insert(key, cell);
        Ok(())
    }

    /// Removes the box of `key` from the map. The box itself is untouched.
    pub fn remove(&mut self, key: &K) -> Option<Arc<dyn ValueBox<V>>> {
        self.entries.remove(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }

    /// Reads every box, stopping at the first failure.
    pub fn values(&self) -> Result<Vec<V>, BoxError> {
        self.entries.values().map(|value_box| value_box.get()).collect()
    }
}

impl<K: fmt::Debug, V> fmt::Debug for BoxesMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxesMap")
            .field("keys", &self.entries.keys().collect::<Vec<_>>())
            .field("cells", &self.cells.description())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use powerbox_core::participants::RequireBounds;

    use super::*;

    const SCOPE: Scope = Scope::new("tests::Settings");

    #[test]
    fn put_writes_through_the_box() {
        let boxes = Boxes::new();
        let volume = boxes.cell(SCOPE, "volume", 5_i32);
        volume
            .add_change_observer(Arc::new(RequireBounds::between(0, 10).unwrap()))
            .unwrap();
        let mut settings = BoxesMap::new(&boxes, SCOPE, "setting");
        settings.put_box("volume", Arc::new(volume.clone()));

        settings.put("volume", 7).unwrap();
        assert_eq!(volume.get().unwrap(), 7);

        let err = settings.put("volume", 11).unwrap_err();
        assert!(matches!(err, BoxesMapError::Box(ref inner) if !inner.is_fatal()));
        assert_eq!(settings.get(&"volume").unwrap(), Some(7));
    }

    #[test]
    fn boxless_keys_need_permission() {
        let boxes = Boxes::new();
        let mut settings: BoxesMap<&str, i32> = BoxesMap::new(&boxes, SCOPE, "flags");
        let err = settings.put("retries", 3).unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"no box for key "retries"; add one with put_box or allow boxless keys"#
        );
        assert!(settings.is_empty());

        settings.allows_boxless_keys().set(true).unwrap();
        settings.put("retries", 3).unwrap();
        settings.put("retries", 4).unwrap();
        assert_eq!(settings.len(), 1);
        assert_eq!(settings.values().unwrap(), vec![4]);
        assert!(settings.remove(&"retries").is_some());
        assert_eq!(settings.get(&"retries").unwrap(), None);
    }
}
