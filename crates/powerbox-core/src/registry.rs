#![forbid(unsafe_code)]

//! The family registry: one [`Family`] per (scope, name, value type).
//!
//! # Invariants
//!
//! 1. Two lookups with equal scope, name and value type return the same
//!    `Arc<Family<T>>` for the lifetime of the registry.
//! 2. Under concurrent first access exactly one family is created and
//!    published.
//!
//! The value type is part of the identity, so the same scope and name used
//! with two value types yields two independent families.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use ahash::AHashMap;

use crate::family::{Family, Scope};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FamilyKey {
    scope: &'static str,
    name: Box<str>,
    value_type: TypeId,
}

struct RegistryInner {
    families: RwLock<AHashMap<FamilyKey, Arc<dyn Any + Send + Sync>>>,
    show_value_strings: bool,
}

/// Cheap-clone handle to a shared family cache.
#[derive(Clone)]
pub struct FamilyRegistry {
    inner: Arc<RegistryInner>,
}

impl FamilyRegistry {
    /// A registry whose new families show value strings iff
    /// `show_value_strings`.
    #[must_use]
    pub fn new(show_value_strings: bool) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                families: RwLock::new(AHashMap::new()),
                show_value_strings,
            }),
        }
    }

    /// The family for `(scope, name, T)`, created on first request.
    pub fn family<T: Send + Sync + 'static>(&self, scope: Scope, name: &str) -> Arc<Family<T>> {
        let key = FamilyKey {
            scope: scope.path(),
            name: Box::from(name),
            value_type: TypeId::of::<T>(),
        };

        {
            let families = self
                .inner
                .families
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(existing) = families.get(&key).and_then(downcast_family::<T>) {
                return existing;
            }
        }

        let mut families = self
            .inner
            .families
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = families.get(&key).and_then(downcast_family::<T>) {
            return existing;
        }
        let family = Arc::new(Family::new(scope, name, self.inner.show_value_strings));
        tracing::debug!(family = family.description(), "created box family");
        families.insert(key, Arc::clone(&family) as Arc<dyn Any + Send + Sync>);
        family
    }

    /// Whether a family for `(scope, name, T)` exists yet.
    #[must_use]
    pub fn contains<T: 'static>(&self, scope: Scope, name: &str) -> bool {
        let key = FamilyKey {
            scope: scope.path(),
            name: Box::from(name),
            value_type: TypeId::of::<T>(),
        };
        self.inner
            .families
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .families
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for FamilyRegistry {
    fn default() -> Self {
        Self::new(true)
    }
}

impl fmt::Debug for FamilyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FamilyRegistry")
            .field("families", &self.len())
            .field("show_value_strings", &self.inner.show_value_strings)
            .finish()
    }
}

fn downcast_family<T: Send + Sync + 'static>(
    stored: &Arc<dyn Any + Send + Sync>,
) -> Option<Arc<Family<T>>> {
    Arc::clone(stored).downcast::<Family<T>>().ok()
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::thread;

    use super::*;

    const SCOPE: Scope = Scope::new("tests::Settings");

    #[test]
    fn same_identity_same_family() {
        let registry = FamilyRegistry::default();
        let a = registry.family::<i32>(SCOPE, "volume");
        let b = registry.family::<i32>(SCOPE, "volume");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn value_type_is_part_of_identity() {
        let registry = FamilyRegistry::default();
        registry.family::<i32>(SCOPE, "volume");
        registry.family::<String>(SCOPE, "volume");
        registry.family::<i32>(SCOPE, "balance");
        assert_eq!(registry.len(), 3);
        assert!(registry.contains::<String>(SCOPE, "volume"));
        assert!(!registry.contains::<u8>(SCOPE, "volume"));
    }

    #[test]
    fn registries_are_independent() {
        let first = FamilyRegistry::default();
        let second = FamilyRegistry::new(false);
        let a = first.family::<i32>(SCOPE, "volume");
        let b = second.family::<i32>(SCOPE, "volume");
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(a.shows_value_strings());
        assert!(!b.shows_value_strings());
    }

    #[test]
    fn concurrent_first_access_creates_one_family() {
        let registry = FamilyRegistry::default();
        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    registry.family::<u64>(SCOPE, "shared")
                })
            })
            .collect();
        let families: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for family in &families[1..] {
            assert!(Arc::ptr_eq(&families[0], family));
        }
        assert_eq!(registry.len(), 1);
    }
}
