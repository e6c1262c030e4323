#![forbid(unsafe_code)]

//! The application root that owns the registries.

use std::sync::Arc;

use crate::error::BoxError;
use crate::family::{Family, Scope};
use crate::power_box::PowerBox;
use crate::reactive::{DependentRegistry, View};
use crate::registry::FamilyRegistry;
use crate::value::{BoxValue, ValueBox};

/// Settings applied when [`Boxes`] creates families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxesConfig {
    /// Whether new families render values in strings and failure messages.
    pub show_value_strings: bool,
}

impl Default for BoxesConfig {
    fn default() -> Self {
        Self {
            show_value_strings: true,
        }
    }
}

impl BoxesConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// New families start with values hidden.
    #[must_use]
    pub fn with_hidden_values(mut self) -> Self {
        self.show_value_strings = false;
        self
    }

    #[must_use]
    pub fn with_show_value_strings(mut self, show: bool) -> Self {
        self.show_value_strings = show;
        self
    }
}

/// Owns the family registry and the dependent registry.
///
/// Cloning a `Boxes` creates a new handle to the **same** registries.
#[derive(Debug, Clone)]
pub struct Boxes {
    config: BoxesConfig,
    families: FamilyRegistry,
    dependents: DependentRegistry,
}

impl Default for Boxes {
    fn default() -> Self {
        Self::new()
    }
}

impl Boxes {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(BoxesConfig::default())
    }

    #[must_use]
    pub fn with_config(config: BoxesConfig) -> Self {
        tracing::debug!(show_value_strings = config.show_value_strings, "boxes created");
        Self {
            config,
            families: FamilyRegistry::new(config.show_value_strings),
            dependents: DependentRegistry::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &BoxesConfig {
        &self.config
    }

    #[must_use]
    pub fn families(&self) -> &FamilyRegistry {
        &self.families
    }

    #[must_use]
    pub fn dependents(&self) -> &DependentRegistry {
        &self.dependents
    }

    pub fn family<T: Send + Sync + 'static>(&self, scope: Scope, name: &str) -> Arc<Family<T>> {
        self.families.family(scope, name)
    }

    /// A plain pipelined box.
    pub fn cell<T: BoxValue>(&self, scope: Scope, name: &str, initial: T) -> PowerBox<T> {
        PowerBox::new(self.family(scope, name), initial)
    }

    /// A pipelined box over an existing value box.
    pub fn upgrade<T: BoxValue>(
        &self,
        scope: Scope,
        name: &str,
        inner: impl ValueBox<T> + 'static,
    ) -> PowerBox<T> {
        PowerBox::upgrade(self.family(scope, name), inner)
    }

    /// A cached view. Register its sources with [`View::depends_on`].
    pub fn view<T, F>(&self, scope: Scope, name: &str, calculate: F) -> View<T>
    where
        T: BoxValue,
        F: Fn() -> Result<T, BoxError> + Send + Sync + 'static,
    {
        View::new(self, self.family(scope, name), calculate)
    }
}
