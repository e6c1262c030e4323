#![forbid(unsafe_code)]

//! Box families: the shared pipeline configuration of all boxes with the
//! same scope, name and value type.
//!
//! Families are created by a [`FamilyRegistry`](crate::FamilyRegistry) and
//! live as long as it does. Everything a family holds is shared, so adding a
//! participant or hiding values affects every box of the family at once.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::BoxError;
use crate::participant::{
    ChangeMiddleware, ChangeObserver, GetMiddleware, GetObserver, ParticipantKind,
};
use crate::participant_list::ParticipantList;
use crate::participants::{Nullable, RejectNull};

/// The declaring scope of a family, usually a type or module path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Scope {
    path: &'static str,
}

impl Scope {
    #[must_use]
    pub const fn new(path: &'static str) -> Self {
        Self { path }
    }

    /// The scope named after type `S`.
    #[must_use]
    pub fn of<S: ?Sized + 'static>() -> Self {
        Self::new(std::any::type_name::<S>())
    }

    #[must_use]
    pub const fn path(&self) -> &'static str {
        self.path
    }

    /// Last path segment without generic arguments.
    #[must_use]
    pub fn simple_name(&self) -> &'static str {
        let base = match self.path.find('<') {
            Some(generics) => &self.path[..generics],
            None => self.path,
        };
        match base.rfind("::") {
            Some(separator) => &base[separator + 2..],
            None => base,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.simple_name())
    }
}

/// Shared pipeline configuration for boxes holding `T`.
pub struct Family<T> {
    scope: Scope,
    name: Arc<str>,
    description: Arc<str>,
    get_middlewares: ParticipantList<dyn GetMiddleware<T>>,
    get_observers: ParticipantList<dyn GetObserver<T>>,
    change_middlewares: ParticipantList<dyn ChangeMiddleware<T>>,
    change_observers: ParticipantList<dyn ChangeObserver<T>>,
    shows_value_strings: AtomicBool,
}

impl<T: 'static> Family<T> {
    pub(crate) fn new(scope: Scope, name: &str, shows_value_strings: bool) -> Self {
        let description: Arc<str> = Arc::from(format!("{}.{name}", scope.simple_name()));
        Self {
            scope,
            name: Arc::from(name),
            get_middlewares: ParticipantList::new(
                ParticipantKind::GetMiddleware,
                Arc::clone(&description),
            ),
            get_observers: ParticipantList::new(
                ParticipantKind::GetObserver,
                Arc::clone(&description),
            ),
            change_middlewares: ParticipantList::new(
                ParticipantKind::ChangeMiddleware,
                Arc::clone(&description),
            ),
            change_observers: ParticipantList::new(
                ParticipantKind::ChangeObserver,
                Arc::clone(&description),
            ),
            description,
            shows_value_strings: AtomicBool::new(shows_value_strings),
        }
    }
}

impl<T> Family<T> {
    #[must_use]
    pub fn scope(&self) -> Scope {
        self.scope
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `"{scope simple name}.{name}"`.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    pub(crate) fn shared_description(&self) -> Arc<str> {
        Arc::clone(&self.description)
    }

    #[must_use]
    pub fn get_middlewares(&self) -> &ParticipantList<dyn GetMiddleware<T>> {
        &self.get_middlewares
    }

    #[must_use]
    pub fn get_observers(&self) -> &ParticipantList<dyn GetObserver<T>> {
        &self.get_observers
    }

    #[must_use]
    pub fn change_middlewares(&self) -> &ParticipantList<dyn ChangeMiddleware<T>> {
        &self.change_middlewares
    }

    #[must_use]
    pub fn change_observers(&self) -> &ParticipantList<dyn ChangeObserver<T>> {
        &self.change_observers
    }

    #[must_use]
    pub fn shows_value_strings(&self) -> bool {
        self.shows_value_strings.load(Ordering::Acquire)
    }

    /// Redacts values from renderings and failure messages. Cannot be undone.
    pub fn hide_value_strings(&self) -> &Self {
        self.shows_value_strings.store(false, Ordering::Release);
        self
    }

    /// `[hidden value of {description}]`.
    #[must_use]
    pub fn hidden_placeholder(&self) -> String {
        format!("[hidden value of {}]", self.description)
    }
}

impl<T: 'static> Family<T> {
    pub fn add_get_middleware(&self, middleware: Arc<dyn GetMiddleware<T>>) -> Result<&Self, BoxError> {
        self.get_middlewares.add(middleware)?;
        Ok(self)
    }

    pub fn add_get_observer(&self, observer: Arc<dyn GetObserver<T>>) -> Result<&Self, BoxError> {
        self.get_observers.add(observer)?;
        Ok(self)
    }

    pub fn add_change_middleware(
        &self,
        middleware: Arc<dyn ChangeMiddleware<T>>,
    ) -> Result<&Self, BoxError> {
        self.change_middlewares.add(middleware)?;
        Ok(self)
    }

    pub fn add_change_observer(
        &self,
        observer: Arc<dyn ChangeObserver<T>>,
    ) -> Result<&Self, BoxError> {
        self.change_observers.add(observer)?;
        Ok(self)
    }

    pub fn add_get_middlewares<I>(&self, middlewares: I) -> Result<&Self, BoxError>
    where
        I: IntoIterator<Item = Arc<dyn GetMiddleware<T>>>,
    {
        for middleware in middlewares {
            self.get_middlewares.add(middleware)?;
        }
        Ok(self)
    }

    pub fn add_get_observers<I>(&self, observers: I) -> Result<&Self, BoxError>
    where
        I: IntoIterator<Item = Arc<dyn GetObserver<T>>>,
    {
        for observer in observers {
            self.get_observers.add(observer)?;
        }
        Ok(self)
    }

    pub fn add_change_middlewares<I>(&self, middlewares: I) -> Result<&Self, BoxError>
    where
        I: IntoIterator<Item = Arc<dyn ChangeMiddleware<T>>>,
    {
        for middleware in middlewares {
            self.change_middlewares.add(middleware)?;
        }
        Ok(self)
    }

    pub fn add_change_observers<I>(&self, observers: I) -> Result<&Self, BoxError>
    where
        I: IntoIterator<Item = Arc<dyn ChangeObserver<T>>>,
    {
        for observer in observers {
            self.change_observers.add(observer)?;
        }
        Ok(self)
    }

    /// Rejects sets to a null value.
    pub fn not_null(&self) -> Result<&Self, BoxError>
    where
        T: Nullable + fmt::Debug,
    {
        self.add_change_observer(Arc::new(RejectNull))
    }
}

impl<T> fmt::Debug for Family<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Family")
            .field("description", &self.description)
            .field("get_middlewares", &self.get_middlewares)
            .field("get_observers", &self.get_observers)
            .field("change_middlewares", &self.change_middlewares)
            .field("change_observers", &self.change_observers)
            .field(
                "shows_value_strings",
                &self.shows_value_strings.load(Ordering::Relaxed),
            )
            .finish()
    }
}

impl<T> fmt::Display for Family<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "family {}", self.description)
    }
}
