#![forbid(unsafe_code)]

//! Pipeline participants: transforms ("middleware") and observers that run
//! on every get or set of a box in a family.
//!
//! Every participant receives a [`BoxRef`] naming the box it runs for, the
//! value read from raw storage before the operation (`original`), and the
//! value as shaped by earlier participants. Change participants also see the
//! value the caller asked for (`requested`).
//!
//! # Equality
//!
//! Participant lists reject duplicates. By default two participants are the
//! same only if they are the same allocation; value-like participants
//! override [`Participant::same_as`] (usually with [`same_value`]) so that
//! registering an equal instance twice is a no-op.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use as_any::AsAny;

use crate::error::ParticipantFailure;
use crate::family::Family;
use crate::value::BoxId;

/// The four pipeline stages a participant can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParticipantKind {
    GetMiddleware,
    GetObserver,
    ChangeMiddleware,
    ChangeObserver,
}

impl ParticipantKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::GetMiddleware => "GetMiddleware",
            Self::GetObserver => "GetObserver",
            Self::ChangeMiddleware => "ChangeMiddleware",
            Self::ChangeObserver => "ChangeObserver",
        }
    }
}

impl fmt::Display for ParticipantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Renders the raw value of a box that is its own value.
pub(crate) trait Reveal: Send + Sync {
    fn revealed_string(&self) -> String;
}

/// The box a participant is running for.
pub struct BoxRef<'a, T> {
    id: BoxId,
    family: &'a Family<T>,
    revealed: Option<&'a dyn Reveal>,
}

impl<T> Clone for BoxRef<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for BoxRef<'_, T> {}

impl<'a, T> BoxRef<'a, T> {
    pub(crate) fn new(id: BoxId, family: &'a Family<T>) -> Self {
        Self {
            id,
            family,
            revealed: None,
        }
    }

    /// A box whose value is the box itself (a wrapper).
    pub(crate) fn self_valued(id: BoxId, family: &'a Family<T>, revealed: &'a dyn Reveal) -> Self {
        Self {
            id,
            family,
            revealed: Some(revealed),
        }
    }

    #[must_use]
    pub fn id(&self) -> BoxId {
        self.id
    }

    #[must_use]
    pub fn family(&self) -> &'a Family<T> {
        self.family
    }

    #[must_use]
    pub fn description(&self) -> &'a str {
        self.family.description()
    }

    #[must_use]
    pub fn shows_value_strings(&self) -> bool {
        self.family.shows_value_strings()
    }

    #[must_use]
    pub fn is_self_valued(&self) -> bool {
        self.revealed.is_some()
    }

    /// Rendering of the wrapped raw value, for self-valued boxes.
    #[must_use]
    pub fn revealed_string(&self) -> Option<String> {
        self.revealed.map(Reveal::revealed_string)
    }

    /// Renders `value` for a message, or `None` when the family hides values.
    #[must_use]
    pub fn render(&self, value: &T) -> Option<String>
    where
        T: fmt::Debug,
    {
        if !self.shows_value_strings() {
            return None;
        }
        Some(self.revealed_string().unwrap_or_else(|| format!("{value:?}")))
    }
}

impl<T> fmt::Debug for BoxRef<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxRef")
            .field("id", &self.id)
            .field("family", &self.family.description())
            .field("self_valued", &self.is_self_valued())
            .finish()
    }
}

/// Common supertrait of every participant.
pub trait Participant: AsAny + Send + Sync {
    /// Whether `other` counts as the same participant for de-duplication.
    fn same_as(&self, other: &dyn Any) -> bool {
        std::ptr::addr_eq(self as *const Self, other as *const dyn Any)
    }
}

/// Value equality for [`Participant::same_as`] overrides.
#[must_use]
pub fn same_value<P: PartialEq + 'static>(this: &P, other: &dyn Any) -> bool {
    other.downcast_ref::<P>().is_some_and(|other| other == this)
}

/// Transforms the value on its way out of a box.
pub trait GetMiddleware<T>: Participant {
    fn on_get(&self, subject: &BoxRef<'_, T>, original: &T, current: &T)
    -> Result<T, ParticipantFailure>;
}

/// Sees the final value of every get.
pub trait GetObserver<T>: Participant {
    fn on_get(
        &self,
        subject: &BoxRef<'_, T>,
        original: &T,
        final_value: &T,
    ) -> Result<(), ParticipantFailure>;
}

/// Transforms the value on its way into a box.
pub trait ChangeMiddleware<T>: Participant {
    fn on_change(
        &self,
        subject: &BoxRef<'_, T>,
        original: &T,
        current: &T,
        requested: &T,
    ) -> Result<T, ParticipantFailure>;
}

/// Sees every committed set. A failure rolls the box back to `original`.
pub trait ChangeObserver<T>: Participant {
    fn on_change(
        &self,
        subject: &BoxRef<'_, T>,
        original: &T,
        final_value: &T,
        requested: &T,
    ) -> Result<(), ParticipantFailure>;
}

// ─── Closure adapters ───────────────────────────────────────────────────────

struct FnGetMiddleware<F>(F);
struct FnGetObserver<F>(F);
struct FnChangeMiddleware<F>(F);
struct FnChangeObserver<F>(F);

impl<F: Send + Sync + 'static> Participant for FnGetMiddleware<F> {}
impl<F: Send + Sync + 'static> Participant for FnGetObserver<F> {}
impl<F: Send + Sync + 'static> Participant for FnChangeMiddleware<F> {}
impl<F: Send + Sync + 'static> Participant for FnChangeObserver<F> {}

impl<T, F> GetMiddleware<T> for FnGetMiddleware<F>
where
    F: Fn(&BoxRef<'_, T>, &T, &T) -> Result<T, ParticipantFailure> + Send + Sync + 'static,
{
    fn on_get(
        &self,
        subject: &BoxRef<'_, T>,
        original: &T,
        current: &T,
    ) -> Result<T, ParticipantFailure> {
        (self.0)(subject, original, current)
    }
}

impl<T, F> GetObserver<T> for FnGetObserver<F>
where
    F: Fn(&BoxRef<'_, T>, &T, &T) -> Result<(), ParticipantFailure> + Send + Sync + 'static,
{
    fn on_get(
        &self,
        subject: &BoxRef<'_, T>,
        original: &T,
        final_value: &T,
    ) -> Result<(), ParticipantFailure> {
        (self.0)(subject, original, final_value)
    }
}

impl<T, F> ChangeMiddleware<T> for FnChangeMiddleware<F>
where
    F: Fn(&BoxRef<'_, T>, &T, &T, &T) -> Result<T, ParticipantFailure> + Send + Sync + 'static,
{
    fn on_change(
        &self,
        subject: &BoxRef<'_, T>,
        original: &T,
        current: &T,
        requested: &T,
    ) -> Result<T, ParticipantFailure> {
        (self.0)(subject, original, current, requested)
    }
}

impl<T, F> ChangeObserver<T> for FnChangeObserver<F>
where
    F: Fn(&BoxRef<'_, T>, &T, &T, &T) -> Result<(), ParticipantFailure> + Send + Sync + 'static,
{
    fn on_change(
        &self,
        subject: &BoxRef<'_, T>,
        original: &T,
        final_value: &T,
        requested: &T,
    ) -> Result<(), ParticipantFailure> {
        (self.0)(subject, original, final_value, requested)
    }
}

/// Wraps `f(subject, original, current)` as a get transform.
pub fn get_middleware<T, F>(f: F) -> Arc<dyn GetMiddleware<T>>
where
    T: 'static,
    F: Fn(&BoxRef<'_, T>, &T, &T) -> Result<T, ParticipantFailure> + Send + Sync + 'static,
{
    Arc::new(FnGetMiddleware(f))
}

/// Wraps `f(subject, original, final_value)` as a get observer.
pub fn get_observer<T, F>(f: F) -> Arc<dyn GetObserver<T>>
where
    T: 'static,
    F: Fn(&BoxRef<'_, T>, &T, &T) -> Result<(), ParticipantFailure> + Send + Sync + 'static,
{
    Arc::new(FnGetObserver(f))
}

/// Wraps `f(subject, original, current, requested)` as a change transform.
pub fn change_middleware<T, F>(f: F) -> Arc<dyn ChangeMiddleware<T>>
where
    T: 'static,
    F: Fn(&BoxRef<'_, T>, &T, &T, &T) -> Result<T, ParticipantFailure> + Send + Sync + 'static,
{
    Arc::new(FnChangeMiddleware(f))
}

/// Wraps `f(subject, original, final_value, requested)` as a change observer.
pub fn change_observer<T, F>(f: F) -> Arc<dyn ChangeObserver<T>>
where
    T: 'static,
    F: Fn(&BoxRef<'_, T>, &T, &T, &T) -> Result<(), ParticipantFailure> + Send + Sync + 'static,
{
    Arc::new(FnChangeObserver(f))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(PartialEq)]
    struct Offset(i32);

    impl Participant for Offset {
        fn same_as(&self, other: &dyn Any) -> bool {
            same_value(self, other)
        }
    }

    #[test]
    fn default_equality_is_identity() {
        let a = change_observer::<i32, _>(|_, _, _, _| Ok(()));
        let b = change_observer::<i32, _>(|_, _, _, _| Ok(()));
        assert!(a.same_as((*a).as_any()));
        assert!(!a.same_as((*b).as_any()));
    }

    #[test]
    fn value_participants_compare_by_value() {
        let a = Offset(3);
        assert!(a.same_as(&Offset(3)));
        assert!(!a.same_as(&Offset(4)));
        assert!(!a.same_as(&"not an offset"));
    }

    #[test]
    fn kind_displays_its_name() {
        assert_eq!(ParticipantKind::ChangeObserver.to_string(), "ChangeObserver");
        assert_eq!(ParticipantKind::GetMiddleware.name(), "GetMiddleware");
    }
}
