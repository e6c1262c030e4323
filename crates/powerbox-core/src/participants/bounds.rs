#![forbid(unsafe_code)]

//! Range participants: one rejects out-of-range sets, one clamps.

use std::any::Any;
use std::cmp::Ordering;
use std::fmt;

use thiserror::Error;

use crate::error::ParticipantFailure;
use crate::participant::{
    BoxRef, ChangeMiddleware, ChangeObserver, GetMiddleware, Participant, same_value,
};

/// An invalid range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BoundsError {
    #[error("maximum is below minimum")]
    MaxBelowMin,

    #[error("equal minimum and maximum must both be inclusive")]
    UnsatisfiableExclusive,
}

/// One end of a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bound<T> {
    pub value: T,
    pub inclusive: bool,
}

impl<T> Bound<T> {
    #[must_use]
    pub const fn inclusive(value: T) -> Self {
        Self {
            value,
            inclusive: true,
        }
    }

    #[must_use]
    pub const fn exclusive(value: T) -> Self {
        Self {
            value,
            inclusive: false,
        }
    }
}

fn check_range<T: PartialOrd>(min: &Bound<T>, max: &Bound<T>) -> Result<(), BoundsError> {
    match min.value.partial_cmp(&max.value) {
        Some(Ordering::Less) => Ok(()),
        Some(Ordering::Equal) if min.inclusive && max.inclusive => Ok(()),
        Some(Ordering::Equal) => Err(BoundsError::UnsatisfiableExclusive),
        _ => Err(BoundsError::MaxBelowMin),
    }
}

/// Change observer that fails any set outside the range, which rolls the box
/// back to its previous value.
#[derive(Debug, Clone, PartialEq)]
pub struct RequireBounds<T> {
    min: Option<Bound<T>>,
    max: Option<Bound<T>>,
}

impl<T: PartialOrd> RequireBounds<T> {
    /// Inclusive range `[min, max]`.
    pub fn between(min: T, max: T) -> Result<Self, BoundsError> {
        Self::between_bounds(Bound::inclusive(min), Bound::inclusive(max))
    }

    pub fn between_bounds(min: Bound<T>, max: Bound<T>) -> Result<Self, BoundsError> {
        check_range(&min, &max)?;
        Ok(Self {
            min: Some(min),
            max: Some(max),
        })
    }

    #[must_use]
    pub fn minimum(min: T, inclusive: bool) -> Self {
        Self {
            min: Some(Bound {
                value: min,
                inclusive,
            }),
            max: None,
        }
    }

    #[must_use]
    pub fn maximum(max: T, inclusive: bool) -> Self {
        Self {
            min: None,
            max: Some(Bound {
                value: max,
                inclusive,
            }),
        }
    }

    #[must_use]
    pub fn min(&self) -> Option<&Bound<T>> {
        self.min.as_ref()
    }

    #[must_use]
    pub fn max(&self) -> Option<&Bound<T>> {
        self.max.as_ref()
    }

    /// Describes why `value` is out of range, or `None` if it is in range.
    fn violation(&self, value: &T) -> Option<(&'static str, &T)> {
        if let Some(min) = &self.min {
            match value.partial_cmp(&min.value) {
                Some(Ordering::Less) => return Some(("less than", &min.value)),
                Some(Ordering::Equal) if !min.inclusive => {
                    return Some(("the exclusive minimum", &min.value));
                }
                _ => {}
            }
        }
        if let Some(max) = &self.max {
            match value.partial_cmp(&max.value) {
                Some(Ordering::Greater) => return Some(("more than", &max.value)),
                Some(Ordering::Equal) if !max.inclusive => {
                    return Some(("the exclusive maximum", &max.value));
                }
                _ => {}
            }
        }
        None
    }
}

impl<T: PartialEq + Send + Sync + 'static> Participant for RequireBounds<T> {
    fn same_as(&self, other: &dyn Any) -> bool {
        same_value(self, other)
    }
}

impl<T> ChangeObserver<T> for RequireBounds<T>
where
    T: PartialOrd + fmt::Debug + Send + Sync + 'static,
{
    fn on_change(
        &self,
        subject: &BoxRef<'_, T>,
        _original: &T,
        final_value: &T,
        _requested: &T,
    ) -> Result<(), ParticipantFailure> {
        let Some((relation, limit)) = self.violation(final_value) else {
            return Ok(());
        };
        let message = match subject.render(final_value) {
            Some(value) => format!(
                "tried setting {} to {value}, which is {relation} {limit:?}",
                subject.description()
            ),
            None => format!("tried setting {} to a value out of bounds", subject.description()),
        };
        Err(ParticipantFailure::validation(message))
    }
}

/// Symmetric transform that clamps values into `[min, max]` on get and set.
#[derive(Debug, Clone, PartialEq)]
pub struct EnsureBounds<T> {
    min: Option<T>,
    max: Option<T>,
}

impl<T: PartialOrd + Clone> EnsureBounds<T> {
    pub fn between(min: T, max: T) -> Result<Self, BoundsError> {
        if max < min {
            return Err(BoundsError::MaxBelowMin);
        }
        Ok(Self {
            min: Some(min),
            max: Some(max),
        })
    }

    #[must_use]
    pub fn at_least(min: T) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    #[must_use]
    pub fn at_most(max: T) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    fn clamp(&self, current: &T) -> T {
        match (&self.min, &self.max) {
            (Some(min), _) if current < min => min.clone(),
            (_, Some(max)) if current > max => max.clone(),
            _ => current.clone(),
        }
    }
}

impl<T: PartialEq + Send + Sync + 'static> Participant for EnsureBounds<T> {
    fn same_as(&self, other: &dyn Any) -> bool {
        same_value(self, other)
    }
}

impl<T: PartialOrd + Clone + Send + Sync + 'static> GetMiddleware<T> for EnsureBounds<T> {
    fn on_get(
        &self,
        _subject: &BoxRef<'_, T>,
        _original: &T,
        current: &T,
    ) -> Result<T, ParticipantFailure> {
        Ok(self.clamp(current))
    }
}

impl<T: PartialOrd + Clone + Send + Sync + 'static> ChangeMiddleware<T> for EnsureBounds<T> {
    fn on_change(
        &self,
        _subject: &BoxRef<'_, T>,
        _original: &T,
        current: &T,
        _requested: &T,
    ) -> Result<T, ParticipantFailure> {
        Ok(self.clamp(current))
    }
}
