#![forbid(unsafe_code)]

use std::any::Any;

use crate::error::ParticipantFailure;
use crate::participant::{BoxRef, ChangeObserver, Participant};

/// Values that have a null state.
pub trait Nullable {
    fn is_null(&self) -> bool;
}

impl<T> Nullable for Option<T> {
    fn is_null(&self) -> bool {
        self.is_none()
    }
}

/// Change observer that rejects null values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RejectNull;

impl Participant for RejectNull {
    fn same_as(&self, other: &dyn Any) -> bool {
        other.is::<Self>()
    }
}

impl<T: Nullable> ChangeObserver<T> for RejectNull {
    fn on_change(
        &self,
        subject: &BoxRef<'_, T>,
        _original: &T,
        final_value: &T,
        _requested: &T,
    ) -> Result<(), ParticipantFailure> {
        if final_value.is_null() {
            return Err(ParticipantFailure::validation(format!(
                "cannot set {} to None",
                subject.description()
            )));
        }
        Ok(())
    }
}
