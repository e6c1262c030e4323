#![forbid(unsafe_code)]

use std::any::Any;
use std::fmt;

use crate::error::ParticipantFailure;
use crate::participant::{BoxRef, ChangeObserver, Participant};

/// One-line description of a change, honouring hidden values.
///
/// Wrapper boxes render as `"{family} changed to {raw}"`; other boxes as
/// `"{family} value changed from {original} to {final}"`, with the requested
/// value appended when a transform altered it.
pub fn describe_change<T: fmt::Debug + PartialEq>(
    subject: &BoxRef<'_, T>,
    original: &T,
    final_value: &T,
    requested: &T,
) -> String {
    let description = subject.description();
    let (Some(from), Some(to)) = (subject.render(original), subject.render(final_value)) else {
        return format!("{description} value changed");
    };
    if subject.is_self_valued() {
        return format!("{description} changed to {to}");
    }
    let mut line = format!("{description} value changed from {from} to {to}");
    if requested != final_value {
        if let Some(requested) = subject.render(requested) {
            line.push_str(&format!(" (requested value was {requested})"));
        }
    }
    line
}

/// Change observer that emits an INFO event per change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeLogger;

impl Participant for ChangeLogger {
    fn same_as(&self, other: &dyn Any) -> bool {
        other.is::<Self>()
    }
}

impl<T: fmt::Debug + PartialEq> ChangeObserver<T> for ChangeLogger {
    fn on_change(
        &self,
        subject: &BoxRef<'_, T>,
        original: &T,
        final_value: &T,
        requested: &T,
    ) -> Result<(), ParticipantFailure> {
        tracing::info!(
            box_id = subject.id().raw(),
            family = subject.description(),
            "{}",
            describe_change(subject, original, final_value, requested)
        );
        Ok(())
    }
}
