#![forbid(unsafe_code)]

//! The pipeline executor: runs a family's participant lists over one get or
//! one set.
//!
//! Each stage iterates a snapshot of its list, taken when the stage starts,
//! in insertion order. The first failing participant stops the stage; its
//! failure is wrapped by [`wrap_failure`] into a [`BoxError`] naming the
//! participant kind, its 1-based position, the family, and the values in
//! flight (unless the family hides values).
//!
//! Rollback is not done here: the caller owns raw storage and decides.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::{BoxError, ParticipantFailure, ParticipantFault, ParticipationDetails};
use crate::participant::{BoxRef, ParticipantKind};

/// Runs the get transforms, starting from `original`.
pub(crate) fn apply_get_middleware<T: fmt::Debug + Clone + 'static>(
    subject: &BoxRef<'_, T>,
    original: &T,
) -> Result<T, BoxError> {
    let list = subject.family().get_middlewares().snapshot();
    let mut current = original.clone();
    for (index, middleware) in list.iter().enumerate() {
        current = middleware
            .on_get(subject, original, &current)
            .map_err(|failure| {
                wrap_failure(subject, ParticipantKind::GetMiddleware, index, &list, failure, || {
                    format!("original value = {original:?}, current value = {current:?}")
                })
            })?;
    }
    Ok(current)
}

/// Notifies the get observers of the final value.
pub(crate) fn notify_get_observers<T: fmt::Debug + 'static>(
    subject: &BoxRef<'_, T>,
    original: &T,
    final_value: &T,
) -> Result<(), BoxError> {
    let list = subject.family().get_observers().snapshot();
    for (index, observer) in list.iter().enumerate() {
        observer
            .on_get(subject, original, final_value)
            .map_err(|failure| {
                wrap_failure(subject, ParticipantKind::GetObserver, index, &list, failure, || {
                    format!("original value = {original:?}, final value = {final_value:?}")
                })
            })?;
    }
    Ok(())
}

/// Runs the change transforms, starting from `requested`.
pub(crate) fn apply_change_middleware<T: fmt::Debug + Clone + 'static>(
    subject: &BoxRef<'_, T>,
    original: &T,
    requested: &T,
) -> Result<T, BoxError> {
    let list = subject.family().change_middlewares().snapshot();
    let mut current = requested.clone();
    for (index, middleware) in list.iter().enumerate() {
        current = middleware
            .on_change(subject, original, &current, requested)
            .map_err(|failure| {
                wrap_failure(subject, ParticipantKind::ChangeMiddleware, index, &list, failure, || {
                    format!(
                        "original value = {original:?}, current value = {current:?}, \
                         requested value = {requested:?}"
                    )
                })
            })?;
    }
    Ok(current)
}

/// Notifies the change observers of a committed value.
pub(crate) fn notify_change_observers<T: fmt::Debug + 'static>(
    subject: &BoxRef<'_, T>,
    original: &T,
    final_value: &T,
    requested: &T,
) -> Result<(), BoxError> {
    let list = subject.family().change_observers().snapshot();
    for (index, observer) in list.iter().enumerate() {
        observer
            .on_change(subject, original, final_value, requested)
            .map_err(|failure| {
                wrap_failure(subject, ParticipantKind::ChangeObserver, index, &list, failure, || {
                    format!(
                        "original value = {original:?}, final value = {final_value:?}, \
                         requested value = {requested:?}"
                    )
                })
            })?;
    }
    Ok(())
}

/// Builds the error for participant `index` of `list` failing with `failure`.
///
/// `values` renders the values in flight and is only called when the family
/// shows values and the box is not its own value.
fn wrap_failure<T, P>(
    subject: &BoxRef<'_, T>,
    kind: ParticipantKind,
    index: usize,
    list: &Arc<Vec<Arc<P>>>,
    failure: ParticipantFailure,
    values: impl FnOnce() -> String,
) -> BoxError
where
    P: ?Sized + 'static,
    Vec<Arc<P>>: Send + Sync,
{
    let detail = if !subject.shows_value_strings() {
        "values hidden".to_owned()
    } else if let Some(revealed) = subject.revealed_string() {
        format!("value = {revealed}")
    } else {
        values()
    };
    let message = format!(
        "error in {kind} {} out of {} of {}: {detail}",
        index + 1,
        list.len(),
        subject.description()
    );
    let fatal = failure.is_fatal();
    tracing::debug!(
        box_id = subject.id().raw(),
        family = subject.description(),
        kind = %kind,
        position = index + 1,
        fatal,
        "participant failed: {failure}"
    );
    let participants: Arc<dyn Any + Send + Sync> = Arc::clone(list) as _;
    let details = ParticipationDetails::new(
        subject.id(),
        subject.family().shared_description(),
        kind,
        index,
        list.len(),
        participants,
    );
    let fault = ParticipantFault::new(message, details, failure);
    if fatal {
        BoxError::ParticipantError(fault)
    } else {
        BoxError::ParticipantException(fault)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::family::{Family, Scope};
    use crate::participant::{
        ChangeObserver, change_middleware, change_observer, get_middleware, get_observer,
    };
    use crate::value::BoxId;

    fn family(name: &str) -> Family<i32> {
        Family::new(Scope::new("tests::ErrorTest"), name, true)
    }

    #[test]
    fn get_transforms_run_in_order() {
        let family = family("ordered");
        family
            .add_get_middleware(get_middleware(|_, _, current: &i32| Ok(current * 3)))
            .unwrap()
            .add_get_middleware(get_middleware(|_, _, current: &i32| Ok(current + 1)))
            .unwrap();
        let subject = BoxRef::new(BoxId::next(), &family);
        assert_eq!(apply_get_middleware(&subject, &2).unwrap(), 7);
    }

    #[test]
    fn change_transforms_see_original_and_requested() {
        let family = family("args");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        family
            .add_change_middleware(change_middleware(move |_, original: &i32, current, requested| {
                log.lock().unwrap().push((*original, *current, *requested));
                Ok(current * 10)
            }))
            .unwrap();
        let subject = BoxRef::new(BoxId::next(), &family);
        assert_eq!(apply_change_middleware(&subject, &1, &4).unwrap(), 40);
        assert_eq!(*seen.lock().unwrap(), vec![(1, 4, 4)]);
    }

    #[test]
    fn observer_failure_names_position_and_values() {
        let family = family("exceptionBox");
        family
            .add_change_observer(change_observer(|_, _, _, _| Ok(())))
            .unwrap()
            .add_change_observer(change_observer(|_, _, _, _| {
                Err(ParticipantFailure::validation("too big"))
            }))
            .unwrap()
            .add_change_observer(change_observer(|_, _, _, _| Ok(())))
            .unwrap();
        let subject = BoxRef::new(BoxId::next(), &family);
        let err = notify_change_observers(&subject, &0, &15, &5).unwrap_err();
        assert_eq!(
            err.to_string(),
            "error in ChangeObserver 2 out of 3 of ErrorTest.exceptionBox: \
             original value = 0, final value = 15, requested value = 5"
        );
        assert!(!err.is_fatal());
        let details = err.details().unwrap();
        assert_eq!(details.index(), 1);
        assert_eq!(details.len(), 3);
        assert_eq!(details.kind(), ParticipantKind::ChangeObserver);
        let failing = details
            .participant::<dyn ChangeObserver<i32>>()
            .expect("typed participant");
        assert!(Arc::ptr_eq(failing, &family.change_observers().get(1).unwrap()));
    }

    #[test]
    fn hidden_values_are_not_rendered() {
        let family = family("hidden");
        family.hide_value_strings();
        family
            .add_change_observer(change_observer(|_, _, _, _| {
                Err(ParticipantFailure::fatal("nope"))
            }))
            .unwrap();
        let subject = BoxRef::new(BoxId::next(), &family);
        let err = notify_change_observers(&subject, &1, &2, &3).unwrap_err();
        assert_eq!(
            err.to_string(),
            "error in ChangeObserver 1 out of 1 of ErrorTest.hidden: values hidden"
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn get_failures_render_stage_values() {
        let family = family("reads");
        family
            .add_get_middleware(get_middleware(|_, _, current: &i32| Ok(current + 1)))
            .unwrap()
            .add_get_middleware(get_middleware(|_, _, _: &i32| {
                Err(ParticipantFailure::validation("bad"))
            }))
            .unwrap();
        let subject = BoxRef::new(BoxId::next(), &family);
        let err = apply_get_middleware(&subject, &1).unwrap_err();
        assert_eq!(
            err.to_string(),
            "error in GetMiddleware 2 out of 2 of ErrorTest.reads: \
             original value = 1, current value = 2"
        );

        family
            .add_get_observer(get_observer(|_, _, _: &i32| {
                Err(ParticipantFailure::validation("seen"))
            }))
            .unwrap();
        let err = notify_get_observers(&subject, &1, &2).unwrap_err();
        assert_eq!(
            err.to_string(),
            "error in GetObserver 1 out of 1 of ErrorTest.reads: \
             original value = 1, final value = 2"
        );
    }
}
