#![forbid(unsafe_code)]

use std::any::Any;

use crate::error::ParticipantFailure;
use crate::participant::{BoxRef, ChangeMiddleware, GetMiddleware, Participant, same_value};

/// Symmetric transform that replaces `None` with a default, on get and set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultValue<T> {
    default: T,
}

impl<T: Clone> DefaultValue<T> {
    #[must_use]
    pub fn new(default: T) -> Self {
        Self { default }
    }

    fn apply(&self, current: &Option<T>) -> Option<T> {
        Some(current.as_ref().unwrap_or(&self.default).clone())
    }
}

impl<T: PartialEq + Send + Sync + 'static> Participant for DefaultValue<T> {
    fn same_as(&self, other: &dyn Any) -> bool {
        same_value(self, other)
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> GetMiddleware<Option<T>> for DefaultValue<T> {
    fn on_get(
        &self,
        _subject: &BoxRef<'_, Option<T>>,
        _original: &Option<T>,
        current: &Option<T>,
    ) -> Result<Option<T>, ParticipantFailure> {
        Ok(self.apply(current))
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> ChangeMiddleware<Option<T>> for DefaultValue<T> {
    fn on_change(
        &self,
        _subject: &BoxRef<'_, Option<T>>,
        _original: &Option<T>,
        current: &Option<T>,
        _requested: &Option<T>,
    ) -> Result<Option<T>, ParticipantFailure> {
        Ok(self.apply(current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_only_none() {
        let default = DefaultValue::new("fallback".to_string());
        assert_eq!(default.apply(&None).as_deref(), Some("fallback"));
        assert_eq!(default.apply(&Some("set".into())).as_deref(), Some("set"));
    }
}
