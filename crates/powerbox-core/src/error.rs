#![forbid(unsafe_code)]

//! Error types for box operations.
//!
//! Participants report problems with [`ParticipantFailure`]. The pipeline
//! executor wraps every such failure into a [`BoxError`] that names the
//! failing participant, its position, and (unless hidden) the values that
//! were flowing through the pipeline at the time.

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::participant::ParticipantKind;
use crate::value::BoxId;

pub type Result<T> = std::result::Result<T, BoxError>;

/// Failure of a box operation.
#[derive(Debug, Error)]
pub enum BoxError {
    /// A participant failed with a recoverable failure.
    #[error(transparent)]
    ParticipantException(ParticipantFault),

    /// A participant failed with a fatal failure.
    #[error(transparent)]
    ParticipantError(ParticipantFault),

    #[error(transparent)]
    Unsupported(#[from] Unsupported),

    /// The [`Boxes`](crate::Boxes) root a view or wrapper was built in has
    /// been dropped, so it can no longer register dependencies.
    #[error("{family} outlived the boxes root it was created in")]
    Detached { family: String },
}

impl BoxError {
    /// Whether this error came from a fatal participant failure.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ParticipantError(_))
    }

    /// The wrapped participant failure, if any.
    #[must_use]
    pub fn fault(&self) -> Option<&ParticipantFault> {
        match self {
            Self::ParticipantException(fault) | Self::ParticipantError(fault) => Some(fault),
            _ => None,
        }
    }

    /// Where the failing participant sat, if this is a participant failure.
    #[must_use]
    pub fn details(&self) -> Option<&ParticipationDetails> {
        self.fault().map(ParticipantFault::details)
    }
}

/// What a participant returns when it cannot proceed.
#[derive(Debug, Error)]
pub enum ParticipantFailure {
    /// The value was rejected. Recoverable.
    #[error("{0}")]
    Validation(String),

    /// Unrecoverable failure.
    #[error("{0}")]
    Fatal(String),

    /// A box operation performed by the participant failed.
    #[error(transparent)]
    Nested(Box<BoxError>),

    #[error("{0}")]
    Other(#[source] Box<dyn StdError + Send + Sync>),
}

impl ParticipantFailure {
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    #[must_use]
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }

    #[must_use]
    pub fn other(error: impl StdError + Send + Sync + 'static) -> Self {
        Self::Other(Box::new(error))
    }

    /// Fatal failures stay fatal when nested inside another box's pipeline.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Fatal(_) => true,
            Self::Nested(inner) => inner.is_fatal(),
            Self::Validation(_) | Self::Other(_) => false,
        }
    }
}

impl From<BoxError> for ParticipantFailure {
    fn from(error: BoxError) -> Self {
        Self::Nested(Box::new(error))
    }
}

/// A participant failure annotated with where it happened.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ParticipantFault {
    message: String,
    details: ParticipationDetails,
    #[source]
    cause: ParticipantFailure,
}

impl ParticipantFault {
    pub(crate) fn new(
        message: String,
        details: ParticipationDetails,
        cause: ParticipantFailure,
    ) -> Self {
        Self {
            message,
            details,
            cause,
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn details(&self) -> &ParticipationDetails {
        &self.details
    }

    #[must_use]
    pub fn cause(&self) -> &ParticipantFailure {
        &self.cause
    }

    #[must_use]
    pub fn into_cause(self) -> ParticipantFailure {
        self.cause
    }
}

/// Location of a failing participant.
///
/// The participant list is the snapshot the pipeline was iterating, so
/// `participant()` returns exactly the participant that failed even if the
/// family gained participants afterwards.
#[derive(Clone)]
pub struct ParticipationDetails {
    box_id: BoxId,
    family: Arc<str>,
    kind: ParticipantKind,
    index: usize,
    len: usize,
    participants: Arc<dyn Any + Send + Sync>,
}

impl ParticipationDetails {
    pub(crate) fn new(
        box_id: BoxId,
        family: Arc<str>,
        kind: ParticipantKind,
        index: usize,
        len: usize,
        participants: Arc<dyn Any + Send + Sync>,
    ) -> Self {
        Self {
            box_id,
            family,
            kind,
            index,
            len,
            participants,
        }
    }

    #[must_use]
    pub fn box_id(&self) -> BoxId {
        self.box_id
    }

    /// Description of the family the box belongs to.
    #[must_use]
    pub fn family(&self) -> &str {
        &self.family
    }

    #[must_use]
    pub fn kind(&self) -> ParticipantKind {
        self.kind
    }

    /// Zero-based position of the failing participant.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of participants in the list that was running.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The participant list, typed as `P` (for example
    /// `dyn ChangeObserver<i32>`). `None` if `P` is the wrong type.
    #[must_use]
    pub fn participant_list<P: ?Sized + 'static>(&self) -> Option<&[Arc<P>]> {
        self.participants
            .downcast_ref::<Vec<Arc<P>>>()
            .map(Vec::as_slice)
    }

    /// The participant that failed, typed as `P`.
    #[must_use]
    pub fn participant<P: ?Sized + 'static>(&self) -> Option<&Arc<P>> {
        self.participant_list::<P>()?.get(self.index)
    }
}

impl fmt::Debug for ParticipationDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParticipationDetails")
            .field("box_id", &self.box_id)
            .field("family", &self.family)
            .field("kind", &self.kind)
            .field("index", &self.index)
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

/// An operation the box does not support.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Unsupported {
    #[error("{kind} participants are disabled for {family}")]
    DisabledParticipants { kind: ParticipantKind, family: String },

    #[error("cannot set a value on view {family}; it must be calculated")]
    SetOnView { family: String },
}
