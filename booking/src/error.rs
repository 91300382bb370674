use thiserror::Error;

use crate::ids::{BookingId, CourtId, SessionId, UserId};
use crate::model::BookingStatus;
use crate::time::TimeRange;

/// Every failure the engine reports. Nothing here is retried internally:
/// a conflict or a full roster is the final answer for that request.
#[derive(Error, Debug)]
pub enum BookingError {
    #[error("court {court_id} is not available for {range}")]
    Conflict { court_id: CourtId, range: TimeRange },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("training session {session_id} is full ({max_participants} participants)")]
    SessionFull {
        session_id: SessionId,
        max_participants: u32,
    },

    #[error("user {user_id} is already enrolled in training session {session_id}")]
    AlreadyEnrolled {
        user_id: UserId,
        session_id: SessionId,
    },

    #[error("user {user_id} is not enrolled in training session {session_id}")]
    NotEnrolled {
        user_id: UserId,
        session_id: SessionId,
    },

    #[error("court {court_id} is under maintenance")]
    CourtOffline { court_id: CourtId },

    #[error("court {court_id} still has upcoming bookings")]
    CourtInUse { court_id: CourtId },

    #[error("booking {booking_id} cannot move from {from} to {to}")]
    InvalidTransition {
        booking_id: BookingId,
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("training session {session_id} has already started")]
    SessionStarted { session_id: SessionId },

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),
}

impl BookingError {
    pub(crate) fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// True for outcomes caused by the request itself rather than by storage.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, Self::Storage(_))
    }
}

pub type Result<T> = std::result::Result<T, BookingError>;
