use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{BookingError, Result};
use crate::ids::{BookingId, CourtId, SessionId, UserId};
use crate::time::TimeRange;

/// Administrative flag on a court. Only `Maintenance` affects booking;
/// `Booked` is a display hint and is never consulted by the conflict check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CourtStatus {
    Available,
    Booked,
    Maintenance,
}

impl CourtStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourtStatus::Available => "available",
            CourtStatus::Booked => "booked",
            CourtStatus::Maintenance => "maintenance",
        }
    }

    pub fn accepts_bookings(&self) -> bool {
        *self != CourtStatus::Maintenance
    }
}

impl fmt::Display for CourtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CourtStatus {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "available" => Ok(CourtStatus::Available),
            "booked" => Ok(CourtStatus::Booked),
            "maintenance" => Ok(CourtStatus::Maintenance),
            other => Err(BookingError::validation(format!(
                "invalid court status: {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    /// The regular lifecycle: pending -> confirmed, and either -> cancelled.
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Confirmed)
                | (BookingStatus::Pending, BookingStatus::Cancelled)
                | (BookingStatus::Confirmed, BookingStatus::Cancelled)
        )
    }

    pub fn is_live(&self) -> bool {
        *self != BookingStatus::Cancelled
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(BookingError::validation(format!(
                "invalid booking status: {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingKind {
    /// Player self-service reservation.
    Regular,
    /// Court hold owned by a training session.
    Training,
}

impl BookingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingKind::Regular => "regular",
            BookingKind::Training => "training",
        }
    }
}

impl fmt::Display for BookingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingKind {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "regular" => Ok(BookingKind::Regular),
            "training" => Ok(BookingKind::Training),
            other => Err(BookingError::validation(format!(
                "invalid booking kind: {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Court {
    pub id: CourtId,
    pub name: String,
    pub description: String,
    pub status: CourtStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Booking {
    pub id: BookingId,
    pub court_id: CourtId,
    /// Holder: the player, or the coach for training bookings.
    pub user_id: UserId,
    pub range: TimeRange,
    pub status: BookingStatus,
    pub kind: BookingKind,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn is_live(&self) -> bool {
        self.status.is_live()
    }
}

/// Request to reserve a court.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub court_id: CourtId,
    pub user_id: UserId,
    pub range: TimeRange,
    pub kind: BookingKind,
    pub status: BookingStatus,
}

impl NewBooking {
    /// A player booking, which starts out pending.
    pub fn regular(court_id: CourtId, user_id: UserId, range: TimeRange) -> Self {
        Self {
            court_id,
            user_id,
            range,
            kind: BookingKind::Regular,
            status: BookingStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrainingSession {
    pub id: SessionId,
    /// The confirmed training booking holding the court for this session.
    pub booking_id: BookingId,
    pub coach_id: UserId,
    pub court_id: CourtId,
    pub title: String,
    pub description: String,
    pub range: TimeRange,
    pub max_participants: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTrainingSession {
    pub coach_id: UserId,
    pub court_id: CourtId,
    pub title: String,
    pub description: String,
    pub range: TimeRange,
    pub max_participants: u32,
}

/// Full replacement of a session's editable fields.
#[derive(Debug, Clone)]
pub struct TrainingSessionUpdate {
    pub court_id: CourtId,
    pub title: String,
    pub description: String,
    pub range: TimeRange,
    pub max_participants: u32,
}

impl TrainingSessionUpdate {
    /// Starts from the session's current values.
    pub fn from_session(session: &TrainingSession) -> Self {
        Self {
            court_id: session.court_id,
            title: session.title.clone(),
            description: session.description.clone(),
            range: session.range,
            max_participants: session.max_participants,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub session: TrainingSession,
    pub participants: u32,
}

impl SessionSummary {
    pub fn spots_left(&self) -> u32 {
        self.session
            .max_participants
            .saturating_sub(self.participants)
    }

    pub fn is_full(&self) -> bool {
        self.spots_left() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Enrollment {
    pub user_id: UserId,
    pub session_id: SessionId,
    pub enrolled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeSlot {
    pub range: TimeRange,
    pub available: bool,
}

/// One court's slot grid for a single day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourtAvailability {
    pub court: Court,
    pub slots: Vec<TimeSlot>,
}
