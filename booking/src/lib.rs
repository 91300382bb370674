//! Booking & scheduling engine for a set of courts.
//!
//! The engine keeps live bookings on a court from overlapping and session
//! rosters within capacity, even under concurrent requests. Every training
//! session holds exactly one confirmed court booking. Deciding who may call
//! what is left to the caller.

pub mod config;
pub mod conflict;
pub mod db;
pub mod engine;
pub mod enrollment;
pub mod error;
pub mod ids;
pub mod lifecycle;
pub mod model;
pub mod orchestrator;
pub mod registry;
pub mod time;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{BookingError, Result};
pub use ids::{BookingId, CourtId, SessionId, UserId};
pub use model::{
    Booking, BookingKind, BookingStatus, Court, CourtAvailability, CourtStatus, Enrollment,
    NewBooking, NewTrainingSession, SessionSummary, TimeSlot, TrainingSession,
    TrainingSessionUpdate,
};
pub use time::{Clock, FixedClock, SystemClock, TimeRange};
