use std::time::Duration;

use crate::error::{BookingError, Result};

/// Upper bound for [`EngineConfig::max_days_ahead`] (ten years).
pub const MAX_DAYS_AHEAD: u32 = 3650;

/// Upper bound for [`EngineConfig::min_hours_advance`] (one year).
pub const MAX_HOURS_ADVANCE: u32 = 8760;

/// Engine configuration. Built once by the caller and handed to
/// [`crate::Engine::open`]; nothing reads it from process-global state.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Database connection string, e.g. `sqlite://courtbook.db`.
    pub database_url: String,

    /// Upper bound on pooled SQLite connections.
    pub max_connections: u32,

    /// How long a writer waits for the database write lock before the
    /// request fails with a storage error.
    ///
    /// Every check-then-act sequence queues on this lock, so it bounds the
    /// worst-case latency of a booking under contention.
    pub busy_timeout: Duration,

    // =========================
    // Opening hours
    // =========================
    /// First hour (UTC, 0-23) covered by the availability grid.
    pub opening_hour: u32,

    /// Hour (UTC, 1-24) at which the last slot of the grid must have ended.
    pub closing_hour: u32,

    /// Length of one slot in the availability grid.
    pub slot_minutes: u32,

    // =========================
    // Booking window
    // =========================
    /// How far ahead a player may book. Applies to regular bookings only;
    /// coaches scheduling sessions are not limited.
    pub max_days_ahead: u32,

    /// Minimum notice for a regular booking, in hours.
    pub min_hours_advance: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://courtbook.db".to_string(),
            max_connections: 8,
            busy_timeout: Duration::from_secs(5),
            opening_hour: 6,
            closing_hour: 22,
            slot_minutes: 60,
            max_days_ahead: 14,
            min_hours_advance: 1,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key/value source. Missing or unparsable
    /// values fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let num = |key: &str, fallback: u32| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u32>().ok())
                .unwrap_or(fallback)
        };

        Self {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            max_connections: num("DB_MAX_CONNECTIONS", defaults.max_connections),
            busy_timeout: lookup("DB_BUSY_TIMEOUT_MS")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.busy_timeout),
            opening_hour: num("OPENING_HOUR", defaults.opening_hour),
            closing_hour: num("CLOSING_HOUR", defaults.closing_hour),
            slot_minutes: num("SLOT_MINUTES", defaults.slot_minutes),
            max_days_ahead: num("BOOKING_MAX_DAYS_AHEAD", defaults.max_days_ahead),
            min_hours_advance: num("BOOKING_MIN_HOURS_ADVANCE", defaults.min_hours_advance),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(BookingError::validation("max_connections must be at least 1"));
        }
        if self.opening_hour >= self.closing_hour || self.closing_hour > 24 {
            return Err(BookingError::validation(format!(
                "opening hours {}-{} are not a valid range",
                self.opening_hour, self.closing_hour
            )));
        }
        if self.slot_minutes == 0 {
            return Err(BookingError::validation("slot_minutes must be at least 1"));
        }
        if self.max_days_ahead > MAX_DAYS_AHEAD {
            return Err(BookingError::validation(format!(
                "max_days_ahead must be at most {MAX_DAYS_AHEAD}, got {}",
                self.max_days_ahead
            )));
        }
        if self.min_hours_advance > MAX_HOURS_ADVANCE {
            return Err(BookingError::validation(format!(
                "min_hours_advance must be at most {MAX_HOURS_ADVANCE}, got {}",
                self.min_hours_advance
            )));
        }
        Ok(())
    }
}
