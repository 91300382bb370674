//! Identifier newtypes. Raw strings are parsed once, at the edge, through
//! `FromStr`; engine operations only ever see validated ids.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{BookingError, Result};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            pub fn new(raw: i64) -> Result<Self> {
                if raw <= 0 {
                    return Err(BookingError::validation(format!(
                        "{} must be positive, got {raw}",
                        $label
                    )));
                }
                Ok(Self(raw))
            }

            pub fn get(self) -> i64 {
                self.0
            }

            /// Rows carry ids that were validated when they were written.
            pub(crate) fn from_row(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = BookingError;

            fn from_str(s: &str) -> Result<Self> {
                let raw = s.trim().parse::<i64>().map_err(|_| {
                    BookingError::validation(format!("invalid {}: {s:?}", $label))
                })?;
                Self::new(raw)
            }
        }

        impl TryFrom<i64> for $name {
            type Error = BookingError;

            fn try_from(raw: i64) -> Result<Self> {
                Self::new(raw)
            }
        }
    };
}

define_id!(
    /// A bookable court.
    CourtId,
    "court id"
);
define_id!(
    /// A player, coach or admin, as resolved by the caller's auth layer.
    UserId,
    "user id"
);
define_id!(
    /// A court reservation.
    BookingId,
    "booking id"
);
define_id!(
    /// A training session.
    SessionId,
    "session id"
);
