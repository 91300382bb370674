//! Booking lifecycle: create, cancel and status changes for single court
//! reservations.
//!
//! `pending -> confirmed`, `pending -> cancelled`, `confirmed -> cancelled`.
//! Nothing leaves `cancelled`. Training bookings belong to their session and
//! are only ever changed through [`crate::orchestrator::SessionOrchestrator`].

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use tracing::{debug, info, instrument, warn};

use crate::config::EngineConfig;
use crate::conflict::ensure_bookable;
use crate::db::{Db, LockTarget, lock_row, ts_to_datetime};
use crate::error::{BookingError, Result};
use crate::ids::{BookingId, CourtId, UserId};
use crate::model::{Booking, BookingKind, BookingStatus, NewBooking};
use crate::time::{Clock, TimeRange};

pub(crate) const BOOKING_COLUMNS: &str =
    "id, court_id, user_id, start_ts, end_ts, status, kind, created_ts";

pub struct BookingLifecycle {
    db: Db,
    clock: Arc<dyn Clock>,
    config: Arc<EngineConfig>,
}

impl BookingLifecycle {
    pub fn new(db: Db, clock: Arc<dyn Clock>, config: Arc<EngineConfig>) -> Self {
        Self { db, clock, config }
    }

    /// Reserves the court for `new.range`.
    ///
    /// Only regular bookings are accepted here, and they must fall inside the
    /// configured booking window. Training bookings are written by
    /// [`crate::orchestrator::SessionOrchestrator`] together with their session.
    /// The availability check and the insert share one write transaction, so
    /// concurrent requests for overlapping slots cannot both succeed.
    #[instrument(
        skip_all,
        target = "lifecycle",
        fields(
            court_id = %new.court_id,
            user_id = %new.user_id,
            range = %new.range,
            kind = %new.kind
        )
    )]
    pub async fn create(&self, new: NewBooking) -> Result<Booking> {
        if new.kind == BookingKind::Training {
            return Err(BookingError::validation(
                "training bookings are created by scheduling a training session",
            ));
        }
        if new.status == BookingStatus::Cancelled {
            return Err(BookingError::validation(
                "a booking cannot be created in the cancelled state",
            ));
        }

        let now = self.clock.now();
        self.check_booking_window(&new.range, now)?;

        let mut tx = self.db.pool.begin().await?;
        ensure_bookable(&mut tx, new.court_id, &new.range, None).await?;
        let booking = insert_booking(&mut tx, &new, now).await?;
        tx.commit().await?;

        info!(booking_id = %booking.id, status = %booking.status, "booking created");
        Ok(booking)
    }

    /// Cancels a regular booking. Ownership is the caller's concern; `actor`
    /// is recorded in the log only.
    #[instrument(skip_all, target = "lifecycle", fields(booking_id = %booking_id, actor = %actor))]
    pub async fn cancel(&self, booking_id: BookingId, actor: UserId) -> Result<Booking> {
        let mut tx = self.db.pool.begin().await?;
        let booking = lock_and_fetch(&mut tx, booking_id).await?;

        if booking.kind == BookingKind::Training {
            return Err(BookingError::validation(
                "training bookings are released by deleting their session",
            ));
        }
        if !booking.status.can_transition_to(BookingStatus::Cancelled) {
            warn!(status = %booking.status, "cancel refused");
            return Err(BookingError::InvalidTransition {
                booking_id,
                from: booking.status,
                to: BookingStatus::Cancelled,
            });
        }

        write_status(&mut tx, booking_id, BookingStatus::Cancelled).await?;
        tx.commit().await?;

        info!("booking cancelled");
        Ok(Booking {
            status: BookingStatus::Cancelled,
            ..booking
        })
    }

    /// Privileged status override. Skips the conflict check, so it may not
    /// bring a cancelled booking back, and may not cancel a training booking
    /// out from under its session.
    #[instrument(
        skip_all,
        target = "lifecycle",
        fields(booking_id = %booking_id, status = %status)
    )]
    pub async fn set_status(
        &self,
        booking_id: BookingId,
        status: BookingStatus,
    ) -> Result<Booking> {
        let mut tx = self.db.pool.begin().await?;
        let booking = lock_and_fetch(&mut tx, booking_id).await?;

        if booking.status == status {
            debug!("status unchanged");
            return Ok(booking);
        }
        if booking.status == BookingStatus::Cancelled {
            return Err(BookingError::InvalidTransition {
                booking_id,
                from: booking.status,
                to: status,
            });
        }
        if booking.kind == BookingKind::Training && status == BookingStatus::Cancelled {
            return Err(BookingError::validation(
                "training bookings are released by deleting their session",
            ));
        }

        write_status(&mut tx, booking_id, status).await?;
        tx.commit().await?;

        info!(from = %booking.status, "booking status overridden");
        Ok(Booking { status, ..booking })
    }

    pub async fn get(&self, booking_id: BookingId) -> Result<Booking> {
        let mut conn = self.db.pool.acquire().await?;
        fetch_booking(&mut conn, booking_id).await
    }

    /// Most recently created bookings first.
    pub async fn list_recent(&self, limit: u32) -> Result<Vec<Booking>> {
        let rows = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings ORDER BY created_ts DESC, id DESC LIMIT ?"
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.db.pool)
        .await?;
        rows.iter().map(booking_from_row).collect()
    }

    pub async fn list_all(&self) -> Result<Vec<Booking>> {
        let rows = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings ORDER BY start_ts DESC, id DESC"
        ))
        .fetch_all(&self.db.pool)
        .await?;
        rows.iter().map(booking_from_row).collect()
    }

    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Booking>> {
        let rows = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE user_id = ? ORDER BY start_ts DESC, id DESC"
        ))
        .bind(user_id.get())
        .fetch_all(&self.db.pool)
        .await?;
        rows.iter().map(booking_from_row).collect()
    }

    pub async fn list_for_court(&self, court_id: CourtId) -> Result<Vec<Booking>> {
        let rows = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE court_id = ? ORDER BY start_ts DESC, id DESC"
        ))
        .bind(court_id.get())
        .fetch_all(&self.db.pool)
        .await?;
        rows.iter().map(booking_from_row).collect()
    }

    /// Live bookings of `user_id` that have not ended yet, soonest first.
    pub async fn list_upcoming_for_user(&self, user_id: UserId) -> Result<Vec<Booking>> {
        let rows = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE user_id = ? AND status != 'cancelled' AND end_ts > ? \
             ORDER BY start_ts ASC, id ASC"
        ))
        .bind(user_id.get())
        .bind(self.clock.now().timestamp())
        .fetch_all(&self.db.pool)
        .await?;
        rows.iter().map(booking_from_row).collect()
    }

    fn check_booking_window(&self, range: &TimeRange, now: DateTime<Utc>) -> Result<()> {
        let out_of_range =
            || BookingError::validation("booking window exceeds the supported date range");

        let earliest = now
            .checked_add_signed(TimeDelta::hours(i64::from(self.config.min_hours_advance)))
            .ok_or_else(out_of_range)?;
        if range.start() < earliest {
            return Err(BookingError::validation(format!(
                "bookings must start at least {} hour(s) from now",
                self.config.min_hours_advance
            )));
        }

        let latest = now
            .checked_add_signed(TimeDelta::days(i64::from(self.config.max_days_ahead)))
            .ok_or_else(out_of_range)?;
        if range.start() > latest {
            return Err(BookingError::validation(format!(
                "bookings may be made at most {} day(s) ahead",
                self.config.max_days_ahead
            )));
        }
        Ok(())
    }
}

pub(crate) async fn insert_booking(
    conn: &mut SqliteConnection,
    new: &NewBooking,
    now: DateTime<Utc>,
) -> Result<Booking> {
    let res = sqlx::query(
        r#"
INSERT INTO bookings (court_id, user_id, start_ts, end_ts, status, kind, created_ts)
VALUES (?, ?, ?, ?, ?, ?, ?)
"#,
    )
    .bind(new.court_id.get())
    .bind(new.user_id.get())
    .bind(new.range.start_ts())
    .bind(new.range.end_ts())
    .bind(new.status.as_str())
    .bind(new.kind.as_str())
    .bind(now.timestamp())
    .execute(&mut *conn)
    .await?;

    Ok(Booking {
        id: BookingId::from_row(res.last_insert_rowid()),
        court_id: new.court_id,
        user_id: new.user_id,
        range: new.range,
        status: new.status,
        kind: new.kind,
        created_at: ts_to_datetime(now.timestamp())?,
    })
}

pub(crate) async fn fetch_booking(
    conn: &mut SqliteConnection,
    booking_id: BookingId,
) -> Result<Booking> {
    let row = sqlx::query(&format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?"))
        .bind(booking_id.get())
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(r) => booking_from_row(&r),
        None => Err(BookingError::not_found("booking", booking_id.get())),
    }
}

async fn lock_and_fetch(conn: &mut SqliteConnection, booking_id: BookingId) -> Result<Booking> {
    if !lock_row(conn, LockTarget::Booking, booking_id.get()).await? {
        return Err(BookingError::not_found("booking", booking_id.get()));
    }
    fetch_booking(conn, booking_id).await
}

async fn write_status(
    conn: &mut SqliteConnection,
    booking_id: BookingId,
    status: BookingStatus,
) -> Result<()> {
    sqlx::query(r#"UPDATE bookings SET status = ? WHERE id = ?"#)
        .bind(status.as_str())
        .bind(booking_id.get())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(crate) fn booking_from_row(r: &SqliteRow) -> Result<Booking> {
    let decode = |e: BookingError| crate::db::decode_error(e.to_string());

    Ok(Booking {
        id: BookingId::from_row(r.try_get("id")?),
        court_id: CourtId::from_row(r.try_get("court_id")?),
        user_id: UserId::from_row(r.try_get("user_id")?),
        range: TimeRange::new(
            ts_to_datetime(r.try_get("start_ts")?)?,
            ts_to_datetime(r.try_get("end_ts")?)?,
        )
        .map_err(decode)?,
        status: r.try_get::<String, _>("status")?.parse().map_err(decode)?,
        kind: r.try_get::<String, _>("kind")?.parse().map_err(decode)?,
        created_at: ts_to_datetime(r.try_get("created_ts")?)?,
    })
}
