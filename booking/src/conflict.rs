//! Interval conflict checks.
//!
//! Two ranges `[s1, e1)` and `[s2, e2)` conflict iff `s1 < e2 && s2 < e1`.
//! Only live (non-cancelled) bookings take part. A court under maintenance is
//! unavailable regardless of its bookings.
//!
//! The read-only methods on [`ConflictChecker`] answer "is it free right now"
//! for display. Writers must use [`ensure_bookable`] inside their own
//! transaction so that the answer still holds when they insert.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime, TimeDelta};
use common::warn_if_slow;
use sqlx::{Row, SqliteConnection};
use tracing::{debug, instrument, warn};

use crate::config::EngineConfig;
use crate::db::{Db, LockTarget, lock_row, ts_to_datetime};
use crate::error::{BookingError, Result};
use crate::ids::{BookingId, CourtId};
use crate::lifecycle::{BOOKING_COLUMNS, booking_from_row};
use crate::model::{Booking, CourtAvailability, TimeSlot};
use crate::registry::{COURT_COLUMNS, court_from_row, fetch_court};
use crate::time::{Clock, TimeRange};

pub struct ConflictChecker {
    db: Db,
    clock: Arc<dyn Clock>,
    config: Arc<EngineConfig>,
}

impl ConflictChecker {
    pub fn new(db: Db, clock: Arc<dyn Clock>, config: Arc<EngineConfig>) -> Self {
        Self { db, clock, config }
    }

    /// True iff the court accepts bookings and no live booking overlaps `range`.
    #[instrument(skip_all, target = "conflict", fields(court_id = %court_id, range = %range))]
    pub async fn is_available(&self, court_id: CourtId, range: &TimeRange) -> Result<bool> {
        self.check(court_id, range, None).await
    }

    /// Same as [`Self::is_available`], ignoring one booking (typically the
    /// caller's own, when moving it).
    #[instrument(
        skip_all,
        target = "conflict",
        fields(court_id = %court_id, range = %range, excluding = %excluding)
    )]
    pub async fn is_available_excluding(
        &self,
        court_id: CourtId,
        range: &TimeRange,
        excluding: BookingId,
    ) -> Result<bool> {
        self.check(court_id, range, Some(excluding)).await
    }

    async fn check(
        &self,
        court_id: CourtId,
        range: &TimeRange,
        excluding: Option<BookingId>,
    ) -> Result<bool> {
        let mut conn = self.db.pool.acquire().await?;

        let court = fetch_court(&mut conn, court_id).await?;
        if !court.status.accepts_bookings() {
            debug!(status = %court.status, "court is not accepting bookings");
            return Ok(false);
        }

        let conflicts = count_conflicts(&mut conn, court_id, range, excluding).await?;
        debug!(conflicts, "conflict scan complete");
        Ok(conflicts == 0)
    }

    /// Live bookings on the court that overlap `range`, earliest first.
    pub async fn conflicts(&self, court_id: CourtId, range: &TimeRange) -> Result<Vec<Booking>> {
        let rows = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE court_id = ? AND status != 'cancelled' AND start_ts < ? AND ? < end_ts \
             ORDER BY start_ts"
        ))
        .bind(court_id.get())
        .bind(range.end_ts())
        .bind(range.start_ts())
        .fetch_all(&self.db.pool)
        .await?;

        rows.iter().map(booking_from_row).collect()
    }

    /// Slot grid for every court on `date`, between the configured opening
    /// and closing hours. Slots that have already started are left out.
    #[instrument(skip_all, target = "conflict", fields(date = %date))]
    pub async fn day_availability(&self, date: NaiveDate) -> Result<Vec<CourtAvailability>> {
        let now = self.clock.now();
        let day_start = date.and_time(NaiveTime::MIN).and_utc();
        let open = day_start + TimeDelta::hours(i64::from(self.config.opening_hour));
        let close = day_start + TimeDelta::hours(i64::from(self.config.closing_hour));
        let slot_len = TimeDelta::minutes(i64::from(self.config.slot_minutes));

        let load = async {
            let courts = sqlx::query(&format!("SELECT {COURT_COLUMNS} FROM courts ORDER BY id"))
                .fetch_all(&self.db.pool)
                .await?;
            let bookings = sqlx::query(
                r#"SELECT court_id, start_ts, end_ts FROM bookings
                   WHERE status != 'cancelled' AND start_ts < ? AND end_ts > ?"#,
            )
            .bind(close.timestamp())
            .bind(open.timestamp())
            .fetch_all(&self.db.pool)
            .await?;
            Ok::<_, BookingError>((courts, bookings))
        };
        let (court_rows, booking_rows) =
            warn_if_slow("db_day_availability", Duration::from_millis(200), load).await?;

        let mut taken: HashMap<CourtId, Vec<TimeRange>> = HashMap::new();
        for r in &booking_rows {
            let range = TimeRange::new(
                ts_to_datetime(r.try_get("start_ts")?)?,
                ts_to_datetime(r.try_get("end_ts")?)?,
            )?;
            taken
                .entry(CourtId::from_row(r.try_get("court_id")?))
                .or_default()
                .push(range);
        }

        let mut out = Vec::with_capacity(court_rows.len());
        for row in &court_rows {
            let court = court_from_row(row)?;
            let busy = taken.get(&court.id).map(Vec::as_slice).unwrap_or(&[]);

            let mut slots = Vec::new();
            let mut start = open;
            while start + slot_len <= close {
                let slot = TimeRange::starting_at(start, slot_len)?;
                start += slot_len;
                if slot.start() < now {
                    continue;
                }
                let available =
                    court.status.accepts_bookings() && !busy.iter().any(|b| b.overlaps(&slot));
                slots.push(TimeSlot { range: slot, available });
            }

            out.push(CourtAvailability { court, slots });
        }

        debug!(courts = out.len(), "availability grid built");
        Ok(out)
    }
}

/// Number of live bookings on `court_id` overlapping `range`.
pub(crate) async fn count_conflicts(
    conn: &mut SqliteConnection,
    court_id: CourtId,
    range: &TimeRange,
    excluding: Option<BookingId>,
) -> Result<i64> {
    let excluding = excluding.map(BookingId::get);

    let count: i64 = sqlx::query_scalar(
        r#"
SELECT COUNT(*) FROM bookings
WHERE court_id = ?
  AND status != 'cancelled'
  AND start_ts < ? AND ? < end_ts
  AND (? IS NULL OR id != ?)
"#,
    )
    .bind(court_id.get())
    .bind(range.end_ts())
    .bind(range.start_ts())
    .bind(excluding)
    .bind(excluding)
    .fetch_one(&mut *conn)
    .await?;

    Ok(count)
}

/// Locks the court and fails unless `range` can be booked on it.
///
/// Must run first in a write transaction; the lock it takes is what keeps
/// the answer valid until that transaction commits.
pub(crate) async fn ensure_bookable(
    conn: &mut SqliteConnection,
    court_id: CourtId,
    range: &TimeRange,
    excluding: Option<BookingId>,
) -> Result<()> {
    if !lock_row(conn, LockTarget::Court, court_id.get()).await? {
        return Err(BookingError::not_found("court", court_id.get()));
    }

    let court = fetch_court(conn, court_id).await?;
    if !court.status.accepts_bookings() {
        warn!(target: "conflict", court_id = %court_id, "court under maintenance");
        return Err(BookingError::CourtOffline { court_id });
    }

    let conflicts = count_conflicts(conn, court_id, range, excluding).await?;
    if conflicts > 0 {
        warn!(
            target: "conflict",
            court_id = %court_id,
            range = %range,
            conflicts,
            "slot already taken"
        );
        return Err(BookingError::Conflict {
            court_id,
            range: *range,
        });
    }

    Ok(())
}
