//! Training sessions and the court booking each one holds.
//!
//! A session and its confirmed training booking are written, moved and
//! removed in the same transaction, so neither ever exists without the other.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use tracing::{debug, info, instrument, warn};

use crate::conflict::ensure_bookable;
use crate::db::{Db, LockTarget, i64_to_u32, lock_row, ts_to_datetime};
use crate::error::{BookingError, Result};
use crate::ids::{BookingId, CourtId, SessionId, UserId};
use crate::lifecycle::insert_booking;
use crate::model::{
    BookingKind, BookingStatus, NewBooking, NewTrainingSession, SessionSummary, TrainingSession,
    TrainingSessionUpdate,
};
use crate::time::{Clock, TimeRange};

pub(crate) const SESSION_COLUMNS: &str = "t.id, t.booking_id, t.coach_id, t.court_id, t.title, \
     t.description, t.start_ts, t.end_ts, t.max_participants, t.created_ts";

pub struct SessionOrchestrator {
    db: Db,
    clock: Arc<dyn Clock>,
}

impl SessionOrchestrator {
    pub fn new(db: Db, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Reserves the court and creates the session on top of it.
    ///
    /// Flow, inside one write transaction:
    /// 1) Lock the court and check the slot is free.
    /// 2) Insert the training booking (confirmed, held by the coach).
    /// 3) Insert the session row pointing at that booking.
    /// 4) Commit.
    ///
    /// Any failure before commit drops the transaction, which rolls back the
    /// booking written in step 2.
    #[instrument(
        skip_all,
        target = "orchestrator",
        fields(coach_id = %new.coach_id, court_id = %new.court_id, range = %new.range)
    )]
    pub async fn create_training_session(
        &self,
        new: NewTrainingSession,
    ) -> Result<TrainingSession> {
        validate_details(&new.title, new.max_participants)?;
        let now = self.clock.now();

        let mut tx = self.db.pool.begin().await?;
        ensure_bookable(&mut tx, new.court_id, &new.range, None).await?;

        let booking = insert_booking(
            &mut tx,
            &NewBooking {
                court_id: new.court_id,
                user_id: new.coach_id,
                range: new.range,
                kind: BookingKind::Training,
                status: BookingStatus::Confirmed,
            },
            now,
        )
        .await?;
        debug!(booking_id = %booking.id, "court held for session");

        let session = insert_session(&mut tx, &new, booking.id, now).await?;
        tx.commit().await?;

        info!(session_id = %session.id, booking_id = %booking.id, "training session scheduled");
        Ok(session)
    }

    /// Replaces the editable fields of a session owned by `coach_id`.
    ///
    /// A session owned by someone else is reported as not found. Moving the
    /// session to another court or time re-runs the conflict check, ignoring
    /// the session's own booking, and moves the booking along with it.
    #[instrument(
        skip_all,
        target = "orchestrator",
        fields(session_id = %session_id, coach_id = %coach_id)
    )]
    pub async fn update_training_session(
        &self,
        session_id: SessionId,
        coach_id: UserId,
        update: TrainingSessionUpdate,
    ) -> Result<TrainingSession> {
        validate_details(&update.title, update.max_participants)?;

        let mut tx = self.db.pool.begin().await?;
        let current = lock_and_fetch(&mut tx, session_id).await?;
        if current.coach_id != coach_id {
            warn!(owner = %current.coach_id, "session belongs to another coach");
            return Err(BookingError::not_found("training session", session_id.get()));
        }

        let moved = update.court_id != current.court_id || update.range != current.range;
        if moved {
            let own = Some(current.booking_id);
            ensure_bookable(&mut tx, update.court_id, &update.range, own).await?;
        }

        let enrolled = count_participants(&mut tx, session_id).await?;
        if update.max_participants < enrolled {
            return Err(BookingError::validation(format!(
                "cannot lower capacity to {} with {} participants enrolled",
                update.max_participants, enrolled
            )));
        }

        sqlx::query(
            r#"
UPDATE training_sessions
SET court_id = ?, title = ?, description = ?, start_ts = ?, end_ts = ?, max_participants = ?
WHERE id = ?
"#,
        )
        .bind(update.court_id.get())
        .bind(update.title.trim())
        .bind(&update.description)
        .bind(update.range.start_ts())
        .bind(update.range.end_ts())
        .bind(i64::from(update.max_participants))
        .bind(session_id.get())
        .execute(&mut *tx)
        .await?;

        if moved {
            sqlx::query(
                r#"UPDATE bookings SET court_id = ?, start_ts = ?, end_ts = ? WHERE id = ?"#,
            )
            .bind(update.court_id.get())
            .bind(update.range.start_ts())
            .bind(update.range.end_ts())
            .bind(current.booking_id.get())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(moved, "training session updated");
        Ok(TrainingSession {
            court_id: update.court_id,
            title: update.title.trim().to_string(),
            description: update.description,
            range: update.range,
            max_participants: update.max_participants,
            ..current
        })
    }

    /// Deletes a session that has not started yet, together with its booking
    /// and every enrollment.
    #[instrument(skip_all, target = "orchestrator", fields(session_id = %session_id))]
    pub async fn delete_training_session(&self, session_id: SessionId) -> Result<()> {
        let now = self.clock.now();

        let mut tx = self.db.pool.begin().await?;
        let session = lock_and_fetch(&mut tx, session_id).await?;
        if session.range.start() < now {
            warn!(start = %session.range.start(), "refusing to delete a session that has started");
            return Err(BookingError::SessionStarted { session_id });
        }

        let removed = sqlx::query(r#"DELETE FROM session_participants WHERE session_id = ?"#)
            .bind(session_id.get())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query(r#"DELETE FROM training_sessions WHERE id = ?"#)
            .bind(session_id.get())
            .execute(&mut *tx)
            .await?;

        sqlx::query(r#"DELETE FROM bookings WHERE id = ?"#)
            .bind(session.booking_id.get())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            enrollments_removed = removed,
            booking_id = %session.booking_id,
            "training session deleted"
        );
        Ok(())
    }

    pub async fn get(&self, session_id: SessionId) -> Result<TrainingSession> {
        let mut conn = self.db.pool.acquire().await?;
        fetch_session(&mut conn, session_id).await
    }

    /// Sessions that have not ended yet, soonest first, with roster sizes.
    pub async fn list_upcoming(&self) -> Result<Vec<SessionSummary>> {
        let rows = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS}, \
               (SELECT COUNT(*) FROM session_participants p \
                WHERE p.session_id = t.id) AS participants \
             FROM training_sessions t \
             WHERE t.end_ts > ? \
             ORDER BY t.start_ts ASC, t.id ASC"
        ))
        .bind(self.clock.now().timestamp())
        .fetch_all(&self.db.pool)
        .await?;

        rows.iter()
            .map(|r| {
                Ok(SessionSummary {
                    session: session_from_row(r)?,
                    participants: i64_to_u32(r.try_get("participants")?)?,
                })
            })
            .collect()
    }

    /// All sessions of one coach, latest first.
    pub async fn list_by_coach(&self, coach_id: UserId) -> Result<Vec<TrainingSession>> {
        let rows = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM training_sessions t \
             WHERE t.coach_id = ? ORDER BY t.start_ts DESC, t.id DESC"
        ))
        .bind(coach_id.get())
        .fetch_all(&self.db.pool)
        .await?;
        rows.iter().map(session_from_row).collect()
    }
}

fn validate_details(title: &str, max_participants: u32) -> Result<()> {
    if title.trim().is_empty() {
        return Err(BookingError::validation("session title must not be empty"));
    }
    if max_participants == 0 {
        return Err(BookingError::validation("max_participants must be at least 1"));
    }
    Ok(())
}

async fn insert_session(
    conn: &mut SqliteConnection,
    new: &NewTrainingSession,
    booking_id: BookingId,
    now: DateTime<Utc>,
) -> Result<TrainingSession> {
    let res = sqlx::query(
        r#"
INSERT INTO training_sessions (
  booking_id, coach_id, court_id, title, description,
  start_ts, end_ts, max_participants, created_ts
)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
"#,
    )
    .bind(booking_id.get())
    .bind(new.coach_id.get())
    .bind(new.court_id.get())
    .bind(new.title.trim())
    .bind(&new.description)
    .bind(new.range.start_ts())
    .bind(new.range.end_ts())
    .bind(i64::from(new.max_participants))
    .bind(now.timestamp())
    .execute(&mut *conn)
    .await?;

    Ok(TrainingSession {
        id: SessionId::from_row(res.last_insert_rowid()),
        booking_id,
        coach_id: new.coach_id,
        court_id: new.court_id,
        title: new.title.trim().to_string(),
        description: new.description.clone(),
        range: new.range,
        max_participants: new.max_participants,
        created_at: ts_to_datetime(now.timestamp())?,
    })
}

pub(crate) async fn fetch_session(
    conn: &mut SqliteConnection,
    session_id: SessionId,
) -> Result<TrainingSession> {
    let row = sqlx::query(&format!(
        "SELECT {SESSION_COLUMNS} FROM training_sessions t WHERE t.id = ?"
    ))
    .bind(session_id.get())
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(r) => session_from_row(&r),
        None => Err(BookingError::not_found("training session", session_id.get())),
    }
}

/// Write-locks the session row and loads it.
pub(crate) async fn lock_and_fetch(
    conn: &mut SqliteConnection,
    session_id: SessionId,
) -> Result<TrainingSession> {
    if !lock_row(conn, LockTarget::Session, session_id.get()).await? {
        return Err(BookingError::not_found("training session", session_id.get()));
    }
    fetch_session(conn, session_id).await
}

pub(crate) async fn count_participants(
    conn: &mut SqliteConnection,
    session_id: SessionId,
) -> Result<u32> {
    let count: i64 =
        sqlx::query_scalar(r#"SELECT COUNT(*) FROM session_participants WHERE session_id = ?"#)
            .bind(session_id.get())
            .fetch_one(&mut *conn)
            .await?;
    i64_to_u32(count)
}

pub(crate) fn session_from_row(r: &SqliteRow) -> Result<TrainingSession> {
    Ok(TrainingSession {
        id: SessionId::from_row(r.try_get("id")?),
        booking_id: BookingId::from_row(r.try_get("booking_id")?),
        coach_id: UserId::from_row(r.try_get("coach_id")?),
        court_id: CourtId::from_row(r.try_get("court_id")?),
        title: r.try_get("title")?,
        description: r.try_get("description")?,
        range: TimeRange::new(
            ts_to_datetime(r.try_get("start_ts")?)?,
            ts_to_datetime(r.try_get("end_ts")?)?,
        )
        .map_err(|e| crate::db::decode_error(e.to_string()))?,
        max_participants: i64_to_u32(r.try_get("max_participants")?)?,
        created_at: ts_to_datetime(r.try_get("created_ts")?)?,
    })
}
