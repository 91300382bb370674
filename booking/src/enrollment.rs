use std::sync::Arc;

use sqlx::Row;
use tracing::{info, instrument, warn};

use crate::db::{Db, ts_to_datetime};
use crate::error::{BookingError, Result};
use crate::ids::{SessionId, UserId};
use crate::model::{Enrollment, TrainingSession};
use crate::orchestrator::{SESSION_COLUMNS, count_participants, lock_and_fetch, session_from_row};
use crate::time::Clock;

/// Who is enrolled in which training session.
///
/// The roster of one session is only ever changed while holding that
/// session's row lock, so the capacity check and the insert see the same
/// participant count.
pub struct EnrollmentLedger {
    db: Db,
    clock: Arc<dyn Clock>,
}

impl EnrollmentLedger {
    pub fn new(db: Db, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub async fn is_enrolled(&self, user_id: UserId, session_id: SessionId) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            r#"SELECT 1 FROM session_participants WHERE user_id = ? AND session_id = ?"#,
        )
        .bind(user_id.get())
        .bind(session_id.get())
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(found.is_some())
    }

    /// Adds `user_id` to the session roster.
    ///
    /// A duplicate is reported before a full roster, so a user retrying an
    /// enrollment into a session that has since filled up still learns they
    /// are already in.
    #[instrument(
        skip_all,
        target = "enrollment",
        fields(user_id = %user_id, session_id = %session_id)
    )]
    pub async fn enroll(&self, user_id: UserId, session_id: SessionId) -> Result<Enrollment> {
        let now = self.clock.now();

        let mut tx = self.db.pool.begin().await?;
        let session = lock_and_fetch(&mut tx, session_id).await?;

        let already: Option<i64> = sqlx::query_scalar(
            r#"SELECT 1 FROM session_participants WHERE user_id = ? AND session_id = ?"#,
        )
        .bind(user_id.get())
        .bind(session_id.get())
        .fetch_optional(&mut *tx)
        .await?;
        if already.is_some() {
            return Err(BookingError::AlreadyEnrolled { user_id, session_id });
        }

        let enrolled = count_participants(&mut tx, session_id).await?;
        if enrolled >= session.max_participants {
            warn!(enrolled, max = session.max_participants, "roster full");
            return Err(BookingError::SessionFull {
                session_id,
                max_participants: session.max_participants,
            });
        }

        let inserted = sqlx::query(
            r#"
INSERT INTO session_participants (user_id, session_id, enrolled_ts)
VALUES (?, ?, ?)
"#,
        )
        .bind(user_id.get())
        .bind(session_id.get())
        .bind(now.timestamp())
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(BookingError::AlreadyEnrolled { user_id, session_id });
            }
            Err(e) => return Err(e.into()),
        }

        tx.commit().await?;

        info!(participants = enrolled + 1, max = session.max_participants, "participant enrolled");
        Ok(Enrollment {
            user_id,
            session_id,
            enrolled_at: ts_to_datetime(now.timestamp())?,
        })
    }

    #[instrument(
        skip_all,
        target = "enrollment",
        fields(user_id = %user_id, session_id = %session_id)
    )]
    pub async fn cancel_enrollment(&self, user_id: UserId, session_id: SessionId) -> Result<()> {
        let res = sqlx::query(
            r#"DELETE FROM session_participants WHERE user_id = ? AND session_id = ?"#,
        )
        .bind(user_id.get())
        .bind(session_id.get())
        .execute(&self.db.pool)
        .await?;

        if res.rows_affected() == 0 {
            return Err(BookingError::NotEnrolled { user_id, session_id });
        }

        info!("enrollment cancelled");
        Ok(())
    }

    pub async fn participant_count(&self, session_id: SessionId) -> Result<u32> {
        let mut conn = self.db.pool.acquire().await?;
        count_participants(&mut conn, session_id).await
    }

    /// Roster in enrollment order.
    pub async fn participants(&self, session_id: SessionId) -> Result<Vec<Enrollment>> {
        let rows = sqlx::query(
            r#"
SELECT user_id, session_id, enrolled_ts
FROM session_participants
WHERE session_id = ?
ORDER BY enrolled_ts ASC, user_id ASC
"#,
        )
        .bind(session_id.get())
        .fetch_all(&self.db.pool)
        .await?;

        rows.iter()
            .map(|r| {
                Ok(Enrollment {
                    user_id: UserId::from_row(r.try_get("user_id")?),
                    session_id: SessionId::from_row(r.try_get("session_id")?),
                    enrolled_at: ts_to_datetime(r.try_get("enrolled_ts")?)?,
                })
            })
            .collect()
    }

    /// Sessions `user_id` is enrolled in, soonest first.
    pub async fn sessions_for_user(&self, user_id: UserId) -> Result<Vec<TrainingSession>> {
        let rows = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM training_sessions t \
             JOIN session_participants p ON p.session_id = t.id \
             WHERE p.user_id = ? \
             ORDER BY t.start_ts ASC, t.id ASC"
        ))
        .bind(user_id.get())
        .fetch_all(&self.db.pool)
        .await?;
        rows.iter().map(session_from_row).collect()
    }
}
