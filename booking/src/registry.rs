//! Court registry: identity and administrative status of bookable courts.

use std::sync::Arc;

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use tracing::{debug, info, instrument, warn};

use crate::db::{Db, LockTarget, lock_row, ts_to_datetime};
use crate::error::{BookingError, Result};
use crate::ids::CourtId;
use crate::model::{Court, CourtStatus};
use crate::time::Clock;

pub(crate) const COURT_COLUMNS: &str = "id, name, description, status, created_ts";

pub struct CourtRegistry {
    db: Db,
    clock: Arc<dyn Clock>,
}

impl CourtRegistry {
    pub fn new(db: Db, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    #[instrument(skip_all, target = "registry", fields(name = %name, status = %status))]
    pub async fn create(
        &self,
        name: &str,
        description: &str,
        status: CourtStatus,
    ) -> Result<Court> {
        let name = validate_name(name)?;
        let now = self.clock.now();

        let res = sqlx::query(
            r#"INSERT INTO courts (name, description, status, created_ts) VALUES (?, ?, ?, ?)"#,
        )
        .bind(name)
        .bind(description)
        .bind(status.as_str())
        .bind(now.timestamp())
        .execute(&self.db.pool)
        .await?;

        let court = Court {
            id: CourtId::from_row(res.last_insert_rowid()),
            name: name.to_string(),
            description: description.to_string(),
            status,
            created_at: ts_to_datetime(now.timestamp())?,
        };

        info!(court_id = %court.id, "court registered");
        Ok(court)
    }

    #[instrument(skip_all, target = "registry", fields(court_id = %id))]
    pub async fn get(&self, id: CourtId) -> Result<Court> {
        let mut conn = self.db.pool.acquire().await?;
        fetch_court(&mut conn, id).await
    }

    pub async fn list(&self) -> Result<Vec<Court>> {
        let rows = sqlx::query(&format!("SELECT {COURT_COLUMNS} FROM courts ORDER BY id"))
            .fetch_all(&self.db.pool)
            .await?;
        rows.iter().map(court_from_row).collect()
    }

    pub async fn list_by_status(&self, status: CourtStatus) -> Result<Vec<Court>> {
        let rows = sqlx::query(&format!(
            "SELECT {COURT_COLUMNS} FROM courts WHERE status = ? ORDER BY id"
        ))
        .bind(status.as_str())
        .fetch_all(&self.db.pool)
        .await?;
        rows.iter().map(court_from_row).collect()
    }

    /// Overwrites name, description and status.
    #[instrument(skip_all, target = "registry", fields(court_id = %court.id))]
    pub async fn update(&self, court: &Court) -> Result<()> {
        let name = validate_name(&court.name)?;

        let res = sqlx::query(
            r#"UPDATE courts SET name = ?, description = ?, status = ? WHERE id = ?"#,
        )
        .bind(name)
        .bind(&court.description)
        .bind(court.status.as_str())
        .bind(court.id.get())
        .execute(&self.db.pool)
        .await?;

        if res.rows_affected() == 0 {
            return Err(BookingError::not_found("court", court.id.get()));
        }
        debug!("court updated");
        Ok(())
    }

    #[instrument(skip_all, target = "registry", fields(court_id = %id, status = %status))]
    pub async fn set_status(&self, id: CourtId, status: CourtStatus) -> Result<()> {
        let res = sqlx::query(r#"UPDATE courts SET status = ? WHERE id = ?"#)
            .bind(status.as_str())
            .bind(id.get())
            .execute(&self.db.pool)
            .await?;

        if res.rows_affected() == 0 {
            return Err(BookingError::not_found("court", id.get()));
        }
        info!("court status changed");
        Ok(())
    }

    /// Removes a court together with its history. Refused while any live
    /// booking on it has not yet ended.
    #[instrument(skip_all, target = "registry", fields(court_id = %id))]
    pub async fn delete(&self, id: CourtId) -> Result<()> {
        let now = self.clock.now();
        let mut tx = self.db.pool.begin().await?;

        if !lock_row(&mut tx, LockTarget::Court, id.get()).await? {
            return Err(BookingError::not_found("court", id.get()));
        }

        let upcoming: i64 = sqlx::query_scalar(
            r#"
SELECT COUNT(*) FROM bookings
WHERE court_id = ? AND status != 'cancelled' AND end_ts > ?
"#,
        )
        .bind(id.get())
        .bind(now.timestamp())
        .fetch_one(&mut *tx)
        .await?;

        if upcoming > 0 {
            warn!(upcoming, "refusing to delete court with upcoming bookings");
            return Err(BookingError::CourtInUse { court_id: id });
        }

        sqlx::query(r#"DELETE FROM courts WHERE id = ?"#)
            .bind(id.get())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!("court deleted");
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(BookingError::validation("court name must not be empty"));
    }
    Ok(name)
}

pub(crate) async fn fetch_court(conn: &mut SqliteConnection, id: CourtId) -> Result<Court> {
    let row = sqlx::query(&format!("SELECT {COURT_COLUMNS} FROM courts WHERE id = ?"))
        .bind(id.get())
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(r) => court_from_row(&r),
        None => Err(BookingError::not_found("court", id.get())),
    }
}

pub(crate) fn court_from_row(r: &SqliteRow) -> Result<Court> {
    Ok(Court {
        id: CourtId::from_row(r.try_get("id")?),
        name: r.try_get("name")?,
        description: r.try_get("description")?,
        status: r
            .try_get::<String, _>("status")?
            .parse()
            .map_err(|e: BookingError| crate::db::decode_error(e.to_string()))?,
        created_at: ts_to_datetime(r.try_get("created_ts")?)?,
    })
}
