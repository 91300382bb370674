pub mod schema;

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::config::EngineConfig;
use crate::error::Result;

#[derive(Clone, Debug)]
pub struct Db {
    pub pool: SqlitePool,
}

impl Db {
    pub async fn connect(cfg: &EngineConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&cfg.database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(cfg.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(cfg.max_connections)
            .connect_with(options)
            .await?;

        info!(
            target: "db",
            url = %cfg.database_url,
            max_connections = cfg.max_connections,
            "database pool ready"
        );

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        schema::migrate(&self.pool).await
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Parent rows a write transaction can lock before it reads anything.
#[derive(Debug, Clone, Copy)]
pub(crate) enum LockTarget {
    Court,
    Booking,
    Session,
}

impl LockTarget {
    fn sql(self) -> &'static str {
        match self {
            LockTarget::Court => "UPDATE courts SET id = id WHERE id = ?",
            LockTarget::Booking => "UPDATE bookings SET id = id WHERE id = ?",
            LockTarget::Session => "UPDATE training_sessions SET id = id WHERE id = ?",
        }
    }
}

/// Takes the database write lock by touching one parent row, and reports
/// whether that row exists.
///
/// This must be the first statement of a transaction that reads and then
/// writes: SQLite admits one writer at a time, so once this returns no other
/// transaction can commit until ours finishes, and everything we read
/// afterwards stays current until commit. It plays the role `SELECT … FOR
/// UPDATE` plays on a server database. A transaction that reads first and
/// upgrades later can instead fail with `SQLITE_BUSY` under WAL.
pub(crate) async fn lock_row(
    conn: &mut SqliteConnection,
    target: LockTarget,
    id: i64,
) -> Result<bool> {
    let res = sqlx::query(target.sql()).bind(id).execute(&mut *conn).await?;
    Ok(res.rows_affected() == 1)
}

/* =========================
Row conversions
========================= */

pub(crate) fn ts_to_datetime(ts: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
        .ok_or_else(|| decode_error(format!("timestamp out of range: {ts}")))
}

pub(crate) fn i64_to_u32(v: i64) -> Result<u32> {
    u32::try_from(v).map_err(|_| decode_error(format!("out of range for u32: {v}")))
}

pub(crate) fn decode_error(msg: String) -> crate::error::BookingError {
    sqlx::Error::Decode(msg.into()).into()
}
