use sqlx::SqlitePool;

use crate::error::Result;

/// Idempotent schema setup; safe to run on every start.
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    // Courts
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS courts (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL,
  description TEXT NOT NULL DEFAULT '',
  status TEXT NOT NULL CHECK (status IN ('available', 'booked', 'maintenance')),
  created_ts INTEGER NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    // Bookings. Past and cancelled rows go with their court when it is removed.
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS bookings (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  court_id INTEGER NOT NULL REFERENCES courts(id) ON DELETE CASCADE,
  user_id INTEGER NOT NULL,
  start_ts INTEGER NOT NULL,
  end_ts INTEGER NOT NULL,
  status TEXT NOT NULL CHECK (status IN ('pending', 'confirmed', 'cancelled')),
  kind TEXT NOT NULL CHECK (kind IN ('regular', 'training')),
  created_ts INTEGER NOT NULL,
  CHECK (end_ts > start_ts)
);
"#,
    )
    .execute(pool)
    .await?;

    // Training sessions, each paired 1:1 with a training booking.
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS training_sessions (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  booking_id INTEGER NOT NULL UNIQUE REFERENCES bookings(id) ON DELETE CASCADE,
  coach_id INTEGER NOT NULL,
  court_id INTEGER NOT NULL REFERENCES courts(id) ON DELETE CASCADE,
  title TEXT NOT NULL,
  description TEXT NOT NULL DEFAULT '',
  start_ts INTEGER NOT NULL,
  end_ts INTEGER NOT NULL,
  max_participants INTEGER NOT NULL CHECK (max_participants > 0),
  created_ts INTEGER NOT NULL,
  CHECK (end_ts > start_ts)
);
"#,
    )
    .execute(pool)
    .await?;

    // Enrollments
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS session_participants (
  user_id INTEGER NOT NULL,
  session_id INTEGER NOT NULL REFERENCES training_sessions(id) ON DELETE CASCADE,
  enrolled_ts INTEGER NOT NULL,
  PRIMARY KEY (user_id, session_id)
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE INDEX IF NOT EXISTS idx_bookings_court_start ON bookings(court_id, start_ts);"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_bookings_user ON bookings(user_id);"#)
        .execute(pool)
        .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_sessions_coach ON training_sessions(coach_id);"#)
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
CREATE INDEX IF NOT EXISTS idx_participants_session ON session_participants(session_id);
"#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
