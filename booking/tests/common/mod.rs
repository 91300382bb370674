#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use courtbook::db::Db;
use courtbook::{
    Court, CourtId, CourtStatus, Engine, EngineConfig, FixedClock, NewTrainingSession, TimeRange,
    TrainingSession, UserId,
};

/// An engine over a fresh on-disk database, with the clock pinned to
/// 2030-06-01 08:00 UTC.
///
/// A file (not `:memory:`) is used so that every pooled connection sees the
/// same database and the write lock behaves as in production.
pub struct TestEngine {
    pub engine: Arc<Engine>,
    pub clock: Arc<FixedClock>,
    _dir: TempDir,
}

pub async fn setup() -> anyhow::Result<TestEngine> {
    setup_with(EngineConfig::default()).await
}

pub async fn setup_with(config: EngineConfig) -> anyhow::Result<TestEngine> {
    let dir = tempfile::tempdir()?;
    let config = EngineConfig {
        database_url: format!("sqlite://{}", dir.path().join("courtbook.db").display()),
        ..config
    };

    let db = Db::connect(&config).await?;
    db.migrate().await?;

    let clock = Arc::new(FixedClock::new(at(8, 0)));
    let engine = Engine::with_clock(db, config, clock.clone());

    Ok(TestEngine {
        engine: Arc::new(engine),
        clock,
        _dir: dir,
    })
}

pub fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 6, 1, h, m, 0).unwrap()
}

pub fn range(h1: u32, m1: u32, h2: u32, m2: u32) -> TimeRange {
    TimeRange::new(at(h1, m1), at(h2, m2)).unwrap()
}

pub fn user(n: i64) -> UserId {
    UserId::new(n).unwrap()
}

pub async fn court(engine: &Engine, name: &str) -> anyhow::Result<Court> {
    Ok(engine.courts().create(name, "", CourtStatus::Available).await?)
}

pub fn training(
    coach: UserId,
    court_id: CourtId,
    range: TimeRange,
    max: u32,
) -> NewTrainingSession {
    NewTrainingSession {
        coach_id: coach,
        court_id,
        title: "Footwork drills".to_string(),
        description: "Intermediate group".to_string(),
        range,
        max_participants: max,
    }
}

pub async fn session(
    engine: &Engine,
    court_id: CourtId,
    range: TimeRange,
    max: u32,
) -> anyhow::Result<TrainingSession> {
    Ok(engine
        .sessions()
        .create_training_session(training(user(900), court_id, range, max))
        .await?)
}
