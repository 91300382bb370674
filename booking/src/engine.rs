use std::sync::Arc;

use tracing::info;

use crate::config::EngineConfig;
use crate::conflict::ConflictChecker;
use crate::db::Db;
use crate::enrollment::EnrollmentLedger;
use crate::error::Result;
use crate::lifecycle::BookingLifecycle;
use crate::orchestrator::SessionOrchestrator;
use crate::registry::CourtRegistry;
use crate::time::{Clock, SystemClock};

/// Entry point for callers: one database, one clock, and the components
/// that share them.
pub struct Engine {
    db: Db,
    config: Arc<EngineConfig>,
    courts: CourtRegistry,
    conflicts: ConflictChecker,
    bookings: BookingLifecycle,
    sessions: SessionOrchestrator,
    enrollments: EnrollmentLedger,
}

impl Engine {
    /// Validates `config`, opens the database and applies the schema.
    pub async fn open(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let db = Db::connect(&config).await?;
        db.migrate().await?;
        Ok(Self::with_clock(db, config, Arc::new(SystemClock)))
    }

    /// Builds an engine over an already migrated database. Tests use this
    /// to pin the clock.
    pub fn with_clock(db: Db, config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        let config = Arc::new(config);
        info!(
            target: "engine",
            opening_hour = config.opening_hour,
            closing_hour = config.closing_hour,
            slot_minutes = config.slot_minutes,
            "booking engine ready"
        );

        Self {
            courts: CourtRegistry::new(db.clone(), clock.clone()),
            conflicts: ConflictChecker::new(db.clone(), clock.clone(), config.clone()),
            bookings: BookingLifecycle::new(db.clone(), clock.clone(), config.clone()),
            sessions: SessionOrchestrator::new(db.clone(), clock.clone()),
            enrollments: EnrollmentLedger::new(db.clone(), clock),
            db,
            config,
        }
    }

    pub fn courts(&self) -> &CourtRegistry {
        &self.courts
    }

    pub fn conflicts(&self) -> &ConflictChecker {
        &self.conflicts
    }

    pub fn bookings(&self) -> &BookingLifecycle {
        &self.bookings
    }

    pub fn sessions(&self) -> &SessionOrchestrator {
        &self.sessions
    }

    pub fn enrollments(&self) -> &EnrollmentLedger {
        &self.enrollments
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub async fn close(&self) {
        self.db.close().await;
    }
}
