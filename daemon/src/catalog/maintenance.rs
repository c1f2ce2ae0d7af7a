//! Housekeeping work.
//!
//! Everything heavy runs when all markets are closed: backups first, then
//! the remote copy and its rotation, with vacuum waiting on the backup so a
//! botched compaction never eats the only copy. Retention cleanups are
//! independent of each other; recommendation cleanup runs hourly because
//! stale advice ages badly.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use worker::progress::ProgressReporter;
use worker::registry::Registry;
use worker::types::{MarketTiming, WorkHandler, WorkType};

use super::Capabilities;
use crate::caps::MaintenanceRunner;

const DAILY: Duration = Duration::from_secs(24 * 3600);
const HOURLY: Duration = Duration::from_secs(3600);

pub struct Backup(pub Arc<dyn MaintenanceRunner>);

#[async_trait]
impl WorkHandler for Backup {
    async fn execute(&self, _: &str, progress: &ProgressReporter) -> anyhow::Result<()> {
        self.0.backup_database(progress).await
    }
}

pub struct RemoteBackup(pub Arc<dyn MaintenanceRunner>);

#[async_trait]
impl WorkHandler for RemoteBackup {
    async fn execute(&self, _: &str, progress: &ProgressReporter) -> anyhow::Result<()> {
        self.0.upload_backup(progress).await
    }
}

pub struct RemoteRotation(pub Arc<dyn MaintenanceRunner>);

#[async_trait]
impl WorkHandler for RemoteRotation {
    async fn execute(&self, _: &str, progress: &ProgressReporter) -> anyhow::Result<()> {
        self.0.rotate_remote_backups(progress).await
    }
}

pub struct Vacuum(pub Arc<dyn MaintenanceRunner>);

#[async_trait]
impl WorkHandler for Vacuum {
    async fn execute(&self, _: &str, progress: &ProgressReporter) -> anyhow::Result<()> {
        progress.message("vacuuming database");
        self.0.vacuum_database().await
    }
}

pub struct Health(pub Arc<dyn MaintenanceRunner>);

#[async_trait]
impl WorkHandler for Health {
    async fn execute(&self, _: &str, _: &ProgressReporter) -> anyhow::Result<()> {
        self.0.health_check().await
    }
}

/// Which retention sweep a cleanup handler performs.
#[derive(Clone, Copy)]
pub enum CleanupKind {
    History,
    Cache,
    ClientData,
    Recommendations,
}

pub struct Cleanup {
    pub maintenance: Arc<dyn MaintenanceRunner>,
    pub kind: CleanupKind,
}

#[async_trait]
impl WorkHandler for Cleanup {
    async fn execute(&self, _: &str, _: &ProgressReporter) -> anyhow::Result<()> {
        match self.kind {
            CleanupKind::History => self.maintenance.cleanup_history().await,
            CleanupKind::Cache => self.maintenance.cleanup_cache().await,
            CleanupKind::ClientData => self.maintenance.cleanup_client_data().await,
            CleanupKind::Recommendations => self.maintenance.cleanup_recommendations().await,
        }
    }
}

pub fn register(registry: &Registry, caps: &Capabilities) {
    let m = &caps.maintenance;

    registry.register(
        WorkType::new(
            "maintenance:backup",
            MarketTiming::AllMarketsClosed,
            Arc::new(Backup(m.clone())),
        )
        .with_interval(DAILY),
    );

    registry.register(
        WorkType::new(
            "maintenance:r2-backup",
            MarketTiming::AllMarketsClosed,
            Arc::new(RemoteBackup(m.clone())),
        )
        .with_interval(DAILY)
        .with_depends_on(["maintenance:backup"]),
    );

    registry.register(
        WorkType::new(
            "maintenance:r2-rotation",
            MarketTiming::AllMarketsClosed,
            Arc::new(RemoteRotation(m.clone())),
        )
        .with_interval(DAILY)
        .with_depends_on(["maintenance:r2-backup"]),
    );

    registry.register(
        WorkType::new(
            "maintenance:vacuum",
            MarketTiming::AllMarketsClosed,
            Arc::new(Vacuum(m.clone())),
        )
        .with_interval(DAILY)
        .with_depends_on(["maintenance:backup"]),
    );

    registry.register(
        WorkType::new(
            "maintenance:health",
            MarketTiming::AllMarketsClosed,
            Arc::new(Health(m.clone())),
        )
        .with_interval(DAILY),
    );

    let cleanup = |kind| {
        Arc::new(Cleanup {
            maintenance: m.clone(),
            kind,
        })
    };

    registry.register(
        WorkType::new(
            "maintenance:cleanup:history",
            MarketTiming::AllMarketsClosed,
            cleanup(CleanupKind::History),
        )
        .with_interval(DAILY),
    );

    registry.register(
        WorkType::new(
            "maintenance:cleanup:cache",
            MarketTiming::AllMarketsClosed,
            cleanup(CleanupKind::Cache),
        )
        .with_interval(DAILY),
    );

    registry.register(
        WorkType::new(
            "maintenance:cleanup:client-data",
            MarketTiming::AllMarketsClosed,
            cleanup(CleanupKind::ClientData),
        )
        .with_interval(DAILY),
    );

    registry.register(
        WorkType::new(
            "maintenance:cleanup:recommendations",
            MarketTiming::AnyTime,
            cleanup(CleanupKind::Recommendations),
        )
        .with_interval(HOURLY),
    );
}
