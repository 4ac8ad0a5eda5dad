//! Background upkeep: rate-limit sweeps and scheduled backups.

use std::sync::Arc;
use std::time::Duration;

use clickrush_common::AppConfig;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::service::GameService;

/// How often each maintenance job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceSchedule {
    pub cleanup_every: Duration,
    pub backup_every: Duration,
}

impl MaintenanceSchedule {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            cleanup_every: Duration::from_secs(config.maintenance.cleanup_interval_secs),
            backup_every: Duration::from_secs(
                config.backup.backup_interval_hours.saturating_mul(3600),
            ),
        }
    }
}

/// Spawn the maintenance worker. It runs until `shutdown` is cancelled.
///
/// Both jobs first fire one full period after startup. A failed cycle is
/// logged and the schedule carries on.
pub fn spawn_maintenance(
    service: Arc<GameService>,
    schedule: MaintenanceSchedule,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            cleanup_secs = schedule.cleanup_every.as_secs(),
            backup_secs = schedule.backup_every.as_secs(),
            backups_enabled = service.backups_enabled(),
            "maintenance worker started"
        );

        let start = Instant::now();
        let mut cleanup = interval_at(start + schedule.cleanup_every, schedule.cleanup_every);
        cleanup.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut backup = interval_at(start + schedule.backup_every, schedule.backup_every);
        backup.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cleanup.tick() => run_sweep(&service).await,
                _ = backup.tick() => run_backup(&service).await,
                _ = shutdown.cancelled() => {
                    info!("maintenance worker shutting down");
                    break;
                }
            }
        }
    })
}

async fn run_sweep(service: &Arc<GameService>) {
    let service = Arc::clone(service);
    match tokio::task::spawn_blocking(move || service.sweep()).await {
        Ok(evicted) => debug!(evicted, "rate limiter cleanup tick completed"),
        Err(e) => error!(error = %e, "rate limiter cleanup failed"),
    }
}

async fn run_backup(service: &Arc<GameService>) {
    if !service.backups_enabled() {
        return;
    }
    let service = Arc::clone(service);
    match tokio::task::spawn_blocking(move || service.create_backup()).await {
        Ok(Some(path)) => debug!(path = %path.display(), "scheduled backup completed"),
        Ok(None) => warn!("scheduled backup produced no snapshot"),
        Err(e) => error!(error = %e, "scheduled backup failed"),
    }
}
