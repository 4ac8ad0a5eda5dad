use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::Local;
use clickrush_common::{AppConfig, ClickrushError, ClickrushResult};
use clickrush_rate_limit::{Admission, AdmissionControl};
use clickrush_store::{
    unix_now, Achievements, BackupCoordinator, CounterState, Document, DocumentStore, Statistics,
    StoreError, DOCUMENT_VERSION,
};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::metrics::GameMetrics;

/// Result of a connection attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectOutcome {
    Connected {
        client_id: String,
        /// Stats session to pass back with clicks; `None` when stats are off.
        session_id: Option<String>,
        state: CounterState,
    },
    /// The service is full. Clients should try again later.
    CapacityExceeded,
}

/// Result of a button click.
#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    /// The click was counted. `persisted` is `false` when the write-through
    /// failed; the in-memory count still includes the click.
    Accepted { state: CounterState, persisted: bool },
    /// The client is clicking too fast and should slow down.
    RateLimited { remaining: u64 },
}

/// Result of an achievement unlock report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AchievementOutcome {
    Unlocked { new_global: bool, persisted: bool },
    Invalid,
    Disabled,
}

/// Liveness summary for operators.
#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub connections: usize,
    pub button_count: u64,
}

/// Owns the admission gates, the store and the in-memory documents.
///
/// Constructed once at startup and shared behind an `Arc` by every handler
/// and by the maintenance task.
pub struct GameService {
    config: AppConfig,
    admission: AdmissionControl,
    store: Arc<DocumentStore>,
    backups: BackupCoordinator,
    counter: Mutex<CounterState>,
    achievements: Mutex<Achievements>,
    stats: Mutex<Statistics>,
    metrics: GameMetrics,
    started_at: Instant,
}

fn storage_error(err: StoreError) -> ClickrushError {
    match err {
        StoreError::AccessDenied { .. } => ClickrushError::AccessDenied(err.to_string()),
        other => ClickrushError::Storage(other.to_string()),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl GameService {
    /// Open the data directory and load the persisted documents.
    pub fn open(config: AppConfig) -> ClickrushResult<Self> {
        config
            .validate()
            .map_err(|e| ClickrushError::Config(e.to_string()))?;

        let store = Arc::new(
            DocumentStore::open(&config.storage.data_dir).map_err(storage_error)?,
        );
        let backups = BackupCoordinator::new(Arc::clone(&store), &config.backup)
            .map_err(storage_error)?;

        let counter: CounterState = store.load().map_err(storage_error)?;
        let achievements: Achievements = if config.features.achievements {
            store.load().map_err(storage_error)?
        } else {
            Achievements::default_document(Local::now())
        };
        let stats: Statistics = if config.features.stats {
            store.load().map_err(storage_error)?
        } else {
            Statistics::default_document(Local::now())
        };

        info!(
            count = counter.count,
            unique_users = stats.unique_users,
            global_achievements = achievements.global_unlocked.len(),
            data_dir = %config.storage.data_dir.display(),
            "game state loaded"
        );

        let metrics = GameMetrics::new().map_err(anyhow::Error::from)?;

        Ok(Self {
            admission: AdmissionControl::new(&config.rate_limit),
            config,
            store,
            backups,
            counter: Mutex::new(counter),
            achievements: Mutex::new(achievements),
            stats: Mutex::new(stats),
            metrics,
            started_at: Instant::now(),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn admission(&self) -> &AdmissionControl {
        &self.admission
    }

    pub fn metrics(&self) -> &GameMetrics {
        &self.metrics
    }

    /// Accept a new client under a freshly generated identity.
    pub fn connect(&self) -> ConnectOutcome {
        self.connect_as(&Uuid::new_v4().to_string())
    }

    /// Accept a client under a caller-chosen identity.
    pub fn connect_as(&self, client_id: &str) -> ConnectOutcome {
        if !self.admission.connect(client_id).is_allowed() {
            self.metrics.connections_rejected.inc();
            warn!(client = client_id, "connection rejected due to limits");
            return ConnectOutcome::CapacityExceeded;
        }
        self.metrics
            .active_connections
            .set(self.admission.active_connections() as i64);

        let session_id = self
            .config
            .features
            .stats
            .then(|| self.register_session(client_id));

        let state = lock(&self.counter).clone();
        info!(client = client_id, count = state.count, "client connected");

        ConnectOutcome::Connected {
            client_id: client_id.to_string(),
            session_id,
            state,
        }
    }

    fn register_session(&self, client_id: &str) -> String {
        let mut stats = lock(&self.stats);
        let now = unix_now();
        let session_id = format!("client_{}_{}", now, stats.user_sessions.len());
        stats.register_session(&session_id, client_id, now);
        self.save_or_count(&mut *stats);
        session_id
    }

    pub fn disconnect(&self, client_id: &str) {
        self.admission.disconnect(client_id);
        self.metrics
            .active_connections
            .set(self.admission.active_connections() as i64);
        info!(client = client_id, "client disconnected");
    }

    /// Count a click from `client_id`, attributing it to `session_id` in the
    /// statistics when that session is known.
    ///
    /// The in-memory counter is updated before it is written through. A failed
    /// write is logged and reported, never rolled back.
    pub fn click(&self, client_id: &str, session_id: Option<&str>) -> ClickOutcome {
        if let Admission::RateLimited { remaining } = self.admission.check_action(client_id) {
            self.metrics.clicks_rate_limited.inc();
            return ClickOutcome::RateLimited { remaining };
        }

        if self.config.features.stats {
            if let Some(session_id) = session_id {
                let mut stats = lock(&self.stats);
                if stats.record_click(session_id, Local::now()) {
                    self.save_or_count(&mut *stats);
                }
            }
        }

        // The counter guard is held across the save so the file never goes
        // backwards relative to memory.
        let mut counter = lock(&self.counter);
        counter.count += 1;
        let persisted = self.save_or_count(&mut *counter);
        if !persisted {
            error!(count = counter.count, "failed to save button state");
        }
        self.metrics.clicks_total.inc();
        debug!(client = client_id, count = counter.count, "button clicked");

        ClickOutcome::Accepted {
            state: counter.clone(),
            persisted,
        }
    }

    /// Record an achievement unlock reported by a client.
    pub fn unlock_achievement(&self, user_id: &str, achievement_id: &str) -> AchievementOutcome {
        if !self.config.features.achievements {
            return AchievementOutcome::Disabled;
        }
        if user_id.trim().is_empty() || achievement_id.trim().is_empty() {
            warn!(user_id, achievement_id, "invalid achievement unlock data");
            return AchievementOutcome::Invalid;
        }

        let mut achievements = lock(&self.achievements);
        let new_global = achievements.unlock(user_id, achievement_id);
        let persisted = self.save_or_count(&mut *achievements);
        self.metrics.achievements_unlocked.inc();

        if persisted {
            info!(user_id, achievement_id, new_global, "achievement unlocked");
        } else {
            error!(achievement_id, "failed to save achievement unlock");
        }
        AchievementOutcome::Unlocked {
            new_global,
            persisted,
        }
    }

    fn save_or_count<D: Document>(&self, doc: &mut D) -> bool {
        let saved = self.store.save(doc);
        if !saved {
            self.metrics.save_failures.inc();
        }
        saved
    }

    pub fn counter(&self) -> CounterState {
        lock(&self.counter).clone()
    }

    /// Statistics, or `None` when the feature is disabled.
    pub fn stats(&self) -> Option<Statistics> {
        self.config
            .features
            .stats
            .then(|| lock(&self.stats).clone())
    }

    /// Achievements, or `None` when the feature is disabled.
    pub fn achievements(&self) -> Option<Achievements> {
        self.config
            .features
            .achievements
            .then(|| lock(&self.achievements).clone())
    }

    pub fn health(&self) -> Health {
        Health {
            status: "healthy",
            version: DOCUMENT_VERSION,
            uptime_secs: self.started_at.elapsed().as_secs(),
            connections: self.admission.active_connections(),
            button_count: lock(&self.counter).count,
        }
    }

    /// Evict expired rate-limit state.
    pub fn sweep(&self) -> usize {
        self.admission.sweep()
    }

    pub fn backups_enabled(&self) -> bool {
        self.backups.enabled()
    }

    pub fn backup_dir(&self) -> &Path {
        self.backups.backup_dir()
    }

    /// Snapshot the persisted documents. `None` when disabled or failed.
    pub fn create_backup(&self) -> Option<PathBuf> {
        let path = self.backups.create_backup()?;
        self.metrics.backups_created.inc();
        Some(path)
    }

    pub fn list_backups(&self) -> ClickrushResult<Vec<PathBuf>> {
        self.backups.list_backups().map_err(storage_error)
    }

    /// Restore a snapshot and reload the in-memory documents from disk.
    pub fn restore_backup(&self, path: &Path) -> bool {
        // Holding every in-memory guard keeps concurrent clicks from writing
        // stale documents over the restored files.
        let mut counter = lock(&self.counter);
        let mut achievements = lock(&self.achievements);
        let mut stats = lock(&self.stats);

        let restored = self.backups.restore(path);

        match self.store.load::<CounterState>() {
            Ok(doc) => *counter = doc,
            Err(e) => error!(error = %e, "failed to reload button state after restore"),
        }
        match self.store.load::<Achievements>() {
            Ok(doc) => *achievements = doc,
            Err(e) => error!(error = %e, "failed to reload achievements after restore"),
        }
        match self.store.load::<Statistics>() {
            Ok(doc) => *stats = doc,
            Err(e) => error!(error = %e, "failed to reload stats after restore"),
        }

        restored
    }
}
