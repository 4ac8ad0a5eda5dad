//! Periodic full-state snapshots with retention and restore.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Local};
use clickrush_common::BackupConfig;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::document::{default_version, Achievements, CounterState, Statistics, DOCUMENT_VERSION};
use crate::error::{StoreError, StoreResult};
use crate::store::{file_stamp, write_atomic, DocumentStore};

const BACKUP_PREFIX: &str = "backup_";
const BACKUP_EXTENSION: &str = ".json";
const REQUIRED_KEYS: [&str; 3] = ["button_state", "achievements", "stats"];

/// A point-in-time bundle of every document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupSnapshot {
    #[serde(default)]
    pub timestamp: String,
    pub button_state: CounterState,
    pub achievements: Achievements,
    pub stats: Statistics,
    #[serde(default = "default_version")]
    pub version: String,
}

/// Writes snapshots of the live documents into a rotating backup directory.
pub struct BackupCoordinator {
    store: Arc<DocumentStore>,
    backup_dir: PathBuf,
    max_backups: usize,
    enabled: bool,
}

impl BackupCoordinator {
    /// Create a coordinator writing into `<data_dir>/backups`, creating the
    /// directory if needed.
    pub fn new(store: Arc<DocumentStore>, config: &BackupConfig) -> StoreResult<Self> {
        let backup_dir = store.data_dir().join("backups");
        fs::create_dir_all(&backup_dir).map_err(|e| StoreError::from_io(backup_dir.clone(), e))?;

        Ok(Self {
            store,
            backup_dir,
            max_backups: config.max_backups,
            enabled: config.enabled,
        })
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Snapshot all documents and rotate old snapshots.
    ///
    /// Returns the snapshot path, or `None` when backups are disabled or the
    /// snapshot could not be written. Failures are logged.
    pub fn create_backup(&self) -> Option<PathBuf> {
        if !self.enabled {
            return None;
        }

        match self.create_backup_at(Local::now()) {
            Ok(path) => Some(path),
            Err(e) => {
                error!(error = %e, "error creating backup");
                None
            }
        }
    }

    pub(crate) fn create_backup_at(&self, now: DateTime<Local>) -> StoreResult<PathBuf> {
        let timestamp = file_stamp(now);
        let snapshot = BackupSnapshot {
            timestamp: timestamp.clone(),
            button_state: self.store.load()?,
            achievements: self.store.load()?,
            stats: self.store.load()?,
            version: DOCUMENT_VERSION.to_string(),
        };

        let path = self.unused_backup_path(&timestamp);
        let bytes = serde_json::to_vec_pretty(&snapshot).map_err(|e| StoreError::InvalidSnapshot {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        write_atomic(&path, &bytes)?;
        info!(path = %path.display(), "backup created");

        self.rotate();
        Ok(path)
    }

    /// `backup_<ts>.json`, or `backup_<ts>_<n>.json` with `n` past every
    /// existing snapshot from the same second.
    fn unused_backup_path(&self, timestamp: &str) -> PathBuf {
        let next_seq = self
            .scan_backups()
            .unwrap_or_default()
            .iter()
            .filter(|entry| entry.order.0 == timestamp)
            .map(|entry| entry.order.1 + 1)
            .max();

        let name = match next_seq {
            Some(seq) => format!("{}{}_{}{}", BACKUP_PREFIX, timestamp, seq, BACKUP_EXTENSION),
            None => format!("{}{}{}", BACKUP_PREFIX, timestamp, BACKUP_EXTENSION),
        };
        self.backup_dir.join(name)
    }

    /// Snapshot paths, newest first.
    pub fn list_backups(&self) -> StoreResult<Vec<PathBuf>> {
        Ok(self
            .scan_backups()?
            .into_iter()
            .map(|entry| entry.path)
            .collect())
    }

    fn scan_backups(&self) -> StoreResult<Vec<BackupEntry>> {
        let dir = fs::read_dir(&self.backup_dir)
            .map_err(|e| StoreError::from_io(self.backup_dir.clone(), e))?;

        let mut entries = Vec::new();
        for item in dir {
            let item = item.map_err(|e| StoreError::from_io(self.backup_dir.clone(), e))?;
            let name = item.file_name().to_string_lossy().into_owned();
            let Some(order) = parse_backup_name(&name) else {
                continue;
            };
            let modified = item
                .metadata()
                .and_then(|m| m.modified())
                .map_err(|e| StoreError::from_io(item.path(), e))?;
            entries.push(BackupEntry {
                path: item.path(),
                modified,
                order,
            });
        }

        // Newest first; snapshots from the same instant fall back to name order.
        entries.sort_by(|a, b| {
            b.modified
                .cmp(&a.modified)
                .then_with(|| b.order.cmp(&a.order))
        });
        Ok(entries)
    }

    /// Delete every snapshot beyond the newest `max_backups`. Returns the
    /// number of files removed.
    pub fn rotate(&self) -> usize {
        let entries = match self.scan_backups() {
            Ok(entries) => entries,
            Err(e) => {
                error!(error = %e, "error cleaning up old backups");
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries.iter().skip(self.max_backups) {
            match fs::remove_file(&entry.path) {
                Ok(()) => {
                    removed += 1;
                    info!(path = %entry.path.display(), "old backup removed");
                }
                Err(e) => warn!(path = %entry.path.display(), error = %e, "failed to remove old backup"),
            }
        }
        removed
    }

    /// Write every document in the snapshot at `path` back through the store.
    ///
    /// Returns `true` only if all three documents were saved. Writes that
    /// succeeded before a failure stay in place.
    pub fn restore(&self, path: &Path) -> bool {
        let snapshot = match read_snapshot(path) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(path = %path.display(), error = %e, "error restoring from backup");
                return false;
            }
        };

        let BackupSnapshot {
            mut button_state,
            mut achievements,
            mut stats,
            ..
        } = snapshot;

        let mut success = self.store.save(&mut button_state);
        success &= self.store.save(&mut achievements);
        success &= self.store.save(&mut stats);

        if success {
            info!(path = %path.display(), "successfully restored from backup");
        } else {
            error!(path = %path.display(), "partial failure restoring from backup");
        }
        success
    }
}

struct BackupEntry {
    path: PathBuf,
    modified: SystemTime,
    order: (String, u32),
}

/// Ordering key for a snapshot file name: timestamp and sequence number of
/// `backup_<ts>[_<n>].json`. Names that match the prefix and extension but not
/// that layout sort by their raw stem.
fn parse_backup_name(name: &str) -> Option<(String, u32)> {
    let stem = name
        .strip_prefix(BACKUP_PREFIX)?
        .strip_suffix(BACKUP_EXTENSION)?;

    // The timestamp itself contains one underscore (YYYYMMDD_HHMMSS).
    let mut parts = stem.splitn(3, '_');
    let key = match (parts.next(), parts.next(), parts.next()) {
        (Some(date), Some(time), None) => (format!("{}_{}", date, time), 0),
        (Some(date), Some(time), Some(seq)) => match seq.parse() {
            Ok(seq) => (format!("{}_{}", date, time), seq),
            Err(_) => (stem.to_string(), 0),
        },
        _ => (stem.to_string(), 0),
    };
    Some(key)
}

fn read_snapshot(path: &Path) -> StoreResult<BackupSnapshot> {
    let invalid = |reason: String| StoreError::InvalidSnapshot {
        path: path.to_path_buf(),
        reason,
    };

    let bytes = fs::read(path).map_err(|e| StoreError::from_io(path.to_path_buf(), e))?;
    let value: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|e| invalid(e.to_string()))?;

    let missing: Vec<&str> = REQUIRED_KEYS
        .iter()
        .copied()
        .filter(|key| value.get(key).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(invalid(format!("missing keys: {}", missing.join(", "))));
    }

    serde_json::from_value(value).map_err(|e| invalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Document, DocumentKind};
    use tempfile::TempDir;

    fn coordinator(dir: &TempDir, max_backups: usize) -> (Arc<DocumentStore>, BackupCoordinator) {
        let store = Arc::new(DocumentStore::open(dir.path()).unwrap());
        let config = BackupConfig {
            enabled: true,
            max_backups,
            backup_interval_hours: 24,
        };
        let backups = BackupCoordinator::new(Arc::clone(&store), &config).unwrap();
        (store, backups)
    }

    #[test]
    fn parses_backup_names() {
        assert_eq!(
            parse_backup_name("backup_20240101_120000.json"),
            Some(("20240101_120000".to_string(), 0))
        );
        assert_eq!(
            parse_backup_name("backup_20240101_120000_12.json"),
            Some(("20240101_120000".to_string(), 12))
        );
        assert_eq!(parse_backup_name("backup_20240101_120000.json.tmp"), None);
        assert_eq!(
            parse_backup_name("backup_manual.json"),
            Some(("manual".to_string(), 0))
        );
        assert_eq!(parse_backup_name("notes.json"), None);
    }

    #[test]
    fn snapshot_contains_all_documents() {
        let dir = TempDir::new().unwrap();
        let (store, backups) = coordinator(&dir, 7);

        let mut counter = CounterState::default_document(Local::now());
        counter.count = 41;
        assert!(store.save(&mut counter));

        let path = backups.create_backup().unwrap();
        let name = path.file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with("backup_") && name.ends_with(".json"));

        let value: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(value["button_state"]["count"], 41);
        assert!(value["achievements"]["global_unlocked"].is_array());
        assert_eq!(value["stats"]["clicks_per_hour"].as_array().unwrap().len(), 24);
        assert_eq!(value["version"], "2.0");
        assert_eq!(value["timestamp"].as_str().unwrap().len(), "YYYYMMDD_HHMMSS".len());
    }

    #[test]
    fn rotation_keeps_the_newest_snapshots() {
        let dir = TempDir::new().unwrap();
        let (_store, backups) = coordinator(&dir, 3);
        let now = Local::now();

        let created: Vec<PathBuf> = (0..5)
            .map(|_| backups.create_backup_at(now).unwrap())
            .collect();

        let remaining = backups.list_backups().unwrap();
        assert_eq!(remaining.len(), 3);
        assert!(!created[0].exists());
        assert!(!created[1].exists());
        for path in &created[2..] {
            assert!(path.exists(), "{} should survive rotation", path.display());
        }
        assert_eq!(remaining[0], created[4]);
    }

    #[test]
    fn disabled_backups_write_nothing() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(DocumentStore::open(dir.path()).unwrap());
        let config = BackupConfig {
            enabled: false,
            ..BackupConfig::default()
        };
        let backups = BackupCoordinator::new(store, &config).unwrap();

        assert!(backups.create_backup().is_none());
        assert!(backups.list_backups().unwrap().is_empty());
    }

    #[test]
    fn restore_writes_every_document_back() {
        let dir = TempDir::new().unwrap();
        let (store, backups) = coordinator(&dir, 7);

        let mut counter = CounterState::default_document(Local::now());
        counter.count = 100;
        assert!(store.save(&mut counter));
        let mut achievements = Achievements::default_document(Local::now());
        achievements.unlock("alice", "hundred");
        assert!(store.save(&mut achievements));

        let snapshot = backups.create_backup().unwrap();

        counter.count = 5;
        assert!(store.save(&mut counter));
        fs::remove_file(store.path_for(DocumentKind::Achievements)).unwrap();

        assert!(backups.restore(&snapshot));

        let counter: CounterState = store.read().unwrap();
        assert_eq!(counter.count, 100);
        let achievements: Achievements = store.read().unwrap();
        assert!(achievements.global_unlocked.contains("hundred"));
        assert!(store.read::<Statistics>().is_ok());
    }

    #[test]
    fn restore_rejects_incomplete_snapshots() {
        let dir = TempDir::new().unwrap();
        let (store, backups) = coordinator(&dir, 7);

        let partial = backups.backup_dir().join("backup_20240101_000000.json");
        fs::write(&partial, br#"{"button_state": {"count": 3}, "stats": {}}"#).unwrap();
        assert!(!backups.restore(&partial));
        assert!(!store.path_for(DocumentKind::Counter).exists());

        let garbage = backups.backup_dir().join("backup_20240101_000001.json");
        fs::write(&garbage, b"not json").unwrap();
        assert!(!backups.restore(&garbage));

        assert!(!backups.restore(&backups.backup_dir().join("missing.json")));
    }

    #[test]
    fn restore_accepts_bare_document_sections() {
        let dir = TempDir::new().unwrap();
        let (store, backups) = coordinator(&dir, 7);

        let snapshot = backups.backup_dir().join("backup_20240101_000000.json");
        fs::write(
            &snapshot,
            br#"{"button_state": {"count": 3}, "achievements": {}, "stats": {"date": "2024-01-01"}}"#,
        )
        .unwrap();

        assert!(backups.restore(&snapshot));
        let counter: CounterState = store.read().unwrap();
        assert_eq!(counter.count, 3);
        let achievements: Achievements = store.read().unwrap();
        assert!(achievements.global_unlocked.is_empty());
        assert!(store.read::<Statistics>().is_ok());
    }

    #[test]
    fn restore_reports_partial_failure() {
        let dir = TempDir::new().unwrap();
        let (store, backups) = coordinator(&dir, 7);

        let mut counter = CounterState::default_document(Local::now());
        counter.count = 77;
        assert!(store.save(&mut counter));
        let snapshot = backups.create_backup().unwrap();

        // Block the stats write; the counter and achievements still land.
        fs::create_dir(store.path_for(DocumentKind::Statistics)).unwrap();
        fs::remove_file(store.path_for(DocumentKind::Counter)).unwrap();

        assert!(!backups.restore(&snapshot));
        let counter: CounterState = store.read().unwrap();
        assert_eq!(counter.count, 77);
    }
}
