use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local};
use tracing::{debug, error, info, warn};

use crate::document::{Document, DocumentKind};
use crate::error::{LoadError, StoreError, StoreResult};

/// Loads and saves the named documents under a data directory.
///
/// Each document kind has its own guard, so a slow stats write never holds
/// up a counter save. Writes go to `<file>.tmp` first and are renamed over
/// the target, so readers only ever see a complete file.
pub struct DocumentStore {
    data_dir: PathBuf,
    counter_lock: Mutex<()>,
    achievements_lock: Mutex<()>,
    stats_lock: Mutex<()>,
}

impl DocumentStore {
    /// Open the store rooted at `data_dir`, creating the directory if needed.
    pub fn open(data_dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir).map_err(|e| StoreError::from_io(data_dir.clone(), e))?;
        info!(data_dir = %data_dir.display(), "document store opened");

        Ok(Self {
            data_dir,
            counter_lock: Mutex::new(()),
            achievements_lock: Mutex::new(()),
            stats_lock: Mutex::new(()),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn path_for(&self, kind: DocumentKind) -> PathBuf {
        self.data_dir.join(kind.file_name())
    }

    fn lock(&self, kind: DocumentKind) -> MutexGuard<'_, ()> {
        let lock = match kind {
            DocumentKind::Counter => &self.counter_lock,
            DocumentKind::Achievements => &self.achievements_lock,
            DocumentKind::Statistics => &self.stats_lock,
        };
        lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read a document, reporting exactly why it could not be produced.
    ///
    /// Nothing on disk is modified; see [`load`](Self::load) for the variant
    /// that falls back to defaults and quarantines corrupt files.
    pub fn read<D: Document>(&self) -> Result<D, LoadError> {
        let _guard = self.lock(D::KIND);
        read_document(&self.path_for(D::KIND))
    }

    /// Load a document, degrading to its default when the file is absent,
    /// corrupt or unreadable for transient reasons.
    ///
    /// A corrupt file is renamed aside as `<file>.corrupted.<timestamp>`.
    /// Only a permission failure is returned as an error.
    pub fn load<D: Document>(&self) -> StoreResult<D> {
        let _guard = self.lock(D::KIND);
        self.load_unlocked(Local::now())
    }

    fn load_unlocked<D: Document>(&self, now: DateTime<Local>) -> StoreResult<D> {
        recover(read_document::<D>(&self.path_for(D::KIND)), now)
    }

    /// Stamp and persist a document, returning whether the write succeeded.
    ///
    /// Failures are logged; the target file is left untouched.
    pub fn save<D: Document>(&self, doc: &mut D) -> bool {
        match self.try_save(doc) {
            Ok(()) => true,
            Err(e) => {
                error!(kind = %D::KIND, error = %e, "error saving document");
                false
            }
        }
    }

    /// Stamp and persist a document.
    pub fn try_save<D: Document>(&self, doc: &mut D) -> StoreResult<()> {
        self.save_at(doc, Local::now())
    }

    pub(crate) fn save_at<D: Document>(&self, doc: &mut D, now: DateTime<Local>) -> StoreResult<()> {
        let _guard = self.lock(D::KIND);

        doc.prepare_save(now.date_naive());
        doc.stamp(now.timestamp_millis() as f64 / 1000.0);

        let bytes = serde_json::to_vec_pretty(doc)
            .map_err(|source| StoreError::Serialize { kind: D::KIND, source })?;
        write_atomic(&self.path_for(D::KIND), &bytes)?;

        debug!(kind = %D::KIND, "document saved");
        Ok(())
    }
}

/// Turn a read outcome into the document `load` hands out.
///
/// Absent, corrupt and transient failures yield the default document (corrupt
/// files are quarantined first); access denied is returned to the caller.
fn recover<D: Document>(read: Result<D, LoadError>, now: DateTime<Local>) -> StoreResult<D> {
    match read {
        Ok(doc) => Ok(doc),
        Err(LoadError::Absent { path }) => {
            info!(kind = %D::KIND, path = %path.display(), "file not found, using default data");
            Ok(D::default_document(now))
        }
        Err(LoadError::Corrupt { path, reason }) => {
            error!(kind = %D::KIND, path = %path.display(), reason = %reason, "corrupt document");
            quarantine(&path, now);
            Ok(D::default_document(now))
        }
        Err(LoadError::AccessDenied { path, source }) => {
            error!(kind = %D::KIND, path = %path.display(), error = %source, "permission error loading document");
            Err(StoreError::AccessDenied { path, source })
        }
        Err(err @ LoadError::TransientIo { .. }) => {
            error!(kind = %D::KIND, error = %err, "unexpected error loading document, using default data");
            Ok(D::default_document(now))
        }
    }
}

/// Read and structurally validate a document file.
pub(crate) fn read_document<D: Document>(path: &Path) -> Result<D, LoadError> {
    let bytes = fs::read(path).map_err(|e| LoadError::from_io(path.to_path_buf(), e))?;
    parse_document(path, &bytes)
}

fn parse_document<D: Document>(path: &Path, bytes: &[u8]) -> Result<D, LoadError> {
    let corrupt = |reason: String| LoadError::Corrupt {
        path: path.to_path_buf(),
        reason,
    };

    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| corrupt(format!("JSON decode error: {}", e)))?;
    if !value.is_object() {
        return Err(corrupt(format!("invalid {} structure: not a JSON object", D::KIND)));
    }
    serde_json::from_value(value).map_err(|e| corrupt(format!("invalid {} structure: {}", D::KIND, e)))
}

/// Format used for backup and quarantine file suffixes.
pub fn file_stamp(now: DateTime<Local>) -> String {
    now.format("%Y%m%d_%H%M%S").to_string()
}

/// `path` with `suffix` appended to its final component.
pub(crate) fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Move a corrupt file aside so it can be inspected later.
///
/// Repeated corruption within one second gets `_<n>` appended so no earlier
/// quarantined copy is overwritten.
fn quarantine(path: &Path, now: DateTime<Local>) {
    let base = format!(".corrupted.{}", file_stamp(now));
    let mut target = with_suffix(path, &base);
    let mut seq = 1u32;
    while target.exists() {
        target = with_suffix(path, &format!("{}_{}", base, seq));
        seq += 1;
    }
    match fs::rename(path, &target) {
        Ok(()) => {
            info!(path = %path.display(), quarantined = %target.display(), "corrupted file moved aside");
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "failed to quarantine corrupted file");
        }
    }
}

/// Write `bytes` to `<path>.tmp` and rename it over `path`.
///
/// On failure the temporary file is removed and `path` keeps its previous
/// contents.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    let tmp = with_suffix(path, ".tmp");

    if let Err(source) = write_then_rename(&tmp, path, bytes) {
        if tmp.exists() {
            if let Err(e) = fs::remove_file(&tmp) {
                warn!(path = %tmp.display(), error = %e, "failed to remove temporary file");
            }
        }
        return Err(StoreError::from_io(path.to_path_buf(), source));
    }
    Ok(())
}

fn write_then_rename(tmp: &Path, path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);

    // std::fs::rename replaces an existing target on every supported
    // platform (MoveFileExW with MOVEFILE_REPLACE_EXISTING on Windows).
    fs::rename(tmp, path)
}
