use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::document::DocumentKind;

/// Closed set of outcomes when reading a document from disk.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{} not found", path.display())]
    Absent { path: PathBuf },

    #[error("{} is corrupt: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("access denied to {}: {source}", path.display())]
    AccessDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error on {}: {source}", path.display())]
    TransientIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl LoadError {
    /// Classify an I/O failure on `path`.
    pub(crate) fn from_io(path: PathBuf, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => LoadError::Absent { path },
            io::ErrorKind::PermissionDenied => LoadError::AccessDenied { path, source },
            _ => LoadError::TransientIo { path, source },
        }
    }
}

/// Errors surfaced by store and backup operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("access denied to {}: {source}", path.display())]
    AccessDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize {kind}: {source}")]
    Serialize {
        kind: DocumentKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid backup snapshot {}: {reason}", path.display())]
    InvalidSnapshot { path: PathBuf, reason: String },
}

impl StoreError {
    pub(crate) fn from_io(path: PathBuf, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::PermissionDenied {
            StoreError::AccessDenied { path, source }
        } else {
            StoreError::Io { path, source }
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
