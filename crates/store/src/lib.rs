//! Durable state for clickrush.
//!
//! Three JSON documents live in the data directory: the shared counter,
//! achievements and usage statistics. [`DocumentStore`] owns their on-disk
//! form and guarantees that
//!
//! - a save never leaves a partially written file (write to `<file>.tmp`,
//!   then rename over the target);
//! - a corrupt file is moved aside and replaced by defaults instead of
//!   taking the service down;
//! - only permission failures are surfaced to callers of `load`.
//!
//! [`BackupCoordinator`] bundles all three documents into timestamped
//! snapshots under `backups/`, keeps the newest `max_backups` of them and can
//! write a snapshot back through the store.

pub mod backup;
pub mod document;
pub mod error;
pub mod store;

pub use backup::{BackupCoordinator, BackupSnapshot};
pub use document::{
    unix_now, Achievements, CounterState, Document, DocumentKind, Statistics, UserSession,
    DOCUMENT_VERSION,
};
pub use error::{LoadError, StoreError, StoreResult};
pub use store::DocumentStore;
