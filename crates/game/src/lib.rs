//! The clickrush game service.
//!
//! [`GameService`] is the single owner of the shared button counter, the
//! achievement and statistics documents, the admission gates and the backup
//! coordinator. Transport layers call into it and translate the returned
//! outcomes into client-facing messages; [`maintenance`] keeps the limiter
//! tables small and writes periodic backups.
//!
//! A click is visible in memory (and to anyone reading [`GameService::counter`])
//! as soon as it is admitted. The write-through to disk follows under the same
//! guard; if it fails the click still counts and the outcome says so.

pub mod maintenance;
pub mod metrics;
pub mod service;

pub use maintenance::{spawn_maintenance, MaintenanceSchedule};
pub use metrics::GameMetrics;
pub use service::{AchievementOutcome, ClickOutcome, ConnectOutcome, GameService, Health};
