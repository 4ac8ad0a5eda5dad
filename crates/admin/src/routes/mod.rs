pub mod backups;
pub mod health;
pub mod metrics;
pub mod stats;
