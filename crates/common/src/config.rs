use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Longest accepted backup period: one year.
pub const MAX_BACKUP_INTERVAL_HOURS: u64 = 24 * 365;
/// Longest accepted limiter sweep period: one day.
pub const MAX_CLEANUP_INTERVAL_SECS: u64 = 24 * 3600;

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub backup: BackupConfig,
    #[serde(default)]
    pub features: FeatureConfig,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_requests_per_minute")]
    pub max_requests_per_minute: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests_per_minute: default_max_requests_per_minute(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_backups")]
    pub max_backups: usize,
    #[serde(default = "default_backup_interval_hours")]
    pub backup_interval_hours: u64,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_backups: default_max_backups(),
            backup_interval_hours: default_backup_interval_hours(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    #[serde(default = "default_true")]
    pub achievements: bool,
    #[serde(default = "default_true")]
    pub stats: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            achievements: true,
            stats: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_admin_listen")]
    pub listen: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: default_admin_listen(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_true")]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: true,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}
fn default_max_requests_per_minute() -> u64 {
    600 // 10 clicks per second
}
fn default_max_connections() -> usize {
    1000
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_max_backups() -> usize {
    7
}
fn default_backup_interval_hours() -> u64 {
    24
}
fn default_cleanup_interval_secs() -> u64 {
    300
}
fn default_admin_listen() -> String {
    "127.0.0.1:9090".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a YAML file, then apply environment overrides.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yaml::from_str(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Built-in defaults plus environment overrides, for running without a file.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup. Values that fail to parse are
    /// logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        override_parsed(&lookup, "RATE_LIMIT_PER_MINUTE", &mut self.rate_limit.max_requests_per_minute);
        override_parsed(&lookup, "MAX_CONNECTIONS", &mut self.rate_limit.max_connections);
        override_parsed(&lookup, "MAX_BACKUPS", &mut self.backup.max_backups);
        override_parsed(&lookup, "BACKUP_INTERVAL_HOURS", &mut self.backup.backup_interval_hours);
        override_flag(&lookup, "ENABLE_BACKUPS", &mut self.backup.enabled);
        override_flag(&lookup, "ENABLE_ACHIEVEMENTS", &mut self.features.achievements);
        override_flag(&lookup, "ENABLE_STATS", &mut self.features.stats);
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level.to_lowercase();
        }
    }

    /// Validate the configuration for consistency.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.rate_limit.max_requests_per_minute == 0 {
            anyhow::bail!("rate_limit.max_requests_per_minute must be greater than zero");
        }
        if self.rate_limit.max_connections == 0 {
            anyhow::bail!("rate_limit.max_connections must be greater than zero");
        }
        if self.backup.max_backups == 0 {
            anyhow::bail!("backup.max_backups must be greater than zero");
        }
        if !(1..=MAX_BACKUP_INTERVAL_HOURS).contains(&self.backup.backup_interval_hours) {
            anyhow::bail!(
                "backup.backup_interval_hours must be between 1 and {}",
                MAX_BACKUP_INTERVAL_HOURS
            );
        }
        if !(1..=MAX_CLEANUP_INTERVAL_SECS).contains(&self.maintenance.cleanup_interval_secs) {
            anyhow::bail!(
                "maintenance.cleanup_interval_secs must be between 1 and {}",
                MAX_CLEANUP_INTERVAL_SECS
            );
        }
        if self.storage.data_dir.as_os_str().is_empty() {
            anyhow::bail!("storage.data_dir must not be empty");
        }
        Ok(())
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, slot: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    if let Some(raw) = lookup(key) {
        match raw.trim().parse() {
            Ok(value) => *slot = value,
            Err(_) => tracing::warn!(key, value = %raw, "ignoring unparseable override"),
        }
    }
}

fn override_flag<F>(lookup: &F, key: &str, slot: &mut bool)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(key) {
        *slot = matches!(raw.trim().to_lowercase().as_str(), "true" | "1" | "yes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.rate_limit.max_requests_per_minute, 600);
        assert_eq!(config.rate_limit.max_connections, 1000);
        assert_eq!(config.backup.max_backups, 7);
        assert_eq!(config.backup.backup_interval_hours, 24);
        assert_eq!(config.storage.data_dir, PathBuf::from("data"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let yaml = "rate_limit:\n  max_requests_per_minute: 5\nstorage:\n  data_dir: /tmp/clicks\n";
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.rate_limit.max_requests_per_minute, 5);
        assert_eq!(config.rate_limit.max_connections, 1000);
        assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/clicks"));
        assert!(config.backup.enabled);
    }

    #[test]
    fn overrides_apply_and_bad_values_are_ignored() {
        let env: HashMap<&str, &str> = [
            ("MAX_CONNECTIONS", "42"),
            ("MAX_BACKUPS", "not-a-number"),
            ("ENABLE_STATS", "False"),
            ("ENABLE_BACKUPS", "yes"),
            ("DATA_DIR", "/srv/clicks"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.backup.enabled = false;
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.rate_limit.max_connections, 42);
        assert_eq!(config.backup.max_backups, 7);
        assert!(!config.features.stats);
        assert!(config.backup.enabled);
        assert_eq!(config.storage.data_dir, PathBuf::from("/srv/clicks"));
    }

    #[test]
    fn validate_rejects_zero_limits() {
        let mut config = AppConfig::default();
        config.rate_limit.max_connections = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.backup.max_backups = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_bounds_intervals() {
        let mut config = AppConfig::default();
        config.backup.backup_interval_hours = u64::MAX;
        assert!(config.validate().is_err());

        config.backup.backup_interval_hours = MAX_BACKUP_INTERVAL_HOURS;
        assert!(config.validate().is_ok());

        config.maintenance.cleanup_interval_secs = MAX_CLEANUP_INTERVAL_SECS + 1;
        assert!(config.validate().is_err());
    }
}
