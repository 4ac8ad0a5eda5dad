//! The three persisted documents and their JSON wire shapes.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Local, NaiveDate, Timelike, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Version tag stamped into every document on save.
pub const DOCUMENT_VERSION: &str = "2.0";

/// Identifies one of the named documents owned by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Counter,
    Achievements,
    Statistics,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 3] = [
        DocumentKind::Counter,
        DocumentKind::Achievements,
        DocumentKind::Statistics,
    ];

    /// File name of the document inside the data directory.
    pub fn file_name(self) -> &'static str {
        match self {
            DocumentKind::Counter => "button_clicks.json",
            DocumentKind::Achievements => "achievements.json",
            DocumentKind::Statistics => "stats.json",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DocumentKind::Counter => "button state",
            DocumentKind::Achievements => "achievements",
            DocumentKind::Statistics => "stats",
        };
        f.write_str(name)
    }
}

/// A whole-file JSON document managed by the store.
pub trait Document: Serialize + DeserializeOwned + Clone + Send + 'static {
    const KIND: DocumentKind;

    /// Document used when the file is absent or unreadable.
    fn default_document(now: DateTime<Local>) -> Self;

    /// Set `version` and `last_updated` ahead of a save.
    fn stamp(&mut self, at: f64);

    /// Adjust the document right before it is written. `today` is the local
    /// calendar date of the save.
    fn prepare_save(&mut self, _today: NaiveDate) {}
}

/// Current wall-clock time as fractional unix seconds.
pub fn unix_now() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

pub(crate) fn default_version() -> String {
    DOCUMENT_VERSION.to_string()
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Shared button counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterState {
    pub count: u64,
    #[serde(default)]
    pub last_updated: f64,
    #[serde(default = "default_version")]
    pub version: String,
}

impl Document for CounterState {
    const KIND: DocumentKind = DocumentKind::Counter;

    fn default_document(now: DateTime<Local>) -> Self {
        Self {
            count: 0,
            last_updated: now.timestamp_millis() as f64 / 1000.0,
            version: default_version(),
        }
    }

    fn stamp(&mut self, at: f64) {
        self.version = default_version();
        self.last_updated = at;
    }
}

/// Global and per-player achievement unlocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Achievements {
    #[serde(default)]
    pub global_unlocked: BTreeSet<String>,
    #[serde(default)]
    pub player_achievements: BTreeMap<String, BTreeSet<String>>,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub last_updated: f64,
}

impl Achievements {
    /// Record `achievement_id` for `user_id`. Returns `true` when the
    /// achievement had not been unlocked globally before.
    pub fn unlock(&mut self, user_id: &str, achievement_id: &str) -> bool {
        self.player_achievements
            .entry(user_id.to_string())
            .or_default()
            .insert(achievement_id.to_string());
        self.global_unlocked.insert(achievement_id.to_string())
    }
}

impl Document for Achievements {
    const KIND: DocumentKind = DocumentKind::Achievements;

    fn default_document(_now: DateTime<Local>) -> Self {
        Self {
            global_unlocked: BTreeSet::new(),
            player_achievements: BTreeMap::new(),
            version: default_version(),
            last_updated: 0.0,
        }
    }

    fn stamp(&mut self, at: f64) {
        self.version = default_version();
        self.last_updated = at;
    }
}

/// A tracked client session inside the statistics document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSession {
    pub first_connected: f64,
    #[serde(default)]
    pub clicks: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_click: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket_id: Option<String>,
}

/// Daily and per-session usage statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    #[serde(default)]
    pub clicks_today: u64,
    #[serde(default = "today")]
    pub date: NaiveDate,
    #[serde(default)]
    pub clicks_per_hour: [u64; 24],
    #[serde(default)]
    pub unique_users: u64,
    #[serde(default)]
    pub user_sessions: BTreeMap<String, UserSession>,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub last_updated: f64,
}

impl Statistics {
    /// Reset the daily counters when `today` is a different calendar day.
    /// Returns `true` if a reset happened.
    pub fn roll_over(&mut self, today: NaiveDate) -> bool {
        if self.date == today {
            return false;
        }
        self.clicks_today = 0;
        self.clicks_per_hour = [0; 24];
        self.date = today;
        true
    }

    /// Register a new session and count it as a unique user.
    pub fn register_session(&mut self, session_id: &str, socket_id: &str, at: f64) {
        self.unique_users += 1;
        self.user_sessions.insert(
            session_id.to_string(),
            UserSession {
                first_connected: at,
                clicks: 0,
                last_click: None,
                socket_id: Some(socket_id.to_string()),
            },
        );
    }

    /// Count a click for a known session. Unknown sessions are ignored and
    /// `false` is returned.
    pub fn record_click(&mut self, session_id: &str, now: DateTime<Local>) -> bool {
        let at = now.timestamp_millis() as f64 / 1000.0;
        let Some(session) = self.user_sessions.get_mut(session_id) else {
            return false;
        };
        session.clicks += 1;
        session.last_click = Some(at);

        self.roll_over(now.date_naive());
        self.clicks_today += 1;
        self.clicks_per_hour[now.hour() as usize] += 1;
        true
    }
}

impl Document for Statistics {
    const KIND: DocumentKind = DocumentKind::Statistics;

    fn default_document(now: DateTime<Local>) -> Self {
        Self {
            clicks_today: 0,
            date: now.date_naive(),
            clicks_per_hour: [0; 24],
            unique_users: 0,
            user_sessions: BTreeMap::new(),
            version: default_version(),
            last_updated: 0.0,
        }
    }

    fn stamp(&mut self, at: f64) {
        self.version = default_version();
        self.last_updated = at;
    }

    fn prepare_save(&mut self, today: NaiveDate) {
        if self.roll_over(today) {
            tracing::info!(date = %today, "daily stats reset for new day");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn counter_requires_count() {
        assert!(serde_json::from_str::<CounterState>(r#"{"version": "2.0"}"#).is_err());

        let state: CounterState = serde_json::from_str(r#"{"count": 7}"#).unwrap();
        assert_eq!(state.count, 7);
        assert_eq!(state.version, DOCUMENT_VERSION);
    }

    #[test]
    fn statistics_wire_shape() {
        let json = r#"{
            "clicks_today": 3,
            "date": "2024-01-01",
            "clicks_per_hour": [0,0,0,0,0,0,0,0,0,0,0,0,3,0,0,0,0,0,0,0,0,0,0,0],
            "unique_users": 1,
            "user_sessions": {"client_1_0": {"first_connected": 1704110400.5, "clicks": 3}},
            "version": "2.0",
            "last_updated": 1704110400.0
        }"#;
        let stats: Statistics = serde_json::from_str(json).unwrap();
        assert_eq!(stats.date, date("2024-01-01"));
        assert_eq!(stats.clicks_per_hour[12], 3);
        assert_eq!(stats.user_sessions["client_1_0"].last_click, None);

        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["date"], "2024-01-01");
        assert_eq!(value["clicks_per_hour"].as_array().unwrap().len(), 24);
        assert!(value["user_sessions"]["client_1_0"].get("last_click").is_none());
    }

    #[test]
    fn statistics_rejects_wrong_hour_count() {
        let json = r#"{"date": "2024-01-01", "clicks_per_hour": [1, 2, 3]}"#;
        assert!(serde_json::from_str::<Statistics>(json).is_err());
    }

    #[test]
    fn roll_over_resets_daily_counters() {
        let now = Local.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let mut stats = Statistics::default_document(now);
        stats.clicks_today = 12;
        stats.clicks_per_hour = [1; 24];
        stats.unique_users = 4;

        assert!(!stats.roll_over(date("2024-01-01")));
        assert_eq!(stats.clicks_today, 12);

        assert!(stats.roll_over(date("2024-01-02")));
        assert_eq!(stats.clicks_today, 0);
        assert_eq!(stats.clicks_per_hour, [0; 24]);
        assert_eq!(stats.date, date("2024-01-02"));
        assert_eq!(stats.unique_users, 4, "lifetime counters survive");
    }

    #[test]
    fn record_click_updates_session_and_hour() {
        let now = Local.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap();
        let mut stats = Statistics::default_document(now);
        stats.register_session("s1", "socket-1", 1.0);

        assert!(stats.record_click("s1", now));
        assert!(!stats.record_click("unknown", now));

        let session = &stats.user_sessions["s1"];
        assert_eq!(session.clicks, 1);
        assert!(session.last_click.is_some());
        assert_eq!(stats.clicks_today, 1);
        assert_eq!(stats.clicks_per_hour[14], 1);
        assert_eq!(stats.unique_users, 1);
    }

    #[test]
    fn record_click_after_midnight_counts_toward_the_new_day() {
        let yesterday = Local.with_ymd_and_hms(2024, 3, 5, 23, 0, 0).unwrap();
        let mut stats = Statistics::default_document(yesterday);
        stats.register_session("s1", "socket-1", 1.0);
        stats.record_click("s1", yesterday);

        let today = Local.with_ymd_and_hms(2024, 3, 6, 0, 15, 0).unwrap();
        stats.record_click("s1", today);

        assert_eq!(stats.date, date("2024-03-06"));
        assert_eq!(stats.clicks_today, 1);
        assert_eq!(stats.clicks_per_hour[0], 1);
        assert_eq!(stats.clicks_per_hour[23], 0);
        assert_eq!(stats.user_sessions["s1"].clicks, 2);
    }

    #[test]
    fn unlock_reports_new_global_achievements() {
        let mut achievements = Achievements::default_document(Local::now());

        assert!(achievements.unlock("alice", "first_click"));
        assert!(!achievements.unlock("bob", "first_click"));
        assert!(!achievements.unlock("bob", "first_click"));

        assert_eq!(achievements.global_unlocked.len(), 1);
        assert_eq!(achievements.player_achievements["bob"].len(), 1);
        assert_eq!(achievements.player_achievements.len(), 2);
    }
}
