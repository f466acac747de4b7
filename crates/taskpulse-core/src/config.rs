//! TaskPulse configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, TaskPulseError};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPulseConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub work_window: WorkWindow,
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub reminders: ReminderConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

impl TaskPulseConfig {
    /// Load config from the default path (~/.taskpulse/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TaskPulseError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| TaskPulseError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the given path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| TaskPulseError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    /// Reject configurations the scheduler cannot work with.
    pub fn validate(&self) -> Result<()> {
        self.work_window.validate()?;
        if self.timer.tick_millis == 0 {
            return Err(TaskPulseError::Config("timer.tick_millis must be > 0".into()));
        }
        if self.scheduler.granularity_minutes == 0 || self.scheduler.granularity_minutes > 60 {
            return Err(TaskPulseError::Config(
                "scheduler.granularity_minutes must be within 1..=60".into(),
            ));
        }
        if self.reminders.overdue_grace_minutes >= self.reminders.overdue_window_minutes {
            return Err(TaskPulseError::Config(
                "reminders.overdue_grace_minutes must be below overdue_window_minutes".into(),
            ));
        }
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the TaskPulse home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".taskpulse")
    }
}

/// Task store (REST backend) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_base_url() -> String { "http://127.0.0.1:8000/api".into() }
fn default_timeout_secs() -> u64 { 10 }

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            api_key: None,
        }
    }
}

/// Daily hours (local wall clock) during which tasks may be auto-scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkWindow {
    #[serde(default = "default_morning_start")]
    pub morning_start: u32,
    #[serde(default = "default_evening_end")]
    pub evening_end: u32,
    #[serde(default = "default_lunch_start")]
    pub lunch_start: u32,
    #[serde(default = "default_lunch_end")]
    pub lunch_end: u32,
}

fn default_morning_start() -> u32 { 9 }
fn default_evening_end() -> u32 { 22 }
fn default_lunch_start() -> u32 { 12 }
fn default_lunch_end() -> u32 { 13 }

impl Default for WorkWindow {
    fn default() -> Self {
        Self {
            morning_start: default_morning_start(),
            evening_end: default_evening_end(),
            lunch_start: default_lunch_start(),
            lunch_end: default_lunch_end(),
        }
    }
}

impl WorkWindow {
    pub fn validate(&self) -> Result<()> {
        let hours = [self.morning_start, self.evening_end, self.lunch_start, self.lunch_end];
        if hours.iter().any(|h| *h > 24) {
            return Err(TaskPulseError::Config("work_window hours must be <= 24".into()));
        }
        if self.morning_start >= self.evening_end {
            return Err(TaskPulseError::Config(
                "work_window.morning_start must be before evening_end".into(),
            ));
        }
        if self.lunch_start > self.lunch_end {
            return Err(TaskPulseError::Config(
                "work_window.lunch_start must not be after lunch_end".into(),
            ));
        }
        // An empty lunch (start == end) is allowed anywhere.
        if self.lunch_start < self.lunch_end
            && (self.lunch_start < self.morning_start || self.lunch_end > self.evening_end)
        {
            return Err(TaskPulseError::Config(
                "work_window lunch break must lie within morning_start..evening_end".into(),
            ));
        }
        Ok(())
    }
}

/// Snapshot backend for the timer registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotBackend {
    Json,
    Sqlite,
}

/// Timer registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,
    /// Persist the registry every N ticks (commands always persist).
    #[serde(default = "default_persist_every_ticks")]
    pub persist_every_ticks: u32,
    #[serde(default = "default_backend")]
    pub backend: SnapshotBackend,
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}

fn default_tick_millis() -> u64 { 1000 }
fn default_persist_every_ticks() -> u32 { 1 }
fn default_backend() -> SnapshotBackend { SnapshotBackend::Json }

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            tick_millis: default_tick_millis(),
            persist_every_ticks: default_persist_every_ticks(),
            backend: default_backend(),
            snapshot_path: None,
        }
    }
}

impl TimerConfig {
    /// Resolved snapshot location for the configured backend.
    pub fn resolved_snapshot_path(&self) -> PathBuf {
        self.snapshot_path.clone().unwrap_or_else(|| {
            let file = match self.backend {
                SnapshotBackend::Json => "timers.json",
                SnapshotBackend::Sqlite => "timers.db",
            };
            TaskPulseConfig::home_dir().join(file)
        })
    }
}

/// Reminder scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderConfig {
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_pre_start_minutes")]
    pub pre_start_minutes: i64,
    #[serde(default = "default_overdue_grace_minutes")]
    pub overdue_grace_minutes: i64,
    #[serde(default = "default_overdue_window_minutes")]
    pub overdue_window_minutes: i64,
    /// Re-raise the overdue notice on every refresh inside the overdue window.
    /// Off by default: the toast is shown once per overdue stretch and later
    /// refreshes only keep the flag. Set `true` to notify on every refresh.
    #[serde(default)]
    pub repeat_overdue_notice: bool,
}

fn default_refresh_interval_secs() -> u64 { 60 }
fn default_pre_start_minutes() -> i64 { 30 }
fn default_overdue_grace_minutes() -> i64 { 5 }
fn default_overdue_window_minutes() -> i64 { 60 }

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
            pre_start_minutes: default_pre_start_minutes(),
            overdue_grace_minutes: default_overdue_grace_minutes(),
            overdue_window_minutes: default_overdue_window_minutes(),
            repeat_overdue_notice: false,
        }
    }
}

/// Auto-scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_duration_minutes")]
    pub default_duration_minutes: i64,
    /// Minimum distance from "now" for a same-day slot.
    #[serde(default = "default_lead_minutes")]
    pub lead_minutes: i64,
    #[serde(default = "default_granularity_minutes")]
    pub granularity_minutes: u32,
    #[serde(default)]
    pub history_path: Option<PathBuf>,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_duration_minutes() -> i64 { 30 }
fn default_lead_minutes() -> i64 { 30 }
fn default_granularity_minutes() -> u32 { 15 }
fn default_history_limit() -> usize { 100 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_duration_minutes: default_duration_minutes(),
            lead_minutes: default_lead_minutes(),
            granularity_minutes: default_granularity_minutes(),
            history_path: None,
            history_limit: default_history_limit(),
        }
    }
}

impl SchedulerConfig {
    pub fn resolved_history_path(&self) -> PathBuf {
        self.history_path
            .clone()
            .unwrap_or_else(|| TaskPulseConfig::home_dir().join("schedule_history.json"))
    }
}

/// Notification sink configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub webhook_headers: Vec<(String, String)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_work_window() {
        let config = TaskPulseConfig::default();
        assert_eq!(config.work_window.morning_start, 9);
        assert_eq!(config.work_window.evening_end, 22);
        assert_eq!(config.work_window.lunch_start, 12);
        assert_eq!(config.work_window.lunch_end, 13);
        assert_eq!(config.scheduler.history_limit, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: TaskPulseConfig = toml::from_str(
            r#"
            [work_window]
            morning_start = 8

            [timer]
            backend = "sqlite"
            "#,
        )
        .unwrap();
        assert_eq!(config.work_window.morning_start, 8);
        assert_eq!(config.work_window.evening_end, 22);
        assert_eq!(config.timer.backend, SnapshotBackend::Sqlite);
        assert_eq!(config.timer.tick_millis, 1000);
        assert_eq!(config.reminders.refresh_interval_secs, 60);
    }

    #[test]
    fn test_invalid_window_rejected() {
        let mut config = TaskPulseConfig::default();
        config.work_window.morning_start = 23;
        assert!(matches!(config.validate(), Err(TaskPulseError::Config(_))));
    }

    #[test]
    fn test_lunch_outside_window_rejected() {
        let mut config = TaskPulseConfig::default();
        config.work_window.lunch_start = 0;
        config.work_window.lunch_end = 24;
        assert!(matches!(config.validate(), Err(TaskPulseError::Config(_))));

        config.work_window.lunch_start = 8;
        config.work_window.lunch_end = 10;
        assert!(config.validate().is_err());

        config.work_window.lunch_start = 23;
        config.work_window.lunch_end = 23;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_repeat_overdue_notice_opt_in() {
        assert!(!ReminderConfig::default().repeat_overdue_notice);

        let config: TaskPulseConfig = toml::from_str(
            r#"
            [reminders]
            repeat_overdue_notice = true
            "#,
        )
        .unwrap();
        assert!(config.reminders.repeat_overdue_notice);
        assert_eq!(config.reminders.pre_start_minutes, 30);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = TaskPulseConfig::default();
        config.store.base_url = "http://tasks.local/api".into();
        config.save_to(&path).unwrap();

        let loaded = TaskPulseConfig::load_from(&path).unwrap();
        assert_eq!(loaded.store.base_url, "http://tasks.local/api");
        assert_eq!(loaded.work_window, WorkWindow::default());
    }
}
