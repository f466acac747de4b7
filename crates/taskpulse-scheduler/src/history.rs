//! Schedule history: a bounded log of accepted auto-schedule choices.
//!
//! Kept for later analysis (which hours and weekdays each domain tends to get).
//! Nothing reads it back to influence slot choice. Saved as pretty JSON next
//! to the rest of the local state; write failures are logged and ignored.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub domain: Option<String>,
    /// Hour of the chosen start, 0–23.
    pub hour: u32,
    /// 0 = Sunday … 6 = Saturday.
    pub day_of_week: u32,
    pub duration: i64,
}

impl HistoryEntry {
    pub fn new(domain: Option<&str>, start: NaiveDateTime, duration_minutes: i64) -> Self {
        Self {
            domain: domain.map(str::to_string),
            hour: start.hour(),
            day_of_week: start.weekday().num_days_from_sunday(),
            duration: duration_minutes,
        }
    }
}

/// Ring buffer of the most recent `limit` entries, optionally file-backed.
pub struct ScheduleHistory {
    entries: VecDeque<HistoryEntry>,
    limit: usize,
    path: Option<PathBuf>,
}

impl ScheduleHistory {
    /// In-memory only.
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            limit: limit.max(1),
            path: None,
        }
    }

    /// Load existing entries from `path` (missing or unreadable → empty) and
    /// save back to it on every record.
    pub fn open(path: &Path, limit: usize) -> Self {
        let mut history = Self::new(limit);
        history.path = Some(path.to_path_buf());
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(json) => match serde_json::from_str::<Vec<HistoryEntry>>(&json) {
                    Ok(entries) => history.entries = entries.into(),
                    Err(e) => tracing::warn!("⚠️ Failed to parse {}: {e}", path.display()),
                },
                Err(e) => tracing::warn!("⚠️ Failed to read {}: {e}", path.display()),
            }
        }
        history.trim();
        history
    }

    /// Append an entry, dropping the oldest past the limit.
    pub fn record(&mut self, entry: HistoryEntry) {
        self.entries.push_back(entry);
        self.trim();
        self.save();
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn trim(&mut self) {
        while self.entries.len() > self.limit {
            self.entries.pop_front();
        }
    }

    fn save(&self) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = self.write(path) {
            tracing::warn!("⚠️ Failed to save schedule history: {e}");
        }
    }

    fn write(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| format!("Create dir error: {e}"))?;
        }
        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| format!("Serialize error: {e}"))?;
        std::fs::write(path, json).map_err(|e| format!("Write error: {e}"))?;
        tracing::debug!("💾 Saved {} schedule history entries", self.entries.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn monday_at(hour: u32) -> NaiveDateTime {
        // 2025-03-10 is a Monday.
        NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(hour, 15, 0)
            .unwrap()
    }

    #[test]
    fn test_entry_fields() {
        let entry = HistoryEntry::new(Some("work"), monday_at(14), 45);
        assert_eq!(entry.hour, 14);
        assert_eq!(entry.day_of_week, 1);
        assert_eq!(entry.duration, 45);
        assert_eq!(entry.domain.as_deref(), Some("work"));
    }

    #[test]
    fn test_ring_buffer_keeps_latest() {
        let mut history = ScheduleHistory::new(3);
        for hour in 9..15 {
            history.record(HistoryEntry::new(None, monday_at(hour), 30));
        }
        assert_eq!(history.len(), 3);
        let hours: Vec<u32> = history.entries().map(|e| e.hour).collect();
        assert_eq!(hours, vec![12, 13, 14]);
    }

    #[test]
    fn test_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        {
            let mut history = ScheduleHistory::open(&path, 100);
            history.record(HistoryEntry::new(Some("study"), monday_at(10), 60));
        }
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"dayOfWeek\": 1"));

        let reloaded = ScheduleHistory::open(&path, 100);
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "[{").unwrap();
        assert!(ScheduleHistory::open(&path, 100).is_empty());
    }
}
