//! File-based timer snapshot store.
//! The registry is saved as one pretty JSON object keyed by task id,
//! human-readable, and the same layout the web client kept in local storage.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use taskpulse_core::error::{Result, TaskPulseError};
use taskpulse_core::snapshot::TimerSnapshot;
use taskpulse_core::traits::SnapshotStore;

/// JSON file snapshot store.
pub struct JsonSnapshotStore {
    path: PathBuf,
}

impl JsonSnapshotStore {
    /// Store at the given file path. Parent directories are created lazily.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for JsonSnapshotStore {
    fn save(&self, snapshot: &TimerSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| TaskPulseError::Persistence(format!("Create dir error: {e}")))?;
        }
        let json = serde_json::to_string_pretty(snapshot)?;
        // Write-then-rename so a crash mid-write keeps the previous snapshot.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)
            .map_err(|e| TaskPulseError::Persistence(format!("Write error: {e}")))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| TaskPulseError::Persistence(format!("Rename error: {e}")))?;
        tracing::debug!("💾 Saved {} timer(s) to {}", snapshot.len(), self.path.display());
        Ok(())
    }

    fn load(&self) -> Result<TimerSnapshot> {
        if !self.path.exists() {
            return Ok(TimerSnapshot::default());
        }
        let json = std::fs::read_to_string(&self.path)
            .map_err(|e| TaskPulseError::Persistence(format!("Read error: {e}")))?;
        Ok(serde_json::from_str(&json).unwrap_or_else(|e| {
            tracing::warn!("⚠️ Failed to parse {}: {e}", self.path.display());
            TimerSnapshot::default()
        }))
    }
}

/// In-process snapshot store for tests and `--offline` sessions.
#[derive(Default)]
pub struct MemorySnapshotStore {
    snapshot: Mutex<Option<TimerSnapshot>>,
    failing: AtomicBool,
    saves: AtomicUsize,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent save fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    /// Last successfully saved snapshot.
    pub fn saved(&self) -> Option<TimerSnapshot> {
        self.snapshot.lock().ok().and_then(|s| s.clone())
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::Relaxed)
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn save(&self, snapshot: &TimerSnapshot) -> Result<()> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(TaskPulseError::Persistence("storage unavailable".into()));
        }
        let mut slot = self
            .snapshot
            .lock()
            .map_err(|e| TaskPulseError::Persistence(format!("Lock poisoned: {e}")))?;
        *slot = Some(snapshot.clone());
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn load(&self) -> Result<TimerSnapshot> {
        Ok(self.saved().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;
    use taskpulse_core::snapshot::{PersistedTimer, TimerStatus};

    fn sample() -> TimerSnapshot {
        let mut snapshot = TimerSnapshot::default();
        snapshot.0.insert(
            "t-1".into(),
            PersistedTimer {
                status: TimerStatus::Active,
                elapsed_seconds: 90,
                start_time: Local::now(),
                actual_start: Some(Local::now()),
            },
        );
        snapshot
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSnapshotStore::new(&dir.path().join("timers.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSnapshotStore::new(&dir.path().join("state").join("timers.json"));
        let snapshot = sample();
        store.save(&snapshot).unwrap();
        assert_eq!(store.load().unwrap(), snapshot);

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"elapsedSeconds\": 90"));
    }

    #[test]
    fn test_corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timers.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(JsonSnapshotStore::new(&path).load().unwrap().is_empty());
    }
}
