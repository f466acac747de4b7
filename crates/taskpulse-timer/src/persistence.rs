//! SQLite-backed timer snapshot store.
//! Alternative to the JSON file when the host already keeps a database.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Local};
use taskpulse_core::error::{Result, TaskPulseError};
use taskpulse_core::snapshot::{PersistedTimer, TimerSnapshot, TimerStatus};
use taskpulse_core::traits::SnapshotStore;

/// SQLite snapshot store. One row per timed task.
pub struct SqliteSnapshotStore {
    conn: Mutex<rusqlite::Connection>,
}

impl SqliteSnapshotStore {
    /// Open or create the timer database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = rusqlite::Connection::open(path).map_err(|e| db_err("DB open", e))?;
        Self::with_connection(conn)
    }

    /// Throwaway in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory().map_err(|e| db_err("DB open", e))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: rusqlite::Connection) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS timers (
                task_id TEXT PRIMARY KEY,
                status TEXT NOT NULL,            -- 'active', 'paused'
                elapsed_seconds INTEGER NOT NULL DEFAULT 0,
                start_time TEXT NOT NULL,        -- RFC 3339
                actual_start TEXT
            );
            ",
        )
        .map_err(|e| db_err("Migration", e))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, rusqlite::Connection>> {
        self.conn
            .lock()
            .map_err(|e| TaskPulseError::Persistence(format!("Lock poisoned: {e}")))
    }
}

fn db_err(context: &str, e: rusqlite::Error) -> TaskPulseError {
    TaskPulseError::Persistence(format!("{context}: {e}"))
}

fn parse_time(raw: &str) -> Option<DateTime<Local>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|d| d.with_timezone(&Local))
}

impl SnapshotStore for SqliteSnapshotStore {
    /// Replace every row in a single transaction.
    fn save(&self, snapshot: &TimerSnapshot) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(|e| db_err("Begin", e))?;
        tx.execute("DELETE FROM timers", [])
            .map_err(|e| db_err("Clear timers", e))?;
        for (task_id, timer) in &snapshot.0 {
            tx.execute(
                "INSERT INTO timers (task_id, status, elapsed_seconds, start_time, actual_start)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    task_id,
                    timer.status.to_string(),
                    timer.elapsed_seconds as i64,
                    timer.start_time.to_rfc3339(),
                    timer.actual_start.map(|t| t.to_rfc3339()),
                ],
            )
            .map_err(|e| db_err("Save timer", e))?;
        }
        tx.commit().map_err(|e| db_err("Commit", e))?;
        Ok(())
    }

    fn load(&self) -> Result<TimerSnapshot> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT task_id, status, elapsed_seconds, start_time, actual_start FROM timers")
            .map_err(|e| db_err("Prepare", e))?;
        let rows = stmt
            .query_map([], |row| {
                let task_id: String = row.get(0)?;
                let status: String = row.get(1)?;
                let elapsed: i64 = row.get(2)?;
                let start_time: String = row.get(3)?;
                let actual_start: Option<String> = row.get(4)?;
                Ok((task_id, status, elapsed, start_time, actual_start))
            })
            .map_err(|e| db_err("Load timers", e))?;

        let mut snapshot = TimerSnapshot::default();
        for row in rows {
            let (task_id, status, elapsed, start_time, actual_start) =
                row.map_err(|e| db_err("Read row", e))?;
            let status = match status.as_str() {
                "active" => TimerStatus::Active,
                "paused" => TimerStatus::Paused,
                other => {
                    tracing::warn!("⚠️ Skipping timer {task_id} with unknown status '{other}'");
                    continue;
                }
            };
            let Some(start_time) = parse_time(&start_time) else {
                tracing::warn!("⚠️ Skipping timer {task_id} with bad start_time");
                continue;
            };
            snapshot.0.insert(
                task_id,
                PersistedTimer {
                    status,
                    elapsed_seconds: elapsed.max(0) as u64,
                    start_time,
                    actual_start: actual_start.as_deref().and_then(parse_time),
                },
            );
        }
        Ok(snapshot)
    }
}
