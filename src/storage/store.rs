//! SQLite store for tasks and sessions
//!
//! The database holds two tables:
//!
//! ```text
//! tasks(id, name UNIQUE, is_running, current_start, minimum_minutes)
//! sessions(id, task_id -> tasks.id, start, end, duration_sec)
//! ```
//!
//! The schema is created idempotently on open. Databases written before
//! `minimum_minutes` existed get the column added in place.
//!
//! Reads go through [`Store`] directly. Mutations run inside
//! [`Store::write`], which wraps them in a `BEGIN IMMEDIATE` transaction so
//! the check-then-write sequence of an operation cannot interleave with a
//! second process working on the same file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDateTime;
use rusqlite::{
    params, params_from_iter, Connection, ErrorCode, OptionalExtension, Transaction,
    TransactionBehavior,
};
use thiserror::Error;

use crate::domain::{
    clamp_minimum_minutes, timestamp, ReportFilter, Session, SessionRecord, Task, TaskId,
    TaskState, TimestampError,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt timestamp in store: {0}")]
    Timestamp(#[from] TimestampError),

    #[error("Task '{0}' already exists")]
    Duplicate(String),
}

/// Handle to the task database
pub struct Store {
    /// Path to the SQLite database (`:memory:` for in-memory stores)
    path: PathBuf,

    /// Database connection
    conn: Connection,
}

impl Store {
    /// How long a writer waits for another process holding the lock
    const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

    /// Opens (and if needed creates) the store at the given path
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        Self::with_connection(path.to_path_buf(), conn)
    }

    /// Opens a private in-memory store
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(PathBuf::from(":memory:"), conn)
    }

    fn with_connection(path: PathBuf, conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(Self::BUSY_TIMEOUT)?;

        let store = Self { path, conn };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Creates missing tables and patches older layouts
    fn ensure_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                is_running INTEGER NOT NULL DEFAULT 0,
                current_start TIMESTAMP,
                minimum_minutes INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id INTEGER NOT NULL,
                start TIMESTAMP,
                end TIMESTAMP,
                duration_sec INTEGER,
                FOREIGN KEY(task_id) REFERENCES tasks(id)
            );
            ",
        )?;

        // Databases from before the minimum-minutes policy lack this column
        self.add_column_if_missing("tasks", "minimum_minutes", "INTEGER NOT NULL DEFAULT 0")?;

        self.conn.execute_batch(
            "
            CREATE INDEX IF NOT EXISTS idx_sessions_task ON sessions(task_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_start ON sessions(start);
            ",
        )?;

        Ok(())
    }

    fn column_exists(&self, table: &str, column: &str) -> Result<bool, StoreError> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2",
                params![table, column],
                |_| Ok(true),
            )
            .optional()?;

        Ok(found.unwrap_or(false))
    }

    fn add_column_if_missing(
        &self,
        table: &str,
        column: &str,
        definition: &str,
    ) -> Result<(), StoreError> {
        if self.column_exists(table, column)? {
            return Ok(());
        }

        let sql = format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, definition);
        match self.conn.execute(&sql, []) {
            Ok(_) => Ok(()),
            // Another process may have added it between the check and the ALTER
            Err(e) if e.to_string().contains("duplicate column") => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Returns the path to the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs `f` inside an immediate transaction and commits if it succeeds
    ///
    /// Any error returned by `f` rolls the transaction back.
    pub fn write<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Writer<'_>) -> Result<T, E>,
        E: From<StoreError>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StoreError::from)?;

        let value = f(&Writer { tx: &tx })?;
        tx.commit().map_err(StoreError::from)?;

        Ok(value)
    }

    /// Looks a task up by exact name
    pub fn find_task(&self, name: &str) -> Result<Option<Task>, StoreError> {
        find_task(&self.conn, name)
    }

    /// All tasks ordered by name
    pub fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, is_running, current_start, minimum_minutes
             FROM tasks
             ORDER BY name ASC",
        )?;

        let rows = stmt
            .query_map([], TaskRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(TaskRow::into_task).collect()
    }

    /// Number of sessions recorded for a task
    pub fn count_sessions(&self, task_id: TaskId) -> Result<usize, StoreError> {
        count_sessions(&self.conn, task_id)
    }

    /// Sessions matching a filter, ordered by task name then start time
    pub fn sessions(&self, filter: &ReportFilter) -> Result<Vec<SessionRecord>, StoreError> {
        let mut sql = String::from(
            "SELECT t.name, s.id, s.task_id, s.start, s.end, s.duration_sec
             FROM sessions s
             JOIN tasks t ON t.id = s.task_id
             WHERE s.start IS NOT NULL AND s.end IS NOT NULL",
        );
        let mut values: Vec<String> = Vec::new();

        if let Some(ref task) = filter.task {
            sql.push_str(" AND t.name = ?");
            values.push(task.clone());
        }
        if let Some(ref start) = filter.start {
            sql.push_str(&format!(" AND {} >= ?", normalized("s.start")));
            values.push(timestamp::to_store(start));
        }
        if let Some(ref end) = filter.end {
            sql.push_str(&format!(" AND {} <= ?", normalized("s.end")));
            values.push(timestamp::to_store(end));
        }
        sql.push_str(&format!(
            " ORDER BY t.name ASC, {} ASC, s.id ASC",
            normalized("s.start")
        ));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<i64>>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(task_name, id, task_id, start, end, duration_sec)| -> Result<_, StoreError> {
                Ok(SessionRecord {
                    task_name,
                    session: Session {
                        id,
                        task_id,
                        start: timestamp::from_store(&start)?,
                        end: timestamp::from_store(&end)?,
                        duration_sec: duration_sec.unwrap_or(0),
                    },
                })
            })
            .collect()
    }
}

/// Rewrites a stored timestamp column into the `STORE_FORMAT` shape
///
/// Older rows may use a `T` separator or a different fraction length, so
/// comparing the raw text against a bound is not reliable.
fn normalized(column: &str) -> String {
    format!("strftime('%Y-%m-%d %H:%M:%f', {})", column)
}

/// Mutating view of the store, only available inside [`Store::write`]
pub struct Writer<'a> {
    tx: &'a Transaction<'a>,
}

impl Writer<'_> {
    /// Looks a task up by exact name
    pub fn find_task(&self, name: &str) -> Result<Option<Task>, StoreError> {
        find_task(self.tx, name)
    }

    /// Looks a task up by id
    pub fn find_task_by_id(&self, id: TaskId) -> Result<Option<Task>, StoreError> {
        let row = self
            .tx
            .query_row(
                "SELECT id, name, is_running, current_start, minimum_minutes
                 FROM tasks WHERE id = ?1",
                params![id],
                TaskRow::from_row,
            )
            .optional()?;

        row.map(TaskRow::into_task).transpose()
    }

    /// Inserts an idle task and returns it
    pub fn insert_task(&self, name: &str, minimum_minutes: u32) -> Result<Task, StoreError> {
        let result = self.tx.execute(
            "INSERT INTO tasks (name, is_running, current_start, minimum_minutes)
             VALUES (?1, 0, NULL, ?2)",
            params![name, minimum_minutes],
        );

        match result {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                return Err(StoreError::Duplicate(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Task {
            id: self.tx.last_insert_rowid(),
            name: name.to_string(),
            state: TaskState::Idle,
            minimum_minutes,
        })
    }

    /// Marks a task running since `since`
    pub fn mark_running(&self, id: TaskId, since: &NaiveDateTime) -> Result<(), StoreError> {
        self.tx.execute(
            "UPDATE tasks SET is_running = 1, current_start = ?1 WHERE id = ?2",
            params![timestamp::to_store(since), id],
        )?;
        Ok(())
    }

    /// Marks a task idle and clears its open interval
    pub fn mark_idle(&self, id: TaskId) -> Result<(), StoreError> {
        self.tx.execute(
            "UPDATE tasks SET is_running = 0, current_start = NULL WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    /// Appends a completed session
    pub fn insert_session(
        &self,
        task_id: TaskId,
        start: &NaiveDateTime,
        end: &NaiveDateTime,
        duration_sec: i64,
    ) -> Result<Session, StoreError> {
        self.tx.execute(
            "INSERT INTO sessions (task_id, start, end, duration_sec) VALUES (?1, ?2, ?3, ?4)",
            params![
                task_id,
                timestamp::to_store(start),
                timestamp::to_store(end),
                duration_sec
            ],
        )?;

        Ok(Session {
            id: self.tx.last_insert_rowid(),
            task_id,
            start: *start,
            end: *end,
            duration_sec,
        })
    }

    /// Removes a task and all of its sessions, returning the session count
    pub fn delete_task(&self, id: TaskId) -> Result<usize, StoreError> {
        let removed = self
            .tx
            .execute("DELETE FROM sessions WHERE task_id = ?1", params![id])?;
        self.tx.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        Ok(removed)
    }

    /// Number of sessions recorded for a task
    pub fn count_sessions(&self, task_id: TaskId) -> Result<usize, StoreError> {
        count_sessions(self.tx, task_id)
    }
}

fn find_task(conn: &Connection, name: &str) -> Result<Option<Task>, StoreError> {
    let row = conn
        .query_row(
            "SELECT id, name, is_running, current_start, minimum_minutes
             FROM tasks WHERE name = ?1",
            params![name],
            TaskRow::from_row,
        )
        .optional()?;

    row.map(TaskRow::into_task).transpose()
}

fn count_sessions(conn: &Connection, task_id: TaskId) -> Result<usize, StoreError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sessions WHERE task_id = ?1",
        params![task_id],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

/// Raw `tasks` row before timestamp parsing
struct TaskRow {
    id: i64,
    name: String,
    is_running: bool,
    current_start: Option<String>,
    minimum_minutes: i64,
}

impl TaskRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            is_running: row.get::<_, i64>(2)? != 0,
            current_start: row.get(3)?,
            minimum_minutes: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
        })
    }

    fn into_task(self) -> Result<Task, StoreError> {
        // A running flag without a start time cannot be stopped meaningfully
        let state = match (self.is_running, self.current_start) {
            (true, Some(raw)) => TaskState::Running {
                since: timestamp::from_store(&raw)?,
            },
            _ => TaskState::Idle,
        };

        Ok(Task {
            id: self.id,
            name: self.name,
            state,
            minimum_minutes: clamp_minimum_minutes(self.minimum_minutes),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 14)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn add(store: &mut Store, name: &str, minutes: u32) -> Task {
        store
            .write(|w| w.insert_task(name, minutes))
            .unwrap()
    }

    #[test]
    fn test_store_creation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("tasks.db");
        let store = Store::open(&path).unwrap();

        assert!(store.path().exists());
    }

    #[test]
    fn test_open_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.db");

        {
            let mut store = Store::open(&path).unwrap();
            add(&mut store, "writing", 0);
        }

        let store = Store::open(&path).unwrap();
        assert_eq!(store.list_tasks().unwrap().len(), 1);
    }

    #[test]
    fn test_patches_legacy_tasks_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.db");

        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE tasks (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE,
                    is_running INTEGER NOT NULL DEFAULT 0,
                    current_start TIMESTAMP
                );
                INSERT INTO tasks (name) VALUES ('legacy');",
            )
            .unwrap();
        }

        let store = Store::open(&path).unwrap();
        assert!(store.column_exists("tasks", "minimum_minutes").unwrap());

        let task = store.find_task("legacy").unwrap().unwrap();
        assert_eq!(task.minimum_minutes, 0);
        drop(store);

        // Second open must not trip over the existing column
        Store::open(&path).unwrap();
    }

    #[test]
    fn test_reads_legacy_timestamps() {
        let store = Store::open_in_memory().unwrap();
        store
            .conn
            .execute_batch(
                "INSERT INTO tasks (name, is_running, current_start)
                 VALUES ('old', 1, '2025-01-14 09:00:00.123456');",
            )
            .unwrap();

        let task = store.find_task("old").unwrap().unwrap();
        assert!(task.is_running());
    }

    #[test]
    fn test_filters_legacy_session_timestamps() {
        let store = Store::open_in_memory().unwrap();
        store
            .conn
            .execute_batch(
                "INSERT INTO tasks (name) VALUES ('old');
                 INSERT INTO sessions (task_id, start, end, duration_sec) VALUES
                    (1, '2025-01-02 00:00:00', '2025-01-02 00:10:00', 600),
                    (1, '2025-01-01T23:00:00', '2025-01-01T23:30:00', 1800),
                    (1, '2025-01-02T08:00:00.250000', '2025-01-02T08:05:00', 300);",
            )
            .unwrap();

        let from_second = ReportFilter {
            start: Some(
                NaiveDate::from_ymd_opt(2025, 1, 2)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
            ),
            ..Default::default()
        };
        let durations: Vec<_> = store
            .sessions(&from_second)
            .unwrap()
            .iter()
            .map(|r| r.session.duration_sec)
            .collect();
        assert_eq!(durations, vec![600, 300]);

        let until_first = ReportFilter {
            end: Some(
                NaiveDate::from_ymd_opt(2025, 1, 1)
                    .unwrap()
                    .and_hms_milli_opt(23, 59, 59, 999)
                    .unwrap(),
            ),
            ..Default::default()
        };
        let hits = store.sessions(&until_first).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].session.duration_sec, 1800);

        let order: Vec<_> = store
            .sessions(&ReportFilter::default())
            .unwrap()
            .iter()
            .map(|r| r.session.duration_sec)
            .collect();
        assert_eq!(order, vec![1800, 600, 300]);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut store = Store::open_in_memory().unwrap();
        add(&mut store, "writing", 0);

        let result = store.write(|w| w.insert_task("writing", 5));
        assert!(matches!(result, Err(StoreError::Duplicate(ref n)) if n == "writing"));
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let mut store = Store::open_in_memory().unwrap();
        add(&mut store, "writing", 0);
        add(&mut store, "Writing", 0);

        assert!(store.find_task("WRITING").unwrap().is_none());
        assert_eq!(store.list_tasks().unwrap().len(), 2);
    }

    #[test]
    fn test_list_ordered_by_name() {
        let mut store = Store::open_in_memory().unwrap();
        add(&mut store, "zeta", 0);
        add(&mut store, "alpha", 0);
        add(&mut store, "mid", 0);

        let names: Vec<_> = store
            .list_tasks()
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_running_round_trip() {
        let mut store = Store::open_in_memory().unwrap();
        let task = add(&mut store, "writing", 0);

        store
            .write(|w| w.mark_running(task.id, &at(9, 0, 0)))
            .unwrap();
        let running = store.find_task("writing").unwrap().unwrap();
        assert_eq!(running.state.started_at(), Some(at(9, 0, 0)));

        store.write(|w| w.mark_idle(task.id)).unwrap();
        let idle = store.find_task("writing").unwrap().unwrap();
        assert_eq!(idle.state, TaskState::Idle);
    }

    #[test]
    fn test_failed_write_rolls_back() {
        let mut store = Store::open_in_memory().unwrap();
        let task = add(&mut store, "writing", 0);

        let result: Result<(), StoreError> = store.write(|w| {
            w.insert_session(task.id, &at(9, 0, 0), &at(9, 30, 0), 1800)?;
            Err(StoreError::Duplicate("boom".to_string()))
        });

        assert!(result.is_err());
        assert_eq!(store.count_sessions(task.id).unwrap(), 0);
    }

    #[test]
    fn test_delete_removes_only_own_sessions() {
        let mut store = Store::open_in_memory().unwrap();
        let a = add(&mut store, "a", 0);
        let b = add(&mut store, "b", 0);

        store
            .write(|w| {
                w.insert_session(a.id, &at(9, 0, 0), &at(9, 10, 0), 600)?;
                w.insert_session(a.id, &at(10, 0, 0), &at(10, 10, 0), 600)?;
                w.insert_session(b.id, &at(11, 0, 0), &at(11, 10, 0), 600)
            })
            .unwrap();

        let removed = store.write(|w| w.delete_task(a.id)).unwrap();
        assert_eq!(removed, 2);
        assert!(store.find_task("a").unwrap().is_none());
        assert_eq!(store.count_sessions(b.id).unwrap(), 1);
    }

    #[test]
    fn test_session_filters() {
        let mut store = Store::open_in_memory().unwrap();
        let a = add(&mut store, "a", 0);
        let b = add(&mut store, "b", 0);

        store
            .write(|w| {
                w.insert_session(b.id, &at(8, 0, 0), &at(8, 30, 0), 1800)?;
                w.insert_session(a.id, &at(10, 0, 0), &at(10, 10, 0), 600)?;
                w.insert_session(a.id, &at(9, 0, 0), &at(9, 10, 0), 600)
            })
            .unwrap();

        let all = store.sessions(&ReportFilter::default()).unwrap();
        let order: Vec<_> = all
            .iter()
            .map(|r| (r.task_name.as_str(), r.session.start))
            .collect();
        assert_eq!(
            order,
            vec![("a", at(9, 0, 0)), ("a", at(10, 0, 0)), ("b", at(8, 0, 0))]
        );

        let only_a = ReportFilter {
            task: Some("a".to_string()),
            ..Default::default()
        };
        assert_eq!(store.sessions(&only_a).unwrap().len(), 2);

        let window = ReportFilter {
            start: Some(at(8, 45, 0)),
            end: Some(at(9, 30, 0)),
            ..Default::default()
        };
        let hits = store.sessions(&window).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].session.start, at(9, 0, 0));
    }
}
