//! Task lifecycle: create, start, stop, toggle, delete
//!
//! Each task is a two-state machine:
//!
//! ```text
//!          start                stop (records a session)
//!   Idle ─────────▶ Running ───────────────────────▶ Idle
//! ```
//!
//! Delete is allowed from either state and removes the task for good.
//! Every mutation is a single store transaction, so a toggle from the shell's
//! task panel and a command typed elsewhere can never leave a task flagged
//! running without its interval, or record a session twice.

use chrono::NaiveDateTime;
use serde::Serialize;

use super::clock::{Clock, SystemClock};
use super::error::{TrackerError, TrackerResult};
use crate::domain::{credited_seconds, parse_minimum_minutes, Session, Task, TaskId, TaskState};
use crate::storage::{Store, StoreError, Writer};

/// Task lifecycle engine over a [`Store`]
pub struct Tracker<C: Clock = SystemClock> {
    store: Store,
    clock: C,
}

/// Transition performed by [`Tracker::toggle`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Toggled {
    Started { task: Task },
    Stopped { task: Task, session: Session },
}

/// Proof that a deletion was requested for a specific task
///
/// Obtained from [`Tracker::request_delete`] and consumed by
/// [`Tracker::confirm_delete`]. Presentation layers hold on to it while they
/// ask the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteToken {
    #[serde(skip)]
    task_id: TaskId,
    name: String,
    sessions: usize,
}

impl DeleteToken {
    /// Name of the task to delete
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of sessions that will be removed with the task
    pub fn sessions(&self) -> usize {
        self.sessions
    }
}

/// Result of [`Tracker::confirm_delete`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted { name: String, sessions_removed: usize },
    Cancelled { name: String },
}

impl Tracker<SystemClock> {
    /// Creates a tracker using the system clock
    pub fn new(store: Store) -> Self {
        Self::with_clock(store, SystemClock)
    }
}

impl<C: Clock> Tracker<C> {
    /// Creates a tracker with a custom clock
    pub fn with_clock(store: Store, clock: C) -> Self {
        Self { store, clock }
    }

    /// Returns the underlying store
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Returns the clock
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Creates an idle task
    ///
    /// `minute_floor` is clamped into `0..=60`; missing or non-numeric input
    /// means "record to the second".
    pub fn create(&mut self, name: &str, minute_floor: Option<&str>) -> TrackerResult<Task> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TrackerError::InvalidArgument(
                "task name must not be empty".to_string(),
            ));
        }

        let minimum_minutes = parse_minimum_minutes(minute_floor);

        self.store.write(|w| {
            if w.find_task(name)?.is_some() {
                return Err(TrackerError::AlreadyExists(name.to_string()));
            }

            w.insert_task(name, minimum_minutes).map_err(|e| match e {
                StoreError::Duplicate(name) => TrackerError::AlreadyExists(name),
                other => other.into(),
            })
        })
    }

    /// Starts the timer of an idle task
    pub fn start(&mut self, name: &str) -> TrackerResult<Task> {
        let now = self.clock.now();
        self.store.write(|w| {
            let task = require_task(w, name)?;
            start_in(w, task, now)
        })
    }

    /// Stops a running task and records the session
    ///
    /// Returns the stored session; its `duration_sec` is the elapsed time
    /// rounded to the second, raised to the task's minimum if shorter.
    pub fn stop(&mut self, name: &str) -> TrackerResult<Session> {
        let now = self.clock.now();
        self.store.write(|w| {
            let task = require_task(w, name)?;
            stop_in(w, task, now).map(|(_, session)| session)
        })
    }

    /// Stops a running task or starts an idle one
    pub fn toggle(&mut self, name: &str) -> TrackerResult<Toggled> {
        let now = self.clock.now();
        self.store.write(|w| {
            let task = require_task(w, name)?;
            if task.is_running() {
                let (task, session) = stop_in(w, task, now)?;
                Ok(Toggled::Stopped { task, session })
            } else {
                let task = start_in(w, task, now)?;
                Ok(Toggled::Started { task })
            }
        })
    }

    /// First half of a deletion: checks the task exists and describes it
    ///
    /// Nothing is changed until the token is confirmed.
    pub fn request_delete(&self, name: &str) -> TrackerResult<DeleteToken> {
        let task = self
            .store
            .find_task(name)?
            .ok_or_else(|| TrackerError::NotFound(name.to_string()))?;
        let sessions = self.store.count_sessions(task.id)?;

        Ok(DeleteToken {
            task_id: task.id,
            name: task.name,
            sessions,
        })
    }

    /// Second half of a deletion
    ///
    /// When approved, removes the task and all of its sessions in one
    /// transaction. Fails with `NotFound` if the task disappeared (or was
    /// replaced by a new task with the same name) since the request.
    pub fn confirm_delete(
        &mut self,
        token: DeleteToken,
        approved: bool,
    ) -> TrackerResult<DeleteOutcome> {
        if !approved {
            return Ok(DeleteOutcome::Cancelled { name: token.name });
        }

        self.store.write(|w| {
            match w.find_task_by_id(token.task_id)? {
                Some(task) if task.name == token.name => {}
                _ => return Err(TrackerError::NotFound(token.name.clone())),
            }

            let sessions_removed = w.delete_task(token.task_id)?;
            Ok(DeleteOutcome::Deleted {
                name: token.name.clone(),
                sessions_removed,
            })
        })
    }

    /// All tasks ordered by name
    pub fn list(&self) -> TrackerResult<Vec<Task>> {
        Ok(self.store.list_tasks()?)
    }

    /// Task names starting with `prefix`, ignoring case
    pub fn suggestions(&self, prefix: &str) -> TrackerResult<Vec<String>> {
        let prefix = prefix.to_lowercase();
        Ok(self
            .store
            .list_tasks()?
            .into_iter()
            .map(|t| t.name)
            .filter(|name| name.to_lowercase().starts_with(&prefix))
            .collect())
    }
}

fn require_task(w: &Writer<'_>, name: &str) -> TrackerResult<Task> {
    w.find_task(name)?
        .ok_or_else(|| TrackerError::NotFound(name.to_string()))
}

fn start_in(w: &Writer<'_>, mut task: Task, now: NaiveDateTime) -> TrackerResult<Task> {
    if task.is_running() {
        return Err(TrackerError::AlreadyRunning(task.name));
    }

    w.mark_running(task.id, &now)?;
    task.state = TaskState::Running { since: now };
    Ok(task)
}

fn stop_in(
    w: &Writer<'_>,
    mut task: Task,
    now: NaiveDateTime,
) -> TrackerResult<(Task, Session)> {
    let since = match task.state {
        TaskState::Running { since } => since,
        TaskState::Idle => return Err(TrackerError::NotActive(task.name)),
    };

    let elapsed_ms = (now - since).num_milliseconds();
    let duration_sec = credited_seconds(elapsed_ms, task.minimum_minutes);

    let session = w.insert_session(task.id, &since, &now, duration_sec)?;
    w.mark_idle(task.id)?;

    task.state = TaskState::Idle;
    Ok((task, session))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{format_duration, ReportFilter};
    use crate::tracker::ManualClock;
    use chrono::{Duration, NaiveDate};

    fn clock() -> ManualClock {
        ManualClock::new(
            NaiveDate::from_ymd_opt(2025, 1, 14)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        )
    }

    fn tracker() -> Tracker<ManualClock> {
        Tracker::with_clock(Store::open_in_memory().unwrap(), clock())
    }

    fn session_count(tracker: &Tracker<ManualClock>) -> usize {
        tracker
            .store()
            .sessions(&ReportFilter::default())
            .unwrap()
            .len()
    }

    #[test]
    fn create_clamps_floor() {
        let mut t = tracker();

        assert_eq!(t.create("a", Some("0")).unwrap().minimum_minutes, 0);
        assert_eq!(t.create("b", Some("-3")).unwrap().minimum_minutes, 0);
        assert_eq!(t.create("c", Some("61")).unwrap().minimum_minutes, 60);
        assert_eq!(t.create("d", Some("abc")).unwrap().minimum_minutes, 0);
        assert_eq!(t.create("e", None).unwrap().minimum_minutes, 0);
        assert_eq!(t.create("f", Some("15")).unwrap().minimum_minutes, 15);
    }

    #[test]
    fn create_rejects_duplicates() {
        let mut t = tracker();
        t.create("writing", None).unwrap();

        let err = t.create("writing", Some("5")).unwrap_err();
        assert!(matches!(err, TrackerError::AlreadyExists(ref n) if n == "writing"));
        assert_eq!(t.list().unwrap().len(), 1);
    }

    #[test]
    fn create_rejects_blank_name() {
        let mut t = tracker();
        assert!(matches!(
            t.create("   ", None),
            Err(TrackerError::InvalidArgument(_))
        ));
    }

    #[test]
    fn start_unknown_task() {
        let mut t = tracker();
        assert!(matches!(t.start("ghost"), Err(TrackerError::NotFound(_))));
    }

    #[test]
    fn double_start_keeps_original_start() {
        let mut t = tracker();
        t.create("reading", None).unwrap();

        let started = t.start("reading").unwrap();
        let since = started.state.started_at().unwrap();

        t.clock().advance(Duration::seconds(30));
        let err = t.start("reading").unwrap_err();
        assert!(matches!(err, TrackerError::AlreadyRunning(_)));

        let task = t.store().find_task("reading").unwrap().unwrap();
        assert_eq!(task.state.started_at(), Some(since));
        assert_eq!(session_count(&t), 0);
    }

    #[test]
    fn stop_idle_task_records_nothing() {
        let mut t = tracker();
        t.create("reading", None).unwrap();

        assert!(matches!(t.stop("reading"), Err(TrackerError::NotActive(_))));
        assert_eq!(session_count(&t), 0);
    }

    #[test]
    fn stop_applies_minimum_floor() {
        let mut t = tracker();
        t.create("writing", Some("10")).unwrap();
        t.start("writing").unwrap();

        t.clock().advance(Duration::seconds(2));
        let session = t.stop("writing").unwrap();

        assert_eq!(session.duration_sec, 600);
        assert_eq!(format_duration(session.duration_sec as f64), "00:10:00");
        assert_eq!(session.end - session.start, Duration::seconds(2));

        let task = t.store().find_task("writing").unwrap().unwrap();
        assert_eq!(task.state, TaskState::Idle);
    }

    #[test]
    fn stop_keeps_longer_sessions_exact() {
        let mut t = tracker();
        t.create("writing", Some("1")).unwrap();
        t.start("writing").unwrap();

        t.clock().advance(Duration::milliseconds(90_600));
        let session = t.stop("writing").unwrap();
        assert_eq!(session.duration_sec, 91);
    }

    #[test]
    fn stop_rounds_to_nearest_second() {
        let mut t = tracker();
        t.create("quick", None).unwrap();
        t.start("quick").unwrap();

        t.clock().advance(Duration::milliseconds(4_499));
        assert_eq!(t.stop("quick").unwrap().duration_sec, 4);
    }

    #[test]
    fn clock_going_backwards_counts_zero() {
        let mut t = tracker();
        t.create("odd", None).unwrap();
        t.start("odd").unwrap();

        t.clock().advance(Duration::seconds(-30));
        assert_eq!(t.stop("odd").unwrap().duration_sec, 0);
    }

    #[test]
    fn toggle_switches_state() {
        let mut t = tracker();
        t.create("focus", None).unwrap();

        let first = t.toggle("focus").unwrap();
        assert!(matches!(first, Toggled::Started { ref task } if task.is_running()));

        t.clock().advance(Duration::seconds(60));
        match t.toggle("focus").unwrap() {
            Toggled::Stopped { task, session } => {
                assert!(!task.is_running());
                assert_eq!(session.duration_sec, 60);
            }
            other => panic!("expected stop, got {:?}", other),
        }
    }

    #[test]
    fn declined_delete_changes_nothing() {
        let mut t = tracker();
        t.create("keep", None).unwrap();

        let token = t.request_delete("keep").unwrap();
        let outcome = t.confirm_delete(token, false).unwrap();

        assert_eq!(
            outcome,
            DeleteOutcome::Cancelled {
                name: "keep".to_string()
            }
        );
        assert!(t.store().find_task("keep").unwrap().is_some());
    }

    #[test]
    fn delete_removes_only_own_sessions() {
        let mut t = tracker();
        t.create("a", None).unwrap();
        t.create("b", None).unwrap();

        for name in ["a", "a", "b"] {
            t.start(name).unwrap();
            t.clock().advance(Duration::seconds(10));
            t.stop(name).unwrap();
        }

        let token = t.request_delete("a").unwrap();
        assert_eq!(token.sessions(), 2);

        let outcome = t.confirm_delete(token, true).unwrap();
        assert_eq!(
            outcome,
            DeleteOutcome::Deleted {
                name: "a".to_string(),
                sessions_removed: 2
            }
        );

        let remaining = t.store().sessions(&ReportFilter::default()).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].task_name, "b");
    }

    #[test]
    fn delete_running_task() {
        let mut t = tracker();
        t.create("busy", None).unwrap();
        t.start("busy").unwrap();

        let token = t.request_delete("busy").unwrap();
        t.confirm_delete(token, true).unwrap();
        assert!(t.list().unwrap().is_empty());
    }

    #[test]
    fn stale_token_is_rejected() {
        let mut t = tracker();
        t.create("temp", None).unwrap();

        let token = t.request_delete("temp").unwrap();
        let again = t.request_delete("temp").unwrap();
        t.confirm_delete(again, true).unwrap();

        // Re-created under the same name: the old token must not touch it
        t.create("temp", None).unwrap();
        assert!(matches!(
            t.confirm_delete(token, true),
            Err(TrackerError::NotFound(_))
        ));
        assert!(t.store().find_task("temp").unwrap().is_some());
    }

    #[test]
    fn request_delete_unknown() {
        let t = tracker();
        assert!(matches!(
            t.request_delete("nope"),
            Err(TrackerError::NotFound(_))
        ));
    }

    #[test]
    fn suggestions_ignore_case() {
        let mut t = tracker();
        t.create("Writing", None).unwrap();
        t.create("website", None).unwrap();
        t.create("reading", None).unwrap();

        assert_eq!(t.suggestions("w").unwrap(), vec!["Writing", "website"]);
        assert_eq!(t.suggestions("WRI").unwrap(), vec!["Writing"]);
        assert!(t.suggestions("x").unwrap().is_empty());
    }

    #[test]
    fn list_is_sorted_and_may_be_empty() {
        let mut t = tracker();
        assert!(t.list().unwrap().is_empty());

        t.create("b", None).unwrap();
        t.create("a", Some("5")).unwrap();
        let names: Vec<_> = t.list().unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
