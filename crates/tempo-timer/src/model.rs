/*
[INPUT]:  Session parameters (kind, label, duration) and countdown progress
[OUTPUT]: Task records and the persisted TaskState aggregate
[POS]:    Domain layer - single source of truth for timer state
[UPDATE]: When changing the persisted state shape or cycle progression
[UPDATE]: 2026-08-21 Track pomodoro cycles and suggest the next session kind
*/

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Formatted rendering of an idle countdown.
pub const ZERO_FORMATTED: &str = "00:00";

/// Kind of session a task represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Focus,
    ShortBreak,
    LongBreak,
}

/// One focus/break interval. Records are never mutated in place; the reducer
/// replaces them inside `TaskState::tasks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub name: String,
    pub kind: TaskKind,
    /// Planned duration in seconds.
    pub duration_secs: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub interrupted_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(name: impl Into<String>, kind: TaskKind, duration_secs: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            kind,
            duration_secs,
            started_at: Utc::now(),
            completed_at: None,
            interrupted_at: None,
        }
    }
}

/// The single persisted/reactive aggregate.
///
/// Invariants: at most one active task; `seconds_remaining` is 0 whenever
/// `active_task` is `None`; `formatted_seconds_remaining` is always the MM:SS
/// rendering of `seconds_remaining`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskState {
    /// Session history plus the in-flight record, insertion order significant.
    pub tasks: Vec<Task>,
    pub active_task: Option<Task>,
    pub seconds_remaining: u64,
    pub formatted_seconds_remaining: String,
    /// Count of completed focus sessions; drives break-kind suggestions.
    pub current_cycle: u32,
}

impl TaskState {
    pub fn initial() -> Self {
        Self {
            tasks: Vec::new(),
            active_task: None,
            seconds_remaining: 0,
            formatted_seconds_remaining: ZERO_FORMATTED.to_string(),
            current_cycle: 0,
        }
    }

    /// Reset timer-in-progress fields. A resumed process must never appear to
    /// still be counting down a task that was active when it last exited,
    /// because the counting worker does not survive a restart.
    pub fn neutralized(mut self) -> Self {
        self.active_task = None;
        self.seconds_remaining = 0;
        self.formatted_seconds_remaining = ZERO_FORMATTED.to_string();
        self
    }
}

/// Canonical MM:SS rendering. Minutes are not wrapped, so long sessions render
/// as e.g. "90:00".
pub fn format_seconds(secs: u64) -> String {
    let minutes = secs / 60;
    let seconds = secs % 60;
    format!("{minutes:02}:{seconds:02}")
}

/// Suggest the session kind that follows a completed focus session.
/// Every `cycles_per_long_break`-th cycle earns a long break.
pub fn next_task_kind(current_cycle: u32, cycles_per_long_break: u32) -> TaskKind {
    if cycles_per_long_break > 0 && current_cycle % cycles_per_long_break == 0 {
        TaskKind::LongBreak
    } else {
        TaskKind::ShortBreak
    }
}
