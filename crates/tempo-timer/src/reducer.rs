/*
[INPUT]:  Current TaskState + one TaskAction
[OUTPUT]: Next TaskState (pure transition, no I/O)
[POS]:    Domain layer - task lifecycle state machine
[UPDATE]: When adding lifecycle actions or changing transition policy
*/

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::model::{Task, TaskKind, TaskState, ZERO_FORMATTED, format_seconds};

/// One state transition request.
///
/// Completion and interruption timestamps ride on the action rather than being
/// read from the clock inside `reduce`, so identical `(state, action)` pairs
/// always produce identical output.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskAction {
    /// Begin counting down a new task. No-op while another task is active.
    Start(Task),
    /// New remaining-seconds value from the counting worker.
    Tick { seconds_remaining: u64 },
    /// The countdown reached zero.
    Complete { at: DateTime<Utc> },
    /// The user abandoned the active task.
    Cancel { at: DateTime<Utc> },
}

/// Single source of truth for task lifecycle transitions.
pub fn reduce(state: &TaskState, action: &TaskAction) -> TaskState {
    match action {
        TaskAction::Start(task) => start(state, task),
        TaskAction::Tick { seconds_remaining } => tick(state, *seconds_remaining),
        TaskAction::Complete { at } => finish(state, *at, Outcome::Completed),
        TaskAction::Cancel { at } => finish(state, *at, Outcome::Interrupted),
    }
}

#[derive(Clone, Copy)]
enum Outcome {
    Completed,
    Interrupted,
}

fn start(state: &TaskState, task: &Task) -> TaskState {
    // At most one active task; re-starting never overwrites the one in flight.
    if state.active_task.is_some() {
        return state.clone();
    }

    let mut next = state.clone();
    next.tasks.push(task.clone());
    next.seconds_remaining = task.duration_secs;
    next.formatted_seconds_remaining = format_seconds(task.duration_secs);
    next.active_task = Some(task.clone());
    next
}

fn tick(state: &TaskState, seconds_remaining: u64) -> TaskState {
    // Ticks racing a stop are expected; without an active task they are noise.
    if state.active_task.is_none() {
        return state.clone();
    }

    let mut next = state.clone();
    next.seconds_remaining = seconds_remaining;
    next.formatted_seconds_remaining = format_seconds(seconds_remaining);
    next
}

fn finish(state: &TaskState, at: DateTime<Utc>, outcome: Outcome) -> TaskState {
    let Some(active) = state.active_task.as_ref() else {
        return state.clone();
    };

    let mut next = state.clone();
    next.tasks = stamp(&next.tasks, active.id, at, outcome);
    next.active_task = None;
    next.seconds_remaining = 0;
    next.formatted_seconds_remaining = ZERO_FORMATTED.to_string();
    if matches!(outcome, Outcome::Completed) && active.kind == TaskKind::Focus {
        next.current_cycle += 1;
    }
    next
}

fn stamp(tasks: &[Task], id: Uuid, at: DateTime<Utc>, outcome: Outcome) -> Vec<Task> {
    tasks
        .iter()
        .map(|task| {
            if task.id != id {
                return task.clone();
            }
            let mut task = task.clone();
            match outcome {
                Outcome::Completed => task.completed_at = Some(at),
                Outcome::Interrupted => task.interrupted_at = Some(at),
            }
            task
        })
        .collect()
}
