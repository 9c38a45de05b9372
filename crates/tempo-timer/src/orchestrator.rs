/*
[INPUT]:  Lifecycle actions from the frontend + ticks from the counting worker
[OUTPUT]: Reduced TaskState with persistence, display, cue, and worker side effects
[POS]:    Coordination layer - the single dispatch loop
[UPDATE]: When changing the effect execution order or the session exit policy
*/

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::countdown::{CountdownCoordinator, CountdownSnapshot};
use crate::cue::{ArmedCue, CueSource};
use crate::display::StatusDisplay;
use crate::effects::{Effect, plan_effects};
use crate::model::TaskState;
use crate::reducer::{TaskAction, reduce};
use crate::storage::StateStorage;

/// Messages draining into the orchestrator's dispatch loop.
#[derive(Debug)]
pub enum TimerEvent {
    /// Remaining-seconds value from the counting worker; <= 0 means done.
    Tick(i64),
    /// User-initiated lifecycle action.
    Dispatch(TaskAction),
}

/// Wires the reducer, countdown coordinator, persistence, cue, and status
/// display together. Dispatch is synchronous and atomic: no two actions ever
/// interleave mid-transition.
pub struct Orchestrator {
    state: TaskState,
    storage: StateStorage,
    coordinator: CountdownCoordinator,
    display: Box<dyn StatusDisplay>,
    cue_source: Box<dyn CueSource>,
    cue: ArmedCue,
    event_tx: mpsc::UnboundedSender<TimerEvent>,
    event_rx: mpsc::UnboundedReceiver<TimerEvent>,
    shutdown: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        state: TaskState,
        storage: StateStorage,
        coordinator: CountdownCoordinator,
        display: Box<dyn StatusDisplay>,
        cue_source: Box<dyn CueSource>,
        shutdown: CancellationToken,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Self {
            state,
            storage,
            coordinator,
            display,
            cue_source,
            cue: ArmedCue::default(),
            event_tx,
            event_rx,
            shutdown,
        }
    }

    /// Sender used by frontends to dispatch lifecycle actions.
    pub fn event_sender(&self) -> mpsc::UnboundedSender<TimerEvent> {
        self.event_tx.clone()
    }

    pub fn state(&self) -> &TaskState {
        &self.state
    }

    /// Run the dispatch loop until the active session ends or shutdown is
    /// requested. Shutdown interrupts the active task so the record is
    /// stamped and persisted before exit.
    pub async fn run(mut self) -> Result<TaskState> {
        self.install_tick_handler();

        let mut session_seen = self.state.active_task.is_some();
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("shutdown requested");
                    if self.state.active_task.is_some() {
                        self.apply(TaskAction::Cancel { at: Utc::now() }).await?;
                    }
                    break;
                }
                event = self.event_rx.recv() => {
                    let Some(event) = event else {
                        break;
                    };
                    match event {
                        TimerEvent::Tick(value) => self.handle_tick(value).await?,
                        TimerEvent::Dispatch(action) => self.apply(action).await?,
                    }

                    if self.state.active_task.is_some() {
                        session_seen = true;
                    } else if session_seen {
                        debug!("session finished; leaving dispatch loop");
                        break;
                    }
                }
            }
        }

        self.coordinator.stop();
        Ok(self.state)
    }

    fn install_tick_handler(&self) {
        let tx = self.event_tx.clone();
        self.coordinator.set_handler(move |value| {
            let _ = tx.send(TimerEvent::Tick(value));
        });
    }

    async fn handle_tick(&mut self, value: i64) -> Result<()> {
        if self.state.active_task.is_none() {
            // Expected race between stop() and an in-flight tick.
            debug!(value, "tick with no active task; dropped");
            return Ok(());
        }

        if value <= 0 {
            self.cue.fire();
            self.apply(TaskAction::Complete { at: Utc::now() }).await
        } else {
            let seconds_remaining = u64::try_from(value).unwrap_or(0);
            self.apply(TaskAction::Tick { seconds_remaining }).await
        }
    }

    async fn apply(&mut self, action: TaskAction) -> Result<()> {
        let next = reduce(&self.state, &action);
        let effects = plan_effects(&self.state, &next);
        self.state = next;

        for effect in effects {
            self.run_effect(effect).await?;
        }
        Ok(())
    }

    async fn run_effect(&mut self, effect: Effect) -> Result<()> {
        match effect {
            Effect::Persist => self
                .storage
                .save(&self.state)
                .await
                .context("persist task state"),
            Effect::StopCountdown => {
                self.coordinator.stop();
                Ok(())
            }
            Effect::UpdateDisplay => {
                let idle = self.state.active_task.is_none();
                self.display
                    .update(&self.state.formatted_seconds_remaining, idle);
                Ok(())
            }
            Effect::ForwardSnapshot => {
                self.coordinator.send(CountdownSnapshot::of(&self.state));
                Ok(())
            }
            Effect::ArmCue => {
                self.cue.arm(self.cue_source.as_ref());
                Ok(())
            }
            Effect::DisarmCue => {
                self.cue.disarm();
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cue::PreparedCue;
    use crate::model::{Task, TaskKind};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    struct CountingCue(Arc<AtomicUsize>);

    impl CueSource for CountingCue {
        fn prepare(&self) -> PreparedCue {
            let plays = self.0.clone();
            Box::new(move || {
                plays.fetch_add(1, Ordering::SeqCst);
            })
        }
    }

    struct RecordingDisplay(Arc<Mutex<Vec<(String, bool)>>>);

    impl StatusDisplay for RecordingDisplay {
        fn update(&mut self, formatted: &str, idle: bool) {
            self.0.lock().unwrap().push((formatted.to_string(), idle));
        }
    }

    struct Harness {
        orchestrator: Orchestrator,
        plays: Arc<AtomicUsize>,
        titles: Arc<Mutex<Vec<(String, bool)>>>,
        _dir: TempDir,
    }

    fn harness() -> Harness {
        let dir = TempDir::new().unwrap();
        let storage = StateStorage::with_path(dir.path().join("state.json"));
        let coordinator = CountdownCoordinator::new().unwrap();
        let plays = Arc::new(AtomicUsize::new(0));
        let titles = Arc::new(Mutex::new(Vec::new()));

        let orchestrator = Orchestrator::new(
            TaskState::initial(),
            storage,
            coordinator,
            Box::new(RecordingDisplay(titles.clone())),
            Box::new(CountingCue(plays.clone())),
            CancellationToken::new(),
        );

        Harness {
            orchestrator,
            plays,
            titles,
            _dir: dir,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn two_second_scenario_fires_cue_once_and_completes() {
        let mut h = harness();
        let task = Task::new("session", TaskKind::Focus, 2);
        h.orchestrator
            .apply(TaskAction::Start(task))
            .await
            .unwrap();
        assert!(h.orchestrator.cue.is_armed());

        h.orchestrator.handle_tick(1).await.unwrap();
        assert_eq!(h.orchestrator.state.seconds_remaining, 1);
        assert_eq!(h.orchestrator.state.formatted_seconds_remaining, "00:01");

        h.orchestrator.handle_tick(0).await.unwrap();
        assert!(h.orchestrator.state.active_task.is_none());
        assert_eq!(h.orchestrator.state.seconds_remaining, 0);
        assert_eq!(h.orchestrator.state.formatted_seconds_remaining, "00:00");
        assert_eq!(h.plays.load(Ordering::SeqCst), 1);

        let titles = h.titles.lock().unwrap();
        assert!(titles.contains(&("00:01".to_string(), false)));
        assert_eq!(titles.last(), Some(&("00:00".to_string(), true)));
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_terminal_ticks_fire_the_cue_once() {
        let mut h = harness();
        let task = Task::new("session", TaskKind::Focus, 1);
        h.orchestrator
            .apply(TaskAction::Start(task))
            .await
            .unwrap();

        h.orchestrator.handle_tick(0).await.unwrap();
        h.orchestrator.handle_tick(0).await.unwrap();
        h.orchestrator.handle_tick(-1).await.unwrap();

        assert_eq!(h.plays.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_without_an_active_task_are_dropped() {
        let mut h = harness();
        h.orchestrator.handle_tick(5).await.unwrap();
        assert_eq!(h.orchestrator.state, TaskState::initial());
        assert_eq!(h.plays.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_disarms_the_cue_and_stops_the_worker() {
        let mut h = harness();
        let task = Task::new("session", TaskKind::Focus, 60);
        h.orchestrator
            .apply(TaskAction::Start(task))
            .await
            .unwrap();
        assert!(h.orchestrator.coordinator.is_running());

        h.orchestrator
            .apply(TaskAction::Cancel { at: Utc::now() })
            .await
            .unwrap();

        assert!(!h.orchestrator.cue.is_armed());
        assert!(!h.orchestrator.coordinator.is_running());
        let record = &h.orchestrator.state.tasks[0];
        assert!(record.interrupted_at.is_some());
        assert_eq!(h.plays.load(Ordering::SeqCst), 0);
    }
}
