/*
[INPUT]:  TaskState snapshots from the orchestrator + a tick handler slot
[OUTPUT]: Once-per-second remaining-seconds ticks; a terminal tick <= 0 exactly once
[POS]:    Execution layer - the one background counting worker
[UPDATE]: When changing tick cadence, respawn semantics, or the handler contract
[UPDATE]: 2026-08-22 Replace add-listener registration with a single handler slot
*/

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Result, anyhow};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Interval, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::model::TaskState;

/// Callback invoked on every tick. Values <= 0 signal completion.
pub type TickHandler = Box<dyn Fn(i64) + Send + 'static>;

/// The part of the state the counting worker needs; sufficient to resume
/// counting without consulting anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownSnapshot {
    pub active: bool,
    pub seconds_remaining: u64,
}

impl CountdownSnapshot {
    pub fn of(state: &TaskState) -> Self {
        Self {
            active: state.active_task.is_some(),
            seconds_remaining: state.seconds_remaining,
        }
    }
}

#[derive(Debug)]
struct WorkerLink {
    snapshot_tx: mpsc::UnboundedSender<CountdownSnapshot>,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns at most one background counting worker and bridges its ticks to the
/// orchestrator. Constructed once at process start and passed by reference;
/// there is deliberately no global instance.
pub struct CountdownCoordinator {
    handler: Arc<Mutex<Option<TickHandler>>>,
    worker: Option<WorkerLink>,
}

impl CountdownCoordinator {
    /// Create the coordinator.
    ///
    /// Fails when no Tokio runtime is available: without one the counting
    /// worker can never be spawned, and that is a startup error rather than a
    /// silent per-tick failure.
    pub fn new() -> Result<Self> {
        tokio::runtime::Handle::try_current()
            .map_err(|_| anyhow!("countdown worker requires a Tokio runtime"))?;

        Ok(Self {
            handler: Arc::new(Mutex::new(None)),
            worker: None,
        })
    }

    /// Install the tick handler.
    ///
    /// Replace semantics: repeated registration swaps the previous handler out
    /// instead of stacking another one, so one tick can never fan out into
    /// duplicate dispatches.
    pub fn set_handler<F>(&self, handler: F)
    where
        F: Fn(i64) + Send + 'static,
    {
        *lock_slot(&self.handler) = Some(Box::new(handler));
    }

    /// Push the latest snapshot to the counting worker.
    ///
    /// Transparently respawns the worker when it was stopped and the snapshot
    /// carries an active task.
    pub fn send(&mut self, snapshot: CountdownSnapshot) {
        if self.worker.is_none() {
            if !snapshot.active {
                return;
            }
            self.spawn_worker();
        }

        let Some(worker) = self.worker.as_ref() else {
            return;
        };
        if worker.snapshot_tx.send(snapshot).is_err() {
            debug!("countdown worker channel closed; dropping stale link");
            self.worker = None;
        }
    }

    /// Terminate the counting worker. Safe to call when already stopped.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        worker.shutdown.cancel();
        drop(worker.handle);
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }

    fn spawn_worker(&mut self) {
        let (snapshot_tx, snapshot_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let worker = CountdownWorker::new(snapshot_rx, self.handler.clone(), shutdown.clone());

        let handle = tokio::spawn(async move { worker.run().await });
        self.worker = Some(WorkerLink {
            snapshot_tx,
            shutdown,
            handle,
        });
    }
}

impl Drop for CountdownCoordinator {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock_slot(slot: &Mutex<Option<TickHandler>>) -> MutexGuard<'_, Option<TickHandler>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

struct CountdownWorker {
    snapshot_rx: mpsc::UnboundedReceiver<CountdownSnapshot>,
    handler: Arc<Mutex<Option<TickHandler>>>,
    shutdown: CancellationToken,
    remaining: i64,
    counting: bool,
}

impl CountdownWorker {
    fn new(
        snapshot_rx: mpsc::UnboundedReceiver<CountdownSnapshot>,
        handler: Arc<Mutex<Option<TickHandler>>>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            snapshot_rx,
            handler,
            shutdown,
            remaining: 0,
            counting: false,
        }
    }

    async fn run(mut self) {
        let mut ticker = interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    debug!("countdown worker shutdown requested");
                    return;
                }
                snapshot = self.snapshot_rx.recv() => {
                    match snapshot {
                        Some(snapshot) => self.apply_snapshot(snapshot, &mut ticker),
                        None => return,
                    }
                }
                _ = ticker.tick(), if self.counting => {
                    self.remaining -= 1;
                    self.emit(self.remaining);
                    if self.remaining <= 0 {
                        // Terminal tick emitted; idle until the next snapshot.
                        self.counting = false;
                    }
                }
            }
        }
    }

    fn apply_snapshot(&mut self, snapshot: CountdownSnapshot, ticker: &mut Interval) {
        if !snapshot.active {
            self.counting = false;
            return;
        }

        let remaining = i64::try_from(snapshot.seconds_remaining).unwrap_or(i64::MAX);
        if self.counting && remaining == self.remaining {
            // Echo of our own tick coming back through the orchestrator;
            // keep the current cadence instead of resetting it.
            return;
        }

        self.remaining = remaining;
        if remaining <= 0 {
            // A zero-length session still owes its terminal tick; emit it now
            // instead of idling forever.
            self.counting = false;
            self.emit(0);
            return;
        }
        self.counting = true;
        ticker.reset();
    }

    fn emit(&self, value: i64) {
        let slot = lock_slot(&self.handler);
        match slot.as_ref() {
            Some(handler) => handler(value),
            None => debug!(value, "countdown tick with no handler installed; dropped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::timeout;

    fn channel_handler() -> (impl Fn(i64) + Send + 'static, mpsc::UnboundedReceiver<i64>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (move |value| { let _ = tx.send(value); }, rx)
    }

    fn active(seconds_remaining: u64) -> CountdownSnapshot {
        CountdownSnapshot {
            active: true,
            seconds_remaining,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn counts_down_once_per_second() {
        let mut coordinator = CountdownCoordinator::new().unwrap();
        let (handler, mut rx) = channel_handler();
        coordinator.set_handler(handler);

        coordinator.send(active(3));

        assert_eq!(rx.recv().await, Some(2));
        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_tick_is_emitted_exactly_once() {
        let mut coordinator = CountdownCoordinator::new().unwrap();
        let (handler, mut rx) = channel_handler();
        coordinator.set_handler(handler);

        coordinator.send(active(1));

        assert_eq!(rx.recv().await, Some(0));
        // The worker goes idle after the terminal tick; nothing else arrives.
        let extra = timeout(Duration::from_secs(10), rx.recv()).await;
        assert!(extra.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_second_snapshot_gets_its_terminal_tick_immediately() {
        let mut coordinator = CountdownCoordinator::new().unwrap();
        let (handler, mut rx) = channel_handler();
        coordinator.set_handler(handler);

        coordinator.send(active(0));

        assert_eq!(rx.recv().await, Some(0));
        // Exactly once; the worker idles afterwards.
        let extra = timeout(Duration::from_secs(10), rx.recv()).await;
        assert!(extra.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn resubscribing_replaces_the_previous_handler() {
        let mut coordinator = CountdownCoordinator::new().unwrap();

        let stale = Arc::new(AtomicUsize::new(0));
        let stale_count = stale.clone();
        coordinator.set_handler(move |_| {
            stale_count.fetch_add(1, Ordering::SeqCst);
        });

        let (handler, mut rx) = channel_handler();
        coordinator.set_handler(handler);

        coordinator.send(active(2));
        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, Some(0));
        assert_eq!(stale.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_and_send_respawns() {
        let mut coordinator = CountdownCoordinator::new().unwrap();
        let (handler, mut rx) = channel_handler();
        coordinator.set_handler(handler);

        coordinator.send(active(60));
        assert!(coordinator.is_running());

        coordinator.stop();
        coordinator.stop();

        // Stopped worker delivers nothing further.
        let extra = timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(extra.is_err());

        // The next active snapshot transparently recreates the worker.
        coordinator.send(active(2));
        assert!(coordinator.is_running());
        assert_eq!(rx.recv().await, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn inactive_snapshot_does_not_spawn_a_worker() {
        let mut coordinator = CountdownCoordinator::new().unwrap();
        coordinator.send(CountdownSnapshot {
            active: false,
            seconds_remaining: 0,
        });
        assert!(!coordinator.is_running());
    }
}
