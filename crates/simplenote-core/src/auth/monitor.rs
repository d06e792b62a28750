use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::authority::{RefreshOutcome, SessionAuthority};

/// How often the monitor checks whether the session needs refreshing
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(60);

/// Shortest interval the loop accepts; tokio intervals cannot be zero
const MIN_MONITOR_INTERVAL: Duration = Duration::from_millis(1);

/// Buffer size for the tick outcome channel.
/// Slow subscribers just miss old outcomes.
const OUTCOME_CHANNEL_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Stopped,
    Running,
}

/// What one monitor tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The token was not close enough to expiry to bother
    Idle,
    Refreshed,
    /// The session can no longer be refreshed; the monitor stops
    Rejected(String),
    /// The tick broke down; the monitor tries again next tick
    Failed(String),
}

/// Background loop that refreshes the session shortly before it expires.
///
/// Must be started from within a Tokio runtime. Clone is cheap and all
/// clones control the same loop.
#[derive(Clone)]
pub struct SessionMonitor {
    inner: Arc<Inner>,
}

struct Inner {
    authority: SessionAuthority,
    interval: Duration,
    state: watch::Sender<MonitorState>,
    outcomes: broadcast::Sender<TickOutcome>,
    running: Mutex<Option<RunningLoop>>,
    generation: AtomicU64,
}

struct RunningLoop {
    generation: u64,
    cancel: CancellationToken,
}

impl SessionMonitor {
    pub fn new(authority: SessionAuthority) -> Self {
        Self::with_interval(authority, DEFAULT_MONITOR_INTERVAL)
    }

    /// Intervals shorter than a millisecond are raised to one.
    pub fn with_interval(authority: SessionAuthority, interval: Duration) -> Self {
        let interval = interval.max(MIN_MONITOR_INTERVAL);
        let (state, _) = watch::channel(MonitorState::Stopped);
        let (outcomes, _) = broadcast::channel(OUTCOME_CHANNEL_SIZE);
        Self {
            inner: Arc::new(Inner {
                authority,
                interval,
                state,
                outcomes,
                running: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Start monitoring. A loop that is already running is replaced.
    pub fn start(&self) {
        let mut running = self.inner.lock_running();
        if let Some(previous) = running.take() {
            debug!("Replacing running session monitor");
            previous.cancel.cancel();
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancellationToken::new();
        *running = Some(RunningLoop {
            generation,
            cancel: cancel.clone(),
        });
        self.inner.state.send_replace(MonitorState::Running);
        drop(running);

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.run(generation, cancel).await;
        });
    }

    /// Stop monitoring. Does nothing when already stopped.
    ///
    /// A refresh already on the wire is allowed to finish.
    pub fn stop(&self) {
        let mut running = self.inner.lock_running();
        if let Some(current) = running.take() {
            current.cancel.cancel();
            self.inner.state.send_replace(MonitorState::Stopped);
            info!("Session monitor stopped");
        }
    }

    pub fn state(&self) -> MonitorState {
        *self.inner.state.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.state() == MonitorState::Running
    }

    /// Observe Running/Stopped transitions
    pub fn watch_state(&self) -> watch::Receiver<MonitorState> {
        self.inner.state.subscribe()
    }

    /// Receive the outcome of every tick from now on
    pub fn subscribe(&self) -> broadcast::Receiver<TickOutcome> {
        self.inner.outcomes.subscribe()
    }
}

impl Inner {
    fn lock_running(&self) -> std::sync::MutexGuard<'_, Option<RunningLoop>> {
        self.running.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn run(&self, generation: u64, cancel: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "Session monitor started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let outcome = match AssertUnwindSafe(self.tick()).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(_) => TickOutcome::Failed("monitor tick panicked".to_string()),
            };

            match outcome {
                TickOutcome::Idle => debug!("Session fresh, nothing to do"),
                TickOutcome::Refreshed => debug!("Session refreshed ahead of expiry"),
                TickOutcome::Rejected(ref reason) => {
                    warn!(reason = %reason, "Session can no longer be refreshed")
                }
                TickOutcome::Failed(ref reason) => {
                    warn!(reason = %reason, "Session monitor tick failed")
                }
            }

            let stop = matches!(outcome, TickOutcome::Rejected(_));
            // No subscribers is fine
            let _ = self.outcomes.send(outcome);
            if stop {
                break;
            }
        }

        self.finish(generation);
    }

    async fn tick(&self) -> TickOutcome {
        if !self.authority.store().read().needs_refresh() {
            return TickOutcome::Idle;
        }
        match self.authority.refresh_outcome().await {
            RefreshOutcome::Refreshed => TickOutcome::Refreshed,
            RefreshOutcome::Rejected(reason) => TickOutcome::Rejected(reason),
            RefreshOutcome::Failed(reason) => TickOutcome::Failed(reason),
        }
    }

    /// Mark the monitor stopped, unless a newer loop has taken over
    fn finish(&self, generation: u64) {
        let mut running = self.lock_running();
        if running.as_ref().is_some_and(|r| r.generation == generation) {
            *running = None;
            self.state.send_replace(MonitorState::Stopped);
            info!("Session monitor stopped");
        }
    }
}
