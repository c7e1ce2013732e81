//! Poll loop coordinator
//!
//! Drives snapshot → classify → reconcile → sink → watchdog once per tick.
//!
//! ```text
//! Init ──start()──▶ Running ──stale──▶ Resyncing ──reacquired──▶ Running
//!                      │                                            │
//!                      └──── shutdown / max runtime / fatal ────────┴──▶ Stopped
//! ```

use crate::tracker_core::error_handler::ExponentialBackoff;
use crate::tracker_core::label::classify;
use crate::tracker_core::reconciler::{format_window, ReconciliationResult, Window, WindowReconciler};
use crate::tracker_core::sink_backend::{ConfirmedEvent, EventSink, SinkError};
use crate::tracker_core::source::{SnapshotSource, SourceError};
use crate::tracker_core::watchdog::LivenessWatchdog;
use chrono::Utc;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::{interval, timeout, MissedTickBehavior};

#[derive(Debug, Clone)]
pub struct PollConfig {
    pub poll_interval: Duration,
    /// Total run duration; `None` runs until stopped
    pub max_runtime: Option<Duration>,
    pub stale_threshold: Duration,
    pub acquire_timeout: Duration,
    pub read_timeout: Duration,
    /// Startup acquisition retries before giving up
    pub acquire_retries: u32,
    pub acquire_backoff_initial: Duration,
    pub acquire_backoff_max: Duration,
    /// Consecutive failed appends tolerated before the run aborts
    pub max_sink_failures: u32,
    pub min_overlap: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            max_runtime: None,
            stale_threshold: Duration::from_secs(300),
            acquire_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(10),
            acquire_retries: 3,
            acquire_backoff_initial: Duration::from_secs(5),
            acquire_backoff_max: Duration::from_secs(60),
            max_sink_failures: 5,
            min_overlap: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Init,
    Running,
    Resyncing,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Window read and aligned; `new_events` were queued for the sink
    Reconciled { new_events: usize },
    /// Window read but shared no overlap with the baseline
    Unalignable,
    /// Transient read failure, baseline kept
    ReadFailed,
    /// No source handle (reacquisition after resync failed)
    SourceUnavailable,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub events_confirmed: u64,
    pub events_persisted: u64,
    pub unalignable: u64,
    pub read_failures: u64,
    pub resyncs: u64,
    pub sink_failures: u64,
}

#[derive(Debug)]
pub enum TrackerError {
    /// Source could not be acquired at startup
    SourceUnavailable(String),
    /// Event log could not be created
    SinkInit(SinkError),
    /// Appends kept failing past the configured limit
    SinkFailure { consecutive: u32, last: SinkError },
    /// `tick` called before `start` or after stop
    NotRunning(CoordinatorState),
}

impl std::fmt::Display for TrackerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackerError::SourceUnavailable(msg) => {
                write!(f, "Snapshot source unavailable: {}", msg)
            }
            TrackerError::SinkInit(e) => write!(f, "Failed to initialize event log: {}", e),
            TrackerError::SinkFailure { consecutive, last } => write!(
                f,
                "Event log append failed {} times in a row: {}",
                consecutive, last
            ),
            TrackerError::NotRunning(state) => write!(f, "Coordinator is not running ({:?})", state),
        }
    }
}

impl std::error::Error for TrackerError {}

/// Process-wide reconciliation state owned by the coordinator
#[derive(Debug)]
pub struct EngineState {
    /// `None` at startup and after every resync
    pub previous_window: Option<Window>,
    pub watchdog: LivenessWatchdog,
    /// Confirmed events not yet durably appended, oldest first
    pub pending: VecDeque<ConfirmedEvent>,
    pub consecutive_sink_failures: u32,
}

impl EngineState {
    fn new(stale_threshold: Duration, now: Instant) -> Self {
        Self {
            previous_window: None,
            watchdog: LivenessWatchdog::new(stale_threshold, now),
            pending: VecDeque::new(),
            consecutive_sink_failures: 0,
        }
    }
}

pub struct PollCoordinator<S: SnapshotSource> {
    source: S,
    sink: Box<dyn EventSink>,
    reconciler: WindowReconciler,
    config: PollConfig,
    handle: Option<S::Handle>,
    state: CoordinatorState,
    engine: EngineState,
    summary: RunSummary,
}

impl<S: SnapshotSource> PollCoordinator<S> {
    pub fn new(source: S, sink: Box<dyn EventSink>, config: PollConfig) -> Self {
        Self {
            source,
            sink,
            reconciler: WindowReconciler::new(config.min_overlap),
            engine: EngineState::new(config.stale_threshold, Instant::now()),
            config,
            handle: None,
            state: CoordinatorState::Init,
            summary: RunSummary::default(),
        }
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    pub fn engine_state(&self) -> &EngineState {
        &self.engine
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Acquire the source (with backoff) and initialize the event log.
    pub async fn start(&mut self) -> Result<(), TrackerError> {
        if self.state != CoordinatorState::Init {
            return Err(TrackerError::NotRunning(self.state));
        }

        log::info!("🚀 Acquiring {} snapshot source", self.source.source_type());

        let mut backoff = ExponentialBackoff::new(
            self.config.acquire_backoff_initial,
            self.config.acquire_backoff_max,
            self.config.acquire_retries,
        );

        let handle = loop {
            match self.acquire_once().await {
                Ok(handle) => break handle,
                Err(e) => {
                    log::error!("❌ Source acquisition failed: {}", e);
                    if backoff.sleep().await.is_err() {
                        self.state = CoordinatorState::Stopped;
                        return Err(TrackerError::SourceUnavailable(format!(
                            "{} (after {} retries)",
                            e, self.config.acquire_retries
                        )));
                    }
                }
            }
        };

        if let Err(e) = self.sink.ensure_initialized().await {
            self.source.release(handle).await;
            self.state = CoordinatorState::Stopped;
            return Err(TrackerError::SinkInit(e));
        }
        log::info!("📊 Backend: {}", self.sink.backend_type());

        self.handle = Some(handle);
        self.engine.previous_window = None;
        self.engine.watchdog.reset(Instant::now());
        self.transition(CoordinatorState::Running, "source acquired");
        Ok(())
    }

    pub async fn tick(&mut self) -> Result<TickOutcome, TrackerError> {
        self.tick_at(Instant::now()).await
    }

    /// Run one poll cycle with `now` as the watchdog clock.
    pub async fn tick_at(&mut self, now: Instant) -> Result<TickOutcome, TrackerError> {
        match self.state {
            CoordinatorState::Running | CoordinatorState::Resyncing => {}
            other => return Err(TrackerError::NotRunning(other)),
        }

        self.summary.ticks += 1;
        let outcome = self.observe(now).await;

        self.drain_pending().await?;

        if self.state == CoordinatorState::Running && self.engine.watchdog.is_stale(now) {
            self.resync(now).await;
        }

        Ok(outcome)
    }

    /// Tick at the configured cadence until `shutdown` fires or the runtime elapses.
    pub async fn run(
        &mut self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<RunSummary, TrackerError> {
        if self.state == CoordinatorState::Init {
            let started = tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => None,
                result = self.start() => Some(result),
            };

            match started {
                Some(result) => result?,
                None => {
                    log::info!("🛑 Stop requested during startup");
                    self.stop().await;
                    return Ok(self.summary.clone());
                }
            }
        }

        let deadline = self
            .config
            .max_runtime
            .map(|runtime| tokio::time::Instant::now() + runtime);

        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        log::info!(
            "✅ Polling every {:?} (stale after {:?}, min overlap {}, runtime {})",
            self.config.poll_interval,
            self.config.stale_threshold,
            self.reconciler.min_overlap(),
            self.config
                .max_runtime
                .map(|d| format!("{:?}", d))
                .unwrap_or_else(|| "unbounded".to_string())
        );

        let result = loop {
            if *shutdown.borrow() {
                log::info!("🛑 Stop requested");
                break Ok(());
            }

            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        log::warn!("⚠️  Shutdown channel closed, stopping");
                        break Ok(());
                    }
                    continue;
                }
                _ = wait_until(deadline) => {
                    log::info!("⏱️  Maximum runtime reached, stopping");
                    break Ok(());
                }
            }

            if let Err(e) = self.tick_at(Instant::now()).await {
                break Err(e);
            }
        };

        self.stop().await;
        result.map(|_| self.summary.clone())
    }

    /// Release the source, make a last attempt at queued events, and flush the log.
    pub async fn stop(&mut self) {
        if self.state == CoordinatorState::Stopped {
            return;
        }

        if !self.engine.pending.is_empty() {
            if let Err(e) = self.drain_pending().await {
                log::error!("❌ {} (dropping {} queued events)", e, self.engine.pending.len());
            }
        }

        if let Some(handle) = self.handle.take() {
            self.source.release(handle).await;
        }

        if let Err(e) = self.sink.flush().await {
            log::error!("❌ Failed to flush event log: {}", e);
        }

        self.transition(CoordinatorState::Stopped, "shutdown");
        log::info!(
            "📊 Summary: {} ticks, {} rolls confirmed, {} persisted | {} unalignable, {} read failures, {} resyncs, {} sink failures",
            self.summary.ticks,
            self.summary.events_confirmed,
            self.summary.events_persisted,
            self.summary.unalignable,
            self.summary.read_failures,
            self.summary.resyncs,
            self.summary.sink_failures
        );
    }

    async fn observe(&mut self, now: Instant) -> TickOutcome {
        if self.handle.is_none() && !self.reacquire(now).await {
            return TickOutcome::SourceUnavailable;
        }

        let Some(handle) = self.handle.as_mut() else {
            return TickOutcome::SourceUnavailable;
        };

        let raw = match timeout(self.config.read_timeout, self.source.snapshot(handle)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => return self.read_failed(e),
            Err(_) => return self.read_failed(SourceError::ReadTimeout),
        };

        if raw.is_empty() {
            return self.read_failed(SourceError::Malformed("empty window".to_string()));
        }

        let current: Window = raw.iter().map(|token| classify(token)).collect();
        let result = self
            .reconciler
            .reconcile(self.engine.previous_window.as_deref(), &current);

        let outcome = match result {
            ReconciliationResult::NewEvents(labels) => {
                if labels.is_empty() {
                    log::debug!("No new rolls ({} visible)", current.len());
                } else {
                    let timestamp = Utc::now();
                    self.engine
                        .pending
                        .extend(labels.iter().map(|label| ConfirmedEvent::new(timestamp, *label)));
                    self.engine.watchdog.record_activity(now);
                    self.summary.events_confirmed += labels.len() as u64;
                }
                TickOutcome::Reconciled {
                    new_events: labels.len(),
                }
            }
            ReconciliationResult::Unalignable => {
                self.summary.unalignable += 1;
                log::warn!(
                    "⚠️  Unalignable windows, re-baselining on current: previous={} current={}",
                    self.engine
                        .previous_window
                        .as_deref()
                        .map(format_window)
                        .unwrap_or_default(),
                    format_window(&current)
                );
                TickOutcome::Unalignable
            }
        };

        self.engine.previous_window = Some(current);
        outcome
    }

    fn read_failed(&mut self, err: SourceError) -> TickOutcome {
        self.summary.read_failures += 1;
        log::warn!("⚠️  Snapshot read failed, retrying next tick: {}", err);
        TickOutcome::ReadFailed
    }

    async fn drain_pending(&mut self) -> Result<(), TrackerError> {
        while let Some(event) = self.engine.pending.front() {
            match self.sink.append(event).await {
                Ok(()) => {
                    log::info!("🎲 NEW ROLL {} @ {}", event.label, event.timestamp_iso());
                    self.engine.pending.pop_front();
                    self.engine.consecutive_sink_failures = 0;
                    self.summary.events_persisted += 1;
                }
                Err(e) => {
                    self.engine.consecutive_sink_failures += 1;
                    self.summary.sink_failures += 1;
                    log::error!(
                        "❌ Failed to append event ({} queued, failure {} of {}): {}",
                        self.engine.pending.len(),
                        self.engine.consecutive_sink_failures,
                        self.config.max_sink_failures,
                        e
                    );

                    if self.engine.consecutive_sink_failures >= self.config.max_sink_failures {
                        return Err(TrackerError::SinkFailure {
                            consecutive: self.engine.consecutive_sink_failures,
                            last: e,
                        });
                    }
                    break;
                }
            }
        }
        Ok(())
    }

    async fn resync(&mut self, now: Instant) {
        self.summary.resyncs += 1;
        log::warn!(
            "⏰ No new rolls for {:?} (threshold {:?}), resyncing source",
            self.engine.watchdog.idle_for(now),
            self.engine.watchdog.threshold()
        );
        self.transition(CoordinatorState::Resyncing, "stale feed");

        if let Some(handle) = self.handle.take() {
            self.source.release(handle).await;
        }
        self.engine.previous_window = None;
        self.engine.watchdog.reset(now);

        self.reacquire(now).await;
    }

    async fn reacquire(&mut self, now: Instant) -> bool {
        match self.acquire_once().await {
            Ok(handle) => {
                self.handle = Some(handle);
                self.engine.watchdog.reset(now);
                self.transition(CoordinatorState::Running, "source reacquired");
                true
            }
            Err(e) => {
                log::warn!("⚠️  Source reacquisition failed, retrying next tick: {}", e);
                false
            }
        }
    }

    async fn acquire_once(&mut self) -> Result<S::Handle, SourceError> {
        match timeout(self.config.acquire_timeout, self.source.acquire()).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::Unavailable(format!(
                "acquisition timed out after {:?}",
                self.config.acquire_timeout
            ))),
        }
    }

    fn transition(&mut self, next: CoordinatorState, reason: &str) {
        if self.state != next {
            log::info!("🔄 {:?} → {:?} ({})", self.state, next, reason);
            self.state = next;
        }
    }
}

/// Resolves once shutdown is signalled or the sender is gone
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

async fn wait_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
