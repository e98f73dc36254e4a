//! Stream controller: drives a [`Source`] on a timer behind a
//! pause/resume/stop state machine and forwards decoded records to a single
//! consumer channel.
//!
//! # State machine
//!
//! ```text
//!            pause                 stop / cancel / handle dropped
//!  Running ─────────► Paused  ───────────────────────────────► Stopped
//!     ▲                 │                                         ▲
//!     └──── resume ─────┘                                         │
//!     └───────────────────────────────────────────────────────────┘
//! ```
//!
//! `pause` while paused and `resume` while running are no-ops. `stop` wins
//! over any pending signal. `Stopped` is terminal.
//!
//! # Task layout
//!
//! One tokio task owns the state machine. Each loop iteration waits on a
//! single biased `select!` over the cancellation token, the control channel
//! and the tick deadline, so signals are observed between ticks and during
//! the inter-tick wait. The fetch itself races the cancellation token. The
//! task owns the output [`mpsc::Sender`] and drops it only after the loop has
//! exited, so the consumer sees end-of-stream exactly once and never before
//! the last record.

use crate::report::{Diagnostic, NullReporter, Reporter};
use crate::source::Source;
use crate::types::Record;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

// ---------------------------------------------------------------------------
// State + options
// ---------------------------------------------------------------------------

/// Lifecycle state of a stream controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamState {
    Running,
    Paused,
    Stopped,
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamState::Running => write!(f, "running"),
            StreamState::Paused => write!(f, "paused"),
            StreamState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Tuning knobs for a controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOptions {
    /// Time from the start of one fetch to the start of the next.
    pub poll_interval: Duration,
    /// Capacity of the output channel. A full channel applies backpressure to
    /// the loop; it never drops records.
    pub channel_capacity: usize,
    /// When set, consecutive failed ticks double the wait up to this cap.
    /// The wait never drops below `poll_interval`.
    pub max_backoff: Option<Duration>,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_backoff: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Pause,
    Resume,
}

// ---------------------------------------------------------------------------
// Controller (builder)
// ---------------------------------------------------------------------------

/// Configures and spawns the polling task.
///
/// ```rust,ignore
/// let (handle, mut records) = StreamController::new(source)
///     .options(StreamOptions::default())
///     .reporter(Arc::new(TracingReporter))
///     .spawn();
/// ```
pub struct StreamController {
    source: Arc<dyn Source>,
    options: StreamOptions,
    reporter: Arc<dyn Reporter>,
    scope: Option<CancellationToken>,
}

impl StreamController {
    pub fn new(source: Arc<dyn Source>) -> Self {
        Self {
            source,
            options: StreamOptions::default(),
            reporter: Arc::new(NullReporter),
            scope: None,
        }
    }

    pub fn options(mut self, options: StreamOptions) -> Self {
        self.options = options;
        self
    }

    pub fn reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Tie the controller's lifetime to `parent`: cancelling it stops the
    /// stream. Stopping the stream never cancels `parent`.
    pub fn scope(mut self, parent: &CancellationToken) -> Self {
        self.scope = Some(parent.child_token());
        self
    }

    /// Spawn the loop on the current tokio runtime. The stream starts in
    /// [`StreamState::Running`] and fetches immediately.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn spawn(self) -> (StreamHandle, mpsc::Receiver<Record>) {
        let (output, records) = mpsc::channel(self.options.channel_capacity.max(1));
        let (signals, control) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(StreamState::Running);
        let cancel = self.scope.unwrap_or_else(CancellationToken::new);

        let worker = Worker {
            source: Arc::clone(&self.source),
            output,
            control,
            cancel: cancel.clone(),
            reporter: self.reporter,
            state_tx,
            state: StreamState::Running,
            poll_interval: self.options.poll_interval,
            max_backoff: self.options.max_backoff,
            tick: 0,
            failures: 0,
        };
        let task = tokio::spawn(worker.run());

        let handle = StreamHandle {
            signals,
            cancel,
            source: self.source,
            state: state_rx,
            task,
        };
        (handle, records)
    }
}

// ---------------------------------------------------------------------------
// Handle (control plane)
// ---------------------------------------------------------------------------

/// Control-plane side of a running stream.
///
/// Every method is non-blocking and may be called from synchronous code.
/// Signals are applied asynchronously by the loop; calls after the stream
/// has stopped are ignored. Dropping the handle stops the stream.
pub struct StreamHandle {
    signals: mpsc::UnboundedSender<Signal>,
    cancel: CancellationToken,
    source: Arc<dyn Source>,
    state: watch::Receiver<StreamState>,
    task: JoinHandle<()>,
}

impl StreamHandle {
    pub fn pause(&self) {
        let _ = self.signals.send(Signal::Pause);
    }

    pub fn resume(&self) {
        let _ = self.signals.send(Signal::Resume);
    }

    /// Stop the stream from any state. Aborts an in-flight fetch.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Replace the query text. Does not touch the stream state.
    pub fn update_query(&self, text: &str) {
        self.source.set_query(text);
    }

    pub fn query(&self) -> String {
        self.source.query()
    }

    /// Last state published by the loop.
    pub fn state(&self) -> StreamState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<StreamState> {
        self.state.clone()
    }

    /// Wait until the loop reports [`StreamState::Stopped`].
    pub async fn stopped(&mut self) {
        // An Err means the loop is gone, which only happens after it
        // published Stopped.
        let _ = self.state.wait_for(|s| *s == StreamState::Stopped).await;
    }

    /// Stop the stream and wait for the task to exit.
    pub async fn shutdown(mut self) -> Result<(), JoinError> {
        self.cancel.cancel();
        (&mut self.task).await
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ---------------------------------------------------------------------------
// Worker (the loop)
// ---------------------------------------------------------------------------

enum Tick {
    Succeeded,
    Failed,
    Stop,
}

struct Worker {
    source: Arc<dyn Source>,
    output: mpsc::Sender<Record>,
    control: mpsc::UnboundedReceiver<Signal>,
    cancel: CancellationToken,
    reporter: Arc<dyn Reporter>,
    state_tx: watch::Sender<StreamState>,
    state: StreamState,
    poll_interval: Duration,
    max_backoff: Option<Duration>,
    tick: u64,
    failures: u32,
}

impl Worker {
    async fn run(mut self) {
        let mut next_tick = Instant::now();

        loop {
            match self.state {
                StreamState::Running => {
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => break,
                        signal = self.control.recv() => {
                            if !self.apply(signal) {
                                break;
                            }
                            continue;
                        }
                        _ = time::sleep_until(next_tick) => {}
                    }

                    let started = Instant::now();
                    match self.run_tick().await {
                        Tick::Succeeded => self.failures = 0,
                        Tick::Failed => self.failures = self.failures.saturating_add(1),
                        Tick::Stop => break,
                    }
                    next_tick = started + self.next_delay();
                }
                StreamState::Paused => {
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => break,
                        signal = self.control.recv() => {
                            if !self.apply(signal) {
                                break;
                            }
                        }
                    }
                }
                StreamState::Stopped => break,
            }
        }

        self.finish();
    }

    /// One fetch → decode → emit cycle.
    async fn run_tick(&mut self) -> Tick {
        self.tick += 1;
        let tick = self.tick;

        let fetched = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Tick::Stop,
            result = self.source.fetch(&self.cancel) => result,
        };

        let raw = match fetched {
            Ok(raw) => raw,
            Err(error) if error.is_cancelled() => return Tick::Stop,
            Err(error) => {
                self.reporter.report(Diagnostic::FetchFailed { tick, error });
                return Tick::Failed;
            }
        };

        let records = match self.source.decode(&raw) {
            Ok(records) => records,
            Err(error) => {
                self.reporter.report(Diagnostic::DecodeFailed { tick, error });
                return Tick::Failed;
            }
        };

        let count = records.len();
        for record in records {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Tick::Stop,
                sent = self.output.send(record) => {
                    if sent.is_err() {
                        self.reporter.report(Diagnostic::ConsumerClosed);
                        return Tick::Stop;
                    }
                }
            }
        }

        self.reporter.report(Diagnostic::BatchEmitted { tick, records: count });
        Tick::Succeeded
    }

    /// Apply a control signal. Returns `false` when the control side is gone.
    fn apply(&mut self, signal: Option<Signal>) -> bool {
        match (self.state, signal) {
            (_, None) => return false,
            (StreamState::Running, Some(Signal::Pause)) => self.transition(StreamState::Paused),
            (StreamState::Paused, Some(Signal::Resume)) => self.transition(StreamState::Running),
            _ => {}
        }
        true
    }

    fn next_delay(&self) -> Duration {
        backoff_delay(self.poll_interval, self.max_backoff, self.failures)
    }

    fn transition(&mut self, to: StreamState) {
        let from = self.state;
        self.state = to;
        self.state_tx.send_replace(to);
        self.reporter.report(Diagnostic::StateChanged { from, to });
    }

    fn finish(self) {
        let Worker {
            output,
            mut control,
            reporter,
            state_tx,
            state,
            ..
        } = self;

        // Close the output before publishing Stopped so anyone who has seen
        // Stopped will also see end-of-stream.
        drop(output);
        control.close();
        state_tx.send_replace(StreamState::Stopped);
        reporter.report(Diagnostic::StateChanged {
            from: state,
            to: StreamState::Stopped,
        });
    }
}

/// Wait before the next tick after `failures` consecutive failed ticks.
fn backoff_delay(interval: Duration, max_backoff: Option<Duration>, failures: u32) -> Duration {
    match max_backoff {
        Some(cap) if failures > 0 => {
            let factor = 1u32 << failures.min(16);
            interval.saturating_mul(factor).min(cap).max(interval)
        }
        _ => interval,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
