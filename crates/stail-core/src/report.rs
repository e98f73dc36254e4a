//! Diagnostics emitted by the pipeline.
//!
//! The controller and the sources never log through process-wide state; they
//! hand a [`Diagnostic`] to an injected [`Reporter`]. The binary wires in
//! [`TracingReporter`]; tests use a reporter that records what it sees.

use crate::error::{DecodeError, FetchError};
use crate::stream::StreamState;

/// Something worth telling the operator about.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// The controller moved between states.
    StateChanged { from: StreamState, to: StreamState },
    /// A fetch failed; the next tick retries.
    FetchFailed { tick: u64, error: FetchError },
    /// A payload could not be decoded; the batch was dropped.
    DecodeFailed { tick: u64, error: DecodeError },
    /// A tick finished and pushed `records` records downstream.
    BatchEmitted { tick: u64, records: usize },
    /// The backend accepted the request but attached a warning to it.
    BackendWarning { code: String, title: String, detail: String },
    /// The output receiver was dropped; the controller is shutting down.
    ConsumerClosed,
}

/// Sink for [`Diagnostic`]s. Implementations must be cheap and must not block.
pub trait Reporter: Send + Sync {
    fn report(&self, diagnostic: Diagnostic);
}

/// Forwards diagnostics to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, diagnostic: Diagnostic) {
        match diagnostic {
            Diagnostic::StateChanged { from, to } => {
                tracing::info!(%from, %to, "stream: state changed");
            }
            Diagnostic::FetchFailed { tick, error } => {
                tracing::warn!(tick, %error, "stream: fetch failed");
            }
            Diagnostic::DecodeFailed { tick, error } => {
                tracing::warn!(tick, %error, "stream: decode failed");
            }
            Diagnostic::BatchEmitted { tick, records } => {
                tracing::debug!(tick, records, "stream: batch emitted");
            }
            Diagnostic::BackendWarning { code, title, detail } => {
                tracing::warn!(%code, %title, %detail, "source: backend warning");
            }
            Diagnostic::ConsumerClosed => {
                tracing::debug!("stream: consumer dropped the output channel");
            }
        }
    }
}

/// Reporter that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn report(&self, _diagnostic: Diagnostic) {}
}
