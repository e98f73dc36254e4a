//! stail-core: the polling pipeline behind stail.
//!
//! # Architecture
//!
//! ```text
//!              ┌──────────── StreamController task ────────────┐
//!   control ──►│ state machine ─► Source::fetch ─► Source::decode│──► mpsc<Record> ──► UI
//!              └───────────────────────────────────────────────┘
//! ```
//!
//! A [`Source`] knows one backend. The [`StreamController`](stream::StreamController)
//! polls it on a timer, gated by pause/resume/stop, and pushes [`Record`]s to
//! a single consumer channel. Failures are reported through a [`Reporter`]
//! and never stop the stream.

pub mod config;
pub mod error;
pub mod report;
pub mod source;
pub mod stream;
pub mod types;

pub use error::{DecodeError, FetchError};
pub use report::{Diagnostic, Reporter, TracingReporter};
pub use source::Source;
pub use stream::{StreamController, StreamHandle, StreamOptions, StreamState};
pub use types::{Record, Value};
