//! Error taxonomy for the fetch/decode pipeline.
//!
//! Both error types are recoverable from the controller's point of view: a
//! failed tick is reported and the next tick runs as scheduled. The only
//! variant that ends the loop is [`FetchError::Cancelled`].

use thiserror::Error;

/// Transport or HTTP-level failure of a single fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("backend responded with HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    /// The controller's cancellation scope fired while the request was in
    /// flight.
    #[error("fetch cancelled")]
    Cancelled,
}

impl FetchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }
}

/// A response body that could not be turned into records. A decode error
/// always means zero records for that batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Not JSON at all, or truncated.
    #[error("malformed response payload: {0}")]
    Malformed(String),

    /// Valid JSON that does not match the expected envelope.
    #[error("unexpected response shape: {0}")]
    UnexpectedShape(String),
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() {
            DecodeError::UnexpectedShape(err.to_string())
        } else {
            DecodeError::Malformed(err.to_string())
        }
    }
}
