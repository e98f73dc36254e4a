//! Test builders: terse constructors for `Record`s and stream settings.
//!
//! Designed for readability in assertions, not production use. They panic on
//! invalid input rather than returning `Result`.

use chrono::{DateTime, TimeZone, Utc};
use stail_core::{Record, StreamOptions};
use std::time::Duration;

/// Fixed epoch so timestamps in assertions are stable across runs.
pub const BASE_EPOCH: i64 = 1_705_312_800; // 2024-01-15T10:00:00Z

/// `BASE_EPOCH + secs` as a UTC timestamp.
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(BASE_EPOCH + secs, 0).unwrap()
}

/// An `info` record with message `"<id> message"` at `BASE_EPOCH + secs`.
pub fn record(id: &str, secs: i64) -> Record {
    Record::new(id, at(secs))
        .with_level("info")
        .with_message(format!("{id} message"))
}

pub fn ids(records: &[Record]) -> Vec<String> {
    records.iter().map(|r| r.id().to_string()).collect()
}

/// Options with a 1s interval and no backoff.
pub fn options() -> StreamOptions {
    StreamOptions {
        poll_interval: Duration::from_secs(1),
        channel_capacity: 64,
        max_backoff: None,
    }
}
