//! The producer/transformer seam between the stream controller and a backend.

use crate::error::{DecodeError, FetchError};
use crate::types::Record;
use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

/// A log-search backend.
///
/// The controller calls [`fetch`](Source::fetch) once per tick and hands the
/// payload to [`decode`](Source::decode). [`set_query`](Source::set_query) is
/// called from the control plane, possibly while a fetch is in flight, so
/// implementations keep their query behind a lock and snapshot it at the
/// start of each fetch.
#[async_trait]
pub trait Source: Send + Sync {
    /// Issue one request against the current query.
    ///
    /// Must return [`FetchError::Cancelled`] promptly once `cancel` fires.
    async fn fetch(&self, cancel: &CancellationToken) -> Result<Bytes, FetchError>;

    /// Turn one raw payload into records, in the order they should be shown.
    /// All-or-nothing: an error means no records from this payload.
    fn decode(&self, raw: &[u8]) -> Result<Vec<Record>, DecodeError>;

    /// Replace the filter text. Applies from the next fetch onwards.
    fn set_query(&self, text: &str);

    /// The filter text the next fetch will use.
    fn query(&self) -> String;
}
