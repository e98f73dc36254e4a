//! stail-feeds: log search backends for stail.
//!
//! Each backend implements [`stail_core::Source`]: it fetches one raw page
//! per tick from a remote search API and decodes it into
//! [`stail_core::Record`]s for the stream controller.

pub mod datadog;

pub use datadog::{DatadogError, DatadogSettings, DatadogSource};
