//! Datadog Logs v2 search backend.
//!
//! Each fetch is one `GET /api/v2/logs/events` call, sorted ascending by
//! timestamp and capped at `page[limit]` entries.
//!
//! # Tailing
//!
//! The query keeps a high-water mark: the newest timestamp emitted so far and
//! the ids already emitted at exactly that instant. Once a record has been
//! seen, the next fetch asks for `filter[from] = <high-water>` instead of the
//! configured window, and decode drops anything at or behind the mark that
//! was already emitted. Replacing the query text resets the mark.
//!
//! A full page carrying `meta.page.after` is continued with `page[cursor]`
//! over the same `filter[from]`, so a burst of entries sharing one timestamp
//! cannot pin the tail to its first page.
//!
//! Every `set_query` starts a new generation. A page fetched under an older
//! generation is still decoded and emitted, but it no longer moves the mark
//! or the cursor of the current query.
//!
//! API docs: <https://docs.datadoghq.com/api/latest/logs/#search-logs-get>

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::ACCEPT;
use reqwest::Url;
use serde::Deserialize;
use stail_core::config::DatadogConfig;
use stail_core::report::{Diagnostic, NullReporter, Reporter};
use stail_core::{DecodeError, FetchError, Record, Source, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub const EVENTS_PATH: &str = "/api/v2/logs/events";

pub const API_KEY_HEADER: &str = "DD-API-KEY";
pub const APPLICATION_KEY_HEADER: &str = "DD-APPLICATION-KEY";
pub const API_KEY_ENV: &str = "DD_API_KEY";
pub const APPLICATION_KEY_ENV: &str = "DD_APPLICATION_KEY";

const PARAM_QUERY: &str = "filter[query]";
const PARAM_FROM: &str = "filter[from]";
const PARAM_TO: &str = "filter[to]";
const PARAM_SORT: &str = "sort";
const PARAM_PAGE_LIMIT: &str = "page[limit]";
const PARAM_PAGE_CURSOR: &str = "page[cursor]";
const SORT_ASCENDING: &str = "timestamp";

/// Error bodies are kept for the diagnostic, but not in full.
const MAX_ERROR_BODY: usize = 512;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum DatadogError {
    #[error("environment variable {0} is not set")]
    MissingCredential(&'static str),
    #[error("invalid base URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("could not build HTTP client: {0}")]
    Client(String),
}

/// Everything needed to address and authenticate against one Datadog site.
#[derive(Clone)]
pub struct DatadogSettings {
    pub base_url: String,
    pub api_key: String,
    pub application_key: String,
    pub timeout: Duration,
    pub page_limit: u32,
    /// Window start used until the first record has been seen (`now-15m`).
    pub from: String,
    /// Initial filter query.
    pub query: String,
}

impl DatadogSettings {
    pub fn from_config(
        config: &DatadogConfig,
        api_key: impl Into<String>,
        application_key: impl Into<String>,
    ) -> Self {
        Self {
            base_url: config.base_url(),
            api_key: api_key.into(),
            application_key: application_key.into(),
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
            page_limit: config.page_limit.max(1),
            from: config.from.clone(),
            query: config.query.clone(),
        }
    }

    /// Like [`from_config`](Self::from_config), reading both keys from
    /// `DD_API_KEY` and `DD_APPLICATION_KEY`.
    pub fn from_env(config: &DatadogConfig) -> Result<Self, DatadogError> {
        let api_key = std::env::var(API_KEY_ENV)
            .map_err(|_| DatadogError::MissingCredential(API_KEY_ENV))?;
        let application_key = std::env::var(APPLICATION_KEY_ENV)
            .map_err(|_| DatadogError::MissingCredential(APPLICATION_KEY_ENV))?;
        Ok(Self::from_config(config, api_key, application_key))
    }
}

impl std::fmt::Debug for DatadogSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatadogSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("application_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("page_limit", &self.page_limit)
            .field("from", &self.from)
            .field("query", &self.query)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Query state
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct QueryState {
    text: String,
    /// Bumped by every `set_query`.
    generation: u64,
    high_water: Option<DateTime<Utc>>,
    /// Ids emitted with a timestamp equal to `high_water`.
    seen_at_high_water: HashSet<String>,
    /// Continuation of the last full page.
    cursor: Option<Cursor>,
    /// The request whose response has not been decoded yet.
    in_flight: Option<InFlight>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Cursor {
    after: String,
    from: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct InFlight {
    generation: u64,
    from: String,
}

impl QueryState {
    fn window_start(&self, default: &str) -> String {
        match (&self.cursor, self.high_water) {
            (Some(cursor), _) => cursor.from.clone(),
            (None, Some(mark)) => mark.to_rfc3339_opts(SecondsFormat::Millis, true),
            (None, None) => default.to_string(),
        }
    }

    fn already_emitted(&self, record: &Record) -> bool {
        match self.high_water {
            Some(mark) => {
                record.timestamp() < mark
                    || (record.timestamp() == mark
                        && self.seen_at_high_water.contains(record.id()))
            }
            None => false,
        }
    }

    fn observe(&mut self, record: &Record) {
        match self.high_water {
            Some(mark) if record.timestamp() < mark => {}
            Some(mark) if record.timestamp() == mark => {
                self.seen_at_high_water.insert(record.id().to_string());
            }
            _ => {
                self.high_water = Some(record.timestamp());
                self.seen_at_high_water.clear();
                self.seen_at_high_water.insert(record.id().to_string());
            }
        }
    }
}

/// What a single fetch sends, captured under the lock.
#[derive(Debug, Clone, PartialEq, Eq)]
struct QuerySnapshot {
    text: String,
    from: String,
    cursor: Option<String>,
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

pub struct DatadogSource {
    client: reqwest::Client,
    events_url: Url,
    settings: DatadogSettings,
    query: Mutex<QueryState>,
    reporter: Arc<dyn Reporter>,
}

impl DatadogSource {
    pub fn new(settings: DatadogSettings) -> Result<Self, DatadogError> {
        let raw_url = format!("{}{}", settings.base_url.trim_end_matches('/'), EVENTS_PATH);
        let events_url = Url::parse(&raw_url).map_err(|err| DatadogError::InvalidUrl {
            url: raw_url.clone(),
            reason: err.to_string(),
        })?;

        let client = reqwest::Client::builder()
            .connect_timeout(settings.timeout)
            .timeout(settings.timeout)
            .build()
            .map_err(|err| DatadogError::Client(err.to_string()))?;

        let query = Mutex::new(QueryState {
            text: settings.query.clone(),
            ..QueryState::default()
        });

        Ok(Self {
            client,
            events_url,
            settings,
            query,
            reporter: Arc::new(NullReporter),
        })
    }

    /// Route backend warnings to `reporter`.
    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn settings(&self) -> &DatadogSettings {
        &self.settings
    }

    fn lock(&self) -> MutexGuard<'_, QueryState> {
        // The state is plain data and every critical section leaves it
        // consistent, so a poisoned lock is still usable.
        self.query.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Capture the next request and remember which generation it belongs to.
    fn snapshot(&self) -> QuerySnapshot {
        let mut query = self.lock();
        let from = query.window_start(&self.settings.from);
        query.in_flight = Some(InFlight {
            generation: query.generation,
            from: from.clone(),
        });
        QuerySnapshot {
            text: query.text.clone(),
            from,
            cursor: query.cursor.as_ref().map(|c| c.after.clone()),
        }
    }

    fn request_url(&self, snapshot: &QuerySnapshot) -> Url {
        let mut url = self.events_url.clone();
        url.query_pairs_mut()
            .append_pair(PARAM_QUERY, &snapshot.text)
            .append_pair(PARAM_FROM, &snapshot.from)
            .append_pair(PARAM_TO, "now")
            .append_pair(PARAM_SORT, SORT_ASCENDING)
            .append_pair(PARAM_PAGE_LIMIT, &self.settings.page_limit.to_string());
        if let Some(cursor) = &snapshot.cursor {
            url.query_pairs_mut().append_pair(PARAM_PAGE_CURSOR, cursor);
        }
        url
    }

    async fn send(&self, url: Url) -> Result<Bytes, FetchError> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .header(API_KEY_HEADER, self.settings.api_key.as_str())
            .header(APPLICATION_KEY_HEADER, self.settings.application_key.as_str())
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response
                .text()
                .await
                .unwrap_or_else(|err| format!("<unreadable body: {err}>"));
            truncate_on_char_boundary(&mut body, MAX_ERROR_BODY);
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response.bytes().await.map_err(map_reqwest_error)
    }
}

#[async_trait]
impl Source for DatadogSource {
    async fn fetch(&self, cancel: &CancellationToken) -> Result<Bytes, FetchError> {
        let url = self.request_url(&self.snapshot());
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            result = self.send(url) => result,
        }
    }

    fn decode(&self, raw: &[u8]) -> Result<Vec<Record>, DecodeError> {
        let envelope: Envelope = serde_json::from_slice(raw)?;
        let meta = envelope.meta.unwrap_or_default();

        for warning in meta.warnings.unwrap_or_default() {
            self.reporter.report(Diagnostic::BackendWarning {
                code: warning.code.unwrap_or_default(),
                title: warning.title.unwrap_or_default(),
                detail: warning.detail.unwrap_or_default(),
            });
        }

        let decoded: Vec<Record> = envelope
            .data
            .unwrap_or_default()
            .into_iter()
            .map(Entry::into_record)
            .collect();

        let mut query = self.lock();
        let request = query.in_flight.take();
        if request
            .as_ref()
            .is_some_and(|r| r.generation != query.generation)
        {
            // Fetched for a replaced query: emit as is, leave the tail alone.
            return Ok(decoded);
        }

        let full = decoded.len() >= self.settings.page_limit as usize;
        let from = request
            .map(|r| r.from)
            .unwrap_or_else(|| query.window_start(&self.settings.from));

        let mut fresh = Vec::with_capacity(decoded.len());
        for record in decoded {
            if !query.already_emitted(&record) {
                query.observe(&record);
                fresh.push(record);
            }
        }

        query.cursor = match meta.page.and_then(|p| p.after) {
            Some(after) if full && !after.is_empty() => Some(Cursor { after, from }),
            _ => None,
        };
        Ok(fresh)
    }

    fn set_query(&self, text: &str) {
        let mut query = self.lock();
        query.text = text.to_string();
        query.generation += 1;
        query.high_water = None;
        query.seen_at_high_water.clear();
        query.cursor = None;
    }

    fn query(&self) -> String {
        self.lock().text.clone()
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::Timeout;
    }
    if err.is_connect() {
        return FetchError::Connect(err.to_string());
    }
    FetchError::Transport(err.to_string())
}

fn truncate_on_char_boundary(s: &mut String, max: usize) {
    if s.len() > max {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s.truncate(end);
    }
}

// ---------------------------------------------------------------------------
// Response envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Envelope {
    data: Option<Vec<Entry>>,
    meta: Option<Meta>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    id: String,
    attributes: EntryAttributes,
}

#[derive(Debug, Deserialize)]
struct EntryAttributes {
    timestamp: DateTime<Utc>,
    status: Option<String>,
    message: Option<String>,
    tags: Option<Vec<String>>,
    attributes: Option<BTreeMap<String, Value>>,
    host: Option<String>,
    service: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Meta {
    warnings: Option<Vec<Warning>>,
    page: Option<PageMeta>,
}

#[derive(Debug, Deserialize)]
struct PageMeta {
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Warning {
    code: Option<String>,
    title: Option<String>,
    detail: Option<String>,
}

impl Entry {
    fn into_record(self) -> Record {
        let attrs = self.attributes;
        let mut attributes = attrs.attributes.unwrap_or_default();
        // Reserved fields win only when the log's own attributes do not
        // already carry the key.
        for (key, value) in [("host", attrs.host), ("service", attrs.service)] {
            if let Some(value) = value {
                attributes
                    .entry(key.to_string())
                    .or_insert(Value::String(value));
            }
        }

        Record::new(self.id, attrs.timestamp)
            .with_level(attrs.status.unwrap_or_default())
            .with_message(attrs.message.unwrap_or_default())
            .with_tags(attrs.tags.unwrap_or_default())
            .with_attributes(attributes)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
