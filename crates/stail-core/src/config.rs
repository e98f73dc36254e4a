//! Configuration types for stail.
//!
//! [`Config::load`] reads `~/.config/stail/config.toml`, creating it with
//! hardcoded defaults if it does not yet exist. [`Config::load_from`] reads an
//! explicit path instead. Both layers sit on top of the built-in defaults and
//! under `STAIL_*` environment overrides (`STAIL_STREAM__POLL_INTERVAL_MS=500`).
//! [`Config::defaults`] returns the defaults without touching the filesystem
//! (useful in tests).
//!
//! API credentials are deliberately absent: they come from the environment
//! only and are read by the entry point.

use crate::stream::StreamOptions;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Embedded defaults
// ---------------------------------------------------------------------------

const DEFAULT_CONFIG: &str = r#"
[stream]
poll_interval_ms = 1000
channel_capacity = 1024
max_backoff_ms   = 0

[datadog]
site         = "datadoghq.eu"
page_limit   = 50
timeout_secs = 10
from         = "now-15m"
query        = ""

[ui]
show_timestamps  = true
timestamp_format = "%Y-%m-%d %H:%M:%S%.3f"
show_tags        = true
max_rows         = 10000
"#;

const ENV_PREFIX: &str = "STAIL";

// ---------------------------------------------------------------------------
// Public config types
// ---------------------------------------------------------------------------

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub datadog: DatadogConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

/// `[stream]` section: polling cadence and buffering.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// `0` disables backoff on consecutive failures.
    #[serde(default)]
    pub max_backoff_ms: u64,
}

fn default_poll_interval_ms() -> u64 { 1000 }
fn default_channel_capacity() -> usize { 1024 }

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            channel_capacity: default_channel_capacity(),
            max_backoff_ms: 0,
        }
    }
}

impl StreamConfig {
    pub fn options(&self) -> StreamOptions {
        StreamOptions {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            channel_capacity: self.channel_capacity.max(1),
            max_backoff: (self.max_backoff_ms > 0)
                .then(|| Duration::from_millis(self.max_backoff_ms)),
        }
    }
}

/// `[datadog]` section: where and what to search.
#[derive(Debug, Clone, Deserialize)]
pub struct DatadogConfig {
    /// Datadog site, e.g. `datadoghq.com`, `datadoghq.eu`, `us5.datadoghq.com`.
    #[serde(default = "default_site")]
    pub site: String,
    /// Overrides the `https://api.<site>` base URL (proxies, tests).
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Start of the search window before the first record has been seen.
    #[serde(default = "default_from")]
    pub from: String,
    /// Initial filter query.
    #[serde(default)]
    pub query: String,
}

fn default_site() -> String { "datadoghq.eu".to_string() }
fn default_page_limit() -> u32 { 50 }
fn default_timeout_secs() -> u64 { 10 }
fn default_from() -> String { "now-15m".to_string() }

impl Default for DatadogConfig {
    fn default() -> Self {
        Self {
            site: default_site(),
            base_url: None,
            page_limit: default_page_limit(),
            timeout_secs: default_timeout_secs(),
            from: default_from(),
            query: String::new(),
        }
    }
}

impl DatadogConfig {
    pub fn base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://api.{}", self.site),
        }
    }
}

/// `[ui]` section of `config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_show_timestamps")]
    pub show_timestamps: bool,
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,
    #[serde(default = "default_show_tags")]
    pub show_tags: bool,
    /// Oldest rows are discarded once the log pane holds this many.
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
}

fn default_show_timestamps() -> bool { true }
fn default_timestamp_format() -> String { "%Y-%m-%d %H:%M:%S%.3f".to_string() }
fn default_show_tags() -> bool { true }
fn default_max_rows() -> usize { 10_000 }

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            show_timestamps: default_show_timestamps(),
            timestamp_format: default_timestamp_format(),
            show_tags: default_show_tags(),
            max_rows: default_max_rows(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::defaults()
    }
}

impl Config {
    /// Load from `~/.config/stail/config.toml`, layered on top of the built-in
    /// defaults. Creates the file with defaults if it does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let path = config_path();

        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, DEFAULT_CONFIG.trim_start())?;
        }

        Self::load_from(&path)
    }

    /// Load an explicit file, layered on top of the built-in defaults. A
    /// missing file is an error here, unlike [`Config::load`].
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .add_source(config::File::from(path))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
            .map_err(Into::into)
    }

    /// Return the built-in defaults without touching the filesystem.
    pub fn defaults() -> Self {
        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .build()
            .expect("built-in default config must be valid TOML")
            .try_deserialize()
            .expect("built-in default config must deserialize correctly")
    }
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_path() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
                .join(".config")
        })
        .join("stail")
        .join("config.toml")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
