//! Command-line interface for the `stail` binary.
//!
//! Flags override the loaded configuration; anything left unset keeps the
//! value from the config file, `STAIL_*` environment, or built-in defaults.

use clap::Parser;
use stail_core::config::Config;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "stail", version, about = "Tail a Datadog log search in the terminal")]
pub struct Cli {
    /// Initial filter query, e.g. `service:api status:error`.
    #[arg(short, long)]
    pub query: Option<String>,

    /// Datadog site, e.g. `datadoghq.com` or `us5.datadoghq.com`.
    #[arg(long)]
    pub site: Option<String>,

    /// Override the API base URL (proxies, local fakes).
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Start of the search window before the first record, e.g. `now-1h`.
    #[arg(long)]
    pub from: Option<String>,

    /// Milliseconds between polls.
    #[arg(short = 'i', long, value_name = "MS")]
    pub interval_ms: Option<u64>,

    /// Records requested per poll.
    #[arg(long, value_name = "N")]
    pub page_limit: Option<u32>,

    /// Read this config file instead of `~/.config/stail/config.toml`.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Write debug logs to `stail-debug.log` in the temp dir (tail -f to inspect).
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Load the configuration this invocation asks for and apply the flags.
    pub fn load_config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        };
        self.apply(&mut config);
        Ok(config)
    }

    pub fn apply(&self, config: &mut Config) {
        if let Some(query) = &self.query {
            config.datadog.query = query.clone();
        }
        if let Some(site) = &self.site {
            config.datadog.site = site.clone();
        }
        if let Some(url) = &self.base_url {
            config.datadog.base_url = Some(url.clone());
        }
        if let Some(from) = &self.from {
            config.datadog.from = from.clone();
        }
        if let Some(ms) = self.interval_ms {
            config.stream.poll_interval_ms = ms;
        }
        if let Some(limit) = self.page_limit {
            config.datadog.page_limit = limit;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "stail",
            "-q",
            "service:api",
            "--site",
            "datadoghq.com",
            "-i",
            "250",
            "--page-limit",
            "100",
        ]);
        let mut config = Config::defaults();
        cli.apply(&mut config);

        assert_eq!(config.datadog.query, "service:api");
        assert_eq!(config.datadog.base_url(), "https://api.datadoghq.com");
        assert_eq!(config.stream.poll_interval_ms, 250);
        assert_eq!(config.datadog.page_limit, 100);
    }

    #[test]
    fn unset_flags_keep_config() {
        let cli = Cli::parse_from(["stail"]);
        let mut config = Config::defaults();
        cli.apply(&mut config);

        assert_eq!(config.datadog.query, "");
        assert_eq!(config.datadog.from, "now-15m");
        assert_eq!(config.stream.poll_interval_ms, 1000);
        assert!(!cli.debug);
    }

    #[test]
    fn explicit_config_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stail.toml");
        std::fs::write(&path, "[datadog]\nquery = \"env:prod\"\npage_limit = 10\n").unwrap();

        let cli = Cli::parse_from(["stail", "--config", path.to_str().unwrap(), "--page-limit", "20"]);
        let config = cli.load_config().unwrap();
        assert_eq!(config.datadog.query, "env:prod");
        assert_eq!(config.datadog.page_limit, 20);
    }
}
