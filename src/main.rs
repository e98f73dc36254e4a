use anyhow::Context;
use clap::Parser;
use stail::cli::Cli;
use stail_core::TracingReporter;
use stail_feeds::{DatadogSettings, DatadogSource};
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.debug {
        let path = std::env::temp_dir().join("stail-debug.log");
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening {}", path.display()))?;
        tracing_subscriber::fmt()
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_env("RUST_LOG")
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .init();
        tracing::info!(path = %path.display(), "stail debug log started");
    }

    let config = cli.load_config().context("loading configuration")?;
    let settings = DatadogSettings::from_env(&config.datadog)
        .context("reading Datadog credentials (DD_API_KEY, DD_APPLICATION_KEY)")?;
    tracing::debug!(settings = ?settings, "datadog source");

    let source = DatadogSource::new(settings)
        .context("building the Datadog client")?
        .with_reporter(Arc::new(TracingReporter));

    stail_tui::run(config, Arc::new(source))
}
