//! stail TUI: ratatui application shell over a running stream.

pub mod app;
pub mod commands;
pub mod event;
pub mod theme;
pub mod widgets;

pub use app::{App, StreamCommand};

use stail_core::{config::Config, Source, StreamController, TracingReporter};
use std::sync::Arc;

/// Start the stream controller for `source` and run the UI until the user
/// quits, then stop the stream and wait for it to exit.
pub fn run(config: Config, source: Arc<dyn Source>) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("stail-stream")
        .build()?;

    let (handle, mut records) = {
        let _guard = runtime.enter();
        StreamController::new(source)
            .options(config.stream.options())
            .reporter(Arc::new(TracingReporter))
            .spawn()
    };
    tracing::info!(query = %handle.query(), "stream started");

    let theme = theme::Theme::load_default();
    let result = App::new(&config, theme).run(&handle, &mut records);

    handle.stop();
    drop(records);
    if let Err(err) = runtime.block_on(handle.shutdown()) {
        tracing::warn!(error = %err, "stream task did not exit cleanly");
    }
    tracing::info!("stream stopped");

    result
}
