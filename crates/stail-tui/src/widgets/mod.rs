//! Ratatui widgets for the stail TUI.

pub mod command_bar;
pub mod help;
pub mod log_stream;
pub mod query_bar;
pub mod status_bar;
