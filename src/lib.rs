//! stail: tail a remote log search API in the terminal.
//!
//! The binary is thin glue over three crates:
//!
//! ```text
//! stail-feeds (Source) ──► stail-core (StreamController) ──► stail-tui (App)
//! ```
//!
//! This crate re-exports them so integration tests can reach every layer
//! through one import.

pub mod cli;

pub use stail_core as core;
pub use stail_feeds as feeds;
pub use stail_tui as tui;
