//! Shared test utilities for stail integration harnesses.
//!
//! Import everything you need via `mod common; use common::*;` at the top of
//! each harness file. Stream tests run with `#[tokio::test(start_paused = true)]`
//! so poll intervals elapse instantly and deterministically.
#![allow(dead_code, unused_imports)]

pub mod builders;
pub mod fake_datadog_api;
pub mod fixtures;
pub mod reporter;
pub mod scripted_source;

pub use builders::*;
pub use fixtures::*;
pub use reporter::*;
pub use scripted_source::*;
