#![deny(unsafe_code)]

//! Shared test utilities for the lineage workspace.
//!
//! Fixtures for unique attribute owners, a config builder, temporary config
//! files, tracing setup, and a runner that executes the same test body in a
//! thread, a fiber or a tokio task.
//!
//! ```toml
//! [dev-dependencies]
//! lineage-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod contexts;
pub mod fixtures;
pub mod tracing_setup;
