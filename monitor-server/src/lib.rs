//! # Monitor Server
//!
//! Thin HTTP adapter over `monitor-core`.
//!
//! ## Modules
//! - `args`: Command line flags.
//! - `config`: Layered configuration (defaults, TOML file, environment, flags).
//! - `api`: axum router, shared state and handlers.

pub mod api;
pub mod args;
pub mod config;

pub use api::{router, AppState};
