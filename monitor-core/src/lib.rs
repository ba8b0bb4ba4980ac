//! # Monitor Core Library
//!
//! The stateful heart of the host monitor. Everything the dashboard shows lives here.
//!
//! ## Modules
//! - `services`: Lock-protected registry of simulated services and their lifecycle.
//! - `tasks`: Lock-protected registry of deferred tasks.
//! - `metrics`: Host metrics model, the provider seam and the refreshed snapshot cache.
//! - `effect`: The "wait N time units" abstraction used to simulate work.
//! - `worker`: Bounded, cancellable pool for detached workers.
//! - `events`: Broadcast bus for completion events (telemetry hook).
//! - `config`: Tunables for delays, workers and metrics refresh.
//! - `error`: Error taxonomy shared by every registry.

pub mod config;
pub mod effect;
pub mod error;
pub mod events;
mod locks;
pub mod metrics;
pub mod services;
pub mod tasks;
pub mod worker;

pub use error::{CollectionError, ConfigError, RegistryError};
