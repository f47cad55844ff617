//! Hotpath Core - value types for the hotpath CEP engine
//!
//! This crate provides the event model, run configuration, and error
//! taxonomy shared by the runtime and the CLI.

pub mod config;
pub mod error;
pub mod event;

pub use config::{PatternConfig, ShedMode, SheddingConfig};
pub use error::{ConfigError, EngineError};
pub use event::{BikeId, PatternMatch, Projection, SharedTrip, StationId, Trip};
