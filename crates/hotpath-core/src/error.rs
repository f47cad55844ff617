//! Error taxonomy.
//!
//! Configuration errors fail a run at startup. Malformed or out-of-order
//! events are counted and skipped at ingestion and never become errors.
//! `EngineError` covers internal invariant violations; one of those aborts
//! the run and surfaces the offending state.

use crate::event::BikeId;
use thiserror::Error;

/// Invalid run configuration. Not recoverable; detected before any event is
/// processed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("target station set must not be empty")]
    EmptyTargetStations,

    #[error("window must be positive, got {0} s")]
    NonPositiveWindow(i64),

    #[error("max kleene length must be at least 1")]
    KleeneCapTooSmall,

    #[error("base drop probability must be within [0, 1], got {0}")]
    DropProbOutOfRange(f64),

    #[error("target latency must be positive and finite, got {0} ms")]
    InvalidTargetLatency(f64),
}

/// Internal invariant violations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// A chain keyed to one bike was asked to absorb a trip for another.
    #[error("partial match for bike {chain_bike} cannot absorb trip {event_id} for bike {trip_bike}")]
    MixedCorrelationKeys {
        chain_bike: BikeId,
        trip_bike: BikeId,
        event_id: u64,
    },
}
