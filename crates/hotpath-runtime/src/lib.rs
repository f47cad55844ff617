//! Hotpath Runtime - the pattern-matching engine and its load-shedding
//! controller.
//!
//! The hot path is single-threaded and synchronous: the stream driver feeds
//! trips in arrival order through the shedder into the matcher, and for a
//! given input and shedding seed the emitted match sequence is identical
//! across runs.

pub mod driver;
pub mod index;
pub mod matcher;
pub mod metrics;
pub mod recall;
pub mod shedding;
pub mod synth;

pub use driver::{MatchSink, MemorySink, RunCounters, RunSummary, StreamDriver};
pub use matcher::{HotPathMatcher, MatcherStats};
pub use metrics::LatencySummary;
pub use shedding::{AdmissionController, SheddingController};
