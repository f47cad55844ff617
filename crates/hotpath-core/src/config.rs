//! Run configuration: the pattern parameters and the shedding controller
//! settings. Both are immutable for the duration of a run and validated
//! before the first event is processed.

use crate::error::ConfigError;
use crate::event::StationId;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Target end stations of the reference deployment.
pub const DEFAULT_TARGET_STATIONS: [StationId; 3] = [426, 3002, 462];

/// One hour, in seconds.
pub const DEFAULT_WINDOW_SECS: i64 = 3600;

/// Default bound on Kleene chain length.
pub const DEFAULT_MAX_KLEENE: usize = 3;

/// Parameters of the hot-path pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternConfig {
    /// Stations at which a terminator trip may end (`b.end`).
    pub target_stations: FxHashSet<StationId>,
    /// Maximum elapsed logical time from `a[1].start` to `b.end`, in seconds.
    pub window_secs: i64,
    /// Upper bound on Kleene chain length; the shedding controller may
    /// tighten the effective cap below this at runtime.
    pub max_kleene: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            target_stations: DEFAULT_TARGET_STATIONS.into_iter().collect(),
            window_secs: DEFAULT_WINDOW_SECS,
            max_kleene: DEFAULT_MAX_KLEENE,
        }
    }
}

impl PatternConfig {
    pub fn new(
        target_stations: impl IntoIterator<Item = StationId>,
        window_secs: i64,
        max_kleene: usize,
    ) -> Self {
        Self {
            target_stations: target_stations.into_iter().collect(),
            window_secs,
            max_kleene,
        }
    }

    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.window_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_stations.is_empty() {
            return Err(ConfigError::EmptyTargetStations);
        }
        if self.window_secs <= 0 {
            return Err(ConfigError::NonPositiveWindow(self.window_secs));
        }
        if self.max_kleene < 1 {
            return Err(ConfigError::KleeneCapTooSmall);
        }
        Ok(())
    }
}

/// Shedding controller behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShedMode {
    /// Never drop; the Kleene cap stays at `max_kleene`.
    Off,
    /// Probabilistic ingress drop while overloaded.
    Event,
    /// Ingress drop plus a dynamic Kleene cap.
    Hybrid,
}

impl fmt::Display for ShedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShedMode::Off => "off",
            ShedMode::Event => "event",
            ShedMode::Hybrid => "hybrid",
        };
        f.write_str(name)
    }
}

impl FromStr for ShedMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(ShedMode::Off),
            "event" => Ok(ShedMode::Event),
            "hybrid" => Ok(ShedMode::Hybrid),
            other => Err(format!(
                "unknown shed mode {other:?} (expected off, event, or hybrid)"
            )),
        }
    }
}

/// Settings of the load-shedding controller and the test-only burst
/// injector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheddingConfig {
    pub mode: ShedMode,
    /// Latency reference the EWMA is compared against.
    pub target_latency_ms: f64,
    /// Baseline drop probability applied when overloaded, scaled by the
    /// overload ratio.
    pub base_drop_prob: f64,
    /// PRNG seed for drop decisions; fixed seed gives reproducible runs.
    pub seed: u64,
    /// Sleep every N ingested events (0 disables). Load injection for
    /// experiments only; does not alter pattern semantics.
    pub burst_every: u64,
    pub burst_sleep_ms: u64,
}

impl Default for SheddingConfig {
    fn default() -> Self {
        Self {
            mode: ShedMode::Off,
            target_latency_ms: 25.0,
            base_drop_prob: 0.1,
            seed: 42,
            burst_every: 0,
            burst_sleep_ms: 0,
        }
    }
}

impl SheddingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.target_latency_ms.is_finite() || self.target_latency_ms <= 0.0 {
            return Err(ConfigError::InvalidTargetLatency(self.target_latency_ms));
        }
        if !(0.0..=1.0).contains(&self.base_drop_prob) {
            return Err(ConfigError::DropProbOutOfRange(self.base_drop_prob));
        }
        Ok(())
    }
}
