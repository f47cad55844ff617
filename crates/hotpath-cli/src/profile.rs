//! Optional TOML run profile.
//!
//! A profile fills in whatever the command line leaves unset; explicit
//! flags always win. Every field is optional, so a profile can pin just the
//! pattern, just the shedding settings, or both.
//!
//! ```toml
//! [pattern]
//! target_stations = [426, 3002, 462]
//! window_secs = 3600
//! max_kleene = 3
//!
//! [shedding]
//! mode = "hybrid"
//! target_latency_ms = 25.0
//! base_drop_prob = 0.1
//! seed = 42
//!
//! [input]
//! csv = "data/201804-citibike-tripdata.csv"
//! max_events = 100000
//! ```

use hotpath_core::ShedMode;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("failed to read profile {0}: {1}")]
    Io(PathBuf, String),

    #[error("failed to parse profile: {0}")]
    Parse(String),
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunProfile {
    #[serde(default)]
    pub pattern: PatternSection,
    #[serde(default)]
    pub shedding: SheddingSection,
    #[serde(default)]
    pub input: InputSection,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatternSection {
    pub target_stations: Option<Vec<u32>>,
    pub window_secs: Option<i64>,
    pub max_kleene: Option<usize>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SheddingSection {
    pub mode: Option<ShedMode>,
    pub target_latency_ms: Option<f64>,
    pub base_drop_prob: Option<f64>,
    pub seed: Option<u64>,
    pub burst_every: Option<u64>,
    pub burst_sleep_ms: Option<u64>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputSection {
    pub csv: Option<PathBuf>,
    pub max_events: Option<u64>,
}

impl RunProfile {
    pub fn load(path: &Path) -> Result<Self, ProfileError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ProfileError::Io(path.to_path_buf(), e.to_string()))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ProfileError> {
        toml::from_str(text).map_err(|e| ProfileError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_profile() {
        let profile = RunProfile::from_toml("").unwrap();
        assert!(profile.pattern.target_stations.is_none());
        assert!(profile.shedding.mode.is_none());
        assert!(profile.input.csv.is_none());
    }

    #[test]
    fn test_full_profile() {
        let profile = RunProfile::from_toml(
            r#"
[pattern]
target_stations = [426, 3002]
window_secs = 1800
max_kleene = 2

[shedding]
mode = "hybrid"
target_latency_ms = 10.5
base_drop_prob = 0.25
seed = 99
burst_every = 50
burst_sleep_ms = 5

[input]
csv = "trips.csv"
max_events = 1000
"#,
        )
        .unwrap();

        assert_eq!(profile.pattern.target_stations, Some(vec![426, 3002]));
        assert_eq!(profile.pattern.window_secs, Some(1800));
        assert_eq!(profile.pattern.max_kleene, Some(2));
        assert_eq!(profile.shedding.mode, Some(ShedMode::Hybrid));
        assert_eq!(profile.shedding.target_latency_ms, Some(10.5));
        assert_eq!(profile.shedding.base_drop_prob, Some(0.25));
        assert_eq!(profile.shedding.seed, Some(99));
        assert_eq!(profile.shedding.burst_every, Some(50));
        assert_eq!(profile.shedding.burst_sleep_ms, Some(5));
        assert_eq!(profile.input.csv, Some(PathBuf::from("trips.csv")));
        assert_eq!(profile.input.max_events, Some(1000));
    }

    #[test]
    fn test_partial_profile() {
        let profile = RunProfile::from_toml("[shedding]\nmode = \"event\"\n").unwrap();
        assert_eq!(profile.shedding.mode, Some(ShedMode::Event));
        assert!(profile.shedding.seed.is_none());
        assert!(profile.pattern.window_secs.is_none());
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(RunProfile::from_toml("[pattern]\nwindows = 3\n").is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = RunProfile::load(Path::new("/nonexistent/profile.toml")).unwrap_err();
        assert!(matches!(err, ProfileError::Io(_, _)));
    }
}
