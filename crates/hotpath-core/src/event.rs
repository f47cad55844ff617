//! Event types: trips, completed matches, and recall projections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Station identifier as carried by the trip feed.
pub type StationId = u32;

/// Bike identifier; the correlation key of the hot-path pattern.
pub type BikeId = u64;

/// A shared reference to a Trip for efficient passing through the engine.
/// Chains hold `Arc`s, so extending a partial match copies pointers only and
/// trip data is never duplicated after construction.
pub type SharedTrip = Arc<Trip>;

/// A single bike trip. Immutable once constructed.
///
/// `start_time`/`end_time` are logical timestamps from the data source and
/// are never compared against wall-clock time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trip {
    /// Unique within a run (the CSV row number for file input).
    pub event_id: u64,
    pub bike: BikeId,
    pub start_station: StationId,
    pub end_station: StationId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Monotonic arrival index, assigned by the stream driver.
    #[serde(default)]
    pub ingest_seq: u64,
}

impl Trip {
    pub fn new(
        event_id: u64,
        bike: BikeId,
        start_station: StationId,
        end_station: StationId,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id,
            bike,
            start_station,
            end_station,
            start_time,
            end_time,
            ingest_seq: 0,
        }
    }

    /// Stamp the arrival index. Called by the driver before the trip is
    /// shared; a `Trip` is not mutated once it is behind an `Arc`.
    pub fn with_ingest_seq(mut self, seq: u64) -> Self {
        self.ingest_seq = seq;
        self
    }

    pub fn duration(&self) -> chrono::Duration {
        self.end_time - self.start_time
    }
}

/// A completed hot-path match: the Kleene chain `a[1..k]` plus the
/// terminating trip `b` that ended at a target station.
#[derive(Debug, Clone)]
pub struct PatternMatch {
    /// The chain trips, oldest first. Never empty.
    pub trips: Vec<SharedTrip>,
    pub terminator: SharedTrip,
    /// Wall-clock instant at which the terminator closed the chain.
    pub detected_at: Instant,
}

impl PatternMatch {
    /// Length of the Kleene chain (the terminator is not counted).
    pub fn kleene_len(&self) -> usize {
        self.trips.len()
    }

    pub fn bike(&self) -> BikeId {
        self.terminator.bike
    }

    pub fn projection(&self) -> Projection {
        Projection {
            a1_start: self.trips[0].start_station,
            last_a_end: self.trips[self.trips.len() - 1].end_station,
            b_end: self.terminator.end_station,
        }
    }
}

/// The externally observable triple emitted per match, and the universe over
/// which recall is scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Projection {
    pub a1_start: StationId,
    pub last_a_end: StationId,
    pub b_end: StationId,
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.a1_start, self.last_a_end, self.b_end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_trip_duration() {
        let trip = Trip::new(1, 100, 10, 20, ts(0), ts(600));
        assert_eq!(trip.duration(), chrono::Duration::seconds(600));
    }

    #[test]
    fn test_trip_ingest_seq_stamp() {
        let trip = Trip::new(1, 100, 10, 20, ts(0), ts(600)).with_ingest_seq(7);
        assert_eq!(trip.ingest_seq, 7);
    }

    #[test]
    fn test_projection_from_match() {
        let a1 = Arc::new(Trip::new(1, 100, 5, 6, ts(0), ts(100)));
        let a2 = Arc::new(Trip::new(2, 100, 6, 7, ts(100), ts(200)));
        let b = Arc::new(Trip::new(3, 100, 7, 426, ts(200), ts(300)));
        let m = PatternMatch {
            trips: vec![a1, a2],
            terminator: b,
            detected_at: Instant::now(),
        };
        assert_eq!(m.kleene_len(), 2);
        assert_eq!(m.bike(), 100);
        assert_eq!(
            m.projection(),
            Projection {
                a1_start: 5,
                last_a_end: 7,
                b_end: 426
            }
        );
    }

    #[test]
    fn test_projection_display() {
        let p = Projection {
            a1_start: 5,
            last_a_end: 7,
            b_end: 426,
        };
        assert_eq!(p.to_string(), "(5, 7, 426)");
    }

    #[test]
    fn test_trip_serde_roundtrip() {
        let trip = Trip::new(9, 42, 1, 2, ts(50), ts(80)).with_ingest_seq(3);
        let json = serde_json::to_string(&trip).unwrap();
        let back: Trip = serde_json::from_str(&json).unwrap();
        assert_eq!(back, trip);
    }
}
