//! Synthetic trip generation for sanity tests and load experiments.
//!
//! Each bike performs a random walk over the station universe. With
//! `chain_prob` a trip continues from the previous trip's end station, and
//! with `target_prob` it ends at one of the configured target stations, so
//! generated streams contain real hot-path chains at a controllable rate.

use chrono::{DateTime, TimeZone, Utc};
use hotpath_core::{StationId, Trip};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone)]
pub struct SynthConfig {
    pub bikes: u64,
    pub trips_per_bike: usize,
    /// Station ids are drawn from `1..=stations`; target stations live
    /// outside that range so they are only reached deliberately.
    pub stations: StationId,
    pub target_stations: Vec<StationId>,
    /// Probability that a trip starts where the previous one ended.
    pub chain_prob: f64,
    /// Probability that a trip ends at a target station.
    pub target_prob: f64,
    /// Mean trip duration in seconds; actual durations vary around it.
    pub trip_secs: i64,
    /// Mean idle gap between a bike's consecutive trips, in seconds.
    pub gap_secs: i64,
    pub seed: u64,
    pub start: DateTime<Utc>,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            bikes: 10,
            trips_per_bike: 20,
            stations: 50,
            target_stations: vec![426, 3002, 462],
            chain_prob: 0.7,
            target_prob: 0.15,
            trip_secs: 600,
            gap_secs: 120,
            seed: 42,
            start: Utc.with_ymd_and_hms(2018, 4, 27, 8, 0, 0).unwrap(),
        }
    }
}

/// Generate a trip stream sorted by start time, event ids assigned in
/// stream order. Deterministic for a fixed config.
pub fn generate(config: &SynthConfig) -> Vec<Trip> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut trips = Vec::with_capacity(config.bikes as usize * config.trips_per_bike);

    for bike in 1..=config.bikes {
        let mut clock = config.start + chrono::Duration::seconds(rng.gen_range(0..=config.gap_secs));
        let mut last_end: Option<StationId> = None;

        for _ in 0..config.trips_per_bike {
            let start_station = match last_end {
                Some(station) if rng.gen::<f64>() < config.chain_prob => station,
                _ => rng.gen_range(1..=config.stations),
            };
            let end_station = if !config.target_stations.is_empty()
                && rng.gen::<f64>() < config.target_prob
            {
                config.target_stations[rng.gen_range(0..config.target_stations.len())]
            } else {
                rng.gen_range(1..=config.stations)
            };

            let duration = rng.gen_range(config.trip_secs / 2..=config.trip_secs * 3 / 2);
            let start_time = clock;
            let end_time = start_time + chrono::Duration::seconds(duration.max(1));

            trips.push(Trip::new(0, bike, start_station, end_station, start_time, end_time));

            last_end = Some(end_station);
            let gap = rng.gen_range(0..=config.gap_secs.max(1));
            clock = end_time + chrono::Duration::seconds(gap);
        }
    }

    trips.sort_by_key(|t| (t.start_time, t.bike));
    for (idx, trip) in trips.iter_mut().enumerate() {
        trip.event_id = idx as u64 + 1;
    }
    trips
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_for_seed() {
        let config = SynthConfig::default();
        assert_eq!(generate(&config), generate(&config));

        let other = SynthConfig {
            seed: 99,
            ..SynthConfig::default()
        };
        assert_ne!(generate(&config), generate(&other));
    }

    #[test]
    fn test_stream_is_monotone_and_ids_unique() {
        let trips = generate(&SynthConfig::default());
        assert_eq!(trips.len(), 200);
        for pair in trips.windows(2) {
            assert!(pair[0].start_time <= pair[1].start_time);
            assert!(pair[0].event_id < pair[1].event_id);
        }
        for trip in &trips {
            assert!(trip.end_time > trip.start_time);
        }
    }

    #[test]
    fn test_walk_produces_chained_trips() {
        let trips = generate(&SynthConfig::default());
        let mut chained = 0usize;
        for bike in 1..=10u64 {
            let mine: Vec<&Trip> = trips.iter().filter(|t| t.bike == bike).collect();
            for pair in mine.windows(2) {
                if pair[1].start_station == pair[0].end_station {
                    chained += 1;
                }
            }
        }
        // With chain_prob 0.7 a fair share of successions must chain.
        assert!(chained > 50, "only {chained} chained successions");
    }

    #[test]
    fn test_some_trips_reach_targets() {
        let trips = generate(&SynthConfig::default());
        let hits = trips
            .iter()
            .filter(|t| [426, 3002, 462].contains(&t.end_station))
            .count();
        assert!(hits > 5, "only {hits} target endings");
    }
}
