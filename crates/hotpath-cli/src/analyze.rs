//! Offline chain statistics over a trip CSV.
//!
//! Groups trips by bike, walks greedy chainable successions inside the
//! window, and reports how much hot-path structure a dataset actually
//! contains. Useful for picking target stations and window sizes before a
//! run.

use hotpath_core::{PatternConfig, Trip};
use rustc_hash::FxHashMap;
use serde::Serialize;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChainReport {
    pub trips: usize,
    pub bikes: usize,
    /// Adjacent same-bike trip pairs where the next starts at the previous
    /// end within the window.
    pub chained_successions: u64,
    /// Longest greedy chain observed.
    pub longest_chain: usize,
    /// Greedy chains of length >= 2 whose final trip ends at a target
    /// station.
    pub target_chains: u64,
}

pub fn analyze(trips: &[Trip], config: &PatternConfig) -> ChainReport {
    let window = config.window();

    let mut by_bike: FxHashMap<u64, Vec<&Trip>> = FxHashMap::default();
    for trip in trips {
        by_bike.entry(trip.bike).or_default().push(trip);
    }

    let mut report = ChainReport {
        trips: trips.len(),
        bikes: by_bike.len(),
        ..Default::default()
    };

    for mine in by_bike.values_mut() {
        mine.sort_by_key(|t| (t.start_time, t.event_id));

        for pair in mine.windows(2) {
            if pair[1].start_station == pair[0].end_station
                && pair[1].start_time >= pair[0].end_time
                && pair[1].end_time - pair[0].start_time <= window
            {
                report.chained_successions += 1;
            }
        }

        // Greedy walk from each trip for chain length and target endings.
        let mut i = 0;
        while i < mine.len() {
            let anchor = mine[i];
            let mut chain_len = 1;
            let mut tail = anchor;

            let mut j = i + 1;
            while j < mine.len() {
                let next = mine[j];
                if next.end_time - anchor.start_time > window {
                    break;
                }
                if next.start_station == tail.end_station && next.start_time >= tail.end_time {
                    chain_len += 1;
                    tail = next;
                    j += 1;
                } else {
                    break;
                }
            }

            report.longest_chain = report.longest_chain.max(chain_len);
            if chain_len >= 2 && config.target_stations.contains(&tail.end_station) {
                report.target_chains += 1;
            }
            i += 1;
        }
    }

    report
}
