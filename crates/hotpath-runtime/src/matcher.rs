//! Per-event pattern state machine.
//!
//! For each admitted trip the matcher evicts expired chains, prunes chains
//! the current cap no longer allows, extends every chain the trip fits
//! onto, closes chains when the trip ends at a target station, and finally
//! seeds a fresh length-1 chain. All steps run in index-insertion order, so
//! the emitted match sequence is deterministic for a given input stream.

use crate::index::{PartialMatch, PartialMatchIndex};
use chrono::Duration;
use hotpath_core::{EngineError, PatternConfig, PatternMatch, SharedTrip, StationId};
use std::time::Instant;
use tracing::debug;

/// Snapshot of matcher state for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatcherStats {
    pub live_chains: usize,
    pub tracked_bikes: usize,
    pub evictions: u64,
    pub pruned: u64,
}

pub struct HotPathMatcher {
    config: PatternConfig,
    window: Duration,
    index: PartialMatchIndex,
}

impl HotPathMatcher {
    pub fn new(config: PatternConfig) -> Self {
        let window = config.window();
        Self {
            config,
            window,
            index: PartialMatchIndex::new(),
        }
    }

    /// Advance the state machine by one trip and return the matches it
    /// completed. `cap` is the Kleene length bound in effect for this event;
    /// the controller keeps it within `[1, max_kleene]`.
    pub fn process(
        &mut self,
        trip: &SharedTrip,
        cap: usize,
    ) -> Result<Vec<PatternMatch>, EngineError> {
        self.index.evict_expired(trip.start_time, self.window);
        self.index.prune_over_cap(cap);

        // Kleene continuation. Extended copies are installed after the scan;
        // the source chains stay live so shorter prefixes keep matching
        // later trips. Extension surfaces the mixed-key invariant violation.
        let mut extensions = Vec::new();
        for pm in self.index.candidates_for(trip.bike) {
            if self.chains_onto(pm, trip) && self.within_window(pm, trip) && pm.len() < cap {
                extensions.push(pm.extended(trip.clone())?);
            }
        }
        for pm in extensions {
            self.index.install(pm);
        }

        // Terminator closure, over every live chain including the ones just
        // installed above. Closure does not retire the chain: emission is
        // non-destructive and the chain may still grow or close again later.
        let mut matches = Vec::new();
        if self.is_target(trip.end_station) {
            let detected_at = Instant::now();
            for pm in self.index.candidates_for(trip.bike) {
                if self.chains_onto(pm, trip) && self.within_window(pm, trip) {
                    matches.push(PatternMatch {
                        trips: pm.trips().to_vec(),
                        terminator: trip.clone(),
                        detected_at,
                    });
                }
            }
        }

        // Any trip may begin a fresh `a[1]`. Seeded last, so the new chain
        // cannot close on its own trip as terminator.
        self.index.install(PartialMatch::seed(trip.clone()));

        if !matches.is_empty() {
            debug!(
                event_id = trip.event_id,
                bike = trip.bike,
                matches = matches.len(),
                "terminator closed chains"
            );
        }
        Ok(matches)
    }

    fn chains_onto(&self, pm: &PartialMatch, trip: &SharedTrip) -> bool {
        pm.tail_end_station() == trip.start_station && trip.start_time >= pm.tail_end_time()
    }

    fn within_window(&self, pm: &PartialMatch, trip: &SharedTrip) -> bool {
        trip.end_time - pm.anchor_time() <= self.window
    }

    fn is_target(&self, station: StationId) -> bool {
        self.config.target_stations.contains(&station)
    }

    pub fn stats(&self) -> MatcherStats {
        MatcherStats {
            live_chains: self.index.live_chains(),
            tracked_bikes: self.index.tracked_bikes(),
            evictions: self.index.evictions(),
            pruned: self.index.prunes(),
        }
    }

    pub fn evictions(&self) -> u64 {
        self.index.evictions()
    }

    pub fn prunes(&self) -> u64 {
        self.index.prunes()
    }

    pub fn index(&self) -> &PartialMatchIndex {
        &self.index
    }

    pub fn config(&self) -> &PatternConfig {
        &self.config
    }
}
