//! Partial-match index: per-bike lists of live Kleene chains with
//! window-based eviction.

use chrono::{DateTime, Duration, Utc};
use hotpath_core::{BikeId, EngineError, SharedTrip, StationId};
use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use smallvec::{smallvec, SmallVec};

/// Insertion-ordered map with fast hashing, so traversal over bikes is
/// deterministic for a given input order.
type FxIndexMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// An in-progress `a[1..k]` chain.
///
/// Every trip shares one bike; each adjacent pair chains spatially
/// (`next.start_station == prev.end_station`) and temporally
/// (`next.start_time >= prev.end_time`). Trips are `Arc`-shared, so
/// extending a chain clones pointers, never trip data, and the set of live
/// chains forms a prefix DAG over shared trips.
#[derive(Debug, Clone)]
pub struct PartialMatch {
    trips: SmallVec<[SharedTrip; 4]>,
}

impl PartialMatch {
    /// A fresh length-1 chain.
    pub fn seed(trip: SharedTrip) -> Self {
        Self {
            trips: smallvec![trip],
        }
    }

    /// A new chain one trip longer. The receiver stays live; extension is
    /// non-destructive. A trip for another bike is the fatal invariant
    /// violation: chains never mix correlation keys.
    pub fn extended(&self, trip: SharedTrip) -> Result<Self, EngineError> {
        if trip.bike != self.bike() {
            return Err(EngineError::MixedCorrelationKeys {
                chain_bike: self.bike(),
                trip_bike: trip.bike,
                event_id: trip.event_id,
            });
        }
        let mut trips = self.trips.clone();
        trips.push(trip);
        Ok(Self { trips })
    }

    pub fn bike(&self) -> BikeId {
        self.trips[0].bike
    }

    /// Start time of the first trip. Fixed at creation; the window is
    /// measured from here.
    pub fn anchor_time(&self) -> DateTime<Utc> {
        self.trips[0].start_time
    }

    pub fn tail_end_station(&self) -> StationId {
        self.trips[self.trips.len() - 1].end_station
    }

    pub fn tail_end_time(&self) -> DateTime<Utc> {
        self.trips[self.trips.len() - 1].end_time
    }

    pub fn len(&self) -> usize {
        self.trips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trips.is_empty()
    }

    pub fn trips(&self) -> &[SharedTrip] {
        &self.trips
    }
}

/// Mapping from bike id to that bike's live chains, in installation order.
/// Chains for different bikes never interact.
#[derive(Debug, Default)]
pub struct PartialMatchIndex {
    chains: FxIndexMap<BikeId, Vec<PartialMatch>>,
    evicted: u64,
    pruned: u64,
}

impl PartialMatchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every chain whose window has lapsed at logical time `now`.
    /// Runs before the extension step for each ingested trip, so no expired
    /// chain ever participates in extension or closure.
    ///
    /// Chains installed by the extension step inherit their parent's anchor
    /// time, so per-bike lists are not anchor-ordered and a head-pop scheme
    /// would leave expired chains behind; a full retain pass is used
    /// instead.
    pub fn evict_expired(&mut self, now: DateTime<Utc>, window: Duration) {
        let mut evicted = 0u64;
        for chains in self.chains.values_mut() {
            let before = chains.len();
            chains.retain(|pm| pm.anchor_time() + window >= now);
            evicted += (before - chains.len()) as u64;
        }
        self.evicted += evicted;
        self.chains.retain(|_, chains| !chains.is_empty());
    }

    /// Drop chains longer than the cap currently in effect. The cap can
    /// tighten between events under hybrid shedding; chains grown under a
    /// larger cap are destroyed, not truncated, so nothing longer than the
    /// cap ever reaches extension or closure.
    pub fn prune_over_cap(&mut self, cap: usize) {
        let mut pruned = 0u64;
        for chains in self.chains.values_mut() {
            let before = chains.len();
            chains.retain(|pm| pm.len() <= cap);
            pruned += (before - chains.len()) as u64;
        }
        self.pruned += pruned;
        self.chains.retain(|_, chains| !chains.is_empty());
    }

    /// Live chains for `bike`, oldest installation first.
    pub fn candidates_for(&self, bike: BikeId) -> &[PartialMatch] {
        self.chains.get(&bike).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Append a freshly constructed chain for its bike.
    pub fn install(&mut self, pm: PartialMatch) {
        self.chains.entry(pm.bike()).or_default().push(pm);
    }

    /// Total chains evicted since construction.
    pub fn evictions(&self) -> u64 {
        self.evicted
    }

    /// Total chains destroyed by cap tightening since construction.
    pub fn prunes(&self) -> u64 {
        self.pruned
    }

    pub fn live_chains(&self) -> usize {
        self.chains.values().map(Vec::len).sum()
    }

    pub fn tracked_bikes(&self) -> usize {
        self.chains.len()
    }

    /// All live chains across bikes, bike insertion order then chain
    /// installation order.
    pub fn iter(&self) -> impl Iterator<Item = &PartialMatch> {
        self.chains.values().flatten()
    }
}
