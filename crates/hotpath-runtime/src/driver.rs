//! Stream driver: ingress, shedding, matching, and output fan-out.
//!
//! The driver owns the per-run counters and latency samples. It processes
//! trips strictly in arrival order on a single thread; the only suspension
//! point is the optional burst-injection sleep, and the latency clock is
//! read after it so a sample never spans a sleep.

use crate::matcher::HotPathMatcher;
use crate::metrics::LatencySummary;
use crate::shedding::AdmissionController;
use anyhow::Result;
use chrono::{DateTime, Utc};
use hotpath_core::{PatternMatch, Projection, Trip};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Receives completed matches as they are emitted. Implementations write
/// projections and detection latencies wherever the run wants them.
pub trait MatchSink {
    fn accept(&mut self, m: &PatternMatch, detection_latency_ms: f64) -> Result<()>;
}

/// Sink that collects projections and detection latencies in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub projections: Vec<Projection>,
    pub detection_latencies_ms: Vec<f64>,
}

impl MatchSink for MemorySink {
    fn accept(&mut self, m: &PatternMatch, detection_latency_ms: f64) -> Result<()> {
        self.projections.push(m.projection());
        self.detection_latencies_ms.push(detection_latency_ms);
        Ok(())
    }
}

/// End-of-run counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunCounters {
    /// Events handed to the driver.
    pub ingested: u64,
    /// Events that reached the matcher.
    pub forwarded: u64,
    /// Events dropped by the shedder.
    pub dropped: u64,
    /// Events rejected for violating the monotone start-time contract.
    pub out_of_order: u64,
    /// Matches emitted.
    pub matches: u64,
    /// Partial matches evicted on window expiry.
    pub evictions: u64,
    /// Partial matches destroyed by Kleene-cap tightening.
    pub pruned: u64,
}

impl RunCounters {
    /// Counter names and values, alphabetical, for artifact output.
    pub fn as_pairs(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("dropped", self.dropped),
            ("evictions", self.evictions),
            ("forwarded", self.forwarded),
            ("ingested", self.ingested),
            ("matches", self.matches),
            ("out_of_order", self.out_of_order),
            ("pruned", self.pruned),
        ]
    }
}

/// What a run produced, beyond what the sink collected.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub counters: RunCounters,
    /// Summary over per-event processing latencies; `None` if nothing was
    /// processed.
    pub latency: Option<LatencySummary>,
    pub final_kleene_cap: usize,
    pub overloaded_at_end: bool,
    pub wall_time: Duration,
}

pub struct StreamDriver<C: AdmissionController> {
    matcher: HotPathMatcher,
    controller: C,
    burst_every: u64,
    burst_sleep: Duration,
    cancel: Arc<AtomicBool>,
    counters: RunCounters,
    latencies_ms: Vec<f64>,
}

impl<C: AdmissionController> StreamDriver<C> {
    pub fn new(matcher: HotPathMatcher, controller: C) -> Self {
        Self {
            matcher,
            controller,
            burst_every: 0,
            burst_sleep: Duration::ZERO,
            cancel: Arc::new(AtomicBool::new(false)),
            counters: RunCounters::default(),
            latencies_ms: Vec::new(),
        }
    }

    /// Enable burst-mode load injection: sleep before processing every
    /// `every`-th event. Test facility only; pattern semantics are
    /// unaffected.
    pub fn with_burst(mut self, every: u64, sleep_ms: u64) -> Self {
        self.burst_every = every;
        self.burst_sleep = Duration::from_millis(sleep_ms);
        self
    }

    /// Flag checked between events; set it from another thread to stop the
    /// run cooperatively.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn counters(&self) -> RunCounters {
        self.counters
    }

    /// Per-event processing latencies recorded so far.
    pub fn latencies_ms(&self) -> &[f64] {
        &self.latencies_ms
    }

    /// Process `trips` in arrival order, forwarding matches into `sink`.
    pub fn run<I>(&mut self, trips: I, sink: &mut dyn MatchSink) -> Result<RunSummary>
    where
        I: IntoIterator<Item = Trip>,
    {
        let run_start = Instant::now();
        let mut last_start_time: Option<DateTime<Utc>> = None;

        for trip in trips {
            if self.cancel.load(Ordering::Relaxed) {
                info!("cancellation requested, stopping ingest");
                break;
            }

            let seq = self.counters.ingested;
            self.counters.ingested += 1;

            if self.burst_every > 0 && self.counters.ingested % self.burst_every == 0 {
                std::thread::sleep(self.burst_sleep);
            }

            // The stream contract is monotone non-decreasing start times;
            // out-of-order arrivals are not supported and never reach the
            // matcher.
            if last_start_time.is_some_and(|prev| trip.start_time < prev) {
                warn!(event_id = trip.event_id, "out-of-order trip dropped");
                self.counters.out_of_order += 1;
                continue;
            }
            last_start_time = Some(trip.start_time);

            let started = Instant::now();
            if !self.controller.should_admit() {
                self.counters.dropped += 1;
                continue;
            }

            let trip = Arc::new(trip.with_ingest_seq(seq));
            let matches = self
                .matcher
                .process(&trip, self.controller.current_cap())?;
            let latency_ms = started.elapsed().as_secs_f64() * 1e3;

            self.counters.forwarded += 1;
            self.counters.matches += matches.len() as u64;
            for m in &matches {
                sink.accept(m, latency_ms)?;
            }

            self.latencies_ms.push(latency_ms);
            self.controller.observe_latency(latency_ms);
        }

        self.counters.evictions = self.matcher.evictions();
        self.counters.pruned = self.matcher.prunes();
        let summary = RunSummary {
            counters: self.counters,
            latency: LatencySummary::from_samples(&self.latencies_ms),
            final_kleene_cap: self.controller.current_cap(),
            overloaded_at_end: self.controller.is_overloaded(),
            wall_time: run_start.elapsed(),
        };
        info!(
            ingested = summary.counters.ingested,
            forwarded = summary.counters.forwarded,
            dropped = summary.counters.dropped,
            matches = summary.counters.matches,
            evictions = summary.counters.evictions,
            "run complete"
        );
        Ok(summary)
    }

    pub fn matcher(&self) -> &HotPathMatcher {
        &self.matcher
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use hotpath_core::PatternConfig;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn trip(id: u64, bike: u64, start: u32, end: u32, st: i64, et: i64) -> Trip {
        Trip::new(id, bike, start, end, ts(st), ts(et))
    }

    /// Controller with a scripted admission sequence; everything beyond the
    /// script is admitted.
    struct ScriptedController {
        verdicts: Vec<bool>,
        next: usize,
        cap: usize,
    }

    impl ScriptedController {
        fn new(verdicts: Vec<bool>, cap: usize) -> Self {
            Self {
                verdicts,
                next: 0,
                cap,
            }
        }
    }

    impl AdmissionController for ScriptedController {
        fn should_admit(&mut self) -> bool {
            let verdict = self.verdicts.get(self.next).copied().unwrap_or(true);
            self.next += 1;
            verdict
        }

        fn current_cap(&self) -> usize {
            self.cap
        }

        fn observe_latency(&mut self, _latency_ms: f64) {}
    }

    fn driver(verdicts: Vec<bool>) -> StreamDriver<ScriptedController> {
        StreamDriver::new(
            HotPathMatcher::new(PatternConfig::new([9], 3600, 3)),
            ScriptedController::new(verdicts, 3),
        )
    }

    #[test]
    fn test_counters_without_shedding() {
        let mut d = driver(vec![]);
        let mut sink = MemorySink::default();
        let trips = vec![
            trip(1, 1, 5, 6, 0, 100),
            trip(2, 1, 6, 7, 100, 200),
            trip(3, 1, 7, 9, 200, 300),
        ];
        let summary = d.run(trips, &mut sink).unwrap();
        assert_eq!(summary.counters.ingested, 3);
        assert_eq!(summary.counters.forwarded, 3);
        assert_eq!(summary.counters.dropped, 0);
        assert_eq!(summary.counters.matches, 2);
        assert_eq!(sink.projections.len(), 2);
        assert_eq!(sink.detection_latencies_ms.len(), 2);
        assert_eq!(summary.latency.unwrap().count, 3);
    }

    #[test]
    fn test_shedder_drop_is_counted_and_skips_matcher() {
        // Dropping the first trip leaves only the two-trip tail, which still
        // matches on its own.
        let mut d = driver(vec![false, true, true]);
        let mut sink = MemorySink::default();
        let trips = vec![
            trip(1, 1, 5, 6, 0, 100),
            trip(2, 1, 6, 7, 100, 200),
            trip(3, 1, 7, 9, 200, 300),
        ];
        let summary = d.run(trips, &mut sink).unwrap();
        assert_eq!(summary.counters.ingested, 3);
        assert_eq!(summary.counters.dropped, 1);
        assert_eq!(summary.counters.forwarded, 2);
        assert_eq!(summary.counters.matches, 1);
        assert_eq!(sink.projections[0].a1_start, 6);
    }

    #[test]
    fn test_out_of_order_trip_rejected() {
        let mut d = driver(vec![]);
        let mut sink = MemorySink::default();
        let trips = vec![
            trip(1, 1, 5, 6, 1000, 1100),
            trip(2, 1, 6, 9, 500, 600),
        ];
        let summary = d.run(trips, &mut sink).unwrap();
        assert_eq!(summary.counters.ingested, 2);
        assert_eq!(summary.counters.out_of_order, 1);
        assert_eq!(summary.counters.forwarded, 1);
        assert_eq!(summary.counters.matches, 0);
    }

    #[test]
    fn test_equal_start_times_are_in_order() {
        let mut d = driver(vec![]);
        let mut sink = MemorySink::default();
        let trips = vec![trip(1, 1, 5, 6, 100, 200), trip(2, 2, 8, 7, 100, 150)];
        let summary = d.run(trips, &mut sink).unwrap();
        assert_eq!(summary.counters.out_of_order, 0);
        assert_eq!(summary.counters.forwarded, 2);
    }

    #[test]
    fn test_ingest_seq_assigned_in_arrival_order() {
        let mut d = driver(vec![false, true]);
        let mut sink = MemorySink::default();
        let trips = vec![trip(1, 1, 5, 6, 0, 100), trip(2, 1, 6, 9, 100, 200)];
        d.run(trips, &mut sink).unwrap();
        // The dropped trip still consumed arrival index 0.
        let chains = d.matcher().index();
        let seqs: Vec<u64> = chains.iter().map(|pm| pm.trips()[0].ingest_seq).collect();
        assert_eq!(seqs, vec![1]);
    }

    #[test]
    fn test_cancellation_stops_between_events() {
        let mut d = driver(vec![]);
        d.cancel_flag().store(true, Ordering::Relaxed);
        let mut sink = MemorySink::default();
        let summary = d
            .run(vec![trip(1, 1, 5, 6, 0, 100)], &mut sink)
            .unwrap();
        assert_eq!(summary.counters.ingested, 0);
    }
}
