//! Latency-driven load shedding.
//!
//! The controller smooths per-event processing latency with an EWMA and
//! compares it against a configured target. While overloaded it drops
//! ingress events with a probability proportional to the overload ratio;
//! in hybrid mode it additionally walks the Kleene cap down, which bounds
//! partial-match state directly rather than just thinning the input.
//! Hysteresis on the exit threshold and consecutive-sample streaks keep the
//! controller from flapping on single spikes.

use hotpath_core::{ShedMode, SheddingConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

/// EWMA smoothing factor for latency samples.
const EWMA_ALPHA: f64 = 0.2;

/// Overload clears once the EWMA falls below this fraction of the target.
const EXIT_HYSTERESIS: f64 = 0.8;

/// Ceiling on the drop probability; at least one event in ten always passes.
const MAX_DROP_PROB: f64 = 0.9;

/// Consecutive overloaded samples before the Kleene cap shrinks by one.
const CAP_SHRINK_AFTER: u32 = 3;

/// Consecutive calm samples before the cap grows back by one.
const CAP_GROW_AFTER: u32 = 10;

/// Admission decisions consumed by the stream driver. The driver reads the
/// cap and the admission verdict at the start of each per-event step.
pub trait AdmissionController {
    /// Whether the next ingress event should reach the matcher.
    fn should_admit(&mut self) -> bool;

    /// Kleene length bound in effect for the next event.
    fn current_cap(&self) -> usize;

    /// Feed the processing latency of the event just completed.
    fn observe_latency(&mut self, latency_ms: f64);

    /// Whether the controller currently considers the engine overloaded.
    fn is_overloaded(&self) -> bool {
        false
    }
}

pub struct SheddingController {
    mode: ShedMode,
    target_latency_ms: f64,
    base_drop_prob: f64,
    max_kleene: usize,
    ewma_ms: f64,
    overloaded: bool,
    drop_prob: f64,
    cap: usize,
    overloaded_streak: u32,
    calm_streak: u32,
    rng: StdRng,
}

impl SheddingController {
    pub fn new(config: &SheddingConfig, max_kleene: usize) -> Self {
        Self {
            mode: config.mode,
            target_latency_ms: config.target_latency_ms,
            base_drop_prob: config.base_drop_prob,
            max_kleene,
            // Until the first sample arrives the EWMA is zero, i.e. calm.
            ewma_ms: 0.0,
            overloaded: false,
            drop_prob: 0.0,
            cap: max_kleene,
            overloaded_streak: 0,
            calm_streak: 0,
            rng: StdRng::seed_from_u64(config.seed),
        }
    }

    pub fn ewma_latency_ms(&self) -> f64 {
        self.ewma_ms
    }

    pub fn drop_prob(&self) -> f64 {
        self.drop_prob
    }

    fn adjust_cap(&mut self) {
        if self.overloaded {
            self.calm_streak = 0;
            self.overloaded_streak += 1;
            if self.overloaded_streak >= CAP_SHRINK_AFTER {
                self.overloaded_streak = 0;
                if self.cap > 1 {
                    self.cap -= 1;
                    info!(
                        cap = self.cap,
                        ewma_ms = self.ewma_ms,
                        "kleene cap lowered under overload"
                    );
                }
            }
        } else {
            self.overloaded_streak = 0;
            self.calm_streak += 1;
            if self.calm_streak >= CAP_GROW_AFTER {
                self.calm_streak = 0;
                if self.cap < self.max_kleene {
                    self.cap += 1;
                    info!(cap = self.cap, "kleene cap restored");
                }
            }
        }
    }
}

impl AdmissionController for SheddingController {
    fn should_admit(&mut self) -> bool {
        if self.mode == ShedMode::Off || !self.overloaded || self.drop_prob <= 0.0 {
            return true;
        }
        self.rng.gen::<f64>() >= self.drop_prob
    }

    fn current_cap(&self) -> usize {
        self.cap
    }

    fn is_overloaded(&self) -> bool {
        self.overloaded
    }

    fn observe_latency(&mut self, latency_ms: f64) {
        self.ewma_ms = EWMA_ALPHA * latency_ms + (1.0 - EWMA_ALPHA) * self.ewma_ms;

        if self.ewma_ms > self.target_latency_ms {
            self.overloaded = true;
        } else if self.ewma_ms < EXIT_HYSTERESIS * self.target_latency_ms {
            self.overloaded = false;
        }

        self.drop_prob = if self.overloaded {
            let overload_ratio = self.ewma_ms / self.target_latency_ms;
            (self.base_drop_prob * overload_ratio).min(MAX_DROP_PROB)
        } else {
            0.0
        };

        if self.mode == ShedMode::Hybrid {
            self.adjust_cap();
        }
    }
}
