//! Recall of a run's projections against an unshed baseline.
//!
//! Not on the hot path; used after a run to score what shedding cost.

use hotpath_core::Projection;
use rustc_hash::FxHashSet;

/// Collect projections into the set form recall is computed over.
pub fn projection_set<I>(projections: I) -> FxHashSet<Projection>
where
    I: IntoIterator<Item = Projection>,
{
    projections.into_iter().collect()
}

/// `|run ∩ baseline| / |baseline|`, by exact tuple equality. An empty
/// baseline scores 1.0: there was nothing to miss.
pub fn recall(baseline: &FxHashSet<Projection>, run: &FxHashSet<Projection>) -> f64 {
    if baseline.is_empty() {
        return 1.0;
    }
    let hit = baseline.intersection(run).count();
    hit as f64 / baseline.len() as f64
}
