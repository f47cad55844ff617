//! Latency sample summarisation for end-of-run reporting.

use serde::Serialize;

/// Descriptive statistics over latency samples, in milliseconds.
/// Percentiles use nearest-rank on the sorted samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencySummary {
    pub count: usize,
    pub p50: f64,
    pub p95: f64,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

impl LatencySummary {
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);

        let rank = |q: f64| {
            let idx = (q * (sorted.len() - 1) as f64).round() as usize;
            sorted[idx.min(sorted.len() - 1)]
        };

        Some(Self {
            count: sorted.len(),
            p50: rank(0.50),
            p95: rank(0.95),
            avg: sorted.iter().sum::<f64>() / sorted.len() as f64,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_samples() {
        assert!(LatencySummary::from_samples(&[]).is_none());
    }

    #[test]
    fn test_single_sample() {
        let s = LatencySummary::from_samples(&[4.0]).unwrap();
        assert_eq!(s.count, 1);
        assert_eq!(s.p50, 4.0);
        assert_eq!(s.p95, 4.0);
        assert_eq!(s.min, 4.0);
        assert_eq!(s.max, 4.0);
    }

    #[test]
    fn test_summary_over_unsorted_samples() {
        let samples: Vec<f64> = (1..=100).rev().map(|v| v as f64).collect();
        let s = LatencySummary::from_samples(&samples).unwrap();
        assert_eq!(s.count, 100);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 100.0);
        assert_eq!(s.p50, 51.0);
        assert_eq!(s.p95, 95.0);
        assert!((s.avg - 50.5).abs() < 1e-9);
    }
}
