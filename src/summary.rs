use serde::Serialize;

use crate::hawkes::{IntensitySample, IntensitySeries};

/// Descriptive statistics of a reconstructed intensity series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntensitySummary {
    pub count: usize,
    pub min: f64,
    pub mean: f64,
    /// Sample standard deviation (n − 1 denominator).
    pub std: f64,
    pub max: f64,
    /// Highest-intensity grid points, descending by λ, ties by time.
    pub peaks: Vec<(i64, f64)>,
}

impl IntensitySummary {
    pub fn from_series(series: &IntensitySeries, top_k: usize) -> Option<Self> {
        summarize(&series.samples, top_k)
    }
}

pub fn summarize(samples: &[IntensitySample], top_k: usize) -> Option<IntensitySummary> {
    if samples.is_empty() {
        return None;
    }
    let n = samples.len() as f64;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    for s in samples {
        min = min.min(s.lambda);
        max = max.max(s.lambda);
        sum += s.lambda;
    }
    let mean = sum / n;
    let std = if samples.len() > 1 {
        let ss: f64 = samples.iter().map(|s| (s.lambda - mean).powi(2)).sum();
        (ss / (n - 1.0)).sqrt()
    } else {
        0.0
    };

    let mut ranked: Vec<&IntensitySample> = samples.iter().collect();
    ranked.sort_by(|a, b| {
        b.lambda
            .partial_cmp(&a.lambda)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.t_sec.cmp(&b.t_sec))
    });
    let peaks = ranked
        .into_iter()
        .take(top_k)
        .map(|s| (s.t_sec, s.lambda))
        .collect();

    Some(IntensitySummary {
        count: samples.len(),
        min,
        mean,
        std,
        max,
        peaks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(t_sec: i64, lambda: f64) -> IntensitySample {
        IntensitySample { t_sec, lambda }
    }

    #[test]
    fn basic_stats_and_peaks() {
        let samples = vec![
            sample(10, 1.0),
            sample(11, 3.0),
            sample(12, 2.0),
            sample(13, 3.0),
        ];
        let s = summarize(&samples, 2).unwrap();
        assert_eq!(s.count, 4);
        assert!((s.min - 1.0).abs() < f64::EPSILON);
        assert!((s.max - 3.0).abs() < f64::EPSILON);
        assert!((s.mean - 2.25).abs() < 1e-12);
        assert!((s.std - (2.75_f64 / 3.0).sqrt()).abs() < 1e-12);
        assert_eq!(s.peaks, vec![(11, 3.0), (13, 3.0)]);
    }

    #[test]
    fn empty_has_no_summary() {
        assert!(summarize(&[], 5).is_none());
    }
}
