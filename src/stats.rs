//! Small numeric helpers shared by the cleaner, the model and the scorer.

use std::cmp::Ordering;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator). Zero for fewer than two values.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mu = mean(values);
    let sum_sq: f64 = values.iter().map(|x| (x - mu).powi(2)).sum();
    (sum_sq / (values.len() - 1) as f64).sqrt()
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    sorted
}

/// Percentile in `[0, 100]` with linear interpolation between closest ranks.
pub fn percentile(values: &[f64], pct: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sorted = sorted(values);
    let rank = (pct.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

pub fn median(values: &[f64]) -> Option<f64> {
    percentile(values, 50.0)
}

/// Sample values nearest to the `low_pct` and `high_pct` percentiles, each
/// rounded inward: the low bound is the first sample at or above the
/// interpolated low percentile, the high bound the last one at or below the
/// interpolated high percentile. Clamping to these bounds leaves them
/// unchanged, so repeated clamping is stable.
pub fn inner_bounds(values: &[f64], low_pct: f64, high_pct: f64) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let sorted = sorted(values);
    let last = (sorted.len() - 1) as f64;
    let low_rank = (low_pct.clamp(0.0, 100.0) / 100.0) * last;
    let high_rank = (high_pct.clamp(0.0, 100.0) / 100.0) * last;
    Some((
        sorted[low_rank.ceil() as usize],
        sorted[high_rank.floor() as usize],
    ))
}
