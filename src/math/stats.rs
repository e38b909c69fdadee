//! Statistical primitives shared by the comparators and the cohort engine.
//!
//! Note: `median` and `quantile` may reorder the input slice.

use statrs::distribution::{ContinuousCDF, Normal};

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        let a = values[n / 2 - 1];
        let b = values[n / 2];
        (a + b) / 2.0
    }
}

/// Nearest-rank quantile, `q` in [0,1].
pub fn quantile(values: &mut [f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let q = q.clamp(0.0, 1.0);
    let rank = (q * values.len() as f64).ceil() as usize;
    values[rank.saturating_sub(1).min(values.len() - 1)]
}

/// Population percentile of `value` under N(mean, std).
///
/// Returns `None` when `std` is not a positive finite number.
pub fn normal_cdf(value: f64, mean: f64, std: f64) -> Option<f64> {
    if !(std.is_finite() && std > 0.0) || !mean.is_finite() || !value.is_finite() {
        return None;
    }
    let dist = Normal::new(mean, std).ok()?;
    Some(dist.cdf(value))
}

/// Linear min-max rescale of `values` onto [range_start, range_end].
///
/// A degenerate input (all values equal) maps every value to `range_start`.
pub fn min_max_scale(values: &[f64], range_start: f64, range_end: f64) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let mut min_value = f64::INFINITY;
    let mut max_value = f64::NEG_INFINITY;
    for &v in values {
        min_value = min_value.min(v);
        max_value = max_value.max(v);
    }
    let span = max_value - min_value;
    if span <= 0.0 || !span.is_finite() {
        return vec![range_start; values.len()];
    }
    values
        .iter()
        .map(|v| (v - min_value) / span * (range_end - range_start) + range_start)
        .collect()
}
