//! Summary statistics over sample series.

use serde::{Deserialize, Serialize};

/// Mean, maximum, and minimum of a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

/// Lower and upper quartile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quartiles {
    pub q1: f64,
    pub q3: f64,
}

/// Summarize the strictly positive values of a series.
///
/// Zero and negative values are sensor dropouts, not readings.
/// Returns None if nothing is left.
pub fn summarize(values: &[f64]) -> Option<Summary> {
    let positive = values.iter().copied().filter(|v| *v > 0.0);
    let (count, sum, min, max) = positive.fold(
        (0usize, 0.0, f64::INFINITY, f64::NEG_INFINITY),
        |(n, sum, min, max), v| (n + 1, sum + v, min.min(v), max.max(v)),
    );
    if count == 0 {
        return None;
    }
    Some(Summary {
        avg: sum / count as f64,
        min,
        max,
    })
}

/// Rough quartiles for when no better estimate is available.
///
/// Picks `sorted[floor(n * 0.25)]` and `sorted[floor(n * 0.75)]` from the
/// positive values, with no interpolation between ranks.
pub fn quartiles_fallback(values: &[f64]) -> Option<Quartiles> {
    let sorted = sorted_positive(values);
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    let at = |f: f64| sorted[((n as f64 * f).floor() as usize).min(n - 1)];
    Some(Quartiles {
        q1: at(0.25),
        q3: at(0.75),
    })
}

/// Linear-interpolated percentile of an ascending slice; `p` in [0, 1].
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let rank = p.clamp(0.0, 1.0) * last as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Interquartile range by linear interpolation over the positive values.
pub fn quartiles(values: &[f64]) -> Option<Quartiles> {
    let sorted = sorted_positive(values);
    Some(Quartiles {
        q1: percentile(&sorted, 0.25)?,
        q3: percentile(&sorted, 0.75)?,
    })
}

fn sorted_positive(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| *v > 0.0).collect();
    sorted.sort_by(f64::total_cmp);
    sorted
}
