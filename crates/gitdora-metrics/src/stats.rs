//! Shared numeric primitives: percentile, percentile rank, mean, population
//! standard deviation and fixed-width rounding.

use serde::Serialize;

/// Decimal places for emitted statistics.
pub const STAT_PLACES: u32 = 2;

/// Decimal places for emitted percentages.
pub const PERCENT_PLACES: u32 = 1;

/// Round `value` to `places` decimal places, halves away from zero.
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

/// Arithmetic mean; zero for an empty sample.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divides by `n`); zero for an empty sample.
pub fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Percentile `p` (0-100) by linear interpolation between closest ranks.
///
/// The rank is `p / 100 * (n - 1)` over the ascending sample.
///
/// # Examples
///
/// ```
/// use gitdora_metrics::stats::percentile;
///
/// let sample = [4.0, 1.0, 3.0, 2.0];
/// assert_eq!(percentile(&sample, 50.0), 2.5);
/// assert_eq!(percentile(&sample, 75.0), 3.25);
/// assert_eq!(percentile(&[7.0], 75.0), 7.0);
/// ```
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (rank - lower as f64)
}

/// Share of `values` at or below `value`, as a percentage.
///
/// Ties all take the highest rank, so the largest value always ranks 100.
///
/// # Examples
///
/// ```
/// use gitdora_metrics::stats::percentile_rank;
///
/// let totals = [3.0, 10.0, 3.0, 1.0];
/// assert_eq!(percentile_rank(&totals, 10.0), 100.0);
/// assert_eq!(percentile_rank(&totals, 3.0), 75.0);
/// assert_eq!(percentile_rank(&totals, 1.0), 25.0);
/// ```
pub fn percentile_rank(values: &[f64], value: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let at_or_below = values.iter().filter(|v| **v <= value).count();
    at_or_below as f64 / values.len() as f64 * 100.0
}

/// Aggregate of one sample: the row shape of every time-bucketed table.
///
/// All values are rounded to two decimal places. An empty sample is all
/// zeros so that interval sequences never have gaps.
///
/// # Examples
///
/// ```
/// use gitdora_metrics::stats::Summary;
///
/// let summary = Summary::from_samples(&[10080.0, 10080.0]);
/// assert_eq!(summary.count, 2);
/// assert_eq!(summary.sum, 20160.0);
/// assert_eq!(summary.std, 0.0);
/// assert_eq!(Summary::from_samples(&[]), Summary::default());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// Sample size.
    pub count: usize,
    /// Sum of the sample.
    pub sum: f64,
    /// Arithmetic mean.
    pub average: f64,
    /// Median.
    pub p50: f64,
    /// 75th percentile.
    pub p75: f64,
    /// Population standard deviation.
    pub std: f64,
}

impl Summary {
    /// Summarize a sample.
    pub fn from_samples(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        Self {
            count: values.len(),
            sum: round_to(values.iter().sum(), STAT_PLACES),
            average: round_to(mean(values), STAT_PLACES),
            p50: round_to(percentile(values, 50.0), STAT_PLACES),
            p75: round_to(percentile(values, 75.0), STAT_PLACES),
            std: round_to(population_std(values), STAT_PLACES),
        }
    }
}
