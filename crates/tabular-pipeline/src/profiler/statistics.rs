//! Statistical functions for column profiling.
//!
//! These work on plain `f64` slices so the profiler and the transform engine
//! compute identical quartiles for the same column state.

use indexmap::IndexMap;

/// Arithmetic mean, `None` for an empty slice.
pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Calculate sample standard deviation (n - 1).
///
/// Undefined for fewer than two values.
pub(crate) fn sample_std(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let mean = mean(values)?;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    Some(variance.sqrt())
}

/// Quantile `q` of ascending `sorted` values with linear interpolation
/// between the two closest ranks.
pub(crate) fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let pos = q.clamp(0.0, 1.0) * last as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let fraction = pos - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Median of ascending `sorted` values.
pub(crate) fn median(sorted: &[f64]) -> Option<f64> {
    quantile(sorted, 0.5)
}

/// Tukey fences computed from the interquartile range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IqrBounds {
    pub q1: f64,
    pub q3: f64,
    pub lower: f64,
    pub upper: f64,
}

impl IqrBounds {
    const FENCE: f64 = 1.5;

    /// Bounds for ascending `sorted` values, `None` when there are none.
    pub fn from_sorted(sorted: &[f64]) -> Option<Self> {
        let q1 = quantile(sorted, 0.25)?;
        let q3 = quantile(sorted, 0.75)?;
        let iqr = q3 - q1;
        Some(Self {
            q1,
            q3,
            lower: q1 - Self::FENCE * iqr,
            upper: q3 + Self::FENCE * iqr,
        })
    }

    /// Inclusive bounds check.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.lower, self.upper)
    }

    /// Count values strictly outside the bounds. Nulls are not outliers.
    pub fn count_outside(&self, values: &[Option<f64>]) -> usize {
        values
            .iter()
            .flatten()
            .filter(|v| !self.contains(**v))
            .count()
    }
}

/// Distinct count and most frequent value. Ties go to the value seen first.
pub(crate) fn frequency_summary<'a, I>(values: I) -> (usize, Option<String>)
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: IndexMap<&str, usize> = IndexMap::new();
    for value in values {
        *counts.entry(value).or_insert(0) += 1;
    }

    let mut most_common: Option<(&str, usize)> = None;
    for (value, count) in &counts {
        if most_common.is_none_or(|(_, best)| *count > best) {
            most_common = Some((value, *count));
        }
    }

    (counts.len(), most_common.map(|(v, _)| v.to_string()))
}
