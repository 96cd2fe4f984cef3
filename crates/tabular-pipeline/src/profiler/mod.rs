//! Column profiling.
//!
//! A column is numeric when its storage dtype is an integer or float kind;
//! everything else (strings, booleans, dates) is categorical. Numeric-looking
//! strings are not coerced. Statistics cover finite values only; infinities
//! and NaN fall outside every fence and are counted as outliers.

mod statistics;

pub use statistics::IqrBounds;
pub(crate) use statistics::{mean, median, sample_std};

use crate::error::Result;
use crate::types::{CategoricalStats, ColumnProfile, ColumnStats, InferredType, NumericStats};
use crate::utils::{is_numeric_dtype, numeric_values, percentage, round2, sorted_finite};
use polars::prelude::*;
use tracing::debug;

/// Profiles a single column. Pure function of the column contents.
pub struct ColumnProfiler;

impl ColumnProfiler {
    /// Classify a dtype.
    pub fn infer_type(dtype: &DataType) -> InferredType {
        if is_numeric_dtype(dtype) {
            InferredType::Numeric
        } else {
            InferredType::Categorical
        }
    }

    /// Profile `series`, a column of a table with `total_rows` rows.
    pub fn profile(series: &Series, total_rows: usize) -> Result<ColumnProfile> {
        let inferred_type = Self::infer_type(series.dtype());
        let null_count = series.null_count();

        let (stats, outlier_count) = match inferred_type {
            InferredType::Numeric => Self::numeric_profile(series)?,
            InferredType::Categorical => (Self::categorical_profile(series)?, 0),
        };

        debug!(
            "Profiled column '{}' as {:?} ({} nulls, {} outliers)",
            series.name(),
            inferred_type,
            null_count,
            outlier_count
        );

        Ok(ColumnProfile {
            name: series.name().to_string(),
            inferred_type,
            null_count,
            null_percentage: percentage(null_count, total_rows),
            outlier_count,
            outlier_percentage: percentage(outlier_count, total_rows),
            stats,
        })
    }

    fn numeric_profile(series: &Series) -> Result<(ColumnStats, usize)> {
        let values = numeric_values(series)?;
        let sorted = sorted_finite(&values);

        let Some(bounds) = IqrBounds::from_sorted(&sorted) else {
            return Ok((ColumnStats::Numeric(NumericStats::empty()), 0));
        };

        let stats = NumericStats {
            mean: mean(&sorted).map(round2),
            median: median(&sorted).map(round2),
            min: sorted.first().copied().map(round2),
            max: sorted.last().copied().map(round2),
            std: sample_std(&sorted).map(round2),
        };

        Ok((ColumnStats::Numeric(stats), bounds.count_outside(&values)))
    }

    fn categorical_profile(series: &Series) -> Result<ColumnStats> {
        let text = series.cast(&DataType::String)?;
        let (unique_count, most_common) =
            statistics::frequency_summary(text.str()?.into_iter().flatten());

        Ok(ColumnStats::Categorical(CategoricalStats {
            unique_count,
            most_common,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn column(df: &DataFrame, name: &str) -> Series {
        df.column(name).unwrap().as_materialized_series().clone()
    }

    #[test]
    fn test_infer_type() {
        assert_eq!(ColumnProfiler::infer_type(&DataType::Int32), InferredType::Numeric);
        assert_eq!(ColumnProfiler::infer_type(&DataType::Float64), InferredType::Numeric);
        assert_eq!(ColumnProfiler::infer_type(&DataType::String), InferredType::Categorical);
        assert_eq!(ColumnProfiler::infer_type(&DataType::Boolean), InferredType::Categorical);
    }

    #[test]
    fn test_numeric_profile_with_outlier() {
        let df = df!["v" => [1i64, 2, 3, 4, 100]].unwrap();
        let profile = ColumnProfiler::profile(&column(&df, "v"), 5).unwrap();

        assert_eq!(profile.inferred_type, InferredType::Numeric);
        assert_eq!(profile.outlier_count, 1);
        assert_eq!(profile.outlier_percentage, 20.0);

        let stats = profile.numeric_stats().unwrap();
        assert_eq!(stats.mean, Some(22.0));
        assert_eq!(stats.median, Some(3.0));
        assert_eq!(stats.min, Some(1.0));
        assert_eq!(stats.max, Some(100.0));
        assert_eq!(stats.std, Some(43.62));
    }

    #[test]
    fn test_numeric_profile_counts_nulls() {
        let df = df!["v" => [Some(10.0), None, Some(30.0)]].unwrap();
        let profile = ColumnProfiler::profile(&column(&df, "v"), 3).unwrap();

        assert_eq!(profile.null_count, 1);
        assert_eq!(profile.null_percentage, 33.33);
        assert_eq!(profile.numeric_stats().unwrap().mean, Some(20.0));
    }

    #[test]
    fn test_infinite_values_are_outliers_not_stats() {
        let series = Series::new("v".into(), &[1.0, 2.0, 3.0, 4.0, f64::INFINITY]);
        let profile = ColumnProfiler::profile(&series, 5).unwrap();

        let stats = profile.numeric_stats().unwrap();
        assert_eq!(stats.mean, Some(2.5));
        assert_eq!(stats.max, Some(4.0));
        assert_eq!(stats.std, Some(1.29));
        assert_eq!(profile.outlier_count, 1);
        assert_eq!(profile.null_count, 0);
    }

    #[test]
    fn test_all_missing_numeric() {
        let series = Series::new("v".into(), &[None::<f64>, None, None]);
        let profile = ColumnProfiler::profile(&series, 3).unwrap();

        assert_eq!(profile.stats, ColumnStats::Numeric(NumericStats::empty()));
        assert_eq!(profile.outlier_count, 0);
        assert_eq!(profile.null_percentage, 100.0);
    }

    #[test]
    fn test_single_value_has_no_std() {
        let df = df!["v" => [4.0]].unwrap();
        let profile = ColumnProfiler::profile(&column(&df, "v"), 1).unwrap();
        let stats = profile.numeric_stats().unwrap();
        assert_eq!(stats.mean, Some(4.0));
        assert_eq!(stats.std, None);
    }

    #[test]
    fn test_categorical_profile() {
        let df = df!["c" => [Some("a"), Some("b"), Some("a"), None, Some("c"), Some("a")]].unwrap();
        let profile = ColumnProfiler::profile(&column(&df, "c"), 6).unwrap();

        assert_eq!(profile.inferred_type, InferredType::Categorical);
        assert_eq!(profile.null_count, 1);
        assert_eq!(profile.outlier_count, 0);
        assert_eq!(
            profile.categorical_stats().unwrap(),
            &CategoricalStats {
                unique_count: 3,
                most_common: Some("a".to_string()),
            }
        );
    }

    #[test]
    fn test_boolean_is_categorical() {
        let df = df!["b" => [true, false, true]].unwrap();
        let profile = ColumnProfiler::profile(&column(&df, "b"), 3).unwrap();
        let stats = profile.categorical_stats().unwrap();
        assert_eq!(stats.unique_count, 2);
        assert_eq!(stats.most_common.as_deref(), Some("true"));
    }

    #[test]
    fn test_empty_table() {
        let series = Series::new("v".into(), Vec::<f64>::new());
        let profile = ColumnProfiler::profile(&series, 0).unwrap();
        assert_eq!(profile.null_percentage, 0.0);
        assert_eq!(profile.outlier_percentage, 0.0);
    }
}
