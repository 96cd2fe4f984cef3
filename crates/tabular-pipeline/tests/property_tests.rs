//! Property-based tests for profiling and the transform engine.
//!
//! Numeric columns are generated with controlled null fractions and value
//! ranges; each property is checked against the library's own results.

use polars::prelude::*;
use proptest::prelude::*;
use tabular_pipeline::{
    ColumnProfiler, ColumnRules, DatasetAnalyzer, MissingStrategy, OutlierStrategy,
    PreprocessingConfig, TransformEngine,
};

// ============================================================================
// Test Data Generation Utilities
// ============================================================================

/// A nullable numeric column with at least one present value.
fn nullable_values() -> impl Strategy<Value = Vec<Option<f64>>> {
    prop::collection::vec(
        prop_oneof![
            4 => (-1.0e6f64..1.0e6).prop_map(Some),
            1 => Just(None),
        ],
        1..60,
    )
    .prop_filter("needs one present value", |values| {
        values.iter().any(Option::is_some)
    })
}

fn frame(values: &[Option<f64>]) -> DataFrame {
    let labels: Vec<String> = (0..values.len()).map(|i| format!("row{}", i % 7)).collect();
    df!["v" => values, "label" => labels].unwrap()
}

fn column_values(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
    df.column(name)
        .unwrap()
        .as_materialized_series()
        .cast(&DataType::Float64)
        .unwrap()
        .f64()
        .unwrap()
        .into_iter()
        .collect()
}

// Reported statistics are rounded to two decimals.
const EPSILON: f64 = 0.01 + 1e-9;

// ============================================================================
// Profiling Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_central_stats_within_range(values in nullable_values()) {
        let series = Series::new("v".into(), &values);
        let profile = ColumnProfiler::profile(&series, values.len()).unwrap();
        let stats = profile.numeric_stats().unwrap();

        let (min, max) = (stats.min.unwrap(), stats.max.unwrap());
        let mean = stats.mean.unwrap();
        let median = stats.median.unwrap();

        prop_assert!(min <= mean + EPSILON && mean <= max + EPSILON);
        prop_assert!(min <= median + EPSILON && median <= max + EPSILON);
        prop_assert_eq!(
            profile.null_count,
            values.iter().filter(|v| v.is_none()).count()
        );
    }

    #[test]
    fn prop_analysis_is_deterministic(values in nullable_values()) {
        let df = frame(&values);

        let first = serde_json::to_value(DatasetAnalyzer::analyze(&df, 0).unwrap()).unwrap();
        let second = serde_json::to_value(DatasetAnalyzer::analyze(&df, 0).unwrap()).unwrap();

        prop_assert_eq!(first, second);
    }
}

// ============================================================================
// Transform Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_cap_only_keeps_row_count(values in nullable_values()) {
        let df = frame(&values);
        let config = PreprocessingConfig::new()
            .column("v", ColumnRules::new().missing(MissingStrategy::Median).outliers(OutlierStrategy::Cap));

        let output = TransformEngine::apply(df, &config).unwrap();

        prop_assert_eq!(output.processed_rows(), values.len());
        prop_assert_eq!(output.rows_removed(), 0);
    }

    #[test]
    fn prop_remove_never_adds_rows(values in nullable_values()) {
        let df = frame(&values);
        let config = PreprocessingConfig::new()
            .column("v", ColumnRules::new().outliers(OutlierStrategy::Remove))
            .column("label", ColumnRules::new().missing(MissingStrategy::Remove));

        let output = TransformEngine::apply(df, &config).unwrap();

        prop_assert!(output.processed_rows() <= values.len());
        prop_assert_eq!(output.original_rows - output.processed_rows(), output.rows_removed());
        prop_assert_eq!(output.table.column("v").unwrap().null_count(), 0);
    }

    /// With `4k + 1` values the quartiles land on observed values, so a
    /// second cap sees the same bounds.
    #[test]
    fn prop_cap_is_idempotent(
        values in (1usize..12).prop_flat_map(|k| prop::collection::vec(-1000i64..1000, 4 * k + 1))
    ) {
        let values: Vec<Option<f64>> = values.into_iter().map(|v| Some(v as f64)).collect();
        let config = PreprocessingConfig::new()
            .column("v", ColumnRules::new().outliers(OutlierStrategy::Cap));

        let once = TransformEngine::apply(frame(&values), &config).unwrap().table;
        let twice = TransformEngine::apply(once.clone(), &config).unwrap().table;

        prop_assert_eq!(column_values(&once, "v"), column_values(&twice, "v"));
    }
}
