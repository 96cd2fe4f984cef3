//! Transform engine.
//!
//! Applies per-column rules in configuration order. For each column the
//! missing-value rule runs before the outlier rule, and every rule sees the
//! table as left by the rules before it.

use crate::config::{ColumnRules, MissingStrategy, OutlierStrategy, PreprocessingConfig};
use crate::error::{Result, ResultExt};
use crate::imputers::StatisticalImputer;
use crate::pipeline::outliers::OutlierHandler;
use crate::types::{ActionType, PreprocessingAction, RuleDiagnostic};
use crate::utils::{fill_string_nulls, is_numeric_dtype};
use polars::prelude::*;
use tracing::{debug, info, warn};

/// Output of a transform run.
#[derive(Debug)]
pub struct TransformOutput {
    /// The cleaned table.
    pub table: DataFrame,
    pub original_rows: usize,
    pub actions: Vec<PreprocessingAction>,
    pub diagnostics: Vec<RuleDiagnostic>,
}

impl TransformOutput {
    pub fn processed_rows(&self) -> usize {
        self.table.height()
    }

    /// Rows dropped by remove rules. Never negative: rules only filter.
    pub fn rows_removed(&self) -> usize {
        self.original_rows.saturating_sub(self.table.height())
    }
}

/// Applies a [`PreprocessingConfig`] to a table.
pub struct TransformEngine;

impl TransformEngine {
    /// Run every configured rule, then replace any remaining missing values.
    pub fn apply(mut df: DataFrame, config: &PreprocessingConfig) -> Result<TransformOutput> {
        let original_rows = df.height();
        let mut actions = Vec::new();
        let mut diagnostics = Vec::new();

        info!(
            "Applying {} column rule sets to {} rows",
            config.len(),
            original_rows
        );
        if config.removes_rows() {
            debug!("Configured rules may drop rows");
        }

        for (col_name, rules) in config.iter() {
            Self::apply_column_rules(&mut df, col_name, rules, &mut actions, &mut diagnostics)
                .context(format!("While applying rules to '{col_name}'"))?;
        }

        Self::fill_remaining_nulls(&mut df, &mut actions)?;

        for diagnostic in &diagnostics {
            warn!("{}", diagnostic.message);
        }
        info!(
            "Transform complete: {} -> {} rows",
            original_rows,
            df.height()
        );

        Ok(TransformOutput {
            table: df,
            original_rows,
            actions,
            diagnostics,
        })
    }

    fn apply_column_rules(
        df: &mut DataFrame,
        col_name: &str,
        rules: &ColumnRules,
        actions: &mut Vec<PreprocessingAction>,
        diagnostics: &mut Vec<RuleDiagnostic>,
    ) -> Result<()> {
        let Ok(column) = df.column(col_name) else {
            diagnostics.push(RuleDiagnostic::column_not_found(col_name));
            return Ok(());
        };
        let numeric = is_numeric_dtype(column.dtype());

        if let Some(strategy) = &rules.missing {
            match strategy {
                MissingStrategy::Unrecognized(method) => {
                    diagnostics.push(RuleDiagnostic::unrecognized(col_name, "missing", method));
                }
                _ if !numeric => {
                    debug!("Skipping missing rule for non-numeric '{}'", col_name);
                }
                MissingStrategy::Mean => StatisticalImputer::apply_mean(df, col_name, actions)?,
                MissingStrategy::Median => {
                    StatisticalImputer::apply_median(df, col_name, actions)?
                }
                MissingStrategy::Zero => StatisticalImputer::apply_zero(df, col_name, actions)?,
                MissingStrategy::Remove => {
                    StatisticalImputer::remove_missing(df, col_name, actions)?
                }
            }
        }

        if let Some(strategy) = &rules.outliers {
            match strategy {
                OutlierStrategy::Unrecognized(method) => {
                    diagnostics.push(RuleDiagnostic::unrecognized(col_name, "outliers", method));
                }
                _ if !numeric => {
                    debug!("Skipping outlier rule for non-numeric '{}'", col_name);
                }
                OutlierStrategy::Remove => {
                    OutlierHandler::remove_outliers(df, col_name, actions)?
                }
                OutlierStrategy::Cap => OutlierHandler::cap_outliers(df, col_name, actions)?,
            }
        }

        Ok(())
    }

    /// Replace every remaining null with zero. Numeric columns keep their
    /// dtype; other columns become text holding "0".
    fn fill_remaining_nulls(
        df: &mut DataFrame,
        actions: &mut Vec<PreprocessingAction>,
    ) -> Result<()> {
        let pending: Vec<(String, usize)> = df
            .get_columns()
            .iter()
            .filter(|c| c.null_count() > 0)
            .map(|c| (c.name().to_string(), c.null_count()))
            .collect();

        for (col_name, null_count) in pending {
            let series = df.column(&col_name)?.as_materialized_series().clone();
            let filled = if is_numeric_dtype(series.dtype()) {
                series.fill_null(FillNullStrategy::Zero)?
            } else {
                fill_string_nulls(&series, "0")?
            };
            df.replace(&col_name, filled)?;

            actions.push(PreprocessingAction::new(
                ActionType::ValueCleaned,
                col_name.as_str(),
                format!("Replaced {null_count} remaining missing values in '{col_name}' with 0"),
            ));
            debug!("Final fill: {} nulls in '{}'", null_count, col_name);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DiagnosticKind;
    use crate::utils::numeric_values;

    fn floats(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
        numeric_values(df.column(name).unwrap().as_materialized_series()).unwrap()
    }

    #[test]
    fn test_mean_fill() {
        let df = df!["v" => [Some(10.0), None, Some(30.0)]].unwrap();
        let config = PreprocessingConfig::new()
            .column("v", ColumnRules::new().missing(MissingStrategy::Mean));

        let output = TransformEngine::apply(df, &config).unwrap();

        assert_eq!(floats(&output.table, "v"), vec![Some(10.0), Some(20.0), Some(30.0)]);
        assert_eq!(output.rows_removed(), 0);
    }

    #[test]
    fn test_outlier_remove() {
        let df = df!["v" => [1i64, 2, 3, 4, 100]].unwrap();
        let config = PreprocessingConfig::new()
            .column("v", ColumnRules::new().outliers(OutlierStrategy::Remove));

        let output = TransformEngine::apply(df, &config).unwrap();

        assert_eq!(output.original_rows, 5);
        assert_eq!(output.processed_rows(), 4);
        assert_eq!(output.rows_removed(), 1);
    }

    #[test]
    fn test_missing_runs_before_outliers() {
        // The median fill (3.0) lands inside the bounds, so nothing is removed.
        let df = df!["v" => [Some(1.0), Some(2.0), None, Some(4.0), Some(5.0)]].unwrap();
        let config = PreprocessingConfig::new().column(
            "v",
            ColumnRules::new()
                .missing(MissingStrategy::Median)
                .outliers(OutlierStrategy::Remove),
        );

        let output = TransformEngine::apply(df, &config).unwrap();

        assert_eq!(output.processed_rows(), 5);
        assert_eq!(floats(&output.table, "v")[2], Some(3.0));
    }

    #[test]
    fn test_rules_see_reduced_table() {
        let df = df![
            "a" => [Some(1.0), None, Some(3.0)],
            "b" => [Some(10.0), Some(1000.0), None],
        ]
        .unwrap();
        let config = PreprocessingConfig::new()
            .column("a", ColumnRules::new().missing(MissingStrategy::Remove))
            .column("b", ColumnRules::new().missing(MissingStrategy::Mean));

        let output = TransformEngine::apply(df, &config).unwrap();

        // Row with b=1000 was removed by the rule on 'a', so the mean is 10.
        assert_eq!(floats(&output.table, "b"), vec![Some(10.0), Some(10.0)]);
    }

    #[test]
    fn test_unknown_method_and_column_are_diagnostics() {
        let df = df!["v" => [Some(1.0), None]].unwrap();
        let config = PreprocessingConfig::new()
            .column(
                "v",
                ColumnRules::new().missing(MissingStrategy::Unrecognized("interpolate".into())),
            )
            .column("ghost", ColumnRules::new().missing(MissingStrategy::Mean));

        let output = TransformEngine::apply(df, &config).unwrap();

        let kinds: Vec<DiagnosticKind> = output.diagnostics.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![DiagnosticKind::UnrecognizedRule, DiagnosticKind::ColumnNotFound]
        );
        // The catch-all still fills the null.
        assert_eq!(floats(&output.table, "v"), vec![Some(1.0), Some(0.0)]);
    }

    #[test]
    fn test_non_numeric_rules_pass_through() {
        let df = df!["c" => [Some("x"), None, Some("y")]].unwrap();
        let config = PreprocessingConfig::new().column(
            "c",
            ColumnRules::new()
                .missing(MissingStrategy::Remove)
                .outliers(OutlierStrategy::Cap),
        );

        let output = TransformEngine::apply(df, &config).unwrap();

        assert_eq!(output.processed_rows(), 3);
        assert!(output.diagnostics.is_empty());
        let c = output.table.column("c").unwrap().as_materialized_series().clone();
        let values: Vec<Option<&str>> = c.str().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some("x"), Some("0"), Some("y")]);
    }

    #[test]
    fn test_catch_all_keeps_integer_dtype() {
        let df = df!["n" => [Some(1i64), None]].unwrap();
        let output = TransformEngine::apply(df, &PreprocessingConfig::new()).unwrap();

        assert_eq!(output.table.column("n").unwrap().dtype(), &DataType::Int64);
        assert_eq!(output.actions.len(), 1);
        assert_eq!(output.actions[0].action_type, ActionType::ValueCleaned);
    }

    #[test]
    fn test_cap_only_keeps_row_count() {
        let df = df![
            "a" => [1.0, 2.0, 3.0, 4.0, 100.0],
            "b" => [-50.0, 2.0, 3.0, 4.0, 5.0],
        ]
        .unwrap();
        let config = PreprocessingConfig::new()
            .column("a", ColumnRules::new().outliers(OutlierStrategy::Cap))
            .column("b", ColumnRules::new().outliers(OutlierStrategy::Cap));

        let output = TransformEngine::apply(df, &config).unwrap();

        assert_eq!(output.rows_removed(), 0);
        assert_eq!(floats(&output.table, "a")[4], Some(7.0));
    }
}
