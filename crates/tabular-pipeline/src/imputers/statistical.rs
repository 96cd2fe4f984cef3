//! Statistical imputation methods.
//!
//! Statistics are taken from the column's current non-null values, so a fill
//! that runs after a row removal sees the reduced table.

use crate::error::Result;
use crate::profiler::{mean, median};
use crate::types::{ActionType, PreprocessingAction};
use crate::utils::{fill_numeric_nulls, numeric_values, sorted_finite};
use polars::prelude::*;
use tracing::debug;

/// Statistical imputation methods for filling missing values.
pub struct StatisticalImputer;

impl StatisticalImputer {
    /// Fill nulls with the column mean. The column becomes Float64.
    pub fn apply_mean(
        df: &mut DataFrame,
        col_name: &str,
        actions: &mut Vec<PreprocessingAction>,
    ) -> Result<()> {
        Self::fill_with_statistic(df, col_name, actions, "mean", mean)
    }

    /// Fill nulls with the column median. The column becomes Float64.
    pub fn apply_median(
        df: &mut DataFrame,
        col_name: &str,
        actions: &mut Vec<PreprocessingAction>,
    ) -> Result<()> {
        Self::fill_with_statistic(df, col_name, actions, "median", median)
    }

    /// Fill nulls with zero, keeping the column dtype.
    pub fn apply_zero(
        df: &mut DataFrame,
        col_name: &str,
        actions: &mut Vec<PreprocessingAction>,
    ) -> Result<()> {
        let series = df.column(col_name)?.as_materialized_series().clone();
        let null_count = series.null_count();
        if null_count == 0 {
            return Ok(());
        }

        let filled = series.fill_null(FillNullStrategy::Zero)?;
        df.replace(col_name, filled)?;

        actions.push(PreprocessingAction::new(
            ActionType::ValueImputed,
            col_name,
            format!("Filled {null_count} missing values in '{col_name}' with 0"),
        ));
        debug!("Filled {} nulls in '{}' with 0", null_count, col_name);
        Ok(())
    }

    /// Drop every row where the column is null.
    pub fn remove_missing(
        df: &mut DataFrame,
        col_name: &str,
        actions: &mut Vec<PreprocessingAction>,
    ) -> Result<()> {
        let before = df.height();
        let mask = df.column(col_name)?.as_materialized_series().is_not_null();
        *df = df.filter(&mask)?;

        let removed = before - df.height();
        if removed > 0 {
            actions.push(PreprocessingAction::new(
                ActionType::RowsRemoved,
                col_name,
                format!("Removed {removed} rows with missing '{col_name}'"),
            ));
            debug!("Removed {} rows with missing '{}'", removed, col_name);
        }
        Ok(())
    }

    fn fill_with_statistic(
        df: &mut DataFrame,
        col_name: &str,
        actions: &mut Vec<PreprocessingAction>,
        label: &str,
        statistic: impl Fn(&[f64]) -> Option<f64>,
    ) -> Result<()> {
        let series = df.column(col_name)?.as_materialized_series().clone();
        let null_count = series.null_count();
        if null_count == 0 {
            return Ok(());
        }

        let values = numeric_values(&series)?;
        let Some(fill_value) = statistic(&sorted_finite(&values)) else {
            debug!("No {} for '{}'; all values missing", label, col_name);
            return Ok(());
        };

        df.replace(col_name, fill_numeric_nulls(&series, fill_value)?)?;

        actions.push(PreprocessingAction::new(
            ActionType::ValueImputed,
            col_name,
            format!("Filled {null_count} missing values in '{col_name}' with {label} ({fill_value:.2})"),
        ));
        debug!(
            "Filled {} nulls in '{}' with {} {:.4}",
            null_count, col_name, label, fill_value
        );
        Ok(())
    }
}
