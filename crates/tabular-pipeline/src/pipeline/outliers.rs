//! Outlier handling module.
//!
//! Bounds are recomputed from the column's current state each time a rule
//! runs, using the same quartiles as the profiler.

use crate::error::Result;
use crate::profiler::IqrBounds;
use crate::types::{ActionType, PreprocessingAction};
use crate::utils::{numeric_values, sorted_finite};
use polars::prelude::*;
use tracing::debug;

/// Handles outlier treatment for numeric columns.
pub struct OutlierHandler;

impl OutlierHandler {
    /// Bounds for the finite values, `None` if there are none.
    fn bounds(values: &[Option<f64>]) -> Option<IqrBounds> {
        IqrBounds::from_sorted(&sorted_finite(values))
    }

    /// Keep only rows whose value lies within the IQR bounds.
    ///
    /// Rows where the column is null are dropped as well, since they cannot
    /// be shown to lie within the bounds. A column without any values is left
    /// untouched.
    pub fn remove_outliers(
        df: &mut DataFrame,
        col_name: &str,
        actions: &mut Vec<PreprocessingAction>,
    ) -> Result<()> {
        let values = numeric_values(df.column(col_name)?.as_materialized_series())?;
        let Some(bounds) = Self::bounds(&values) else {
            debug!("Skipping outlier removal for '{}': no values", col_name);
            return Ok(());
        };

        let mask_values: Vec<bool> = values
            .iter()
            .map(|v| v.is_some_and(|val| bounds.contains(val)))
            .collect();
        let mask = BooleanChunked::from_slice("mask".into(), &mask_values);

        let before = df.height();
        *df = df.filter(&mask)?;
        let removed = before - df.height();

        if removed > 0 {
            actions.push(PreprocessingAction::new(
                ActionType::RowsRemoved,
                col_name,
                format!(
                    "Removed {removed} rows outside [{:.2}, {:.2}] in '{col_name}'",
                    bounds.lower, bounds.upper
                ),
            ));
        }
        debug!(
            "Removed {} outlier rows from '{}' (bounds {:.4}..{:.4})",
            removed, col_name, bounds.lower, bounds.upper
        );
        Ok(())
    }

    /// Clamp values into the IQR bounds. Nulls stay null; the column becomes
    /// Float64.
    pub fn cap_outliers(
        df: &mut DataFrame,
        col_name: &str,
        actions: &mut Vec<PreprocessingAction>,
    ) -> Result<()> {
        let series = df.column(col_name)?.as_materialized_series().clone();
        let values = numeric_values(&series)?;
        let Some(bounds) = Self::bounds(&values) else {
            debug!("Skipping outlier capping for '{}': no values", col_name);
            return Ok(());
        };

        let capped_count = bounds.count_outside(&values);
        let capped: Vec<Option<f64>> = values
            .into_iter()
            .map(|v| v.map(|val| bounds.clamp(val)))
            .collect();
        df.replace(col_name, Series::new(series.name().clone(), capped))?;

        if capped_count > 0 {
            actions.push(PreprocessingAction::new(
                ActionType::OutlierHandled,
                col_name,
                format!(
                    "Capped {capped_count} values in '{col_name}' to [{:.2}, {:.2}]",
                    bounds.lower, bounds.upper
                ),
            ));
        }
        debug!("Capped {} outliers in '{}'", capped_count, col_name);
        Ok(())
    }
}
