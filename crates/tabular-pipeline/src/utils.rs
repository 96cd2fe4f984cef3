//! Shared utilities for the pipeline.
//!
//! This module contains helpers used by the profiler, the transform engine
//! and the export writers.

use crate::types::{CellValue, PreviewRow};
use polars::prelude::*;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Category of a data type for pipeline purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtypeCategory {
    /// Signed or unsigned integers
    Integer,
    /// Floating point numbers
    Float,
    /// Boolean type
    Boolean,
    /// Everything else (text, dates, nested)
    Other,
}

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        get_dtype_category(dtype),
        DtypeCategory::Integer | DtypeCategory::Float
    )
}

/// Get the category of a DataType.
pub fn get_dtype_category(dtype: &DataType) -> DtypeCategory {
    match dtype {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => DtypeCategory::Integer,
        DataType::Float32 | DataType::Float64 => DtypeCategory::Float,
        DataType::Boolean => DtypeCategory::Boolean,
        _ => DtypeCategory::Other,
    }
}

// =============================================================================
// Numeric Utilities
// =============================================================================

/// Round to two decimal places.
#[inline]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `part / total * 100`, rounded to two decimals. An empty total yields 0.
pub fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        round2(part as f64 / total as f64 * 100.0)
    }
}

/// Read a numeric Series as `f64` values, keeping nulls in place.
pub fn numeric_values(series: &Series) -> PolarsResult<Vec<Option<f64>>> {
    let float_series = series.cast(&DataType::Float64)?;
    Ok(float_series.f64()?.into_iter().collect())
}

/// The finite non-null values of `values`, sorted ascending. Infinities
/// and NaN take no part in statistics or fences.
pub fn sorted_finite(values: &[Option<f64>]) -> Vec<f64> {
    let mut present: Vec<f64> = values
        .iter()
        .flatten()
        .copied()
        .filter(|v| v.is_finite())
        .collect();
    present.sort_by(f64::total_cmp);
    present
}

// =============================================================================
// Series Transformation Utilities
// =============================================================================

/// Replace nulls in a numeric Series with `fill_value`, producing Float64.
pub fn fill_numeric_nulls(series: &Series, fill_value: f64) -> PolarsResult<Series> {
    let filled: Vec<Option<f64>> = numeric_values(series)?
        .into_iter()
        .map(|v| Some(v.unwrap_or(fill_value)))
        .collect();
    Ok(Series::new(series.name().clone(), filled))
}

/// Replace nulls in any non-numeric Series with `fill_value`, producing a
/// String series.
pub fn fill_string_nulls(series: &Series, fill_value: &str) -> PolarsResult<Series> {
    let as_text = series.cast(&DataType::String)?;
    let filled: Vec<String> = as_text
        .str()?
        .into_iter()
        .map(|v| v.unwrap_or(fill_value).to_string())
        .collect();
    Ok(Series::new(series.name().clone(), filled))
}

// =============================================================================
// Row Extraction Utilities
// =============================================================================

/// Convert a polars value into a library-neutral cell.
pub fn cell_value(value: &AnyValue<'_>) -> CellValue {
    match value {
        AnyValue::Null => CellValue::Null,
        AnyValue::Boolean(v) => CellValue::Bool(*v),
        AnyValue::Int8(v) => CellValue::Int(i64::from(*v)),
        AnyValue::Int16(v) => CellValue::Int(i64::from(*v)),
        AnyValue::Int32(v) => CellValue::Int(i64::from(*v)),
        AnyValue::Int64(v) => CellValue::Int(*v),
        AnyValue::UInt8(v) => CellValue::Int(i64::from(*v)),
        AnyValue::UInt16(v) => CellValue::Int(i64::from(*v)),
        AnyValue::UInt32(v) => CellValue::Int(i64::from(*v)),
        AnyValue::UInt64(v) => match i64::try_from(*v) {
            Ok(v) => CellValue::Int(v),
            Err(_) => CellValue::Float(*v as f64),
        },
        AnyValue::Float32(v) => CellValue::Float(f64::from(*v)),
        AnyValue::Float64(v) => CellValue::Float(*v),
        AnyValue::String(v) => CellValue::Text((*v).to_string()),
        AnyValue::StringOwned(v) => CellValue::Text(v.to_string()),
        other => CellValue::Text(other.to_string()),
    }
}

/// Extract the first `limit` rows (all rows when `None`) as cells, one
/// inner vector per row in column order.
pub fn table_rows(df: &DataFrame, limit: Option<usize>) -> PolarsResult<Vec<Vec<CellValue>>> {
    let height = limit.map_or(df.height(), |n| n.min(df.height()));
    let mut rows: Vec<Vec<CellValue>> = (0..height)
        .map(|_| Vec::with_capacity(df.width()))
        .collect();

    for column in df.get_columns() {
        let series = column.as_materialized_series();
        for (i, row) in rows.iter_mut().enumerate() {
            row.push(cell_value(&series.get(i)?));
        }
    }

    Ok(rows)
}

/// The first `limit` rows as ordered column-to-value maps.
pub fn preview_rows(df: &DataFrame, limit: usize) -> PolarsResult<Vec<PreviewRow>> {
    let names = column_names(df);
    Ok(table_rows(df, Some(limit))?
        .into_iter()
        .map(|row| names.iter().cloned().zip(row).collect())
        .collect())
}

/// Column names of a DataFrame as owned strings.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
