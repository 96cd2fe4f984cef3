//! CSV loading and writing.
//!
//! Tables are read in full with whole-file schema inference. Empty fields and
//! the usual NA markers become nulls. A column with no values at all is typed
//! Float64 so it is treated as an (empty) numeric column.

use crate::error::{PipelineError, Result};
use crate::utils::round2;
use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// Field values read as missing in addition to empty fields.
const NA_MARKERS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Suffix the CSV reader gives repeated header names.
static DUPLICATE_HEADER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.+)_duplicated_(\d+)$").expect("Invalid regex: duplicate header")
});

/// Load a comma-delimited UTF-8 CSV with a header row.
///
/// Malformed rows and invalid encodings fail with [`PipelineError::Read`].
pub fn load_table(path: &Path) -> Result<DataFrame> {
    if !path.is_file() {
        return Err(PipelineError::read(path, "file not found"));
    }

    let null_values = NullValues::AllColumns(
        NA_MARKERS
            .iter()
            .map(|marker| PlSmallStr::from_static(marker))
            .collect(),
    );

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .with_parse_options(
            CsvParseOptions::default()
                .with_separator(b',')
                .with_quote_char(Some(b'"'))
                .with_null_values(Some(null_values)),
        )
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .map_err(|e| PipelineError::read(path, e))?
        .finish()
        .map_err(|e| PipelineError::read(path, e))?;

    let df = rename_duplicate_headers(df).map_err(|e| PipelineError::read(path, e))?;
    let df = type_empty_columns(df).map_err(|e| PipelineError::read(path, e))?;

    debug!(
        "Loaded {} ({} rows x {} columns)",
        path.display(),
        df.height(),
        df.width()
    );
    Ok(df)
}

/// Rename repeated headers `a, a_duplicated_0, a_duplicated_1` to
/// `a, a.1, a.2`.
fn rename_duplicate_headers(mut df: DataFrame) -> PolarsResult<DataFrame> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();

    for name in &names {
        let Some(caps) = DUPLICATE_HEADER_REGEX.captures(name) else {
            continue;
        };
        let base = &caps[1];
        let Ok(index) = caps[2].parse::<usize>() else {
            continue;
        };
        let renamed = format!("{base}.{}", index + 1);
        if names.iter().any(|n| n == base) && !names.contains(&renamed) {
            df.rename(name, renamed.into())?;
        }
    }

    Ok(df)
}

/// Cast columns that hold only nulls to Float64.
fn type_empty_columns(mut df: DataFrame) -> PolarsResult<DataFrame> {
    if df.height() == 0 {
        return Ok(df);
    }

    let empty: Vec<String> = df
        .get_columns()
        .iter()
        .filter(|c| c.null_count() == c.len() && !matches!(c.dtype(), DataType::Float64))
        .map(|c| c.name().to_string())
        .collect();

    for name in empty {
        let cast = df
            .column(&name)?
            .as_materialized_series()
            .cast(&DataType::Float64)?;
        df.replace(&name, cast)?;
    }

    Ok(df)
}

/// Write a table as CSV with a header row.
pub fn write_table(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .finish(df)?;
    Ok(())
}

/// Size of the file at `path` in megabytes, rounded to two decimals.
pub fn file_size_mb(path: &Path) -> Result<f64> {
    let bytes = std::fs::metadata(path)?.len();
    Ok(bytes_to_mb(bytes))
}

pub(crate) fn bytes_to_mb(bytes: u64) -> f64 {
    round2(bytes as f64 / (1024.0 * 1024.0))
}
