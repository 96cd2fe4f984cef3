//! File-level preprocessing.
//!
//! This module provides the `Preprocessor` that loads a CSV, runs the
//! transform engine and writes the cleaned table to a new file.

use crate::config::{PipelineSettings, PreprocessingConfig};
use crate::error::{PipelineError, Result};
use crate::loader::{load_table, write_table};
use crate::pipeline::TransformEngine;
use crate::types::PreprocessResult;
use crate::utils::preview_rows;
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::{error, info};

const DEFAULT_PREVIEW_ROWS: usize = 10;

/// Prefix of every processed file name.
pub const PROCESSED_PREFIX: &str = "processed";

/// Runs preprocessing for one file at a time.
///
/// Use [`Preprocessor::builder()`] to create one with custom settings.
///
/// # Example
///
/// ```rust,ignore
/// use tabular_pipeline::{Preprocessor, PreprocessingConfig};
///
/// let result = Preprocessor::builder()
///     .preview_rows(5)
///     .build()?
///     .run(Path::new("uploads/sales.csv"), &PreprocessingConfig::new())?;
///
/// println!("{} rows removed", result.rows_removed);
/// ```
#[derive(Debug, Clone)]
pub struct Preprocessor {
    output_dir: Option<PathBuf>,
    preview_rows: usize,
}

static_assertions::assert_impl_all!(Preprocessor: Send, Sync);

impl Preprocessor {
    /// Create a new preprocessor builder.
    pub fn builder() -> PreprocessorBuilder {
        PreprocessorBuilder::default()
    }

    /// Build a preprocessor from process settings.
    pub fn from_settings(settings: &PipelineSettings) -> Self {
        Self {
            output_dir: settings.output_dir.clone(),
            preview_rows: settings.preview_rows,
        }
    }

    /// Clean the CSV at `input` and write the result to a new processed file.
    ///
    /// The input file is never modified.
    pub fn run(&self, input: &Path, config: &PreprocessingConfig) -> Result<PreprocessResult> {
        match self.run_internal(input, config) {
            Ok(result) => Ok(result),
            Err(e) => {
                error!("Preprocessing {} failed: {}", input.display(), e);
                Err(e)
            }
        }
    }

    fn run_internal(&self, input: &Path, config: &PreprocessingConfig) -> Result<PreprocessResult> {
        info!("Preprocessing {}", input.display());

        let df = load_table(input)?;
        let output = TransformEngine::apply(df, config)?;

        let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let processed_file = self.output_path(input, &timestamp)?;
        let original_rows = output.original_rows;
        let rows_removed = output.rows_removed();
        let mut table = output.table;
        write_table(&mut table, &processed_file)?;

        info!(
            "Wrote {} ({} rows, {} removed)",
            processed_file.display(),
            table.height(),
            rows_removed
        );

        Ok(PreprocessResult {
            original_rows,
            processed_rows: table.height(),
            rows_removed,
            processed_file,
            preview: preview_rows(&table, self.preview_rows)?,
            actions: output.actions,
            diagnostics: output.diagnostics,
        })
    }

    /// Path of the processed file for `input` stamped with `timestamp`.
    pub fn output_path(&self, input: &Path, timestamp: &str) -> Result<PathBuf> {
        let file_name = input
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| PipelineError::read(input, "path has no file name"))?;
        let name = format!("{PROCESSED_PREFIX}_{timestamp}_{file_name}");

        let dir = match &self.output_dir {
            Some(dir) => dir.as_path(),
            None => input.parent().unwrap_or_else(|| Path::new("")),
        };
        Ok(dir.join(name))
    }
}

/// Builder for [`Preprocessor`].
#[derive(Debug, Default)]
pub struct PreprocessorBuilder {
    output_dir: Option<PathBuf>,
    preview_rows: Option<usize>,
}

impl PreprocessorBuilder {
    /// Write processed files here instead of next to the input.
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Number of rows in the returned preview.
    pub fn preview_rows(mut self, rows: usize) -> Self {
        self.preview_rows = Some(rows);
        self
    }

    /// Build the preprocessor.
    ///
    /// Returns an error if the preview row count is zero.
    pub fn build(self) -> Result<Preprocessor> {
        let preview_rows = self.preview_rows.unwrap_or(DEFAULT_PREVIEW_ROWS);
        if preview_rows == 0 {
            return Err(PipelineError::Config(
                "preview rows must be at least 1".to_string(),
            ));
        }
        Ok(Preprocessor {
            output_dir: self.output_dir,
            preview_rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColumnRules, MissingStrategy};

    #[test]
    fn test_builder_defaults() {
        let preprocessor = Preprocessor::builder().build().unwrap();
        assert_eq!(preprocessor.preview_rows, 10);
        assert!(preprocessor.output_dir.is_none());
    }

    #[test]
    fn test_builder_rejects_zero_preview() {
        let err = Preprocessor::builder().preview_rows(0).build().unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_output_path_next_to_input() {
        let preprocessor = Preprocessor::builder().build().unwrap();
        let path = preprocessor
            .output_path(Path::new("uploads/sales.csv"), "20260101_120000")
            .unwrap();
        assert_eq!(
            path,
            PathBuf::from("uploads/processed_20260101_120000_sales.csv")
        );
    }

    #[test]
    fn test_output_path_with_output_dir() {
        let preprocessor = Preprocessor::builder().output_dir("out").build().unwrap();
        let path = preprocessor
            .output_path(Path::new("uploads/sales.csv"), "20260101_120000")
            .unwrap();
        assert_eq!(path, PathBuf::from("out/processed_20260101_120000_sales.csv"));
    }

    #[test]
    fn test_run_writes_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("data.csv");
        std::fs::write(&input, "v,name\n10,a\n,b\n30,c\n").unwrap();

        let config = PreprocessingConfig::new()
            .column("v", ColumnRules::new().missing(MissingStrategy::Mean));
        let result = Preprocessor::builder()
            .preview_rows(2)
            .build()
            .unwrap()
            .run(&input, &config)
            .unwrap();

        assert_eq!(result.original_rows, 3);
        assert_eq!(result.processed_rows, 3);
        assert_eq!(result.preview.len(), 2);
        assert!(result.processed_file.exists());
        assert_ne!(result.processed_file, input);
        assert_eq!(
            std::fs::read_to_string(&input).unwrap(),
            "v,name\n10,a\n,b\n30,c\n"
        );
        let name = result.processed_file.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("processed_"));
        assert!(name.ends_with("_data.csv"));
    }
}
