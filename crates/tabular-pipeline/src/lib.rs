//! Tabular Data Pipeline Library
//!
//! CSV profiling, rule-based cleaning and database export, built on Polars.
//!
//! # Overview
//!
//! The library covers three stages of a small data-preparation workflow:
//!
//! - **Analysis**: per-column type, missing-value, outlier and summary
//!   statistics for a CSV file ([`DatasetAnalyzer`])
//! - **Preprocessing**: user-chosen per-column rules for missing values and
//!   IQR outliers, written to a new processed file ([`Preprocessor`])
//! - **Export**: the cleaned table written to SQLite, PostgreSQL, MySQL or
//!   MongoDB with a replace/append/fail conflict policy ([`Exporter`])
//!
//! [`PipelineService`] wraps all three behind an access-token check and
//! returns JSON-friendly [`Outcome`] envelopes.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tabular_pipeline::{
//!     ColumnRules, ConflictPolicy, DbConfig, ExportConfig, MissingStrategy, OutlierStrategy,
//!     PipelineService, PipelineSettings, PreprocessingConfig,
//! };
//! use std::path::Path;
//!
//! let service = PipelineService::new(PipelineSettings::builder().data_dir("uploads").build()?);
//!
//! // 1. Profile the file
//! let report = service.analyze(Path::new("uploads/sales.csv"));
//!
//! // 2. Clean it
//! let config = PreprocessingConfig::new()
//!     .column("age", ColumnRules::new().missing(MissingStrategy::Median))
//!     .column("income", ColumnRules::new().outliers(OutlierStrategy::Cap));
//! let cleaned = service
//!     .preprocess(Path::new("uploads/sales.csv"), &config)
//!     .success()
//!     .unwrap();
//!
//! // 3. Export it
//! let export = ExportConfig::new(DbConfig::default(), "sales").with_policy(ConflictPolicy::Append);
//! let result = service.export(&cleaned.processed_file, &export);
//! ```
//!
//! # Configuration
//!
//! Process-level settings come from [`PipelineSettings`], either through its
//! builder or from `PIPELINE_*` environment variables:
//!
//! ```rust,ignore
//! use tabular_pipeline::PipelineSettings;
//!
//! let settings = PipelineSettings::builder()
//!     .data_dir("/var/lib/pipeline")   // uploads and SQLite files
//!     .output_dir("/var/lib/processed") // processed CSVs
//!     .preview_rows(20)
//!     .build()?;
//! ```

pub mod analyzer;
pub mod config;
pub mod credentials;
pub mod error;
pub mod export;
pub mod imputers;
pub mod loader;
pub mod pipeline;
pub mod profiler;
pub mod service;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use analyzer::DatasetAnalyzer;
pub use config::{
    BackendKind, ColumnRules, ConflictPolicy, DbConfig, ExportConfig, MissingStrategy,
    OutlierStrategy, PipelineSettings, PipelineSettingsBuilder, PreprocessingConfig,
    SettingsValidationError,
};
pub use credentials::{AccessToken, Secret};
pub use error::{PipelineError, Result as PipelineResult, ResultExt};
pub use export::{ExportTable, Exporter, TableWriter};
pub use imputers::StatisticalImputer;
pub use loader::{load_table, write_table};
pub use pipeline::{OutlierHandler, Preprocessor, PreprocessorBuilder, TransformEngine, TransformOutput};
pub use profiler::{ColumnProfiler, IqrBounds};
pub use service::{Outcome, PipelineService, UploadResult};
pub use types::{
    ActionType, AnalysisReport, CellValue, ColumnProfile, ColumnStats, DatasetInfo, ExportResult,
    InferredType, PreprocessResult, PreprocessingAction, RuleDiagnostic,
};
