//! Export adapter.
//!
//! A cleaned table is converted once into a driver-neutral [`ExportTable`]
//! and handed to the writer chosen by [`Exporter::writer_for`], the single
//! place where the backend tag is turned into a writer.
//!
//! Writers are synchronous. Each export drives its async driver on a private
//! current-thread runtime, so callers already inside a tokio runtime must
//! call the exporter from `spawn_blocking`.

mod document;
mod identifiers;
mod sql;

pub use document::{DEFAULT_MONGO_DATABASE, DocumentCollection, MongoWriter, write_documents};
pub use identifiers::{quote_identifier, validate_destination_name};
pub use sql::{DEFAULT_SQLITE_DATABASE, SqlWriter};

use crate::config::{BackendKind, ConflictPolicy, DbConfig, ExportConfig, PipelineSettings};
use crate::error::{PipelineError, Result};
use crate::loader::load_table;
use crate::types::{CellValue, ExportResult};
use crate::utils::{DtypeCategory, get_dtype_category, table_rows};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::info;

/// Storage class of an exported column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    Boolean,
    Text,
}

impl ColumnKind {
    pub fn from_dtype(dtype: &DataType) -> Self {
        match get_dtype_category(dtype) {
            DtypeCategory::Integer => Self::Integer,
            DtypeCategory::Float => Self::Float,
            DtypeCategory::Boolean => Self::Boolean,
            DtypeCategory::Other => Self::Text,
        }
    }

    /// Column type used in `CREATE TABLE`.
    pub fn sql_type(&self) -> &'static str {
        match self {
            Self::Integer => "BIGINT",
            Self::Float => "DOUBLE PRECISION",
            Self::Boolean => "BOOLEAN",
            Self::Text => "TEXT",
        }
    }
}

/// A table in row form, ready for any writer.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportTable {
    /// Column names and kinds, in table order.
    pub columns: Vec<(String, ColumnKind)>,
    pub rows: Vec<Vec<CellValue>>,
}

impl ExportTable {
    pub fn from_frame(df: &DataFrame) -> Result<Self> {
        let columns = df
            .get_columns()
            .iter()
            .map(|c| (c.name().to_string(), ColumnKind::from_dtype(c.dtype())))
            .collect();
        Ok(Self {
            columns,
            rows: table_rows(df, None)?,
        })
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|(name, _)| name.clone()).collect()
    }
}

/// One storage backend.
pub trait TableWriter {
    fn backend(&self) -> BackendKind;

    /// Write every row of `table` to `destination` under `policy`, returning
    /// the number of rows written. Rows already written stay written if a
    /// later chunk fails.
    fn write(&self, table: &ExportTable, destination: &str, policy: ConflictPolicy) -> Result<usize>;

    /// Database file written to, for file-backed stores.
    fn db_file(&self) -> Option<&Path> {
        None
    }
}

/// Build the runtime that drives one export.
pub(crate) fn export_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| PipelineError::Internal(format!("failed to start export runtime: {e}")))
}

/// Dispatches cleaned tables to the configured backend.
#[derive(Debug, Clone)]
pub struct Exporter {
    sqlite_dir: PathBuf,
}

static_assertions::assert_impl_all!(Exporter: Send, Sync);

impl Exporter {
    /// Create an exporter that keeps SQLite databases in `sqlite_dir`.
    pub fn new(sqlite_dir: impl Into<PathBuf>) -> Self {
        Self {
            sqlite_dir: sqlite_dir.into(),
        }
    }

    pub fn from_settings(settings: &PipelineSettings) -> Self {
        Self::new(settings.data_dir.clone())
    }

    /// Choose the writer for `db`. Unknown backend tags fail with
    /// [`PipelineError::UnsupportedBackend`].
    pub fn writer_for(&self, db: &DbConfig) -> Result<Box<dyn TableWriter>> {
        let backend = db.backend()?;
        let writer: Box<dyn TableWriter> = match backend {
            BackendKind::Sqlite | BackendKind::Postgres | BackendKind::MySql => {
                Box::new(SqlWriter::from_config(backend, db, &self.sqlite_dir)?)
            }
            BackendKind::Mongo => Box::new(MongoWriter::from_config(db)),
        };
        Ok(writer)
    }

    /// Export an in-memory table.
    pub fn export_table(&self, df: &DataFrame, config: &ExportConfig) -> Result<ExportResult> {
        let writer = self.writer_for(&config.db_config)?;
        validate_destination_name(&config.table_name)?;

        let table = ExportTable::from_frame(df)?;
        let rows = writer.write(&table, &config.table_name, config.if_exists)?;

        info!(
            "Exported {} rows to {} '{}'",
            rows,
            writer.backend(),
            config.table_name
        );
        Ok(ExportResult::new(
            writer.backend(),
            config.table_name.clone(),
            rows,
            table.column_names(),
            writer.db_file().map(Path::to_path_buf),
        ))
    }

    /// Load the CSV at `path` and export it.
    pub fn export_file(&self, path: &Path, config: &ExportConfig) -> Result<ExportResult> {
        let df = load_table(path)?;
        self.export_table(&df, config)
    }
}
