use crate::config::BackendKind;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Analysis Types
// ============================================================================

/// How a column is treated by the profiler and the transform engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferredType {
    /// Integer or floating point storage.
    Numeric,
    /// Anything else (strings, booleans, dates).
    Categorical,
}

impl std::fmt::Display for InferredType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Numeric => write!(f, "numeric"),
            Self::Categorical => write!(f, "categorical"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericStats {
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Sample standard deviation (n - 1).
    pub std: Option<f64>,
}

impl NumericStats {
    pub fn empty() -> Self {
        Self {
            mean: None,
            median: None,
            min: None,
            max: None,
            std: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalStats {
    pub unique_count: usize,
    pub most_common: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnStats {
    Numeric(NumericStats),
    Categorical(CategoricalStats),
}

/// Statistical summary of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    #[serde(rename = "column_name")]
    pub name: String,
    #[serde(rename = "data_type")]
    pub inferred_type: InferredType,
    pub null_count: usize,
    pub null_percentage: f64,
    pub outlier_count: usize,
    pub outlier_percentage: f64,
    pub stats: ColumnStats,
}

impl ColumnProfile {
    pub fn numeric_stats(&self) -> Option<&NumericStats> {
        match &self.stats {
            ColumnStats::Numeric(stats) => Some(stats),
            ColumnStats::Categorical(_) => None,
        }
    }

    pub fn categorical_stats(&self) -> Option<&CategoricalStats> {
        match &self.stats {
            ColumnStats::Categorical(stats) => Some(stats),
            ColumnStats::Numeric(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub row_count: usize,
    pub column_count: usize,
    pub file_size_mb: f64,
}

/// Result of analyzing one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub basic_info: DatasetInfo,
    pub columns: Vec<ColumnProfile>,
}

impl AnalysisReport {
    pub fn column(&self, name: &str) -> Option<&ColumnProfile> {
        self.columns.iter().find(|c| c.name == name)
    }
}

// ============================================================================
// Preprocessing Types
// ============================================================================

/// A single scalar cell, independent of the dataframe library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// One preview row: column name to value, in column order.
pub type PreviewRow = IndexMap<String, CellValue>;

/// Outcome of a preprocessing run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessResult {
    pub original_rows: usize,
    pub processed_rows: usize,
    pub rows_removed: usize,
    pub processed_file: PathBuf,
    pub preview: Vec<PreviewRow>,
    /// Audit trail of every rule that changed the table.
    pub actions: Vec<PreprocessingAction>,
    /// Rules that were skipped (unknown method, unknown column).
    pub diagnostics: Vec<RuleDiagnostic>,
}

/// A single action taken during preprocessing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingAction {
    /// Type of action performed.
    pub action_type: ActionType,
    /// Target of the action (column name or "dataset").
    pub target: String,
    /// Human-readable description of the action.
    pub description: String,
}

impl PreprocessingAction {
    /// Create a new preprocessing action.
    pub fn new(
        action_type: ActionType,
        target: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            action_type,
            target: target.into(),
            description: description.into(),
        }
    }
}

/// Types of actions that can be taken during preprocessing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// One or more rows were removed from the dataset.
    RowsRemoved,
    /// Missing values were imputed.
    ValueImputed,
    /// Outliers were capped.
    OutlierHandled,
    /// Remaining missing values were replaced by the final cleanup.
    ValueCleaned,
}

impl ActionType {
    /// Get a human-readable display name for the action type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::RowsRemoved => "Rows Removed",
            Self::ValueImputed => "Value Imputed",
            Self::OutlierHandled => "Outlier Handled",
            Self::ValueCleaned => "Value Cleaned",
        }
    }
}

/// Why a configured rule did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// The method name is not one the engine knows.
    UnrecognizedRule,
    /// The configured column does not exist in the table.
    ColumnNotFound,
}

/// A rule that was accepted but not applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDiagnostic {
    pub kind: DiagnosticKind,
    pub column: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    pub message: String,
}

impl RuleDiagnostic {
    pub fn unrecognized(column: &str, rule_key: &str, method: &str) -> Self {
        Self {
            kind: DiagnosticKind::UnrecognizedRule,
            column: column.to_string(),
            rule: Some(format!("{rule_key}={method}")),
            message: format!("Unrecognized {rule_key} method '{method}' for column '{column}'; ignored"),
        }
    }

    pub fn column_not_found(column: &str) -> Self {
        Self {
            kind: DiagnosticKind::ColumnNotFound,
            column: column.to_string(),
            rule: None,
            message: format!("Column '{column}' not found in dataset; rules skipped"),
        }
    }
}

// ============================================================================
// Export Types
// ============================================================================

/// Outcome of an export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResult {
    pub message: String,
    pub db_type: String,
    /// Destination table or collection.
    pub table_name: String,
    pub rows_exported: usize,
    pub columns: Vec<String>,
    /// Database file for SQLite, `None` for networked backends.
    pub db_file: Option<PathBuf>,
}

impl ExportResult {
    pub fn new(
        backend: BackendKind,
        table_name: impl Into<String>,
        rows_exported: usize,
        columns: Vec<String>,
        db_file: Option<PathBuf>,
    ) -> Self {
        let table_name = table_name.into();
        let noun = if backend.is_sql() { "Table" } else { "Collection" };
        Self {
            message: format!("{noun} '{table_name}' stored {rows_exported} rows"),
            db_type: backend.as_str().to_string(),
            table_name,
            rows_exported,
            columns,
            db_file,
        }
    }
}
