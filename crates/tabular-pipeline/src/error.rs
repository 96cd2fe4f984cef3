//! Error types for the tabular pipeline.
//!
//! Every failure carries a stable machine-readable code (see
//! [`PipelineError::error_code`]) so callers can tell failures apart without
//! matching on message text. Errors serialize as `{code, message}`.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// Boxed native error of a database connector.
pub type ConnectorError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The main error type for the pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The source file could not be parsed as tabular data.
    #[error("Failed to read '{path}': {reason}")]
    Read { path: String, reason: String },

    /// Structurally invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The requested backend type is not one of the supported writers.
    #[error("Unsupported database type: {0}")]
    UnsupportedBackend(String),

    /// Conflict policy `fail` hit an existing SQL table.
    #[error("Table '{0}' already exists")]
    TableExists(String),

    /// Conflict policy `fail` hit a non-empty collection.
    #[error("Collection '{0}' already exists")]
    CollectionExists(String),

    /// The backend could not be reached. The connector's own error is kept.
    #[error("Failed to connect to {backend}: {source}")]
    Connection {
        backend: String,
        #[source]
        source: ConnectorError,
    },

    /// Presented credential did not match.
    #[error("Invalid authentication credentials")]
    Unauthorized,

    /// Internal error (e.g., runtime construction failure).
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// SQL driver error raised after the connection was established.
    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    /// Document store driver error.
    #[error("Document store error: {0}")]
    DocumentStore(#[from] mongodb::error::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Build a read error for `path`.
    pub fn read(path: impl AsRef<std::path::Path>, reason: impl ToString) -> Self {
        PipelineError::Read {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }

    /// Wrap a native connector error.
    pub fn connection(backend: impl Into<String>, source: impl Into<ConnectorError>) -> Self {
        PipelineError::Connection {
            backend: backend.into(),
            source: source.into(),
        }
    }

    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PipelineError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable error code for callers that need to branch on the failure kind.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Read { .. } => "READ_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::UnsupportedBackend(_) => "UNSUPPORTED_BACKEND",
            Self::TableExists(_) => "TABLE_EXISTS",
            Self::CollectionExists(_) => "COLLECTION_EXISTS",
            Self::Connection { .. } => "CONNECTION_ERROR",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Sql(_) => "SQL_ERROR",
            Self::DocumentStore(_) => "DOCUMENT_STORE_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error was caused by a conflict policy of `fail`.
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::TableExists(_) | Self::CollectionExists(_) => true,
            Self::WithContext { source, .. } => source.is_conflict(),
            _ => false,
        }
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for PipelineError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("PipelineError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PipelineError::Polars(e).with_context(context))
    }
}
