//! Configuration types for the pipeline.
//!
//! Three kinds of configuration live here:
//!
//! - [`PreprocessingConfig`]: ordered per-column cleaning rules.
//! - [`ExportConfig`]: destination backend, credentials and conflict policy.
//! - [`PipelineSettings`]: process-level settings built with
//!   [`PipelineSettings::builder()`] or read from the environment.
//!
//! Rule methods are parsed leniently: a method name the engine does not know
//! is kept as `Unrecognized` and reported as a diagnostic when the rule runs.
//! Values of the wrong JSON type are rejected up front.

use crate::credentials::{AccessToken, Secret};
use crate::error::{PipelineError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

// =============================================================================
// Preprocessing rules
// =============================================================================

/// Strategy for missing values in a numeric column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MissingStrategy {
    /// Fill with the mean of the non-missing values
    Mean,
    /// Fill with the median of the non-missing values
    Median,
    /// Fill with 0
    Zero,
    /// Drop rows where the column is missing
    Remove,
    /// Method name not known to the engine; applied as a no-op
    Unrecognized(String),
}

impl From<String> for MissingStrategy {
    fn from(value: String) -> Self {
        match value.as_str() {
            "mean" => Self::Mean,
            "median" => Self::Median,
            "zero" => Self::Zero,
            "remove" => Self::Remove,
            _ => Self::Unrecognized(value),
        }
    }
}

impl From<MissingStrategy> for String {
    fn from(value: MissingStrategy) -> Self {
        value.to_string()
    }
}

impl fmt::Display for MissingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mean => f.write_str("mean"),
            Self::Median => f.write_str("median"),
            Self::Zero => f.write_str("zero"),
            Self::Remove => f.write_str("remove"),
            Self::Unrecognized(raw) => f.write_str(raw),
        }
    }
}

/// Strategy for IQR outliers in a numeric column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OutlierStrategy {
    /// Remove rows outside Q1 - 1.5*IQR .. Q3 + 1.5*IQR
    Remove,
    /// Clamp values into the IQR bounds
    Cap,
    /// Method name not known to the engine; applied as a no-op
    Unrecognized(String),
}

impl From<String> for OutlierStrategy {
    fn from(value: String) -> Self {
        match value.as_str() {
            "remove" => Self::Remove,
            "cap" => Self::Cap,
            _ => Self::Unrecognized(value),
        }
    }
}

impl From<OutlierStrategy> for String {
    fn from(value: OutlierStrategy) -> Self {
        value.to_string()
    }
}

impl fmt::Display for OutlierStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remove => f.write_str("remove"),
            Self::Cap => f.write_str("cap"),
            Self::Unrecognized(raw) => f.write_str(raw),
        }
    }
}

/// Rules configured for a single column. Both keys are optional; other keys
/// are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing: Option<MissingStrategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outliers: Option<OutlierStrategy>,
}

impl ColumnRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the missing-value strategy.
    pub fn missing(mut self, strategy: MissingStrategy) -> Self {
        self.missing = Some(strategy);
        self
    }

    /// Set the outlier strategy.
    pub fn outliers(mut self, strategy: OutlierStrategy) -> Self {
        self.outliers = Some(strategy);
        self
    }

    /// Whether any rule in this set can drop rows.
    pub(crate) fn removes_rows(&self) -> bool {
        matches!(self.missing, Some(MissingStrategy::Remove))
            || matches!(self.outliers, Some(OutlierStrategy::Remove))
    }
}

/// Per-column cleaning rules, applied in insertion order.
///
/// # Example
///
/// ```rust
/// use tabular_pipeline::config::{ColumnRules, MissingStrategy, OutlierStrategy, PreprocessingConfig};
///
/// let config = PreprocessingConfig::new()
///     .column("age", ColumnRules::new().missing(MissingStrategy::Median))
///     .column("income", ColumnRules::new().outliers(OutlierStrategy::Cap));
/// assert_eq!(config.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreprocessingConfig {
    columns: IndexMap<String, ColumnRules>,
}

impl PreprocessingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the rules for a column.
    pub fn column(mut self, name: impl Into<String>, rules: ColumnRules) -> Self {
        self.columns.insert(name.into(), rules);
        self
    }

    /// Parse a configuration that has already been decoded from a request.
    pub fn from_json_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| PipelineError::Config(format!("preprocessing config: {e}")))
    }

    /// Parse a configuration from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| PipelineError::Config(format!("preprocessing config: {e}")))
    }

    /// Iterate over `(column, rules)` in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnRules)> {
        self.columns.iter().map(|(name, rules)| (name.as_str(), rules))
    }

    pub fn get(&self, column: &str) -> Option<&ColumnRules> {
        self.columns.get(column)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Whether any configured rule can drop rows.
    pub(crate) fn removes_rows(&self) -> bool {
        self.columns.values().any(ColumnRules::removes_rows)
    }
}

// =============================================================================
// Export configuration
// =============================================================================

/// Behavior when the destination table or collection already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Drop and recreate the destination
    #[default]
    Replace,
    /// Insert into the existing destination
    Append,
    /// Refuse to write if the destination already holds data
    Fail,
}

impl ConflictPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Append => "append",
            Self::Fail => "fail",
        }
    }
}

/// The closed set of export backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Sqlite,
    #[serde(rename = "postgresql")]
    Postgres,
    MySql,
    #[serde(rename = "mongodb")]
    Mongo,
}

impl BackendKind {
    /// The tag used in configuration and results.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgresql",
            Self::MySql => "mysql",
            Self::Mongo => "mongodb",
        }
    }

    /// SQL-family backends share one writer.
    pub fn is_sql(&self) -> bool {
        !matches!(self, Self::Mongo)
    }
}

impl FromStr for BackendKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sqlite" => Ok(Self::Sqlite),
            "postgresql" => Ok(Self::Postgres),
            "mysql" => Ok(Self::MySql),
            "mongodb" => Ok(Self::Mongo),
            other => Err(PipelineError::UnsupportedBackend(other.to_string())),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_db_type() -> String {
    BackendKind::Sqlite.as_str().to_string()
}

/// Connection parameters for the destination database.
///
/// `db_type` stays a plain string here so an unknown backend surfaces as
/// [`PipelineError::UnsupportedBackend`] at dispatch rather than as a parse
/// failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    #[serde(default = "default_db_type")]
    pub db_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<Secret>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            db_type: default_db_type(),
            host: None,
            port: None,
            username: None,
            password: None,
            database: None,
        }
    }
}

impl DbConfig {
    /// Resolve the backend variant.
    pub fn backend(&self) -> Result<BackendKind> {
        self.db_type.parse()
    }

    /// Fetch a required string parameter or fail with a config error.
    pub(crate) fn require<'a>(&self, field: &str, value: &'a Option<String>) -> Result<&'a str> {
        value
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                PipelineError::Config(format!("'{field}' is required for {}", self.db_type))
            })
    }
}

/// Everything needed to export one cleaned table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    pub db_config: DbConfig,
    /// Destination table (SQL) or collection (document store).
    pub table_name: String,
    #[serde(default)]
    pub if_exists: ConflictPolicy,
}

impl ExportConfig {
    pub fn new(db_config: DbConfig, table_name: impl Into<String>) -> Self {
        Self {
            db_config,
            table_name: table_name.into(),
            if_exists: ConflictPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ConflictPolicy) -> Self {
        self.if_exists = policy;
        self
    }

    /// Parse a configuration that has already been decoded from a request.
    pub fn from_json_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| PipelineError::Config(format!("export config: {e}")))
    }

    /// Parse a configuration from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| PipelineError::Config(format!("export config: {e}")))
    }
}

// =============================================================================
// Process-level settings
// =============================================================================

/// Environment variable naming the data directory.
pub const ENV_DATA_DIR: &str = "PIPELINE_DATA_DIR";
/// Environment variable naming the processed-file directory.
pub const ENV_OUTPUT_DIR: &str = "PIPELINE_OUTPUT_DIR";
/// Environment variable holding the preview row count.
pub const ENV_PREVIEW_ROWS: &str = "PIPELINE_PREVIEW_ROWS";
/// Environment variable holding the access token.
pub const ENV_ACCESS_TOKEN: &str = "PIPELINE_ACCESS_TOKEN";
/// Environment variable that lets callers in when no token is configured.
pub const ENV_ALLOW_ANONYMOUS: &str = "PIPELINE_ALLOW_ANONYMOUS";

const DEFAULT_DATA_DIR: &str = "uploads";
const DEFAULT_PREVIEW_ROWS: usize = 10;

/// Settings shared by every pipeline invocation of a process.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Directory for stored uploads and SQLite database files.
    /// Default: "uploads"
    pub data_dir: PathBuf,

    /// Directory for processed files. When `None`, processed files are
    /// written next to their input.
    /// Default: None
    pub output_dir: Option<PathBuf>,

    /// Number of rows returned in a preprocessing preview.
    /// Default: 10
    pub preview_rows: usize,

    /// Credential callers must present to [`crate::PipelineService::authorize`].
    pub access_token: Option<AccessToken>,

    /// Accept callers without credentials when no access token is set.
    /// Default: false
    pub allow_anonymous: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            output_dir: None,
            preview_rows: DEFAULT_PREVIEW_ROWS,
            access_token: None,
            allow_anonymous: false,
        }
    }
}

impl PipelineSettings {
    /// Create a new settings builder.
    pub fn builder() -> PipelineSettingsBuilder {
        PipelineSettingsBuilder::default()
    }

    /// Read settings from `PIPELINE_*` environment variables, falling back
    /// to defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::builder();
        if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
            builder = builder.data_dir(dir);
        }
        if let Ok(dir) = std::env::var(ENV_OUTPUT_DIR) {
            builder = builder.output_dir(dir);
        }
        if let Ok(rows) = std::env::var(ENV_PREVIEW_ROWS) {
            let rows = rows.parse::<usize>().map_err(|e| {
                PipelineError::Config(format!("{ENV_PREVIEW_ROWS}='{rows}': {e}"))
            })?;
            builder = builder.preview_rows(rows);
        }
        if let Ok(token) = std::env::var(ENV_ACCESS_TOKEN) {
            builder = builder.access_token(AccessToken::new(token));
        }
        if let Ok(flag) = std::env::var(ENV_ALLOW_ANONYMOUS) {
            let allow = flag.trim().parse::<bool>().map_err(|e| {
                PipelineError::Config(format!("{ENV_ALLOW_ANONYMOUS}='{flag}': {e}"))
            })?;
            builder = builder.allow_anonymous(allow);
        }
        Ok(builder.build()?)
    }

    /// Validate the settings and return errors if invalid.
    pub fn validate(&self) -> std::result::Result<(), SettingsValidationError> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(SettingsValidationError::EmptyDataDir);
        }
        if self.preview_rows == 0 {
            return Err(SettingsValidationError::InvalidPreviewRows(self.preview_rows));
        }
        if self.access_token.as_ref().is_some_and(AccessToken::is_empty) {
            return Err(SettingsValidationError::EmptyAccessToken);
        }
        Ok(())
    }
}

/// Errors that can occur during settings validation.
#[derive(Debug, thiserror::Error)]
pub enum SettingsValidationError {
    #[error("Data directory must not be empty")]
    EmptyDataDir,

    #[error("Invalid preview rows: {0} (must be at least 1)")]
    InvalidPreviewRows(usize),

    #[error("Access token must not be empty")]
    EmptyAccessToken,
}

impl From<SettingsValidationError> for PipelineError {
    fn from(err: SettingsValidationError) -> Self {
        PipelineError::Config(err.to_string())
    }
}

/// Builder for [`PipelineSettings`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineSettingsBuilder {
    data_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    preview_rows: Option<usize>,
    access_token: Option<AccessToken>,
    allow_anonymous: bool,
}

impl PipelineSettingsBuilder {
    /// Set the directory for uploads and SQLite databases.
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(path.into());
        self
    }

    /// Write processed files to this directory instead of next to the input.
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Set the number of preview rows.
    pub fn preview_rows(mut self, rows: usize) -> Self {
        self.preview_rows = Some(rows);
        self
    }

    /// Require callers to present this token.
    pub fn access_token(mut self, token: AccessToken) -> Self {
        self.access_token = Some(token);
        self
    }

    /// Accept callers without credentials when no token is configured.
    pub fn allow_anonymous(mut self, allow: bool) -> Self {
        self.allow_anonymous = allow;
        self
    }

    /// Build the settings.
    ///
    /// Returns validated `PipelineSettings` or an error if validation fails.
    pub fn build(self) -> std::result::Result<PipelineSettings, SettingsValidationError> {
        let settings = PipelineSettings {
            data_dir: self
                .data_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            output_dir: self.output_dir,
            preview_rows: self.preview_rows.unwrap_or(DEFAULT_PREVIEW_ROWS),
            access_token: self.access_token,
            allow_anonymous: self.allow_anonymous,
        };

        settings.validate()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rules_from_json_keep_order() {
        let config = PreprocessingConfig::from_json_value(json!({
            "zeta": {"missing": "remove"},
            "alpha": {"outliers": "cap"},
            "mid": {"missing": "mean", "outliers": "remove"}
        }))
        .unwrap();

        let names: Vec<&str> = config.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        assert_eq!(
            config.get("mid").unwrap().missing,
            Some(MissingStrategy::Mean)
        );
        assert!(config.removes_rows());
    }

    #[test]
    fn test_unknown_method_is_kept() {
        let config = PreprocessingConfig::from_json_str(r#"{"age": {"missing": "meen"}}"#).unwrap();
        assert_eq!(
            config.get("age").unwrap().missing,
            Some(MissingStrategy::Unrecognized("meen".to_string()))
        );
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let config =
            PreprocessingConfig::from_json_str(r#"{"age": {"scale": "minmax", "outliers": "cap"}}"#)
                .unwrap();
        let rules = config.get("age").unwrap();
        assert_eq!(rules.missing, None);
        assert_eq!(rules.outliers, Some(OutlierStrategy::Cap));
    }

    #[test]
    fn test_wrong_value_type_is_config_error() {
        let err = PreprocessingConfig::from_json_value(json!({"age": {"missing": 3}})).unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_rules_serialization_roundtrip_names() {
        let config = PreprocessingConfig::new().column(
            "x",
            ColumnRules::new()
                .missing(MissingStrategy::Zero)
                .outliers(OutlierStrategy::Unrecognized("winsor".to_string())),
        );
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json, json!({"x": {"missing": "zero", "outliers": "winsor"}}));
    }

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("sqlite".parse::<BackendKind>().unwrap(), BackendKind::Sqlite);
        assert_eq!("postgresql".parse::<BackendKind>().unwrap(), BackendKind::Postgres);
        assert_eq!("mysql".parse::<BackendKind>().unwrap(), BackendKind::MySql);
        assert_eq!("mongodb".parse::<BackendKind>().unwrap(), BackendKind::Mongo);

        let err = "oracle".parse::<BackendKind>().unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedBackend(ref name) if name == "oracle"));
    }

    #[test]
    fn test_export_config_from_frontend_json() {
        let config = ExportConfig::from_json_value(json!({
            "db_config": {
                "db_type": "postgresql",
                "host": "db.internal",
                "port": 5432,
                "username": "etl",
                "password": "s3cret",
                "database": "warehouse"
            },
            "table_name": "sales",
            "if_exists": "append"
        }))
        .unwrap();

        assert_eq!(config.db_config.backend().unwrap(), BackendKind::Postgres);
        assert_eq!(config.db_config.port, Some(5432));
        assert_eq!(config.if_exists, ConflictPolicy::Append);
        assert_eq!(config.db_config.password.as_ref().unwrap().expose(), "s3cret");
        assert!(!format!("{config:?}").contains("s3cret"));
    }

    #[test]
    fn test_export_config_defaults() {
        let config = ExportConfig::from_json_str(r#"{"db_config": {}, "table_name": "t"}"#).unwrap();
        assert_eq!(config.db_config.db_type, "sqlite");
        assert_eq!(config.if_exists, ConflictPolicy::Replace);
    }

    #[test]
    fn test_invalid_policy_is_config_error() {
        let err = ExportConfig::from_json_str(
            r#"{"db_config": {}, "table_name": "t", "if_exists": "overwrite"}"#,
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_settings_builder_defaults() {
        let settings = PipelineSettings::builder().build().unwrap();
        assert_eq!(settings.data_dir, PathBuf::from("uploads"));
        assert_eq!(settings.preview_rows, 10);
        assert!(settings.output_dir.is_none());
        assert!(settings.access_token.is_none());
        assert!(!settings.allow_anonymous);
    }

    #[test]
    fn test_settings_validation() {
        let result = PipelineSettings::builder().preview_rows(0).build();
        assert!(matches!(
            result.unwrap_err(),
            SettingsValidationError::InvalidPreviewRows(0)
        ));

        let result = PipelineSettings::builder().data_dir("").build();
        assert!(matches!(
            result.unwrap_err(),
            SettingsValidationError::EmptyDataDir
        ));
    }
}
