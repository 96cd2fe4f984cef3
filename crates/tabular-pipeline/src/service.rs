//! Service boundary.
//!
//! [`PipelineService`] is what request handlers call. Every operation
//! returns an [`Outcome`], never an `Err`: failures are logged and turned
//! into `{"status": "error", "code": ..., "message": ...}`.

use crate::analyzer::DatasetAnalyzer;
use crate::config::{ExportConfig, PipelineSettings, PreprocessingConfig};
use crate::error::{PipelineError, Result};
use crate::export::Exporter;
use crate::pipeline::Preprocessor;
use crate::types::{AnalysisReport, ExportResult, PreprocessResult};
use chrono::Local;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Result envelope returned across the service boundary.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome<T> {
    Success(T),
    Error { code: String, message: String },
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The success payload, if any.
    pub fn success(self) -> Option<T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Error { .. } => None,
        }
    }

    /// The error code, if this is an error.
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Error { code, .. } => Some(code),
        }
    }
}

impl<T> From<Result<T>> for Outcome<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(e) => Self::Error {
                code: e.error_code().to_string(),
                message: e.to_string(),
            },
        }
    }
}

/// A stored upload together with its analysis.
#[derive(Debug, Clone, Serialize)]
pub struct UploadResult {
    /// Stored file name, `<YYYYmmdd_HHMMSS>_<original name>`.
    pub filename: String,
    pub filepath: PathBuf,
    pub analysis: AnalysisReport,
}

/// Entry point for analysis, preprocessing and export requests.
#[derive(Debug, Clone)]
pub struct PipelineService {
    settings: PipelineSettings,
    preprocessor: Preprocessor,
    exporter: Exporter,
}

// Handlers run each call on a blocking worker thread.
static_assertions::assert_impl_all!(PipelineService: Send, Sync);

impl PipelineService {
    pub fn new(settings: PipelineSettings) -> Self {
        Self {
            preprocessor: Preprocessor::from_settings(&settings),
            exporter: Exporter::from_settings(&settings),
            settings,
        }
    }

    /// Build a service from `PIPELINE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(PipelineSettings::from_env()?))
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Check a presented bearer token.
    ///
    /// Without a configured token, callers are rejected unless the settings
    /// allow anonymous access.
    pub fn authorize(&self, presented: Option<&str>) -> Result<()> {
        let Some(expected) = &self.settings.access_token else {
            if self.settings.allow_anonymous {
                return Ok(());
            }
            warn!("Rejected request: no access token configured");
            return Err(PipelineError::Unauthorized);
        };
        match presented {
            Some(token) if expected.verify(token) => Ok(()),
            _ => {
                warn!("Rejected request with invalid credentials");
                Err(PipelineError::Unauthorized)
            }
        }
    }

    /// Analyze a CSV file.
    pub fn analyze(&self, path: &Path) -> Outcome<AnalysisReport> {
        Self::finish("analyze", DatasetAnalyzer::analyze_file(path))
    }

    /// Persist uploaded bytes under the data directory and analyze them.
    pub fn store_upload(&self, original_name: &str, bytes: &[u8]) -> Outcome<UploadResult> {
        Self::finish("upload", self.store_upload_internal(original_name, bytes))
    }

    fn store_upload_internal(&self, original_name: &str, bytes: &[u8]) -> Result<UploadResult> {
        let base_name = Path::new(original_name)
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| PipelineError::Config(format!("invalid file name '{original_name}'")))?;
        if !base_name.to_ascii_lowercase().ends_with(".csv") {
            return Err(PipelineError::Config(format!(
                "only CSV files are accepted, got '{base_name}'"
            )));
        }

        std::fs::create_dir_all(&self.settings.data_dir)?;
        let filename = format!("{}_{base_name}", Local::now().format("%Y%m%d_%H%M%S"));
        let filepath = self.settings.data_dir.join(&filename);
        std::fs::write(&filepath, bytes)?;
        info!("Stored upload {} ({} bytes)", filepath.display(), bytes.len());

        let analysis = DatasetAnalyzer::analyze_file(&filepath)?;
        Ok(UploadResult {
            filename,
            filepath,
            analysis,
        })
    }

    /// Clean a CSV file according to `config`.
    pub fn preprocess(&self, path: &Path, config: &PreprocessingConfig) -> Outcome<PreprocessResult> {
        Self::finish("preprocess", self.preprocessor.run(path, config))
    }

    /// Like [`preprocess`](Self::preprocess) with a configuration still in
    /// JSON form; a malformed configuration is reported as an error outcome.
    pub fn preprocess_json(&self, path: &Path, config: serde_json::Value) -> Outcome<PreprocessResult> {
        let result = PreprocessingConfig::from_json_value(config)
            .and_then(|config| self.preprocessor.run(path, &config));
        Self::finish("preprocess", result)
    }

    /// Export a CSV file to the configured backend.
    pub fn export(&self, path: &Path, config: &ExportConfig) -> Outcome<ExportResult> {
        Self::finish("export", self.exporter.export_file(path, config))
    }

    /// Like [`export`](Self::export) with a configuration still in JSON form.
    pub fn export_json(&self, path: &Path, config: serde_json::Value) -> Outcome<ExportResult> {
        let result = ExportConfig::from_json_value(config)
            .and_then(|config| self.exporter.export_file(path, &config));
        Self::finish("export", result)
    }

    fn finish<T>(operation: &str, result: Result<T>) -> Outcome<T> {
        if let Err(e) = &result {
            error!("{} failed [{}]: {}", operation, e.error_code(), e);
        }
        result.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::AccessToken;
    use serde_json::json;

    fn service(dir: &Path) -> PipelineService {
        PipelineService::new(PipelineSettings::builder().data_dir(dir).build().unwrap())
    }

    #[test]
    fn test_outcome_serialization() {
        let ok: Outcome<serde_json::Value> = Outcome::Success(json!({"rows_exported": 3}));
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"status": "success", "rows_exported": 3})
        );

        let err: Outcome<serde_json::Value> =
            Err(PipelineError::TableExists("sales".to_string())).into();
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({
                "status": "error",
                "code": "TABLE_EXISTS",
                "message": "Table 'sales' already exists"
            })
        );
    }

    #[test]
    fn test_authorize_without_token_rejects_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        assert!(matches!(service.authorize(None), Err(PipelineError::Unauthorized)));
        assert!(matches!(
            service.authorize(Some("anything")),
            Err(PipelineError::Unauthorized)
        ));
    }

    #[test]
    fn test_authorize_anonymous_opt_in() {
        let settings = PipelineSettings::builder()
            .allow_anonymous(true)
            .build()
            .unwrap();
        assert!(PipelineService::new(settings).authorize(None).is_ok());

        let settings = PipelineSettings::builder()
            .access_token(AccessToken::new("t0ken"))
            .allow_anonymous(true)
            .build()
            .unwrap();
        assert!(matches!(
            PipelineService::new(settings).authorize(None),
            Err(PipelineError::Unauthorized)
        ));
    }

    #[test]
    fn test_authorize_with_token() {
        let settings = PipelineSettings::builder()
            .access_token(AccessToken::new("t0ken"))
            .build()
            .unwrap();
        let service = PipelineService::new(settings);

        assert!(service.authorize(Some("t0ken")).is_ok());
        assert!(matches!(
            service.authorize(Some("wrong")),
            Err(PipelineError::Unauthorized)
        ));
        assert!(matches!(service.authorize(None), Err(PipelineError::Unauthorized)));
    }

    #[test]
    fn test_analyze_missing_file_is_error_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = service(dir.path()).analyze(&dir.path().join("missing.csv"));
        assert_eq!(outcome.error_code(), Some("READ_ERROR"));
    }

    #[test]
    fn test_store_upload() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = service(dir.path()).store_upload("../../etc/sales.csv", b"a,b\n1,x\n2,y\n");

        let upload = outcome.success().unwrap();
        assert!(upload.filename.ends_with("_sales.csv"));
        assert_eq!(upload.filepath.parent().unwrap(), dir.path());
        assert_eq!(upload.analysis.basic_info.row_count, 2);
    }

    #[test]
    fn test_store_upload_rejects_non_csv() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = service(dir.path()).store_upload("report.xlsx", b"");
        assert_eq!(outcome.error_code(), Some("CONFIG_ERROR"));
    }

    #[test]
    fn test_preprocess_json_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.csv");
        std::fs::write(&input, "v\n1\n").unwrap();

        let outcome = service(dir.path()).preprocess_json(&input, json!({"v": {"missing": 1}}));
        assert_eq!(outcome.error_code(), Some("CONFIG_ERROR"));
    }

    #[test]
    fn test_export_json_unsupported_backend() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.csv");
        std::fs::write(&input, "v\n1\n").unwrap();

        let outcome = service(dir.path()).export_json(
            &input,
            json!({"db_config": {"db_type": "oracle"}, "table_name": "t"}),
        );
        assert_eq!(outcome.error_code(), Some("UNSUPPORTED_BACKEND"));
    }
}
