//! CLI entry point for the tabular pipeline.

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tabular_pipeline::{
    AnalysisReport, ColumnStats, ExportResult, Outcome, PipelineService, PipelineSettings,
    PreprocessResult, UploadResult,
};
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "CSV profiling, cleaning and database export",
    long_about = "Profile a CSV file, clean it with per-column rules and export the result \
                  to SQLite, PostgreSQL, MySQL or MongoDB.\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  PIPELINE_DATA_DIR       Directory for uploads and SQLite files (default: uploads)\n  \
                  PIPELINE_OUTPUT_DIR     Directory for processed files (default: next to input)\n  \
                  PIPELINE_PREVIEW_ROWS   Rows in the preprocessing preview (default: 10)\n  \
                  PIPELINE_ACCESS_TOKEN   Token callers must present with --token\n  \
                  PIPELINE_ALLOW_ANONYMOUS  Set to true to run without a token (default: false)\n\n\
                  EXAMPLES:\n  \
                  # Profile a file\n  \
                  tabular-pipeline analyze data.csv\n\n  \
                  # Fill missing ages with the median and cap income outliers\n  \
                  tabular-pipeline preprocess data.csv --config '{\"age\": {\"missing\": \"median\"}, \"income\": {\"outliers\": \"cap\"}}'\n\n  \
                  # Export to SQLite, appending to an existing table\n  \
                  tabular-pipeline export processed.csv --config export.json"
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Suppress progress output (only show errors and final result)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output the JSON envelope to stdout instead of a human-readable summary
    ///
    /// Disables all logs; useful for piping: `... --json | jq .status`
    #[arg(long, global = true)]
    json: bool,

    /// Directory for stored uploads and SQLite databases
    ///
    /// Overrides PIPELINE_DATA_DIR
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Access token, checked against PIPELINE_ACCESS_TOKEN
    #[arg(long, global = true)]
    token: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Profile every column of a CSV file
    Analyze {
        /// Path to the CSV file
        input: PathBuf,
    },

    /// Copy a CSV file into the data directory and profile it
    Upload {
        /// Path to the CSV file
        input: PathBuf,
    },

    /// Apply per-column cleaning rules and write a processed file
    Preprocess {
        /// Path to the CSV file
        input: PathBuf,

        /// Cleaning rules as inline JSON or a path to a JSON file
        ///
        /// Shape: {"<column>": {"missing": "mean|median|zero|remove", "outliers": "remove|cap"}}
        #[arg(short, long, default_value = "{}")]
        config: String,
    },

    /// Write a CSV file to a database table or collection
    Export {
        /// Path to the CSV file
        input: PathBuf,

        /// Export settings as inline JSON or a path to a JSON file
        ///
        /// Shape: {"db_config": {"db_type": "sqlite", ...}, "table_name": "t", "if_exists": "replace"}
        #[arg(short, long)]
        config: String,
    },
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    // Load environment variables from .env file
    dotenv().ok();

    let mut settings = PipelineSettings::from_env()?;
    if let Some(dir) = &args.data_dir {
        settings.data_dir = dir.clone();
    }
    settings.validate()?;
    debug!("Settings: {:?}", settings);

    let service = PipelineService::new(settings);
    service.authorize(args.token.as_deref())?;

    match &args.command {
        Command::Analyze { input } => {
            let outcome = service.analyze(input);
            report(&args, outcome, print_analysis)
        }
        Command::Upload { input } => {
            let name = input
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| anyhow!("Input path has no file name: {}", input.display()))?;
            let bytes = std::fs::read(input)
                .with_context(|| format!("Input file not found: {}", input.display()))?;
            let outcome = service.store_upload(name, &bytes);
            report(&args, outcome, print_upload)
        }
        Command::Preprocess { input, config } => {
            let config = read_json_arg(config)?;
            let outcome = service.preprocess_json(input, config);
            report(&args, outcome, print_preprocess)
        }
        Command::Export { input, config } => {
            let config = read_json_arg(config)?;
            let outcome = service.export_json(input, config);
            report(&args, outcome, print_export)
        }
    }
}

/// Accept either inline JSON or the path of a JSON file.
fn read_json_arg(arg: &str) -> Result<serde_json::Value> {
    let trimmed = arg.trim_start();
    let text = if trimmed.starts_with('{') {
        arg.to_string()
    } else {
        info!("Reading configuration from {}", arg);
        std::fs::read_to_string(Path::new(arg))
            .with_context(|| format!("Failed to read configuration file: {arg}"))?
    };
    serde_json::from_str(&text).context("Configuration is not valid JSON")
}

/// Print the outcome and turn an error envelope into a failing exit status.
fn report<T: Serialize>(args: &Args, outcome: Outcome<T>, summary: fn(&T)) -> Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    }

    match outcome {
        Outcome::Success(value) => {
            if !args.json {
                summary(&value);
            }
            Ok(())
        }
        Outcome::Error { code, message } => Err(anyhow!("[{code}] {message}")),
    }
}

fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}

fn format_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v}"))
}

// Summaries below print with `println!` on purpose: they are the command's
// output, not log lines, and must show regardless of the log level.

fn print_analysis(report: &AnalysisReport) {
    println!("\n{}", "=".repeat(80));
    println!("DATASET OVERVIEW");
    println!("{}", "-".repeat(40));
    println!("  Rows: {}", report.basic_info.row_count);
    println!("  Columns: {}", report.basic_info.column_count);
    println!("  Size: {} MB", report.basic_info.file_size_mb);
    println!();

    println!("COLUMN PROFILES");
    println!("{}", "-".repeat(40));
    println!(
        "{:<20} {:<12} {:<10} {:<10} {:<30}",
        "Column", "Type", "Missing %", "Outlier %", "Summary"
    );
    println!("{}", "-".repeat(80));

    for column in &report.columns {
        let summary = match &column.stats {
            ColumnStats::Numeric(stats) => format!(
                "mean={} median={} min={} max={}",
                format_opt(stats.mean),
                format_opt(stats.median),
                format_opt(stats.min),
                format_opt(stats.max)
            ),
            ColumnStats::Categorical(stats) => format!(
                "unique={} top={}",
                stats.unique_count,
                stats.most_common.as_deref().unwrap_or("-")
            ),
        };
        println!(
            "{:<20} {:<12} {:<10.2} {:<10.2} {:<30}",
            truncate_str(&column.name, 19),
            column.inferred_type.to_string(),
            column.null_percentage,
            column.outlier_percentage,
            summary
        );
    }
    println!("{}", "=".repeat(80));
}

fn print_upload(upload: &UploadResult) {
    println!("Stored {} at {}", upload.filename, upload.filepath.display());
    print_analysis(&upload.analysis);
}

fn print_preprocess(result: &PreprocessResult) {
    println!("\n{}", "=".repeat(80));
    println!("PREPROCESSING COMPLETE");
    println!("{}", "-".repeat(40));
    println!("  Rows: {} -> {}", result.original_rows, result.processed_rows);
    println!("  Rows removed: {}", result.rows_removed);
    println!("  Output: {}", result.processed_file.display());
    println!();

    if !result.actions.is_empty() {
        println!("ACTIONS");
        println!("{}", "-".repeat(40));
        for (i, action) in result.actions.iter().enumerate() {
            println!(
                "  {}. [{}] {}",
                i + 1,
                action.action_type.display_name(),
                action.description
            );
        }
        println!();
    }

    if !result.diagnostics.is_empty() {
        println!("WARNINGS");
        println!("{}", "-".repeat(40));
        for diagnostic in &result.diagnostics {
            println!("  - {}: {}", diagnostic.column, diagnostic.message);
        }
        println!();
    }
    println!("{}", "=".repeat(80));
}

fn print_export(result: &ExportResult) {
    println!("{}", result.message);
    println!("  Backend: {}", result.db_type);
    println!("  Columns: {}", result.columns.join(", "));
    if let Some(db_file) = &result.db_file {
        println!("  Database file: {}", db_file.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("short", 10), "short");
        assert_eq!(truncate_str("a_very_long_column_name", 10), "a_very_...");
    }

    #[test]
    fn test_read_json_arg_inline() {
        let value = read_json_arg(r#"{"age": {"missing": "mean"}}"#).unwrap();
        assert_eq!(value["age"]["missing"], "mean");
    }

    #[test]
    fn test_read_json_arg_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.json");
        std::fs::write(&path, r#"{"table_name": "t", "db_config": {}}"#).unwrap();

        let value = read_json_arg(path.to_str().unwrap()).unwrap();
        assert_eq!(value["table_name"], "t");
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "tabular-pipeline",
            "preprocess",
            "data.csv",
            "--config",
            "{}",
            "--json",
        ])
        .unwrap();
        assert!(args.json);
        assert!(matches!(args.command, Command::Preprocess { .. }));
    }
}
