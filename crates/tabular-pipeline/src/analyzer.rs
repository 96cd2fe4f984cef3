//! Dataset-level analysis.

use crate::error::{Result, ResultExt};
use crate::loader::{bytes_to_mb, load_table};
use crate::profiler::ColumnProfiler;
use crate::types::{AnalysisReport, DatasetInfo};
use polars::prelude::*;
use std::path::Path;
use tracing::info;

/// Runs the column profiler over a whole table.
pub struct DatasetAnalyzer;

impl DatasetAnalyzer {
    /// Analyze an in-memory table whose backing file is `file_size_bytes`
    /// long. Columns are reported in table order.
    pub fn analyze(df: &DataFrame, file_size_bytes: u64) -> Result<AnalysisReport> {
        let total_rows = df.height();
        let columns = df
            .get_columns()
            .iter()
            .map(|col| {
                ColumnProfiler::profile(col.as_materialized_series(), total_rows)
                    .context(format!("While profiling column '{}'", col.name()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(AnalysisReport {
            basic_info: DatasetInfo {
                row_count: total_rows,
                column_count: df.width(),
                file_size_mb: bytes_to_mb(file_size_bytes),
            },
            columns,
        })
    }

    /// Load `path` and analyze it.
    pub fn analyze_file(path: &Path) -> Result<AnalysisReport> {
        let df = load_table(path)?;
        let file_size = std::fs::metadata(path)?.len();
        let report = Self::analyze(&df, file_size)?;

        info!(
            "Analyzed {}: {} rows, {} columns, {:.2} MB",
            path.display(),
            report.basic_info.row_count,
            report.basic_info.column_count,
            report.basic_info.file_size_mb
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InferredType;
    use pretty_assertions::assert_eq;

    fn sample_df() -> DataFrame {
        df![
            "id" => [1i64, 2, 3, 4, 5],
            "city" => ["a", "b", "a", "a", "c"],
            "score" => [Some(1.0), Some(2.0), None, Some(4.0), Some(100.0)],
        ]
        .unwrap()
    }

    #[test]
    fn test_analyze_keeps_column_order() {
        let report = DatasetAnalyzer::analyze(&sample_df(), 2048).unwrap();

        assert_eq!(report.basic_info.row_count, 5);
        assert_eq!(report.basic_info.column_count, 3);
        assert_eq!(report.basic_info.file_size_mb, 0.0);

        let names: Vec<&str> = report.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "city", "score"]);
        assert_eq!(report.columns[1].inferred_type, InferredType::Categorical);
        assert_eq!(report.column("score").unwrap().null_count, 1);
    }

    #[test]
    fn test_analyze_is_deterministic() {
        let df = sample_df();
        let first = DatasetAnalyzer::analyze(&df, 10).unwrap();
        let second = DatasetAnalyzer::analyze(&df, 10).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_analyze_empty_table() {
        let df = DataFrame::new(vec![Column::new("x".into(), Vec::<i64>::new())]).unwrap();
        let report = DatasetAnalyzer::analyze(&df, 0).unwrap();

        assert_eq!(report.basic_info.row_count, 0);
        assert_eq!(report.columns[0].null_percentage, 0.0);
    }

    #[test]
    fn test_report_wire_shape() {
        let report = DatasetAnalyzer::analyze(&sample_df(), 0).unwrap();
        let json = serde_json::to_value(&report).unwrap();

        assert!(json["basic_info"]["row_count"].is_u64());
        assert_eq!(json["columns"][0]["column_name"], "id");
        assert_eq!(json["columns"][0]["data_type"], "numeric");
        assert_eq!(json["columns"][1]["stats"]["most_common"], "a");
    }
}
