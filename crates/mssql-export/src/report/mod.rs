//! Run statistics and the human-readable report artifact.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Local};
use tracing::info;

use crate::config::ExportConfig;
use crate::error::Result;

/// Accumulates per-table row counts and run timing. Counts grow
/// monotonically during the export phase; one write per table per run.
#[derive(Debug, Default)]
pub struct ExportStatistics {
    start_time: Option<DateTime<Local>>,
    end_time: Option<DateTime<Local>>,
    table_rows: Mutex<HashMap<String, i64>>,
}

impl ExportStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.start_time = Some(Local::now());
    }

    pub fn end(&mut self) {
        self.end_time = Some(Local::now());
    }

    /// Record the exported row count for one table.
    pub fn record_table_export(&self, table_name: &str, row_count: i64) {
        if let Ok(mut rows) = self.table_rows.lock() {
            rows.insert(table_name.to_string(), row_count);
        }
    }

    pub fn tables_processed(&self) -> usize {
        self.table_rows.lock().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn total_rows_exported(&self) -> i64 {
        self.table_rows
            .lock()
            .map(|rows| rows.values().sum())
            .unwrap_or(0)
    }

    pub fn duration_seconds(&self) -> i64 {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => (end - start).num_seconds(),
            _ => 0,
        }
    }

    pub fn start_time(&self) -> Option<DateTime<Local>> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Local>> {
        self.end_time
    }

    /// Per-table counts sorted by row count descending.
    pub fn table_row_counts(&self) -> Vec<(String, i64)> {
        let mut counts: Vec<(String, i64)> = self
            .table_rows
            .lock()
            .map(|rows| rows.iter().map(|(k, v)| (k.clone(), *v)).collect())
            .unwrap_or_default();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts
    }

    /// Multi-line summary block. All ratios are guarded against empty runs.
    pub fn summary(&self) -> String {
        let tables = self.tables_processed();
        let rows = self.total_rows_exported();
        let duration = self.duration_seconds();

        let avg_rows = if tables > 0 {
            rows as f64 / tables as f64
        } else {
            0.0
        };
        let throughput = if duration > 0 {
            rows as f64 / duration as f64
        } else {
            0.0
        };

        format!(
            "\n========================================\n\
             Export Statistics\n\
             ========================================\n\
             Tables Processed: {}\n\
             Total Rows Exported: {}\n\
             Duration: {} seconds ({:.2} minutes)\n\
             Avg Rows/Table: {:.2}\n\
             Throughput: {:.2} rows/second\n\
             ========================================",
            tables,
            rows,
            duration,
            duration as f64 / 60.0,
            avg_rows,
            throughput
        )
    }
}

const REPORT_SEPARATOR_LEN: usize = 100;

/// Write `export_report_<ts>.txt` next to the SQL artifact.
pub fn generate_report(config: &ExportConfig, statistics: &ExportStatistics) -> Result<PathBuf> {
    fs::create_dir_all(&config.output_directory)?;

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let path = config
        .output_directory
        .join(format!("export_report_{}.txt", timestamp));

    let separator = "=".repeat(REPORT_SEPARATOR_LEN);
    let line = "-".repeat(REPORT_SEPARATOR_LEN);

    let mut writer = BufWriter::new(File::create(&path)?);

    writeln!(writer, "{}", separator)?;
    writeln!(writer, "DATABASE EXPORT REPORT")?;
    writeln!(writer, "{}", separator)?;
    writeln!(writer)?;
    writeln!(writer, "Database: {}", config.db_name)?;
    writeln!(writer, "Generated: {}", Local::now().format("%Y-%m-%d %H:%M:%S"))?;
    if let Some(start) = statistics.start_time() {
        writeln!(writer, "Started: {}", start.format("%Y-%m-%d %H:%M:%S"))?;
    }
    if let Some(end) = statistics.end_time() {
        writeln!(writer, "Completed: {}", end.format("%Y-%m-%d %H:%M:%S"))?;
    }
    writeln!(writer, "Row Limit per Table: {}", config.row_limit)?;
    writeln!(writer, "{}", statistics.summary())?;

    writeln!(writer)?;
    writeln!(writer, "DETAILED TABLE EXPORT COUNTS")?;
    writeln!(writer, "{}", line)?;
    for (table, rows) in statistics.table_row_counts() {
        writeln!(writer, "  {:<50} : {:>10} rows", table, rows)?;
    }

    writeln!(writer)?;
    writeln!(writer, "{}", separator)?;
    writeln!(writer, "END OF REPORT")?;
    writeln!(writer, "{}", separator)?;
    writer.flush()?;

    info!("Export report generated: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterConfig;
    use tempfile::tempdir;

    fn config(dir: PathBuf) -> ExportConfig {
        ExportConfig {
            db_host: "localhost".to_string(),
            db_port: 1433,
            db_name: "northwind".to_string(),
            db_user: "sa".to_string(),
            db_password: "".to_string(),
            schema_name: "dbo".to_string(),
            row_limit: 200,
            batch_size: 1000,
            parallel_threads: 4,
            output_directory: dir,
            include_system_tables: false,
            generate_create_statements: false,
            generate_drop_statements: false,
            filter: FilterConfig::default(),
        }
    }

    #[test]
    fn test_statistics_accumulate() {
        let stats = ExportStatistics::new();
        stats.record_table_export("users", 100);
        stats.record_table_export("orders", 250);

        assert_eq!(stats.tables_processed(), 2);
        assert_eq!(stats.total_rows_exported(), 350);
    }

    #[test]
    fn test_record_is_idempotent_per_table() {
        let stats = ExportStatistics::new();
        stats.record_table_export("users", 100);
        stats.record_table_export("users", 100);
        assert_eq!(stats.tables_processed(), 1);
        assert_eq!(stats.total_rows_exported(), 100);
    }

    #[test]
    fn test_row_counts_sorted_descending() {
        let stats = ExportStatistics::new();
        stats.record_table_export("small", 1);
        stats.record_table_export("big", 500);
        stats.record_table_export("mid", 42);

        let counts = stats.table_row_counts();
        assert_eq!(counts[0].0, "big");
        assert_eq!(counts[1].0, "mid");
        assert_eq!(counts[2].0, "small");
    }

    #[test]
    fn test_empty_summary_has_no_division_by_zero() {
        let stats = ExportStatistics::new();
        let summary = stats.summary();
        assert!(summary.contains("Tables Processed: 0"));
        assert!(summary.contains("Avg Rows/Table: 0.00"));
        assert!(summary.contains("Throughput: 0.00 rows/second"));
    }

    #[test]
    fn test_report_file_contents() {
        let dir = tempdir().unwrap();
        let mut stats = ExportStatistics::new();
        stats.start();
        stats.record_table_export("users", 10);
        stats.end();

        let path = generate_report(&config(dir.path().to_path_buf()), &stats).unwrap();
        let content = fs::read_to_string(&path).unwrap();

        assert!(content.contains("DATABASE EXPORT REPORT"));
        assert!(content.contains("Database: northwind"));
        assert!(content.contains("users"));
        assert!(content.contains("10 rows"));
        assert!(content.contains("END OF REPORT"));

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("export_report_"));
        assert!(name.ends_with(".txt"));
    }
}
