//! Export orchestrator - sequences the run phases and collects statistics.
//!
//! Phases run strictly in order: connect, introspect, filter, sink init,
//! scheduled parallel export, finalize. A failure in any phase terminates
//! the run after the pool is closed; a partial SQL artifact is left on
//! disk for inspection.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Local};
use tracing::{info, warn};

use crate::config::ExportConfig;
use crate::error::Result;
use crate::filter::TableFilter;
use crate::pool::{open_session, SessionPool};
use crate::report::{generate_report, ExportStatistics};
use crate::schema::{analyze_schema, SortStrategy, TableMetadata};
use crate::scheduler::export_in_waves;
use crate::sql::SqlSink;

/// Result of a completed export run.
#[derive(Debug, Clone)]
pub struct ExportRunResult {
    /// Generated SQL artifact.
    pub output_file: PathBuf,

    /// Generated report artifact.
    pub report_file: PathBuf,

    /// Tables actually exported.
    pub tables_exported: usize,

    /// Total rows across all tables.
    pub total_rows: i64,

    /// Wall-clock duration of the run.
    pub duration_seconds: f64,

    pub started_at: DateTime<Local>,
    pub completed_at: DateTime<Local>,
}

/// Connectivity probe result.
#[derive(Debug, Clone)]
pub struct HealthCheckResult {
    pub connected: bool,
    pub latency_ms: u128,
    pub error: Option<String>,
}

/// Coordinates one export run.
pub struct Orchestrator {
    config: Arc<ExportConfig>,
}

impl Orchestrator {
    pub fn new(config: ExportConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Execute the full export.
    pub async fn run(&self) -> Result<ExportRunResult> {
        let started_at = Local::now();
        let run_start = Instant::now();
        let mut statistics = ExportStatistics::new();
        statistics.start();

        self.log_run_start();

        // Phase 1: primary session + worker pool.
        let phase = Instant::now();
        let mut primary = open_session(&self.config).await?;
        let pool = Arc::new(SessionPool::connect(&self.config, self.config.parallel_threads).await?);
        let connect_secs = phase.elapsed().as_secs_f64();

        // Phase 2: bulk introspection.
        let phase = Instant::now();
        let tables = analyze_schema(&mut primary, &self.config).await?;
        log_metadata_summary(&tables);
        let introspect_secs = phase.elapsed().as_secs_f64();

        // Phase 3: filtering.
        let phase = Instant::now();
        let table_filter = TableFilter::from_config(&self.config.filter);
        let (tables, _filter_stats) = table_filter.apply(tables);
        let filter_secs = phase.elapsed().as_secs_f64();

        // Phase 4: sink initialization.
        let phase = Instant::now();
        let sink = Arc::new(SqlSink::create(
            &self.config.output_directory,
            &self.config.db_name,
            tables.len(),
            self.config.row_limit,
        )?);
        let sink_secs = phase.elapsed().as_secs_f64();

        // Phase 5: scheduled parallel export. The partial artifact stays
        // on disk when a wave fails.
        let phase = Instant::now();
        let export_outcome = export_in_waves(
            Arc::clone(&pool),
            Arc::clone(&sink),
            Arc::clone(&self.config),
            tables,
        )
        .await;
        let export_secs = phase.elapsed().as_secs_f64();

        let results = match export_outcome {
            Ok(results) => results,
            Err(e) => {
                pool.close().await;
                return Err(e);
            }
        };

        // Phase 6: finalize.
        let phase = Instant::now();
        for result in &results {
            statistics.record_table_export(&result.table_name, result.row_count);
        }
        sink.finish(results.len()).await?;
        statistics.end();
        let report_file = generate_report(&self.config, &statistics)?;
        pool.close().await;
        let finalize_secs = phase.elapsed().as_secs_f64();

        info!("{}", statistics.summary());
        info!(
            "Phase timings: connect {:.2}s, introspect {:.2}s, filter {:.2}s, \
             sink {:.2}s, export {:.2}s, finalize {:.2}s",
            connect_secs, introspect_secs, filter_secs, sink_secs, export_secs, finalize_secs
        );
        info!("Export completed successfully");

        Ok(ExportRunResult {
            output_file: sink.path().to_path_buf(),
            report_file,
            tables_exported: statistics.tables_processed(),
            total_rows: statistics.total_rows_exported(),
            duration_seconds: run_start.elapsed().as_secs_f64(),
            started_at,
            completed_at: Local::now(),
        })
    }

    /// Open one session and run `SELECT 1`.
    pub async fn health_check(&self) -> HealthCheckResult {
        let start = Instant::now();
        let outcome = async {
            let mut client = open_session(&self.config).await?;
            client.simple_query("SELECT 1").await?.into_row().await?;
            Ok::<_, crate::error::ExportError>(())
        }
        .await;

        match outcome {
            Ok(()) => HealthCheckResult {
                connected: true,
                latency_ms: start.elapsed().as_millis(),
                error: None,
            },
            Err(e) => HealthCheckResult {
                connected: false,
                latency_ms: start.elapsed().as_millis(),
                error: Some(e.to_string()),
            },
        }
    }

    fn log_run_start(&self) {
        info!("============================================================");
        info!("Database Export Starting");
        info!("============================================================");
        info!("Database: {}", self.config.db_name);
        info!("Connection: {}", self.config.connection_string());
        info!("Schema: {}", self.config.schema_name);
        info!("Row Limit: {} per table", self.config.row_limit);
        info!("Parallel Workers: {}", self.config.parallel_threads);
        info!("Batch Size: {}", self.config.batch_size);
        info!("============================================================");
    }
}

/// Warn about tables that will restore in unspecified row order.
fn log_metadata_summary(tables: &[TableMetadata]) {
    let mut without_pk = 0;
    let mut without_sort = 0;
    let mut composite_pk = 0;

    for table in tables {
        if !table.has_primary_key() {
            without_pk += 1;
            warn!("Table without primary key: {}", table.name);
        }
        if table.sort_strategy == SortStrategy::NoSort {
            without_sort += 1;
        }
        if table.has_composite_key() {
            composite_pk += 1;
        }
    }

    info!(
        "Validation summary: {} tables without PK, {} without sort strategy, {} with composite PK",
        without_pk, without_sort, composite_pk
    );
}
