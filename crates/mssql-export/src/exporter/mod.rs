//! Per-table export worker: drive one SELECT cursor, batch INSERT
//! statements, and hand the table section to the sink.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::ExportConfig;
use crate::error::{ExportError, Result};
use crate::pool::MssqlClient;
use crate::schema::TableMetadata;
use crate::sql::{build_select, InsertBuilder, SqlSink};

/// Per-query timeout at the driver.
const QUERY_TIMEOUT: Duration = Duration::from_secs(300);

/// Outcome of one table export.
#[derive(Debug, Clone)]
pub struct ExportResult {
    pub table_name: String,
    pub row_count: i64,
    pub duration_seconds: f64,
}

/// Export one table through an acquired session.
///
/// Rows are read and formatted first; the sink lock is taken only for the
/// write, so slow cursors never block other workers' output.
pub async fn export_table(
    client: &mut MssqlClient,
    metadata: &TableMetadata,
    sink: &SqlSink,
    config: &ExportConfig,
) -> Result<ExportResult> {
    let start = Instant::now();

    let select = build_select(metadata, config.row_limit);
    debug!("{}: {}", metadata.full_name(), select);

    let rows = tokio::time::timeout(QUERY_TIMEOUT, async {
        let stream = client.simple_query(&select).await?;
        stream.into_first_result().await
    })
    .await
    .map_err(|_| {
        ExportError::table(
            metadata.name.clone(),
            format!("query timed out after {:?}", QUERY_TIMEOUT),
        )
    })?
    .map_err(|e| ExportError::table(metadata.name.clone(), e))?;

    let builder = InsertBuilder::new(metadata);
    let mut batches: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::with_capacity(config.batch_size);
    let mut row_count: i64 = 0;

    for row in rows.iter().take(config.row_limit as usize) {
        current.push(builder.insert_for_row(row));
        row_count += 1;

        if current.len() >= config.batch_size {
            batches.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }

    sink.write_table(metadata, &batches)
        .await
        .map_err(|e| ExportError::table(metadata.name.clone(), e))?;

    Ok(ExportResult {
        table_name: metadata.name.clone(),
        row_count,
        duration_seconds: start.elapsed().as_secs_f64(),
    })
}
