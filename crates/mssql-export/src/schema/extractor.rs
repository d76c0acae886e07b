//! Bulk schema introspection.
//!
//! The whole catalog for one schema is recovered with a constant number of
//! queries: one discovery query plus four bulk queries (primary keys,
//! foreign keys, columns, row counts). This keeps the phase O(catalog)
//! instead of O(tables x round-trips).

use std::collections::HashMap;
use std::time::Instant;

use tiberius::Query;
use tracing::{debug, info};

use crate::config::ExportConfig;
use crate::error::{ExportError, Result};
use crate::pool::MssqlClient;
use crate::schema::sort::resolve_sort_strategy;
use crate::schema::types::{ColumnInfo, ForeignKeyInfo, SqlTypeCode, TableMetadata};

/// Tables that slip past the name-shape checks but are still system-owned.
const SYSTEM_TABLE_NAMES: &[&str] = &["trace_xe_action_map", "trace_xe_event_map", "sysdiagrams"];

/// All catalog state for one schema, keyed by table name.
#[derive(Debug, Default)]
pub struct BulkMetadata {
    primary_keys: HashMap<String, Vec<String>>,
    foreign_keys: HashMap<String, Vec<ForeignKeyInfo>>,
    columns: HashMap<String, Vec<ColumnInfo>>,
    row_counts: HashMap<String, i64>,
}

impl BulkMetadata {
    pub fn primary_keys(&self, table: &str) -> Vec<String> {
        self.primary_keys.get(table).cloned().unwrap_or_default()
    }

    pub fn foreign_keys(&self, table: &str) -> Vec<ForeignKeyInfo> {
        self.foreign_keys.get(table).cloned().unwrap_or_default()
    }

    pub fn columns(&self, table: &str) -> Vec<ColumnInfo> {
        self.columns.get(table).cloned().unwrap_or_default()
    }

    /// Estimated row count; -1 when the partitions catalog had no entry.
    pub fn row_count(&self, table: &str) -> i64 {
        self.row_counts.get(table).copied().unwrap_or(-1)
    }
}

/// Analyze one schema: discover tables, pull the catalog in bulk, and
/// assemble `TableMetadata` in discovery order.
pub async fn analyze_schema(
    client: &mut MssqlClient,
    config: &ExportConfig,
) -> Result<Vec<TableMetadata>> {
    let start = Instant::now();

    let table_names = discover_tables(client, config).await?;
    info!("Found {} tables to analyze", table_names.len());

    let bulk = extract_bulk_metadata(client, &config.schema_name).await?;

    let mut tables = Vec::with_capacity(table_names.len());
    for name in table_names {
        let primary_key = bulk.primary_keys(&name);
        let mut foreign_keys = bulk.foreign_keys(&name);
        foreign_keys.sort_by_key(|fk| fk.key_sequence);
        let mut columns = bulk.columns(&name);
        columns.sort_by_key(|col| col.ordinal);

        let sort_strategy = resolve_sort_strategy(&name, &primary_key, &columns);
        let estimated_row_count = bulk.row_count(&name);

        tables.push(TableMetadata {
            name,
            schema: config.schema_name.clone(),
            primary_key,
            foreign_keys,
            columns,
            sort_strategy,
            estimated_row_count,
        });
    }

    info!(
        "Schema analysis complete: {} tables in {:.2}s",
        tables.len(),
        start.elapsed().as_secs_f64()
    );
    Ok(tables)
}

/// List base tables in the schema, dropping system tables unless configured in.
async fn discover_tables(client: &mut MssqlClient, config: &ExportConfig) -> Result<Vec<String>> {
    let sql = r#"
        SELECT t.TABLE_NAME
        FROM INFORMATION_SCHEMA.TABLES t
        WHERE t.TABLE_TYPE = 'BASE TABLE'
          AND t.TABLE_SCHEMA = @P1
        ORDER BY t.TABLE_NAME
    "#;

    let mut query = Query::new(sql);
    query.bind(&config.schema_name);

    let stream = query
        .query(client)
        .await
        .map_err(|e| ExportError::Introspection(format!("table discovery failed: {}", e)))?;
    let rows = stream
        .into_first_result()
        .await
        .map_err(|e| ExportError::Introspection(format!("table discovery failed: {}", e)))?;

    let mut tables = Vec::new();
    for row in rows {
        let name = row.get::<&str, _>(0).unwrap_or_default().to_string();
        if !config.include_system_tables && is_system_table(&name) {
            debug!("Skipping system table: {}", name);
            continue;
        }
        tables.push(name);
    }

    Ok(tables)
}

/// Pull the four bulk catalog mappings.
pub async fn extract_bulk_metadata(
    client: &mut MssqlClient,
    schema: &str,
) -> Result<BulkMetadata> {
    info!("Starting bulk metadata extraction...");
    let start = Instant::now();

    let primary_keys = extract_all_primary_keys(client, schema).await?;
    let foreign_keys = extract_all_foreign_keys(client, schema).await?;
    let columns = extract_all_columns(client, schema).await?;
    let row_counts = extract_all_row_counts(client, schema).await?;

    info!(
        "Bulk metadata extraction complete in {} ms \
         (pk: {} tables, fk: {} tables, columns: {} tables, row counts: {} tables)",
        start.elapsed().as_millis(),
        primary_keys.len(),
        foreign_keys.len(),
        columns.len(),
        row_counts.len()
    );

    Ok(BulkMetadata {
        primary_keys,
        foreign_keys,
        columns,
        row_counts,
    })
}

/// All primary keys for the schema in one query.
async fn extract_all_primary_keys(
    client: &mut MssqlClient,
    schema: &str,
) -> Result<HashMap<String, Vec<String>>> {
    let sql = r#"
        SELECT
            tc.TABLE_NAME,
            kcu.COLUMN_NAME,
            kcu.ORDINAL_POSITION
        FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc
        JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE kcu
            ON tc.CONSTRAINT_NAME = kcu.CONSTRAINT_NAME
            AND tc.TABLE_SCHEMA = kcu.TABLE_SCHEMA
            AND tc.TABLE_NAME = kcu.TABLE_NAME
        WHERE tc.CONSTRAINT_TYPE = 'PRIMARY KEY'
          AND tc.TABLE_SCHEMA = @P1
        ORDER BY tc.TABLE_NAME, kcu.ORDINAL_POSITION
    "#;

    let mut query = Query::new(sql);
    query.bind(schema);

    let rows = run_catalog_query(client, query, "primary key").await?;

    let mut result: HashMap<String, Vec<String>> = HashMap::new();
    for row in rows {
        let table = row.get::<&str, _>(0).unwrap_or_default().to_string();
        let column = row.get::<&str, _>(1).unwrap_or_default().to_string();
        result.entry(table).or_default().push(column);
    }

    Ok(result)
}

/// All foreign key columns for the schema in one query over the FK system views.
async fn extract_all_foreign_keys(
    client: &mut MssqlClient,
    schema: &str,
) -> Result<HashMap<String, Vec<ForeignKeyInfo>>> {
    let sql = r#"
        SELECT
            fk.name AS FK_NAME,
            OBJECT_NAME(fk.parent_object_id) AS TABLE_NAME,
            COL_NAME(fkc.parent_object_id, fkc.parent_column_id) AS COLUMN_NAME,
            SCHEMA_NAME(ref_tab.schema_id) AS REFERENCED_SCHEMA,
            ref_tab.name AS REFERENCED_TABLE,
            COL_NAME(fkc.referenced_object_id, fkc.referenced_column_id) AS REFERENCED_COLUMN,
            fkc.constraint_column_id AS KEY_SEQUENCE
        FROM sys.foreign_keys fk
        INNER JOIN sys.foreign_key_columns fkc
            ON fk.object_id = fkc.constraint_object_id
        INNER JOIN sys.tables tab
            ON fk.parent_object_id = tab.object_id
        INNER JOIN sys.tables ref_tab
            ON fkc.referenced_object_id = ref_tab.object_id
        WHERE SCHEMA_NAME(tab.schema_id) = @P1
        ORDER BY OBJECT_NAME(fk.parent_object_id), fkc.constraint_column_id
    "#;

    let mut query = Query::new(sql);
    query.bind(schema);

    let rows = run_catalog_query(client, query, "foreign key").await?;

    let mut result: HashMap<String, Vec<ForeignKeyInfo>> = HashMap::new();
    for row in rows {
        let table = row.get::<&str, _>(1).unwrap_or_default().to_string();
        let fk = ForeignKeyInfo {
            constraint_name: row.get::<&str, _>(0).unwrap_or_default().to_string(),
            local_column: row.get::<&str, _>(2).unwrap_or_default().to_string(),
            referenced_schema: row.get::<&str, _>(3).unwrap_or_default().to_string(),
            referenced_table: row.get::<&str, _>(4).unwrap_or_default().to_string(),
            referenced_column: row.get::<&str, _>(5).unwrap_or_default().to_string(),
            key_sequence: row.get::<i32, _>(6).unwrap_or(0),
        };
        result.entry(table).or_default().push(fk);
    }

    Ok(result)
}

/// All columns for the schema in one query, with the catalog type name
/// translated into the closed codec type set.
async fn extract_all_columns(
    client: &mut MssqlClient,
    schema: &str,
) -> Result<HashMap<String, Vec<ColumnInfo>>> {
    let sql = r#"
        SELECT
            c.TABLE_NAME,
            c.COLUMN_NAME,
            c.DATA_TYPE,
            CAST(ISNULL(c.CHARACTER_MAXIMUM_LENGTH, 0) AS INT) AS COLUMN_SIZE,
            CASE WHEN c.IS_NULLABLE = 'YES' THEN 1 ELSE 0 END AS IS_NULLABLE,
            ISNULL(COLUMNPROPERTY(OBJECT_ID(c.TABLE_SCHEMA + '.' + c.TABLE_NAME),
                                  c.COLUMN_NAME, 'IsIdentity'), 0) AS IS_IDENTITY,
            c.ORDINAL_POSITION
        FROM INFORMATION_SCHEMA.COLUMNS c
        WHERE c.TABLE_SCHEMA = @P1
        ORDER BY c.TABLE_NAME, c.ORDINAL_POSITION
    "#;

    let mut query = Query::new(sql);
    query.bind(schema);

    let rows = run_catalog_query(client, query, "column").await?;

    let mut result: HashMap<String, Vec<ColumnInfo>> = HashMap::new();
    for row in rows {
        let table = row.get::<&str, _>(0).unwrap_or_default().to_string();
        let type_name = row.get::<&str, _>(2).unwrap_or_default().to_string();
        let column = ColumnInfo {
            name: row.get::<&str, _>(1).unwrap_or_default().to_string(),
            type_code: SqlTypeCode::from_type_name(&type_name),
            type_name,
            size: row.get::<i32, _>(3).unwrap_or(0),
            nullable: row.get::<i32, _>(4).unwrap_or(0) == 1,
            auto_increment: row.get::<i32, _>(5).unwrap_or(0) == 1,
            ordinal: row.get::<i32, _>(6).unwrap_or(0),
        };
        result.entry(table).or_default().push(column);
    }

    Ok(result)
}

/// Approximate row counts from the partitions catalog (heap or clustered).
async fn extract_all_row_counts(
    client: &mut MssqlClient,
    schema: &str,
) -> Result<HashMap<String, i64>> {
    let sql = r#"
        SELECT
            t.name AS TABLE_NAME,
            SUM(p.rows) AS ROW_COUNT
        FROM sys.tables t
        INNER JOIN sys.partitions p
            ON t.object_id = p.object_id
        INNER JOIN sys.schemas s
            ON t.schema_id = s.schema_id
        WHERE p.index_id IN (0, 1)
          AND s.name = @P1
        GROUP BY t.name
        ORDER BY t.name
    "#;

    let mut query = Query::new(sql);
    query.bind(schema);

    let rows = run_catalog_query(client, query, "row count").await?;

    let mut result = HashMap::new();
    for row in rows {
        let table = row.get::<&str, _>(0).unwrap_or_default().to_string();
        let count = row.get::<i64, _>(1).unwrap_or(0);
        result.insert(table, count);
    }

    Ok(result)
}

async fn run_catalog_query(
    client: &mut MssqlClient,
    query: Query<'_>,
    what: &str,
) -> Result<Vec<tiberius::Row>> {
    let stream = query
        .query(client)
        .await
        .map_err(|e| ExportError::Introspection(format!("{} query failed: {}", what, e)))?;
    stream
        .into_first_result()
        .await
        .map_err(|e| ExportError::Introspection(format!("{} query failed: {}", what, e)))
}

/// System-owned table names that are dropped from discovery by default.
pub(crate) fn is_system_table(table_name: &str) -> bool {
    if table_name.is_empty() {
        return true;
    }
    let lower = table_name.to_lowercase();
    lower.starts_with("sys")
        || lower.starts_with("msreplication")
        || lower.starts_with("spt_")
        || lower.starts_with("__")
        || lower.contains('$')
        || SYSTEM_TABLE_NAMES.contains(&lower.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_system_table_prefixes() {
        assert!(is_system_table("sysdiagrams"));
        assert!(is_system_table("sysjobs"));
        assert!(is_system_table("MSreplication_options"));
        assert!(is_system_table("spt_values"));
        assert!(is_system_table("__RefactorLog"));
    }

    #[test]
    fn test_is_system_table_dollar_and_explicit() {
        assert!(is_system_table("queue$messages"));
        assert!(is_system_table("trace_xe_action_map"));
        assert!(is_system_table(""));
    }

    #[test]
    fn test_is_system_table_keeps_user_tables() {
        assert!(!is_system_table("users"));
        assert!(!is_system_table("orders"));
        assert!(!is_system_table("analysys"));
    }

    #[test]
    fn test_bulk_metadata_defaults() {
        let bulk = BulkMetadata::default();
        assert!(bulk.primary_keys("missing").is_empty());
        assert!(bulk.foreign_keys("missing").is_empty());
        assert!(bulk.columns("missing").is_empty());
        assert_eq!(bulk.row_count("missing"), -1);
    }
}
