//! # mssql-export
//!
//! FK-ordered SQL Server data export to portable INSERT scripts.
//!
//! This library exports one schema's table contents into a single file of
//! T-SQL INSERT statements whose execution order respects foreign-key
//! constraints:
//!
//! - **Bulk introspection** of the whole schema catalog in four queries
//! - **Dependency-level scheduling**: tables grouped into FK-depth waves,
//!   each wave exported in parallel on a bounded session pool
//! - **Deterministic row ordering** per table (updated/created date columns,
//!   falling back to the primary key)
//! - **Layered table filtering** (exact, prefix, wildcard, regex) with
//!   sensible defaults for backup/temp/audit tables
//!
//! ## Example
//!
//! ```rust,no_run
//! use mssql_export::{ExportConfig, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExportConfig::load("config.yaml")?;
//!     let result = Orchestrator::new(config).run().await?;
//!     println!(
//!         "Exported {} tables ({} rows) to {}",
//!         result.tables_exported,
//!         result.total_rows,
//!         result.output_file.display()
//!     );
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod exporter;
pub mod filter;
pub mod orchestrator;
pub mod pool;
pub mod report;
pub mod schema;
pub mod scheduler;
pub mod sql;

// Re-exports for convenient access
pub use config::{ExportConfig, FilterConfig};
pub use error::{ExportError, Result};
pub use exporter::ExportResult;
pub use filter::{FilterStatistics, TableExclusionFilter, TableFilter};
pub use orchestrator::{ExportRunResult, HealthCheckResult, Orchestrator};
pub use pool::SessionPool;
pub use report::ExportStatistics;
pub use schema::{
    ColumnInfo, DateColumnKind, ForeignKeyInfo, SortStrategy, SqlTypeCode, TableMetadata,
};
pub use scheduler::{compute_waves, DependencyWaves};
pub use sql::SqlSink;
