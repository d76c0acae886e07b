//! Configuration type definitions with system-aware defaults.

use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use sysinfo::System;

/// System resource information used for the worker-count default.
#[derive(Debug, Clone)]
pub struct SystemResources {
    /// Number of CPU cores.
    pub cpu_cores: usize,
}

impl SystemResources {
    /// Detect system resources.
    /// Uses a targeted refresh to avoid parsing processes, disks, and networks.
    pub fn detect() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu_all();

        Self {
            cpu_cores: sys.cpus().len().max(1),
        }
    }
}

/// Export run configuration.
///
/// Loaded from YAML (see [`ExportConfig::load`](crate::config)) and validated
/// before the run starts. Immutable for the lifetime of one run.
#[derive(Clone, Deserialize)]
pub struct ExportConfig {
    /// Database host.
    pub db_host: String,

    /// Database port (default: 1433).
    #[serde(default = "default_port")]
    pub db_port: u16,

    /// Database name.
    pub db_name: String,

    /// Username.
    pub db_user: String,

    /// Password. May be empty, but must be present.
    pub db_password: String,

    /// Schema to export (default: "dbo").
    #[serde(default = "default_schema")]
    pub schema_name: String,

    /// Maximum rows exported per table (default: 200).
    #[serde(default = "default_row_limit")]
    pub row_limit: u32,

    /// INSERT statements handed to the sink per batch (default: 1000).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Parallel export workers and pool size (default: CPU cores, capped at 32).
    #[serde(default = "default_parallel_threads")]
    pub parallel_threads: usize,

    /// Directory receiving the SQL file, report, and logs (default: "./exports").
    #[serde(default = "default_output_directory")]
    pub output_directory: PathBuf,

    /// Export system tables as well (default: false).
    #[serde(default)]
    pub include_system_tables: bool,

    /// Emit CREATE TABLE statements. Declared for forward compatibility; no-op.
    #[serde(default)]
    pub generate_create_statements: bool,

    /// Emit DROP TABLE statements. Declared for forward compatibility; no-op.
    #[serde(default)]
    pub generate_drop_statements: bool,

    /// Table exclusion configuration.
    #[serde(default)]
    pub filter: FilterConfig,
}

impl fmt::Debug for ExportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportConfig")
            .field("db_host", &self.db_host)
            .field("db_port", &self.db_port)
            .field("db_name", &self.db_name)
            .field("db_user", &self.db_user)
            .field("db_password", &"[REDACTED]")
            .field("schema_name", &self.schema_name)
            .field("row_limit", &self.row_limit)
            .field("batch_size", &self.batch_size)
            .field("parallel_threads", &self.parallel_threads)
            .field("output_directory", &self.output_directory)
            .field("include_system_tables", &self.include_system_tables)
            .field("generate_create_statements", &self.generate_create_statements)
            .field("generate_drop_statements", &self.generate_drop_statements)
            .field("filter", &self.filter)
            .finish()
    }
}

impl ExportConfig {
    /// Canonical connection string, for logging and diagnostics.
    ///
    /// Credentials are supplied separately to the driver and never appear here.
    pub fn connection_string(&self) -> String {
        format!(
            "sqlserver://{}:{};databaseName={};encrypt=false;\
             trustServerCertificate=true;integratedSecurity=false",
            self.db_host, self.db_port, self.db_name
        )
    }
}

/// Table filtering configuration.
///
/// Each list that is left empty falls back to the built-in defaults
/// (see [`crate::filter`]).
#[derive(Debug, Clone, Deserialize)]
pub struct FilterConfig {
    /// Skip tables whose estimated row count is zero (default: true).
    #[serde(default = "default_true")]
    pub exclude_empty_tables: bool,

    /// Exact table names to exclude.
    #[serde(default)]
    pub excluded_tables: Vec<String>,

    /// Case-sensitive name prefixes to exclude.
    #[serde(default)]
    pub excluded_prefixes: Vec<String>,

    /// Wildcard patterns to exclude (`*` any run, `?` one character).
    #[serde(default)]
    pub exclusion_patterns: Vec<String>,

    /// Regular expressions to exclude.
    #[serde(default)]
    pub exclusion_regex: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            exclude_empty_tables: true,
            excluded_tables: Vec::new(),
            excluded_prefixes: Vec::new(),
            exclusion_patterns: Vec::new(),
            exclusion_regex: Vec::new(),
        }
    }
}

// Default value functions for serde

fn default_port() -> u16 {
    1433
}

fn default_schema() -> String {
    "dbo".to_string()
}

fn default_row_limit() -> u32 {
    200
}

fn default_batch_size() -> usize {
    1000
}

fn default_parallel_threads() -> usize {
    SystemResources::detect().cpu_cores.min(32)
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("./exports")
}

fn default_true() -> bool {
    true
}
