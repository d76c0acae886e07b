//! Error types for the export library.

use thiserror::Error;

/// Main error type for export operations.
#[derive(Error, Debug)]
pub enum ExportError {
    /// Configuration error (invalid YAML, missing fields, out-of-range values).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database connection or query error from the driver.
    #[error("Database error: {0}")]
    Db(#[from] tiberius::error::Error),

    /// Connection pool error with context about where it occurred.
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// One of the bulk catalog queries failed.
    #[error("Schema introspection failed: {0}")]
    Introspection(String),

    /// Export failed for a specific table.
    #[error("Export failed for table {table}: {message}")]
    Table { table: String, message: String },

    /// IO error (output file, report, log directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ExportError {
    /// Create a Pool error with context about where it occurred.
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        ExportError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a per-table export error.
    pub fn table(table: impl Into<String>, message: impl ToString) -> Self {
        ExportError::Table {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Format error with full details including the error chain.
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            ExportError::Config(_) | ExportError::Yaml(_) => 2,
            ExportError::Db(_) | ExportError::Pool { .. } => 3,
            ExportError::Introspection(_) => 4,
            ExportError::Table { .. } => 5,
            ExportError::Io(_) => 6,
        }
    }
}

/// Result type alias for export operations.
pub type Result<T> = std::result::Result<T, ExportError>;
