//! Configuration validation.

use super::ExportConfig;
use crate::error::{ExportError, Result};

/// Row limit bounds.
const ROW_LIMIT_RANGE: (u32, u32) = (1, 1_000_000);

/// Batch size bounds.
const BATCH_SIZE_RANGE: (usize, usize) = (1, 10_000);

/// Worker count bounds.
const PARALLEL_THREADS_RANGE: (usize, usize) = (1, 32);

/// Validate the configuration. Errors name the offending field.
pub fn validate(config: &ExportConfig) -> Result<()> {
    require_non_blank(&config.db_host, "db_host")?;
    require_non_blank(&config.db_name, "db_name")?;
    require_non_blank(&config.db_user, "db_user")?;
    require_non_blank(&config.schema_name, "schema_name")?;

    // db_password may be empty but the field must exist; serde enforces
    // presence, nothing further to check here.

    if config.db_port == 0 {
        return Err(ExportError::Config(
            "db_port must be between 1 and 65535".into(),
        ));
    }

    if config.output_directory.as_os_str().is_empty() {
        return Err(ExportError::Config("output_directory cannot be empty".into()));
    }

    check_range(
        config.row_limit as u64,
        ROW_LIMIT_RANGE.0 as u64,
        ROW_LIMIT_RANGE.1 as u64,
        "row_limit",
    )?;
    check_range(
        config.batch_size as u64,
        BATCH_SIZE_RANGE.0 as u64,
        BATCH_SIZE_RANGE.1 as u64,
        "batch_size",
    )?;
    check_range(
        config.parallel_threads as u64,
        PARALLEL_THREADS_RANGE.0 as u64,
        PARALLEL_THREADS_RANGE.1 as u64,
        "parallel_threads",
    )?;

    Ok(())
}

fn require_non_blank(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ExportError::Config(format!("{} cannot be empty", field)));
    }
    Ok(())
}

fn check_range(value: u64, min: u64, max: u64, field: &str) -> Result<()> {
    if value < min || value > max {
        return Err(ExportError::Config(format!(
            "{} must be between {} and {}",
            field, min, max
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterConfig;
    use std::path::PathBuf;

    fn valid_config() -> ExportConfig {
        ExportConfig {
            db_host: "localhost".to_string(),
            db_port: 1433,
            db_name: "northwind".to_string(),
            db_user: "sa".to_string(),
            db_password: "password".to_string(),
            schema_name: "dbo".to_string(),
            row_limit: 200,
            batch_size: 1000,
            parallel_threads: 8,
            output_directory: PathBuf::from("./exports"),
            include_system_tables: false,
            generate_create_statements: false,
            generate_drop_statements: false,
            filter: FilterConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_host_names_field() {
        let mut config = valid_config();
        config.db_host = "".to_string();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("db_host"));
    }

    #[test]
    fn test_blank_user_rejected() {
        let mut config = valid_config();
        config.db_user = "   ".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_empty_password_is_allowed() {
        let mut config = valid_config();
        config.db_password = "".to_string();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_port_zero_rejected() {
        let mut config = valid_config();
        config.db_port = 0;
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("db_port"));
    }

    #[test]
    fn test_row_limit_bounds() {
        let mut config = valid_config();
        config.row_limit = 0;
        assert!(validate(&config).is_err());

        config.row_limit = 1_000_000;
        assert!(validate(&config).is_ok());

        config.row_limit = 1_000_001;
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("row_limit"));
    }

    #[test]
    fn test_batch_size_bounds() {
        let mut config = valid_config();
        config.batch_size = 10_001;
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn test_parallel_threads_bounds() {
        let mut config = valid_config();
        config.parallel_threads = 33;
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("parallel_threads"));
    }

    #[test]
    fn test_debug_redacts_password() {
        let mut config = valid_config();
        config.db_password = "super_secret_password_123".to_string();
        let debug_output = format!("{:?}", config);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_password_123"));
    }
}
