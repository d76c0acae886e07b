//! mssql-export CLI - FK-ordered SQL Server data export.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Local;
use clap::{Parser, Subcommand};
use mssql_export::{ExportConfig, ExportError, Orchestrator};
use tracing::{info, Level};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "mssql-export")]
#[command(about = "Export SQL Server table data as FK-ordered INSERT scripts")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the export
    Export {
        /// Override the source schema
        #[arg(long)]
        schema: Option<String>,

        /// Override the per-table row limit
        #[arg(long)]
        row_limit: Option<u32>,

        /// Override the number of parallel workers
        #[arg(long)]
        threads: Option<usize>,

        /// Override the output directory
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Include system tables in the export
        #[arg(long)]
        include_system_tables: bool,
    },

    /// Test database connectivity
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), ExportError> {
    let cli = Cli::parse();

    let mut config = ExportConfig::load(&cli.config)?;

    match cli.command {
        Commands::Export {
            schema,
            row_limit,
            threads,
            output_dir,
            include_system_tables,
        } => {
            if let Some(schema) = schema {
                config.schema_name = schema;
            }
            if let Some(limit) = row_limit {
                config.row_limit = limit;
            }
            if let Some(threads) = threads {
                config.parallel_threads = threads;
            }
            if let Some(dir) = output_dir {
                config.output_directory = dir;
            }
            if include_system_tables {
                config.include_system_tables = true;
            }
            config.validate()?;

            let log_file = setup_logging(&cli.verbosity, &config.output_directory)?;
            info!("Loaded configuration from {:?}", cli.config);
            info!("Log file: {}", log_file.display());

            let result = Orchestrator::new(config).run().await?;

            println!("\nExport completed!");
            println!("  Output: {}", result.output_file.display());
            println!("  Report: {}", result.report_file.display());
            println!("  Tables: {}", result.tables_exported);
            println!("  Rows: {}", result.total_rows);
            println!("  Duration: {:.2}s", result.duration_seconds);
        }

        Commands::HealthCheck => {
            setup_console_logging(&cli.verbosity);
            let result = Orchestrator::new(config).health_check().await;

            println!("Health Check Results:");
            println!(
                "  SQL Server: {} ({}ms)",
                if result.connected { "OK" } else { "FAILED" },
                result.latency_ms
            );
            if let Some(ref err) = result.error {
                println!("    Error: {}", err);
            }

            if !result.connected {
                return Err(ExportError::Config("Health check failed".to_string()));
            }
        }
    }

    Ok(())
}

fn parse_level(verbosity: &str) -> Level {
    match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Console + per-run log file under `<output_dir>/logs/`.
fn setup_logging(verbosity: &str, output_dir: &Path) -> Result<PathBuf, ExportError> {
    let logs_dir = output_dir.join("logs");
    fs::create_dir_all(&logs_dir)?;

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let log_path = logs_dir.join(format!("export_{}.log", timestamp));
    let log_file = Arc::new(File::create(&log_path)?);

    tracing_subscriber::registry()
        .with(LevelFilter::from_level(parse_level(verbosity)))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(log_file),
        )
        .init();

    Ok(log_path)
}

fn setup_console_logging(verbosity: &str) {
    tracing_subscriber::registry()
        .with(LevelFilter::from_level(parse_level(verbosity)))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
