//! Output sink: one append-only, timestamped SQL artifact per run.
//!
//! Workers format a whole table first, then write it under the sink lock,
//! so every table section is contiguous and the lock never covers network
//! I/O. The file layout (header, per-table sections, footer) is a stable
//! contract; changing it is a breaking change.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::Result;
use crate::schema::TableMetadata;

const BANNER: &str = "-- ============================================";

/// Append-only sink for the generated SQL script.
pub struct SqlSink {
    inner: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl SqlSink {
    /// Create `export_<YYYYMMDD_HHMMSS>.sql` in the output directory
    /// (created if missing) and write the file header.
    pub fn create(
        output_directory: &Path,
        db_name: &str,
        total_tables: usize,
        row_limit: u32,
    ) -> Result<Self> {
        fs::create_dir_all(output_directory)?;

        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let path = output_directory.join(format!("export_{}.sql", timestamp));

        let mut writer = BufWriter::new(File::create(&path)?);
        write_file_header(&mut writer, db_name, total_tables, row_limit)?;
        writer.flush()?;

        info!("SQL output file created: {}", path.display());

        Ok(Self {
            inner: Mutex::new(writer),
            path,
        })
    }

    /// Path of the artifact being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one table section: header comment block, the batched INSERT
    /// statements, then a `GO` terminator. Sections from concurrent workers
    /// serialize on the internal lock and never interleave.
    pub async fn write_table(
        &self,
        metadata: &TableMetadata,
        batches: &[Vec<String>],
    ) -> Result<()> {
        let mut writer = self.inner.lock().await;

        writeln!(writer)?;
        writeln!(writer, "{}", BANNER)?;
        writeln!(writer, "-- Table: {}", metadata.full_name())?;
        writeln!(writer, "-- Primary Key: {}", format_pk(&metadata.primary_key))?;
        writeln!(writer, "-- Foreign Keys: {}", metadata.foreign_keys.len())?;
        writeln!(writer, "{}", BANNER)?;
        writeln!(writer)?;

        for batch in batches {
            for stmt in batch {
                writeln!(writer, "{}", stmt)?;
            }
        }

        writeln!(writer, "GO")?;
        writeln!(writer)?;
        writer.flush()?;

        Ok(())
    }

    /// Write the completion banner and flush.
    pub async fn finish(&self, total_tables: usize) -> Result<()> {
        let mut writer = self.inner.lock().await;

        writeln!(writer)?;
        writeln!(writer, "{}", BANNER)?;
        writeln!(writer, "-- Export Complete")?;
        writeln!(writer, "-- Total Tables: {}", total_tables)?;
        writeln!(writer, "-- Generated: {}", Local::now().format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(writer, "{}", BANNER)?;
        writer.flush()?;

        info!("SQL output file closed: {}", self.path.display());
        Ok(())
    }
}

fn write_file_header(
    writer: &mut BufWriter<File>,
    db_name: &str,
    total_tables: usize,
    row_limit: u32,
) -> Result<()> {
    writeln!(writer, "{}", BANNER)?;
    writeln!(writer, "-- Database Export")?;
    writeln!(writer, "-- Database: {}", db_name)?;
    writeln!(writer, "-- Generated: {}", Local::now().format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(writer, "-- Tables: {}", total_tables)?;
    writeln!(writer, "-- Row Limit per Table: {}", row_limit)?;
    writeln!(writer, "{}", BANNER)?;
    writeln!(writer)?;
    writeln!(writer, "SET NOCOUNT ON;")?;
    writeln!(writer, "GO")?;
    writeln!(writer)?;
    Ok(())
}

fn format_pk(primary_key: &[String]) -> String {
    if primary_key.is_empty() {
        "(none)".to_string()
    } else {
        primary_key.join(", ")
    }
}
