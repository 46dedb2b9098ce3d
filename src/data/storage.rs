//! CSV export of sweep results.
//!
//! Exported files start with a short header block describing the run, a blank line,
//! and then the labelled table:
//!
//! ```text
//! Material: PZT
//! Main Parameters: Z
//! Minor Parameters: THR
//! Info: second anneal
//! Run ID: 6f1c...
//! Started: 2024-03-09T14:05:07+01:00
//!
//! Frequency (Hz),Z Avg.,Z Std.,Z-THR Avg.,Z-THR Std.
//! 20,1523.4,0.8,-1.43,0.002
//! ```

use crate::config::StorageConfig;
use crate::error::{AppResult, DaqError};
use crate::metadata::RunMetadata;
use crate::sweep::{ResultTable, RowSink};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Writes completed tables into the output directory.
#[derive(Debug, Clone)]
pub struct CsvExporter {
    output_dir: PathBuf,
}

impl CsvExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.output_dir)
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Path the table for `metadata` will be written to.
    pub fn path_for(&self, metadata: &RunMetadata) -> PathBuf {
        self.output_dir.join(format!("{}.csv", metadata.file_stem()))
    }

    /// Write `table` with a header block built from `metadata`. Returns the file path.
    pub fn export(&self, metadata: &RunMetadata, table: &ResultTable) -> AppResult<PathBuf> {
        metadata.validate().map_err(DaqError::Storage)?;
        if !self.output_dir.exists() {
            fs::create_dir_all(&self.output_dir).map_err(|e| {
                DaqError::Storage(format!(
                    "Failed to create output directory '{}': {}",
                    self.output_dir.display(),
                    e
                ))
            })?;
        }

        let path = self.path_for(metadata);
        let file = File::create(&path).map_err(|e| {
            DaqError::Storage(format!("Failed to create CSV file '{}': {}", path.display(), e))
        })?;
        let mut writer = BufWriter::new(file);
        write_header(&mut writer, metadata)?;
        table.write_csv(&mut writer)?;
        writer.flush()?;

        info!(path = %path.display(), rows = table.len(), "Data saved");
        Ok(path)
    }
}

fn write_header<W: Write>(writer: &mut W, metadata: &RunMetadata) -> AppResult<()> {
    writeln!(writer, "Material: {}", metadata.material)?;
    writeln!(writer, "Main Parameters: {}", metadata.majors_label())?;
    writeln!(writer, "Minor Parameters: {}", metadata.minors_label())?;
    writeln!(writer, "Info: {}", metadata.info)?;
    writeln!(writer, "Run ID: {}", metadata.run_id)?;
    writeln!(writer, "Started: {}", metadata.started_at.to_rfc3339())?;
    writeln!(writer)?;
    Ok(())
}

/// Rewrites a checkpoint CSV after every appended row.
///
/// The file always holds the full table so far, so a crash mid-sweep loses at most
/// the row in progress.
#[derive(Debug, Clone)]
pub struct CsvCheckpoint {
    path: PathBuf,
    writes: usize,
}

impl CsvCheckpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writes: 0,
        }
    }

    /// Checkpoint file inside the configured output directory.
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.output_dir.join(&config.checkpoint_file))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of successful checkpoint writes.
    pub fn writes(&self) -> usize {
        self.writes
    }

    fn write(&self, table: &ResultTable) -> AppResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&self.path).map_err(|e| {
            DaqError::Storage(format!(
                "Failed to write checkpoint '{}': {}",
                self.path.display(),
                e
            ))
        })?;
        table.write_csv(BufWriter::new(file))
    }
}

impl RowSink for CsvCheckpoint {
    fn row_appended(&mut self, table: &ResultTable) -> AppResult<()> {
        self.write(table)?;
        self.writes += 1;
        debug!(path = %self.path.display(), rows = table.len(), "Checkpoint written");
        Ok(())
    }
}
