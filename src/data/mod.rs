//! Result storage: final CSV export and per-row checkpointing.
pub mod storage;

pub use storage::{CsvCheckpoint, CsvExporter};
