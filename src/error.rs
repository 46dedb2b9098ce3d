//! Custom error types for the application.
//!
//! This module defines the primary error type, `DaqError`, for the whole crate.
//! Using the `thiserror` crate, it provides a centralized and consistent way to handle
//! the failures that can occur while driving the LCR meter and the temperature
//! controller, from configuration problems to garbled device replies.
//!
//! ## Error Hierarchy
//!
//! - **`Config`**: Wraps errors from `figment`, typically TOML syntax or type mismatches.
//! - **`Configuration`**: Semantic errors in configuration or sweep parameters that pass
//!   parsing but are logically wrong (e.g. a frequency range with `min > max`).
//! - **`Io`** / **`Serial`**: Transport-level failures while opening or using a port.
//! - **`TransportTimeout`**: A device never produced the reply we were waiting for within
//!   the allotted time. Waits are always bounded.
//! - **`Parse`**: A meter reply that should contain a numeric pair did not.
//! - **`Instrument`**: Any other device-level failure.
//! - **`Storage`** / **`Csv`**: Failures while exporting or checkpointing results.
//!
//! Controller checksum and echo mismatches are deliberately *not* errors: they are
//! reported as `None` readings and [`WriteStatus`](crate::controller::WriteStatus) values.

use std::time::Duration;
use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, DaqError>;

#[derive(Error, Debug)]
pub enum DaqError {
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "instrument_serial")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("Serial support not enabled. Rebuild with --features instrument_serial")]
    SerialFeatureDisabled,

    #[error("Timed out after {waited:?} waiting for {device}")]
    TransportTimeout { device: String, waited: Duration },

    #[error("Failed to parse meter reply '{reply}': {reason}")]
    Parse { reply: String, reason: String },

    #[error("Instrument error: {0}")]
    Instrument(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl From<figment::Error> for DaqError {
    fn from(err: figment::Error) -> Self {
        DaqError::Config(Box::new(err))
    }
}
