//! # LCR DAQ Core Library
//!
//! Automated impedance spectroscopy: an LCR meter measured against frequency, time or
//! chamber temperature, with the temperature driven by a PID controller. The binary
//! (`main.rs`) is a thin CLI over this library.
//!
//! ## Crate Structure
//!
//! - **`config`**: Loads and validates `Settings` from TOML and `LCR_DAQ_*` environment
//!   variables.
//! - **`error`**: The crate-wide `DaqError` enum and `AppResult` alias.
//! - **`logging`**: `tracing-subscriber` initialisation (pretty, compact or JSON output).
//! - **`transport`**: The line-oriented `Transport` trait, a serial port implementation
//!   and a scripted mock.
//! - **`frame`**: ASCII-hex framing and LRC checksums for the temperature controller.
//! - **`meter`** / **`controller`**: Device drivers behind the `ImpedanceMeter` and
//!   `TemperatureController` capability traits.
//! - **`averager`**: Mean and standard deviation over repeated meter fetches.
//! - **`settling`**: Frequency-dependent dwell before sampling.
//! - **`frequency`**: Log-spaced frequency lists.
//! - **`clock`**: Wall clock and simulated clock used by the sequencer.
//! - **`sweep`**: The sweep sequencer, its configuration and the result table.
//! - **`data`** / **`metadata`**: CSV export, checkpoints and run metadata.
//! - **`measurement`**: Parameter kinds and reading types shared by all of the above.

pub mod averager;
pub mod clock;
pub mod config;
pub mod controller;
pub mod data;
pub mod error;
pub mod frame;
pub mod frequency;
pub mod logging;
pub mod measurement;
pub mod metadata;
pub mod meter;
pub mod settling;
pub mod sweep;
pub mod transport;

pub use error::{AppResult, DaqError};
