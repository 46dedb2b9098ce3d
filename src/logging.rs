//! Tracing setup for the CLI.
//!
//! The library only emits `tracing` events: one `debug` per wire exchange, `info` per
//! recorded row, `warn` for checksum and echo mismatches, `error` for aborted sweeps.
//! This module installs the subscriber that renders them.
//!
//! `RUST_LOG` wins when set. Otherwise the filter is the configured level, optionally
//! raised to `trace` for the device protocol modules (`wire_trace`), which logs every
//! command, acknowledgement and frame.
//!
//! # Example
//! ```no_run
//! use lcr_daq::{config::Settings, logging};
//! use tracing::info;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::load()?;
//! logging::init_from_settings(&settings)?;
//! info!("Application started");
//! # Ok(())
//! # }
//! ```

use crate::config::Settings;
use crate::error::{AppResult, DaqError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::{fmt as tfmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Modules whose traffic `wire_trace` raises to `trace`.
const WIRE_TARGETS: [&str; 3] = ["lcr_daq::meter", "lcr_daq::controller", "lcr_daq::frame"];

/// How events are rendered on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Multi-line, coloured
    Pretty,
    /// One line per event
    #[default]
    Compact,
    /// Newline-delimited JSON
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(OutputFormat::Pretty),
            "compact" => Ok(OutputFormat::Compact),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!(
                "Invalid log format '{other}'. Must be one of: pretty, compact, json"
            )),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Pretty => "pretty",
            OutputFormat::Compact => "compact",
            OutputFormat::Json => "json",
        })
    }
}

/// Subscriber options.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub level: Level,
    pub format: OutputFormat,
    /// Log every device exchange at `trace`, whatever `level` is.
    pub wire_trace: bool,
    /// ANSI colours; ignored for JSON.
    pub ansi: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::new(Level::INFO)
    }
}

impl TracingConfig {
    pub fn new(level: Level) -> Self {
        Self {
            level,
            format: OutputFormat::default(),
            wire_trace: false,
            ansi: true,
        }
    }

    /// Build from the `[application]` section.
    pub fn from_settings(settings: &Settings) -> AppResult<Self> {
        let app = &settings.application;
        let level = app.log_level.parse::<Level>().map_err(|_| {
            DaqError::Configuration(format!("Invalid log_level '{}'", app.log_level))
        })?;
        Ok(Self::new(level)
            .with_format(app.log_format)
            .with_wire_trace(app.wire_trace))
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_wire_trace(mut self, enabled: bool) -> Self {
        self.wire_trace = enabled;
        self
    }

    pub fn with_ansi(mut self, enabled: bool) -> Self {
        self.ansi = enabled;
        self
    }

    /// Filter directives used when `RUST_LOG` is not set, e.g. `info,lcr_daq::meter=trace`.
    pub fn directives(&self) -> String {
        let mut directives = self.level.as_str().to_ascii_lowercase();
        if self.wire_trace {
            for target in WIRE_TARGETS {
                directives.push_str(&format!(",{target}=trace"));
            }
        }
        directives
    }
}

/// Install the subscriber described by the `[application]` section.
pub fn init_from_settings(settings: &Settings) -> AppResult<()> {
    init(TracingConfig::from_settings(settings)?)
}

/// Install the global subscriber. A second call is a no-op.
pub fn init(config: TracingConfig) -> AppResult<()> {
    if tracing::dispatcher::has_been_set() {
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.directives()));

    let layer = match config.format {
        OutputFormat::Pretty => tfmt::layer()
            .pretty()
            .with_ansi(config.ansi)
            .with_filter(filter)
            .boxed(),
        OutputFormat::Compact => tfmt::layer()
            .compact()
            .with_target(config.wire_trace)
            .with_ansi(config.ansi)
            .with_filter(filter)
            .boxed(),
        OutputFormat::Json => tfmt::layer().json().with_filter(filter).boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .map_err(|e| DaqError::Configuration(format!("Failed to initialize tracing: {e}")))
}
