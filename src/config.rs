//! Configuration System using Figment
//!
//! Strongly-typed settings for both serial devices, the settling policy and the
//! export paths. Configuration is loaded from:
//! 1. `config/lcr_daq.toml` (or a path given on the command line)
//! 2. Environment variables prefixed with `LCR_DAQ_`
//!
//! Every field has a default matching the bench setup the tool was written for
//! (ET4510 meter and CN740 controller on 9600 baud links), so an empty file is valid.
//!
//! # Example
//! ```no_run
//! use lcr_daq::config::Settings;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::load()?;
//! println!("Meter on {}", settings.meter.serial.port);
//! # Ok(())
//! # }
//! ```

use crate::error::{AppResult, DaqError};
use crate::logging::OutputFormat;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/lcr_daq.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Application settings
    pub application: ApplicationConfig,
    /// LCR meter link
    pub meter: MeterConfig,
    /// PID temperature controller link
    pub controller: ControllerConfig,
    /// Frequency-dependent dwell before sampling
    pub settling: SettlingConfig,
    /// Export locations
    pub storage: StorageConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format
    pub log_format: OutputFormat,
    /// Log every device exchange regardless of `log_level`
    pub wire_trace: bool,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "LCR-PID".to_string(),
            log_level: "info".to_string(),
            log_format: OutputFormat::Compact,
            wire_trace: false,
        }
    }
}

/// Serial line parity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParitySetting {
    None,
    Odd,
    Even,
}

/// Framing and timing for one serial port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialSettings {
    /// Port path (e.g. "/dev/ttyUSB0", "COM3")
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits (5-8)
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    /// Parity
    #[serde(default = "default_parity")]
    pub parity: ParitySetting,
    /// Stop bits (1 or 2)
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    /// How long a single line read may block before reporting "no data"
    #[serde(with = "humantime_serde", default = "default_read_timeout")]
    pub read_timeout: Duration,
}

impl SerialSettings {
    fn with_port(port: &str, parity: ParitySetting) -> Self {
        Self {
            port: port.to_string(),
            baud_rate: 9600,
            data_bits: default_data_bits(),
            parity,
            stop_bits: default_stop_bits(),
            read_timeout: default_read_timeout(),
        }
    }

    fn validate(&self, what: &str) -> Result<(), String> {
        if self.port.trim().is_empty() {
            return Err(format!("{what}: port cannot be empty"));
        }
        if self.baud_rate == 0 {
            return Err(format!("{what}: baud_rate must be greater than 0"));
        }
        if !(5..=8).contains(&self.data_bits) {
            return Err(format!("{what}: data_bits must be 5-8, got {}", self.data_bits));
        }
        if !matches!(self.stop_bits, 1 | 2) {
            return Err(format!("{what}: stop_bits must be 1 or 2, got {}", self.stop_bits));
        }
        Ok(())
    }
}

/// LCR meter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterConfig {
    /// Serial link
    pub serial: SerialSettings,
    /// Line the meter sends after accepting a command
    pub ack_token: String,
    /// Upper bound on waiting for `ack_token`
    #[serde(with = "humantime_serde")]
    pub ack_timeout: Duration,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            serial: SerialSettings::with_port("/dev/ttyUSB0", ParitySetting::None),
            ack_token: "exec success".to_string(),
            ack_timeout: Duration::from_secs(5),
        }
    }
}

/// Temperature controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Serial link
    pub serial: SerialSettings,
    /// Bus address of the controller (1-247)
    pub address: u8,
    /// Setpoint written when a run is stopped, in degrees Celsius
    pub safe_setpoint_c: f64,
    /// Consecutive unanswered temperature polls a bounded sweep tolerates,
    /// the initial reading included
    pub read_attempts: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            serial: SerialSettings::with_port("/dev/ttyUSB1", ParitySetting::Even),
            address: 0x01,
            safe_setpoint_c: 18.0,
            read_attempts: 5,
        }
    }
}

/// Frequency-dependent settling dwell
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlingConfig {
    /// Frequencies strictly below this get `low_frequency_dwell`
    pub low_frequency_limit_hz: u32,
    /// Frequencies up to and including this get `mid_frequency_dwell`
    pub mid_frequency_limit_hz: u32,
    #[serde(with = "humantime_serde")]
    pub low_frequency_dwell: Duration,
    #[serde(with = "humantime_serde")]
    pub mid_frequency_dwell: Duration,
}

impl Default for SettlingConfig {
    fn default() -> Self {
        Self {
            low_frequency_limit_hz: 100,
            mid_frequency_limit_hz: 1000,
            low_frequency_dwell: Duration::from_secs(10),
            mid_frequency_dwell: Duration::from_secs(2),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Output directory for exported tables
    pub output_dir: PathBuf,
    /// File rewritten after every row of a temperature-bounded sweep
    pub checkpoint_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("Data"),
            checkpoint_file: PathBuf::from("temp_output.csv"),
        }
    }
}

fn default_data_bits() -> u8 {
    8
}

fn default_parity() -> ParitySetting {
    ParitySetting::None
}

fn default_stop_bits() -> u8 {
    1
}

fn default_read_timeout() -> Duration {
    Duration::from_secs(1)
}

impl Settings {
    /// Load configuration from the default file and environment variables
    ///
    /// Environment variables can override configuration with prefix `LCR_DAQ_`,
    /// nested keys separated by `__`.
    /// Example: `LCR_DAQ_METER__SERIAL__PORT=/dev/ttyACM0`
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path. A missing file is not an error;
    /// defaults and environment overrides still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let settings: Settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("LCR_DAQ_").split("__"))
            .extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        self.check().map_err(DaqError::Configuration)
    }

    fn check(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            ));
        }

        self.meter.serial.validate("meter")?;
        self.controller.serial.validate("controller")?;

        if self.meter.ack_token.trim().is_empty() {
            return Err("meter: ack_token cannot be empty".to_string());
        }
        if self.meter.ack_timeout.is_zero() {
            return Err("meter: ack_timeout must be greater than 0".to_string());
        }

        if !(1..=247).contains(&self.controller.address) {
            return Err(format!(
                "controller: address must be 1-247, got {}",
                self.controller.address
            ));
        }
        if !self.controller.safe_setpoint_c.is_finite()
            || !(-50.0..=500.0).contains(&self.controller.safe_setpoint_c)
        {
            return Err(format!(
                "controller: safe_setpoint_c {} is outside -50..=500",
                self.controller.safe_setpoint_c
            ));
        }
        if self.controller.read_attempts == 0 {
            return Err("controller: read_attempts must be at least 1".to_string());
        }

        if self.settling.low_frequency_limit_hz > self.settling.mid_frequency_limit_hz {
            return Err(format!(
                "settling: low_frequency_limit_hz ({}) exceeds mid_frequency_limit_hz ({})",
                self.settling.low_frequency_limit_hz, self.settling.mid_frequency_limit_hz
            ));
        }

        if self.storage.output_dir.as_os_str().is_empty() {
            return Err("storage: output_dir cannot be empty".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.meter.serial.baud_rate, 9600);
        assert_eq!(settings.controller.serial.parity, ParitySetting::Even);
        assert_eq!(settings.meter.serial.parity, ParitySetting::None);
        assert_eq!(settings.controller.safe_setpoint_c, 18.0);
        assert_eq!(settings.meter.ack_token, "exec success");
    }

    #[test]
    fn test_invalid_log_level() {
        let mut settings = Settings::default();
        settings.application.log_level = "verbose".to_string();
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("Invalid log_level"));
    }

    #[test]
    fn test_zero_baud_rejected() {
        let mut settings = Settings::default();
        settings.controller.serial.baud_rate = 0;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("controller: baud_rate"));
    }

    #[test]
    fn test_inverted_settling_thresholds_rejected() {
        let mut settings = Settings::default();
        settings.settling.low_frequency_limit_hz = 5000;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_load_from_toml_and_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "bench.toml",
                r#"
                [application]
                log_level = "debug"
                log_format = "json"

                [meter]
                ack_timeout = "250ms"

                [meter.serial]
                port = "/dev/ttyACM0"
                baud_rate = 19200

                [controller]
                safe_setpoint_c = 20.5
                "#,
            )?;
            jail.set_env("LCR_DAQ_CONTROLLER__SERIAL__PORT", "COM7");

            let settings = Settings::load_from("bench.toml").expect("settings load");
            assert_eq!(settings.application.log_level, "debug");
            assert_eq!(settings.application.log_format, OutputFormat::Json);
            assert_eq!(settings.meter.serial.port, "/dev/ttyACM0");
            assert_eq!(settings.meter.serial.baud_rate, 19200);
            assert_eq!(settings.meter.ack_timeout, Duration::from_millis(250));
            assert_eq!(settings.controller.serial.port, "COM7");
            assert_eq!(settings.controller.safe_setpoint_c, 20.5);
            // untouched sections keep their defaults
            assert_eq!(settings.controller.serial.parity, ParitySetting::Even);
            Ok(())
        });
    }

    #[test]
    fn test_rendered_settings_load_back() {
        let mut settings = Settings::default();
        settings.meter.ack_timeout = Duration::from_millis(1500);
        settings.controller.serial.port = "COM4".to_string();
        let rendered = toml::to_string_pretty(&settings).unwrap();

        Jail::expect_with(|jail| {
            jail.create_file("rendered.toml", &rendered)?;
            let loaded = Settings::load_from("rendered.toml").expect("rendered config loads");
            assert_eq!(loaded.meter.ack_timeout, Duration::from_millis(1500));
            assert_eq!(loaded.controller.serial, settings.controller.serial);
            Ok(())
        });
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        Jail::expect_with(|_jail| {
            let settings = Settings::load_from("does_not_exist.toml").expect("defaults");
            assert_eq!(settings.storage.output_dir, PathBuf::from("Data"));
            Ok(())
        });
    }
}
