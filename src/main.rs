//! CLI Entry Point for lcr-daq
//!
//! Runs one acquisition per invocation:
//! - `sweep`: frequency sweep over every major/minor combination
//! - `sweep-temp`: frequency sweep that also records the chamber temperature
//! - `timed`: fixed frequency for a set duration
//! - `until-temp`: fixed frequency until the chamber reaches a target temperature
//! - `list-ports`: show the serial ports on this machine
//! - `show-config`: print the effective settings as TOML
//! - `simulate`: frequency sweep against a simulated meter (no hardware needed)
//!
//! The completed table is printed and exported to `<output_dir>/<timestamp>_<material>_<majors>_<minors>.csv`.
//! If a sweep aborts, the rows completed so far are still exported.
//!
//! # Usage
//!
//! ```bash
//! lcr-daq sweep --material PZT --min-freq 20 --max-freq 1e6 --points 50 --major Z,C --minor THR
//! lcr-daq until-temp --material PZT --frequency 1000 --setpoint 60 --target 55
//! lcr-daq --log-format json simulate --points 10
//! ```

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use lcr_daq::clock::{Clock, ManualClock, SystemClock};
use lcr_daq::config::{SerialSettings, Settings, DEFAULT_CONFIG_PATH};
use lcr_daq::controller::PidController;
use lcr_daq::data::{CsvCheckpoint, CsvExporter};
use lcr_daq::frequency::log_spaced;
use lcr_daq::logging::{self, OutputFormat, TracingConfig};
use lcr_daq::measurement::ParameterKind;
use lcr_daq::metadata::RunMetadata;
use lcr_daq::meter::LcrMeter;
use lcr_daq::settling::SettlingPolicy;
use lcr_daq::sweep::{SweepConfig, SweepMode, SweepSequencer};
use lcr_daq::transport::{self, MockTransport, Transport};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "lcr-daq")]
#[command(about = "Impedance spectroscopy with an LCR meter and a PID temperature controller", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log output format (pretty, compact, json)
    #[arg(long, global = true)]
    log_format: Option<OutputFormat>,

    /// Log every meter command and controller frame
    #[arg(long, global = true)]
    wire_trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sweep frequency over every major/minor combination
    Sweep {
        #[command(flatten)]
        measurement: MeasurementArgs,
        #[command(flatten)]
        range: FrequencyRange,
    },

    /// Sweep frequency and record the chamber temperature at each point
    SweepTemp {
        #[command(flatten)]
        measurement: MeasurementArgs,
        #[command(flatten)]
        range: FrequencyRange,
        /// Chamber setpoint in degC, applied before the sweep
        #[arg(long)]
        setpoint: Option<f64>,
    },

    /// Measure at a fixed frequency for a set duration
    Timed {
        #[command(flatten)]
        measurement: MeasurementArgs,
        /// Test frequency in Hz
        #[arg(long)]
        frequency: u32,
        /// How long to measure (e.g. "30m", "2h 15m")
        #[arg(long, value_parser = humantime_serde::re::humantime::parse_duration)]
        duration: Duration,
        /// Chamber setpoint in degC
        #[arg(long)]
        setpoint: Option<f64>,
    },

    /// Measure at a fixed frequency until the chamber reaches a target temperature
    UntilTemp {
        #[command(flatten)]
        measurement: MeasurementArgs,
        /// Test frequency in Hz
        #[arg(long)]
        frequency: u32,
        /// Target temperature in degC; the run ends once it is reached or passed
        #[arg(long)]
        target: f64,
        /// Chamber setpoint in degC
        #[arg(long)]
        setpoint: Option<f64>,
    },

    /// List available serial ports
    ListPorts,

    /// Print the effective configuration (file plus environment overrides)
    ShowConfig,

    /// Run a frequency sweep against a simulated meter
    Simulate {
        #[command(flatten)]
        measurement: MeasurementArgs,
        #[command(flatten)]
        range: FrequencyRange,
    },
}

#[derive(Args)]
struct MeasurementArgs {
    /// Sample name, used in the output file name
    #[arg(long, default_value = "sample")]
    material: String,

    /// Free-form notes stored in the file header
    #[arg(long, default_value = "")]
    info: String,

    /// AC test level in volts
    #[arg(long, default_value_t = 1.0)]
    voltage: f64,

    /// DC bias in volts
    #[arg(long, allow_negative_numbers = true)]
    bias: Option<f64>,

    /// Meter fetches averaged per point
    #[arg(long, short = 'n', default_value_t = 10)]
    averaging: u32,

    /// Major parameter kinds (comma separated)
    #[arg(long = "major", value_delimiter = ',', default_value = "Z")]
    majors: Vec<ParameterKind>,

    /// Minor parameter kinds (comma separated)
    #[arg(long = "minor", value_delimiter = ',', default_value = "THR")]
    minors: Vec<ParameterKind>,
}

#[derive(Args)]
struct FrequencyRange {
    /// Lowest frequency in Hz
    #[arg(long, default_value_t = 20.0)]
    min_freq: f64,

    /// Highest frequency in Hz
    #[arg(long, default_value_t = 1e6)]
    max_freq: f64,

    /// Number of log-spaced points
    #[arg(long, default_value_t = 50)]
    points: usize,
}

impl FrequencyRange {
    fn frequencies(&self) -> Result<Vec<u32>> {
        Ok(log_spaced(self.min_freq, self.max_freq, self.points)?)
    }
}

fn millivolts(volts: f64, what: &str) -> Result<i32> {
    let mv = (volts * 1000.0).round();
    if !mv.is_finite() || mv.abs() > f64::from(i32::MAX) {
        bail!("{what} of {volts} V is out of range");
    }
    Ok(mv as i32)
}

impl MeasurementArgs {
    fn sweep_config(&self, mode: SweepMode, setpoint: Option<f64>) -> Result<SweepConfig> {
        let voltage = millivolts(self.voltage, "test voltage")?;
        if voltage <= 0 {
            bail!("test voltage must be positive, got {} V", self.voltage);
        }
        let bias = self
            .bias
            .map(|volts| millivolts(volts, "bias voltage"))
            .transpose()?;

        Ok(SweepConfig::new(mode)
            .with_kinds(self.majors.clone(), self.minors.clone())
            .with_voltage_mv(voltage as u32)
            .with_bias_mv(bias)
            .with_averaging(self.averaging)
            .with_setpoint(setpoint))
    }

    fn metadata(&self, config: &SweepConfig) -> RunMetadata {
        RunMetadata::builder()
            .material(&self.material)
            .info(&self.info)
            .sweep(config)
            .build()
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load_from(&cli.config)
        .with_context(|| format!("Failed to load configuration from '{}'", cli.config.display()))?;

    let mut tracing_config = TracingConfig::from_settings(&settings)?;
    if let Some(format) = cli.log_format {
        tracing_config = tracing_config.with_format(format);
    }
    if cli.wire_trace {
        tracing_config = tracing_config.with_wire_trace(true);
    }
    logging::init(tracing_config)?;

    match cli.command {
        Commands::Sweep { measurement, range } => {
            let mode = SweepMode::FrequencySweep {
                frequencies: range.frequencies()?,
            };
            run_on_hardware(&settings, &measurement, mode, None)
        }
        Commands::SweepTemp {
            measurement,
            range,
            setpoint,
        } => {
            let mode = SweepMode::FrequencySweepWithTemperature {
                frequencies: range.frequencies()?,
            };
            run_on_hardware(&settings, &measurement, mode, setpoint)
        }
        Commands::Timed {
            measurement,
            frequency,
            duration,
            setpoint,
        } => {
            let mode = SweepMode::Timed {
                frequency_hz: frequency,
                duration,
            };
            run_on_hardware(&settings, &measurement, mode, setpoint)
        }
        Commands::UntilTemp {
            measurement,
            frequency,
            target,
            setpoint,
        } => {
            let mode = SweepMode::TemperatureBounded {
                frequency_hz: frequency,
                target_c: target,
            };
            run_on_hardware(&settings, &measurement, mode, setpoint)
        }
        Commands::ListPorts => list_ports(),
        Commands::ShowConfig => {
            let rendered =
                toml::to_string_pretty(&settings).context("Failed to render configuration")?;
            println!("{rendered}");
            Ok(())
        }
        Commands::Simulate { measurement, range } => {
            let mode = SweepMode::FrequencySweep {
                frequencies: range.frequencies()?,
            };
            simulate(&settings, &measurement, mode)
        }
    }
}

fn list_ports() -> Result<()> {
    let ports = transport::list_ports().context("Failed to enumerate serial ports")?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        println!("{port}");
    }
    Ok(())
}

#[cfg(feature = "instrument_serial")]
fn open_port(label: &str, serial: &SerialSettings) -> Result<Box<dyn Transport>> {
    let port = transport::SerialTransport::open(label, serial)
        .with_context(|| format!("Failed to open {label} port '{}'", serial.port))?;
    Ok(Box::new(port))
}

#[cfg(not(feature = "instrument_serial"))]
fn open_port(_label: &str, _serial: &SerialSettings) -> Result<Box<dyn Transport>> {
    Err(lcr_daq::DaqError::SerialFeatureDisabled.into())
}

fn run_on_hardware(
    settings: &Settings,
    measurement: &MeasurementArgs,
    mode: SweepMode,
    setpoint: Option<f64>,
) -> Result<()> {
    let controller_port = if mode.uses_controller() {
        Some(open_port("controller", &settings.controller.serial)?)
    } else {
        None
    };
    let meter_port = open_port("meter", &settings.meter.serial)?;
    let config = measurement.sweep_config(mode, setpoint)?;
    let clock = SystemClock::new();

    execute(
        settings,
        measurement,
        &config,
        meter_port,
        controller_port,
        &clock,
        SettlingPolicy::from_config(&settings.settling),
    )
}

fn simulate(settings: &Settings, measurement: &MeasurementArgs, mode: SweepMode) -> Result<()> {
    let config = measurement.sweep_config(mode, None)?;
    let clock = ManualClock::with_tick(Duration::from_millis(250));
    info!("Simulating meter: 1 nF capacitor with 1 kOhm series resistance");

    execute(
        settings,
        measurement,
        &config,
        Box::new(simulated_meter()),
        None,
        &clock,
        SettlingPolicy::immediate(),
    )
}

/// Mock meter that acknowledges every command and answers fetches with the
/// impedance of a series RC at the last commanded frequency.
fn simulated_meter() -> MockTransport {
    const CAPACITANCE: f64 = 1e-9;
    const RESISTANCE: f64 = 1e3;
    let mut frequency = 1000.0_f64;

    MockTransport::new().with_responder(move |line| {
        let line = line.trim();
        if let Some(hz) = line.strip_prefix("FREQ ") {
            frequency = hz.trim().parse().unwrap_or(frequency);
        }
        if line == "FETCH?" {
            let reactance = -1.0 / (2.0 * std::f64::consts::PI * frequency * CAPACITANCE);
            let magnitude = RESISTANCE.hypot(reactance);
            let phase = reactance.atan2(RESISTANCE);
            return vec![
                Some("0\n".to_string()),
                Some(format!("{magnitude:.6e},{phase:.6e}\n")),
            ];
        }
        vec![Some("exec success\n".to_string())]
    })
}

fn execute(
    settings: &Settings,
    measurement: &MeasurementArgs,
    config: &SweepConfig,
    meter_port: Box<dyn Transport>,
    controller_port: Option<Box<dyn Transport>>,
    clock: &dyn Clock,
    settling: SettlingPolicy,
) -> Result<()> {
    let metadata = measurement.metadata(config);
    info!(run_id = %metadata.run_id, material = %metadata.material, mode = %config.mode, "Run starting");

    let mut meter = LcrMeter::from_config(meter_port, &settings.meter);
    let mut controller = controller_port
        .map(|port| PidController::from_config(port, &settings.controller))
        .transpose()?;
    let mut checkpoint = CsvCheckpoint::from_config(&settings.storage);

    let mut sequencer = SweepSequencer::new(&mut meter, clock)
        .with_settling(settling)
        .with_read_attempts(settings.controller.read_attempts);
    if let Some(controller) = controller.as_mut() {
        sequencer = sequencer.with_controller(controller);
    }
    if matches!(config.mode, SweepMode::TemperatureBounded { .. }) {
        sequencer = sequencer.with_checkpoint(&mut checkpoint);
    }

    let outcome = sequencer.run(config);
    drop(sequencer);

    if let Err(err) = meter.close() {
        warn!(error = %err, "Failed to close meter port");
    }
    if let Some(controller) = controller.as_mut() {
        if let Err(err) = controller.close() {
            warn!(error = %err, "Failed to close controller port");
        }
    }

    let exporter = CsvExporter::from_config(&settings.storage);
    match outcome {
        Ok(table) => {
            println!("{table}");
            let path = exporter.export(&metadata, &table)?;
            println!("Data saved to {}", path.display());
            Ok(())
        }
        Err(aborted) => {
            if !aborted.partial.is_empty() {
                println!("{}", aborted.partial);
                let path = exporter.export(&metadata, &aborted.partial)?;
                println!("Partial data saved to {}", path.display());
            }
            Err(anyhow::Error::new(aborted))
        }
    }
}
