//! LCR meter driver.
//!
//! The meter takes newline-terminated text commands. Every setting command is
//! answered with a literal acknowledgement line (`exec success` by default), and a
//! `FETCH?` is answered with two lines: a status line that is discarded and a
//! comma-separated `major,minor` pair.
//!
//! Waiting for an acknowledgement is bounded by `ack_timeout`. Expiry surfaces as a
//! [`DaqError::TransportTimeout`] instead of a hang. Any other lines seen
//! while waiting (stale replies, blanks) are logged and skipped.

use crate::config::MeterConfig;
use crate::error::{AppResult, DaqError};
use crate::measurement::{MeasurementSample, ParameterKind, ParameterPair};
use crate::transport::Transport;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Command terminator expected by the meter.
pub const COMMAND_TERMINATOR: &str = "\n";
/// Default acknowledgement line.
pub const DEFAULT_ACK_TOKEN: &str = "exec success";
/// Reads allowed while waiting for one acknowledgement.
const MAX_ACK_POLLS: u32 = 64;

/// Capability: two-channel impedance measurement.
pub trait ImpedanceMeter {
    /// Set the AC test level in millivolts.
    fn set_voltage(&mut self, millivolts: u32) -> AppResult<()>;

    /// Set the DC bias in millivolts.
    fn set_bias(&mut self, millivolts: i32) -> AppResult<()>;

    /// Select the quantity reported on the first channel.
    fn set_major(&mut self, kind: ParameterKind) -> AppResult<()>;

    /// Select the quantity reported on the second channel.
    fn set_minor(&mut self, kind: ParameterKind) -> AppResult<()>;

    fn set_frequency(&mut self, hz: u32) -> AppResult<()>;

    /// Trigger a measurement and return the raw pair.
    fn fetch_raw(&mut self) -> AppResult<MeasurementSample>;

    /// Apply a complete measurement setup, in the order the meter expects.
    fn configure(
        &mut self,
        voltage_mv: u32,
        bias_mv: Option<i32>,
        pair: ParameterPair,
        frequency_hz: u32,
    ) -> AppResult<()> {
        self.set_voltage(voltage_mv)?;
        if let Some(bias) = bias_mv {
            self.set_bias(bias)?;
        }
        self.set_major(pair.major)?;
        self.set_minor(pair.minor)?;
        self.set_frequency(frequency_hz)
    }
}

/// Parse the data line of a `FETCH?` reply.
pub fn parse_fetch_line(line: &str) -> AppResult<MeasurementSample> {
    let trimmed = line.trim();
    let parse_error = |reason: &str| DaqError::Parse {
        reply: trimmed.to_string(),
        reason: reason.to_string(),
    };

    let mut fields = trimmed.split(',');
    let (Some(major), Some(minor), None) = (fields.next(), fields.next(), fields.next()) else {
        return Err(parse_error("expected exactly two comma-separated values"));
    };

    let major: f64 = major
        .trim()
        .parse()
        .map_err(|_| parse_error("major value is not a number"))?;
    let minor: f64 = minor
        .trim()
        .parse()
        .map_err(|_| parse_error("minor value is not a number"))?;
    Ok(MeasurementSample::new(major, minor))
}

/// Meter speaking the text command protocol over a [`Transport`].
pub struct LcrMeter<T: Transport> {
    transport: T,
    ack_token: String,
    ack_timeout: Duration,
}

impl<T: Transport> LcrMeter<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            ack_token: DEFAULT_ACK_TOKEN.to_string(),
            ack_timeout: Duration::from_secs(5),
        }
    }

    pub fn from_config(transport: T, config: &MeterConfig) -> Self {
        Self::new(transport)
            .with_ack_token(&config.ack_token)
            .with_ack_timeout(config.ack_timeout)
    }

    pub fn with_ack_token(mut self, token: &str) -> Self {
        self.ack_token = token.to_string();
        self
    }

    /// Upper bound on the wait for one acknowledgement.
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    pub fn close(&mut self) -> AppResult<()> {
        self.transport.close()
    }

    /// Send a setting command and wait for its acknowledgement.
    pub fn send_command(&mut self, command: &str) -> AppResult<()> {
        trace!(command, "Meter command");
        let line = format!("{command}{COMMAND_TERMINATOR}");
        self.transport.write_line(line.as_bytes())?;

        let start = Instant::now();
        let mut polls = 0u32;
        loop {
            match self.transport.read_line()? {
                Some(reply) if reply.trim() == self.ack_token => {
                    debug!(command, "Meter acknowledged");
                    return Ok(());
                }
                Some(reply) => debug!(command, reply = reply.trim(), "Ignoring meter line"),
                None => trace!(command, "No acknowledgement yet"),
            }
            polls += 1;

            // bounded by poll count too: a transport may return without blocking
            if start.elapsed() >= self.ack_timeout || polls >= MAX_ACK_POLLS {
                return Err(DaqError::TransportTimeout {
                    device: format!("meter acknowledgement of '{command}'"),
                    waited: start.elapsed(),
                });
            }
        }
    }

    fn read_fetch_line(&mut self, which: &str) -> AppResult<String> {
        let start = Instant::now();
        self.transport
            .read_line()?
            .ok_or_else(|| DaqError::TransportTimeout {
                device: format!("meter fetch ({which} line)"),
                waited: start.elapsed(),
            })
    }
}

impl<T: Transport> ImpedanceMeter for LcrMeter<T> {
    fn set_voltage(&mut self, millivolts: u32) -> AppResult<()> {
        self.send_command(&format!("VOLT {millivolts}"))
    }

    fn set_bias(&mut self, millivolts: i32) -> AppResult<()> {
        self.send_command(&format!("BIAS:VOLT {millivolts}"))
    }

    fn set_major(&mut self, kind: ParameterKind) -> AppResult<()> {
        self.send_command(&format!("FUNC:IMP:A {kind}"))
    }

    fn set_minor(&mut self, kind: ParameterKind) -> AppResult<()> {
        self.send_command(&format!("FUNC:IMP:B {kind}"))
    }

    fn set_frequency(&mut self, hz: u32) -> AppResult<()> {
        self.send_command(&format!("FREQ {hz}"))
    }

    fn fetch_raw(&mut self) -> AppResult<MeasurementSample> {
        let request = format!("FETCH?{COMMAND_TERMINATOR}");
        self.transport.write_line(request.as_bytes())?;

        let status = self.read_fetch_line("status")?;
        trace!(status = status.trim(), "Discarding fetch status line");
        let data = self.read_fetch_line("data")?;

        let sample = parse_fetch_line(&data)?;
        trace!(major = sample.major, minor = sample.minor, "Meter sample");
        Ok(sample)
    }
}
