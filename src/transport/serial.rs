//! Serial port transport for RS-232/USB-serial instruments
//!
//! Wraps the `serialport` crate. Reads are assembled one byte at a time until a
//! newline or until the configured read timeout elapses, so a silent device can
//! never block a caller indefinitely.

use super::Transport;
use crate::config::{ParitySetting, SerialSettings};
use crate::error::{AppResult, DaqError};
use serialport::{DataBits, Parity, SerialPort, StopBits};
use std::io::{Read, Write};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// Internal poll interval for a single byte read; the overall deadline is `read_timeout`.
const BYTE_POLL: Duration = Duration::from_millis(50);

/// Line transport over a real serial port.
pub struct SerialTransport {
    /// Human-readable device label for logs (e.g. "meter", "controller")
    label: String,
    port_name: String,
    read_timeout: Duration,
    response_delimiter: u8,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialTransport {
    /// Open the port described by `settings`.
    pub fn open(label: &str, settings: &SerialSettings) -> AppResult<Self> {
        let port = serialport::new(&settings.port, settings.baud_rate)
            .data_bits(data_bits(settings.data_bits)?)
            .parity(parity(settings.parity))
            .stop_bits(stop_bits(settings.stop_bits)?)
            .timeout(BYTE_POLL.min(settings.read_timeout))
            .open()?;

        info!(
            device = label,
            port = %settings.port,
            baud = settings.baud_rate,
            parity = ?settings.parity,
            "Serial port opened"
        );

        Ok(Self {
            label: label.to_string(),
            port_name: settings.port.clone(),
            read_timeout: settings.read_timeout,
            response_delimiter: b'\n',
            port: Some(port),
        })
    }

    /// Set the byte that ends a reply line.
    pub fn with_response_delimiter(mut self, delimiter: u8) -> Self {
        self.response_delimiter = delimiter;
        self
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    fn port(&mut self) -> AppResult<&mut Box<dyn SerialPort>> {
        let label = &self.label;
        self.port
            .as_mut()
            .ok_or_else(|| DaqError::Instrument(format!("{label} port is closed")))
    }
}

impl Transport for SerialTransport {
    fn write_line(&mut self, data: &[u8]) -> AppResult<()> {
        let port = self.port()?;
        port.write_all(data)?;
        port.flush()?;
        trace!(device = %self.label, data = %String::from_utf8_lossy(data).trim_end(), "Sent");
        Ok(())
    }

    fn read_line(&mut self) -> AppResult<Option<String>> {
        let timeout = self.read_timeout;
        let delimiter = self.response_delimiter;
        let port = self.port()?;

        let mut line = Vec::new();
        let mut buffer = [0u8; 1];
        let start = Instant::now();

        while start.elapsed() < timeout {
            match port.read(&mut buffer) {
                Ok(1) => {
                    line.push(buffer[0]);
                    if buffer[0] == delimiter {
                        break;
                    }
                }
                Ok(_) => continue,
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if line.is_empty() {
            debug!(device = %self.label, ?timeout, "Read timed out with no data");
            return Ok(None);
        }
        let text = String::from_utf8_lossy(&line).into_owned();
        trace!(device = %self.label, data = %text.trim_end(), "Received");
        Ok(Some(text))
    }

    fn close(&mut self) -> AppResult<()> {
        if self.port.take().is_some() {
            info!(device = %self.label, port = %self.port_name, "Serial port closed");
        }
        Ok(())
    }
}

fn data_bits(bits: u8) -> AppResult<DataBits> {
    match bits {
        5 => Ok(DataBits::Five),
        6 => Ok(DataBits::Six),
        7 => Ok(DataBits::Seven),
        8 => Ok(DataBits::Eight),
        other => Err(DaqError::Configuration(format!(
            "unsupported data bits: {other}"
        ))),
    }
}

fn stop_bits(bits: u8) -> AppResult<StopBits> {
    match bits {
        1 => Ok(StopBits::One),
        2 => Ok(StopBits::Two),
        other => Err(DaqError::Configuration(format!(
            "unsupported stop bits: {other}"
        ))),
    }
}

fn parity(setting: ParitySetting) -> Parity {
    match setting {
        ParitySetting::None => Parity::None,
        ParitySetting::Odd => Parity::Odd,
        ParitySetting::Even => Parity::Even,
    }
}
