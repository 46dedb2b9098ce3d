//! ASCII-hex framing for the temperature controller.
//!
//! Every controller exchange is a single line:
//!
//! ```text
//! ':' + address(2 hex) + function(2 hex) + payload + LRC(2 hex) + CRLF
//! ```
//!
//! The LRC is the two's complement of the 8-bit sum of every byte in the body
//! (address through payload), rendered as two uppercase hex digits.
//!
//! Decoding never fails loudly: any malformed, foreign or corrupted frame reduces to
//! "reading unavailable" and is logged.

use crate::measurement::TemperatureReading;
use thiserror::Error;
use tracing::{debug, warn};

/// Frame start sentinel.
pub const FRAME_START: char = ':';
/// Frame terminator.
pub const FRAME_END: &str = "\r\n";
/// Function code for reading holding registers.
pub const FUNCTION_READ: u8 = 0x03;
/// Function code for writing a single register.
pub const FUNCTION_WRITE: u8 = 0x06;

/// Why a controller frame could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame does not start with ':'")]
    MissingSentinel,

    #[error("frame body has {0} hex digits, too short")]
    TooShort(usize),

    #[error("frame body has an odd number of hex digits ({0})")]
    OddLength(usize),

    #[error("invalid hex digits '{0}'")]
    InvalidHex(String),

    #[error("unexpected header: address {address:02X}, function {function:02X}")]
    UnexpectedHeader { address: u8, function: u8 },

    #[error("byte count {declared} does not match {actual} data bytes")]
    ByteCountMismatch { declared: usize, actual: usize },

    #[error("LRC mismatch: calculated {calculated}, received {received}")]
    ChecksumMismatch { calculated: String, received: String },
}

/// LRC over a hex body: two's complement of the 8-bit sum of its byte pairs.
///
/// ASCII whitespace inside the body is ignored.
pub fn lrc(body_hex: &str) -> Result<u8, FrameError> {
    let digits: Vec<u8> = body_hex
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if digits.len() % 2 != 0 {
        return Err(FrameError::OddLength(digits.len()));
    }

    let mut total: u8 = 0;
    for pair in digits.chunks(2) {
        let text = String::from_utf8_lossy(pair);
        let byte = u8::from_str_radix(&text, 16)
            .map_err(|_| FrameError::InvalidHex(text.to_string()))?;
        total = total.wrapping_add(byte);
    }
    Ok(total.wrapping_neg())
}

/// LRC rendered as two uppercase hex digits.
pub fn compute_checksum(body_hex: &str) -> Result<String, FrameError> {
    lrc(body_hex).map(|sum| format!("{:02X}", sum))
}

fn parse_hex_u8(text: &str) -> Result<u8, FrameError> {
    u8::from_str_radix(text, 16).map_err(|_| FrameError::InvalidHex(text.to_string()))
}

fn parse_hex_u16(text: &str) -> Result<u16, FrameError> {
    u16::from_str_radix(text, 16).map_err(|_| FrameError::InvalidHex(text.to_string()))
}

/// Encoder/decoder bound to one controller bus address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCodec {
    address: u8,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(0x01)
    }
}

impl FrameCodec {
    pub fn new(address: u8) -> Self {
        Self { address }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    fn frame(&self, body: String) -> String {
        // body is built from formatted integers, so its LRC cannot fail
        let sum = lrc(&body).unwrap_or_default();
        format!("{FRAME_START}{body}{sum:02X}{FRAME_END}")
    }

    /// Request `count` registers starting at `start_register`.
    pub fn encode_read_request(&self, start_register: u16, count: u16) -> String {
        self.frame(format!(
            "{:02X}{:02X}{:04X}{:04X}",
            self.address, FUNCTION_READ, start_register, count
        ))
    }

    /// Write `value` to `register`. Negative values are sent as 16-bit two's complement.
    pub fn encode_write_frame(&self, register: u16, value: i16) -> String {
        self.frame(format!(
            "{:02X}{:02X}{:04X}{:04X}",
            self.address, FUNCTION_WRITE, register, value as u16
        ))
    }

    /// Parse a register read response into its data words.
    pub fn parse_read_response(&self, raw: &str) -> Result<Vec<u16>, FrameError> {
        let line = raw.trim();
        let body = line
            .strip_prefix(FRAME_START)
            .ok_or(FrameError::MissingSentinel)?;

        // address + function + byte count + LRC
        if body.len() < 8 {
            return Err(FrameError::TooShort(body.len()));
        }
        if body.len() % 2 != 0 || !body.is_ascii() {
            return Err(FrameError::OddLength(body.len()));
        }

        let (content, received) = body.split_at(body.len() - 2);
        let calculated = compute_checksum(content)?;
        if calculated != received.to_ascii_uppercase() {
            return Err(FrameError::ChecksumMismatch {
                calculated,
                received: received.to_string(),
            });
        }

        let address = parse_hex_u8(&content[0..2])?;
        let function = parse_hex_u8(&content[2..4])?;
        if address != self.address || function != FUNCTION_READ {
            return Err(FrameError::UnexpectedHeader { address, function });
        }

        let declared = usize::from(parse_hex_u8(&content[4..6])?);
        let data = &content[6..];
        if data.len() != declared * 2 || declared % 2 != 0 {
            return Err(FrameError::ByteCountMismatch {
                declared,
                actual: data.len() / 2,
            });
        }

        data.as_bytes()
            .chunks(4)
            .map(|word| parse_hex_u16(&String::from_utf8_lossy(word)))
            .collect()
    }

    /// Decode a PV/SV read response. Returns `None` for anything unusable.
    pub fn decode_read_frame(&self, raw: &str) -> Option<TemperatureReading> {
        match self.parse_read_response(raw) {
            Ok(words) if words.len() >= 2 => {
                let reading = TemperatureReading::from_tenths(words[0] as i16, words[1] as i16);
                debug!(
                    pv = reading.process_value,
                    sv = reading.set_value,
                    "Decoded controller frame"
                );
                Some(reading)
            }
            Ok(words) => {
                warn!(words = words.len(), raw = raw.trim(), "Controller frame carries too few registers");
                None
            }
            Err(err @ FrameError::ChecksumMismatch { .. }) => {
                warn!(raw = raw.trim(), "{}", err);
                None
            }
            Err(err) => {
                debug!(raw = raw.trim(), "Discarding controller frame: {}", err);
                None
            }
        }
    }
}
