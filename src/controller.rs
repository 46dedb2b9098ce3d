//! PID temperature controller driver.
//!
//! The controller is addressed with ASCII-hex frames (see [`crate::frame`]). Reads
//! fetch the process value and set value registers in one request; writes set a
//! single register and are acknowledged by the controller echoing the frame back.
//!
//! Neither a garbled read nor a write that is not echoed verbatim is treated as an
//! error. A garbled read is an unavailable reading (`Ok(None)`), and a bad echo is
//! reported as [`WriteStatus::EchoMismatch`]. Callers keep going in both cases;
//! only transport failures (port closed, I/O error) are returned as `Err`.

use crate::config::ControllerConfig;
use crate::error::{AppResult, DaqError};
use crate::frame::FrameCodec;
use crate::measurement::TemperatureReading;
use crate::transport::Transport;
use tracing::{debug, info, warn};

/// Process value register (first of the PV/SV pair).
pub const REGISTER_PROCESS_VALUE: u16 = 0x4700;
/// Setpoint register.
pub const REGISTER_SETPOINT: u16 = 0x4701;
/// Run/stop control register.
pub const REGISTER_RUN_STOP: u16 = 0x4719;
/// Value for [`REGISTER_RUN_STOP`] that starts regulation.
pub const RUN: i16 = 1;
/// Value for [`REGISTER_RUN_STOP`] that halts regulation.
pub const STOP: i16 = 0;

/// Outcome of a register write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteStatus {
    /// The controller echoed the frame byte-for-byte.
    Confirmed,
    /// The echo differed from the frame sent, or never arrived.
    EchoMismatch {
        sent: String,
        received: Option<String>,
    },
}

impl WriteStatus {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, WriteStatus::Confirmed)
    }

    /// Keep the first mismatch of two consecutive writes.
    pub fn and(self, next: WriteStatus) -> WriteStatus {
        match self {
            WriteStatus::Confirmed => next,
            mismatch => mismatch,
        }
    }
}

/// Convert degrees Celsius to the controller's tenth-of-a-degree register value.
pub fn celsius_to_tenths(celsius: f64) -> AppResult<i16> {
    let tenths = (celsius * 10.0).round();
    if !tenths.is_finite() || tenths < f64::from(i16::MIN) || tenths > f64::from(i16::MAX) {
        return Err(DaqError::Configuration(format!(
            "temperature {celsius} degC cannot be sent to the controller"
        )));
    }
    Ok(tenths as i16)
}

/// Capability: temperature regulation.
///
/// Implemented by [`PidController`]; the sweep sequencer only depends on this trait.
pub trait TemperatureController {
    /// Poll the process and set values. `Ok(None)` means the reading is unavailable.
    fn read_temperature(&mut self) -> AppResult<Option<TemperatureReading>>;

    /// Write `value` to `register` and check the echo.
    fn write_register(&mut self, register: u16, value: i16) -> AppResult<WriteStatus>;

    /// Write the setpoint, then switch the controller to run.
    fn set_setpoint_and_run(&mut self, setpoint_tenths: i16) -> AppResult<WriteStatus> {
        let setpoint = self.write_register(REGISTER_SETPOINT, setpoint_tenths)?;
        let run = self.write_register(REGISTER_RUN_STOP, RUN)?;
        Ok(setpoint.and(run))
    }

    /// Retreat to the safe setpoint, then stop regulation.
    fn stop(&mut self) -> AppResult<WriteStatus>;
}

/// Controller speaking the ASCII-hex register protocol over a [`Transport`].
pub struct PidController<T: Transport> {
    transport: T,
    codec: FrameCodec,
    safe_setpoint_tenths: i16,
}

impl<T: Transport> PidController<T> {
    /// Create a controller at `codec`'s address with an 18.0 degC safe setpoint.
    pub fn new(transport: T, codec: FrameCodec) -> Self {
        Self {
            transport,
            codec,
            safe_setpoint_tenths: 180,
        }
    }

    pub fn from_config(transport: T, config: &ControllerConfig) -> AppResult<Self> {
        Ok(Self::new(transport, FrameCodec::new(config.address))
            .with_safe_setpoint(celsius_to_tenths(config.safe_setpoint_c)?))
    }

    /// Setpoint written by [`TemperatureController::stop`] before halting.
    pub fn with_safe_setpoint(mut self, tenths: i16) -> Self {
        self.safe_setpoint_tenths = tenths;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Release the controller and hand back its transport.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Close the underlying transport.
    pub fn close(&mut self) -> AppResult<()> {
        self.transport.close()
    }
}

impl<T: Transport> TemperatureController for PidController<T> {
    fn read_temperature(&mut self) -> AppResult<Option<TemperatureReading>> {
        let request = self.codec.encode_read_request(REGISTER_PROCESS_VALUE, 2);
        self.transport.write_line(request.as_bytes())?;

        match self.transport.read_line()? {
            Some(raw) => Ok(self.codec.decode_read_frame(&raw)),
            None => {
                debug!("Controller read timed out, temperature unavailable");
                Ok(None)
            }
        }
    }

    fn write_register(&mut self, register: u16, value: i16) -> AppResult<WriteStatus> {
        let frame = self.codec.encode_write_frame(register, value);
        self.transport.write_line(frame.as_bytes())?;
        let echo = self.transport.read_line()?;

        if echo.as_deref() == Some(frame.as_str()) {
            debug!(register = format_args!("{register:04X}"), value, "Controller write confirmed");
            return Ok(WriteStatus::Confirmed);
        }

        warn!(
            register = format_args!("{register:04X}"),
            value,
            sent = frame.trim_end(),
            received = echo.as_deref().map(str::trim_end).unwrap_or("<nothing>"),
            "Controller echo mismatch"
        );
        Ok(WriteStatus::EchoMismatch {
            sent: frame,
            received: echo,
        })
    }

    fn stop(&mut self) -> AppResult<WriteStatus> {
        info!(
            safe_setpoint = f64::from(self.safe_setpoint_tenths) / 10.0,
            "Stopping temperature controller"
        );
        let retreat = self.write_register(REGISTER_SETPOINT, self.safe_setpoint_tenths)?;
        let halt = self.write_register(REGISTER_RUN_STOP, STOP)?;
        Ok(retreat.and(halt))
    }
}
