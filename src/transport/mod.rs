//! Line-oriented device transports.
//!
//! Both instruments speak newline-terminated ASCII over their own serial line. The
//! protocol layers only need three operations, captured by [`Transport`]:
//!
//! - `write_line`: send bytes verbatim (callers supply the terminator)
//! - `read_line`: block until a line arrives or the port's read timeout elapses
//! - `close`: release the port
//!
//! A read timeout with nothing received is reported as `Ok(None)`, which keeps it
//! distinguishable from a device that legitimately sent an empty line (`Some("")`).
//! Partial data received before a timeout is returned as-is; the protocol decoders
//! reject it.
//!
//! Each transport is exclusively owned by one protocol object. There is no locking
//! because commands are strictly sequential: the devices do not pipeline, and a
//! second command issued before the previous reply is read desynchronises them.

pub mod mock;
#[cfg(feature = "instrument_serial")]
pub mod serial;

pub use mock::MockTransport;
#[cfg(feature = "instrument_serial")]
pub use serial::SerialTransport;

use crate::error::AppResult;

/// Duplex line transport to a single device.
pub trait Transport {
    /// Write `data` verbatim.
    fn write_line(&mut self, data: &[u8]) -> AppResult<()>;

    /// Read one line including its terminator, or `None` if the read timed out empty.
    fn read_line(&mut self) -> AppResult<Option<String>>;

    /// Close the underlying port. Further I/O is an error.
    fn close(&mut self) -> AppResult<()>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write_line(&mut self, data: &[u8]) -> AppResult<()> {
        (**self).write_line(data)
    }

    fn read_line(&mut self) -> AppResult<Option<String>> {
        (**self).read_line()
    }

    fn close(&mut self) -> AppResult<()> {
        (**self).close()
    }
}

/// Names of the serial ports present on this machine.
#[cfg(feature = "instrument_serial")]
pub fn list_ports() -> AppResult<Vec<String>> {
    let ports = serialport::available_ports()?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

#[cfg(not(feature = "instrument_serial"))]
pub fn list_ports() -> AppResult<Vec<String>> {
    Err(crate::error::DaqError::SerialFeatureDisabled)
}
