//! Measurement data types shared by the device protocols and the sweep sequencer.
//!
//! - [`ParameterKind`] / [`ParameterPair`]: which impedance quantities the meter reports
//! - [`MeasurementSample`]: one raw fetch, consumed immediately by the averager
//! - [`AveragedMeasurement`]: mean and standard deviation over N samples
//! - [`TemperatureReading`]: process/set value pair decoded from a controller frame;
//!   an unavailable reading is `Option::None`, never a sentinel value

pub mod parameter;
pub mod reading;

pub use parameter::{ParameterKind, ParameterPair};
pub use reading::{AveragedMeasurement, MeasurementSample, TemperatureReading};
