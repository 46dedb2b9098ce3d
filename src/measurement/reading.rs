//! Readings produced by the meter and the temperature controller.

use serde::{Deserialize, Serialize};

/// One raw two-channel fetch from the meter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasurementSample {
    pub major: f64,
    pub minor: f64,
}

impl MeasurementSample {
    pub fn new(major: f64, minor: f64) -> Self {
        Self { major, minor }
    }
}

/// Mean and population standard deviation of both channels over N samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AveragedMeasurement {
    pub major_mean: f64,
    pub major_std_dev: f64,
    pub minor_mean: f64,
    pub minor_std_dev: f64,
    /// Number of samples the statistics were computed from
    pub samples: u32,
}

impl AveragedMeasurement {
    /// Statistics in column order: major mean, major std, minor mean, minor std.
    pub fn as_columns(&self) -> [f64; 4] {
        [
            self.major_mean,
            self.major_std_dev,
            self.minor_mean,
            self.minor_std_dev,
        ]
    }
}

/// Process value and set value reported by the controller, in degrees Celsius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureReading {
    pub process_value: f64,
    pub set_value: f64,
}

impl TemperatureReading {
    /// Build a reading from the controller's tenth-of-a-degree register values.
    pub fn from_tenths(process_tenths: i16, set_tenths: i16) -> Self {
        Self {
            process_value: f64::from(process_tenths) / 10.0,
            set_value: f64::from(set_tenths) / 10.0,
        }
    }
}
