//! Repeated-fetch averaging.
//!
//! Each averaged point is built from N consecutive `FETCH?` reads. Both channels are
//! reduced to their arithmetic mean and population standard deviation. A single
//! failed fetch abandons the whole average; partial statistics are never returned.

use crate::error::{AppResult, DaqError};
use crate::measurement::{AveragedMeasurement, MeasurementSample};
use crate::meter::ImpedanceMeter;
use tracing::debug;

/// Averages a fixed number of meter fetches per point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleAverager {
    samples: u32,
}

impl SampleAverager {
    /// `samples` must be at least 1.
    pub fn new(samples: u32) -> AppResult<Self> {
        if samples == 0 {
            return Err(DaqError::Configuration(
                "averaging count must be at least 1".to_string(),
            ));
        }
        Ok(Self { samples })
    }

    pub fn samples(&self) -> u32 {
        self.samples
    }

    /// Fetch `samples` readings from `meter` and reduce them.
    pub fn average<M: ImpedanceMeter + ?Sized>(
        &self,
        meter: &mut M,
    ) -> AppResult<AveragedMeasurement> {
        let mut readings = Vec::with_capacity(self.samples as usize);
        for _ in 0..self.samples {
            readings.push(meter.fetch_raw()?);
        }
        let averaged = statistics(&readings)?;
        debug!(
            samples = averaged.samples,
            major = averaged.major_mean,
            minor = averaged.minor_mean,
            "Averaged meter samples"
        );
        Ok(averaged)
    }
}

/// Shorthand for `SampleAverager::new(n)?.average(meter)`.
pub fn average<M: ImpedanceMeter + ?Sized>(
    meter: &mut M,
    n: u32,
) -> AppResult<AveragedMeasurement> {
    SampleAverager::new(n)?.average(meter)
}

/// Mean and population standard deviation of both channels.
pub fn statistics(samples: &[MeasurementSample]) -> AppResult<AveragedMeasurement> {
    if samples.is_empty() {
        return Err(DaqError::Configuration(
            "cannot average zero samples".to_string(),
        ));
    }

    let (major_mean, major_std_dev) = mean_and_std(samples.iter().map(|s| s.major));
    let (minor_mean, minor_std_dev) = mean_and_std(samples.iter().map(|s| s.minor));
    Ok(AveragedMeasurement {
        major_mean,
        major_std_dev,
        minor_mean,
        minor_std_dev,
        samples: samples.len() as u32,
    })
}

fn mean_and_std(values: impl Iterator<Item = f64> + Clone) -> (f64, f64) {
    let n = values.clone().count() as f64;
    let mean = values.clone().sum::<f64>() / n;
    let variance = values.map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}
