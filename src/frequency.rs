//! Log-spaced frequency lists.

use crate::error::{AppResult, DaqError};

/// `points` frequencies logarithmically spaced from `min_hz` to `max_hz` inclusive.
///
/// Values are rounded half-to-even to whole hertz, so neighbouring points may repeat
/// at the low end of a dense sweep. A single point yields `[round(min_hz)]`.
pub fn log_spaced(min_hz: f64, max_hz: f64, points: usize) -> AppResult<Vec<u32>> {
    if min_hz.is_nan() || min_hz <= 0.0 || !max_hz.is_finite() {
        return Err(DaqError::Configuration(format!(
            "frequency bounds must be positive and finite, got {min_hz}..{max_hz}"
        )));
    }
    if min_hz > max_hz {
        return Err(DaqError::Configuration(format!(
            "minimum frequency {min_hz} exceeds maximum {max_hz}"
        )));
    }
    if points == 0 {
        return Err(DaqError::Configuration(
            "frequency sweep needs at least one point".to_string(),
        ));
    }
    if max_hz.round_ties_even() > f64::from(u32::MAX) {
        return Err(DaqError::Configuration(format!(
            "maximum frequency {max_hz} is out of range"
        )));
    }

    if points == 1 {
        return Ok(vec![min_hz.round_ties_even() as u32]);
    }

    let start = min_hz.log10();
    let step = (max_hz.log10() - start) / (points - 1) as f64;
    Ok((0..points)
        .map(|i| {
            let hz = match i {
                0 => min_hz,
                i if i == points - 1 => max_hz,
                i => 10f64.powf(start + step * i as f64),
            };
            hz.round_ties_even() as u32
        })
        .collect())
}
