//! Sweep configuration.
//!
//! A [`SweepConfig`] is fixed before the run starts: it decides the traversal
//! policy, the table schema and every command sent to the meter.

use crate::controller::celsius_to_tenths;
use crate::error::{AppResult, DaqError};
use crate::measurement::{ParameterKind, ParameterPair};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Traversal policy of the outer loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SweepMode {
    /// Every major x minor combination at every frequency; one row per frequency.
    FrequencySweep { frequencies: Vec<u32> },

    /// As `FrequencySweep`, also recording the chamber temperature once per frequency.
    FrequencySweepWithTemperature { frequencies: Vec<u32> },

    /// Fixed frequency, one row per iteration until `duration` has elapsed.
    Timed {
        frequency_hz: u32,
        #[serde(with = "humantime_serde")]
        duration: Duration,
    },

    /// Fixed frequency, one row per iteration until the chamber reaches `target_c`.
    TemperatureBounded { frequency_hz: u32, target_c: f64 },
}

impl SweepMode {
    /// Whether the mode drives the temperature controller.
    pub fn uses_controller(&self) -> bool {
        !matches!(self, SweepMode::FrequencySweep { .. })
    }

    /// Whether rows are keyed by elapsed time instead of frequency.
    pub fn is_fixed_frequency(&self) -> bool {
        matches!(
            self,
            SweepMode::Timed { .. } | SweepMode::TemperatureBounded { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            SweepMode::FrequencySweep { .. } => "frequency sweep",
            SweepMode::FrequencySweepWithTemperature { .. } => "frequency sweep with temperature",
            SweepMode::Timed { .. } => "timed sweep",
            SweepMode::TemperatureBounded { .. } => "temperature-bounded sweep",
        }
    }
}

impl fmt::Display for SweepMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable input to one sweep run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    pub mode: SweepMode,
    /// Major parameter kinds, measured in this order
    pub majors: Vec<ParameterKind>,
    /// Minor parameter kinds, measured in this order for each major
    pub minors: Vec<ParameterKind>,
    /// AC test level in millivolts
    pub voltage_mv: u32,
    /// Optional DC bias in millivolts
    pub bias_mv: Option<i32>,
    /// Meter fetches per averaged point
    pub averaging: u32,
    /// Chamber setpoint to run the controller to before measuring
    pub setpoint_c: Option<f64>,
}

impl SweepConfig {
    /// Single Z / THR combination at 1 V, 10 samples per point.
    pub fn new(mode: SweepMode) -> Self {
        Self {
            mode,
            majors: vec![ParameterKind::Z],
            minors: vec![ParameterKind::ThetaRad],
            voltage_mv: 1000,
            bias_mv: None,
            averaging: 10,
            setpoint_c: None,
        }
    }

    pub fn with_kinds(mut self, majors: Vec<ParameterKind>, minors: Vec<ParameterKind>) -> Self {
        self.majors = majors;
        self.minors = minors;
        self
    }

    pub fn with_voltage_mv(mut self, millivolts: u32) -> Self {
        self.voltage_mv = millivolts;
        self
    }

    pub fn with_bias_mv(mut self, millivolts: Option<i32>) -> Self {
        self.bias_mv = millivolts;
        self
    }

    pub fn with_averaging(mut self, samples: u32) -> Self {
        self.averaging = samples;
        self
    }

    pub fn with_setpoint(mut self, celsius: Option<f64>) -> Self {
        self.setpoint_c = celsius;
        self
    }

    /// Every (major, minor) combination in measurement order.
    pub fn combinations(&self) -> Vec<ParameterPair> {
        self.majors
            .iter()
            .flat_map(|&major| {
                self.minors
                    .iter()
                    .map(move |&minor| ParameterPair::new(major, minor))
            })
            .collect()
    }

    /// Reject configurations that cannot produce a meaningful run.
    pub fn validate(&self) -> AppResult<()> {
        self.check().map_err(DaqError::Configuration)
    }

    fn check(&self) -> Result<(), String> {
        if self.majors.is_empty() || self.minors.is_empty() {
            return Err("at least one major and one minor parameter kind are required".into());
        }
        if self.averaging == 0 {
            return Err("averaging count must be at least 1".into());
        }
        if self.voltage_mv == 0 {
            return Err("test voltage must be greater than 0 mV".into());
        }
        if let Some(setpoint) = self.setpoint_c {
            celsius_to_tenths(setpoint).map_err(|e| e.to_string())?;
        }

        match &self.mode {
            SweepMode::FrequencySweep { frequencies }
            | SweepMode::FrequencySweepWithTemperature { frequencies } => {
                if frequencies.is_empty() {
                    return Err("frequency list is empty".into());
                }
                if frequencies.contains(&0) {
                    return Err("frequencies must be greater than 0 Hz".into());
                }
            }
            SweepMode::Timed { frequency_hz, .. } => {
                if *frequency_hz == 0 {
                    return Err("frequency must be greater than 0 Hz".into());
                }
            }
            SweepMode::TemperatureBounded {
                frequency_hz,
                target_c,
            } => {
                if *frequency_hz == 0 {
                    return Err("frequency must be greater than 0 Hz".into());
                }
                if !target_c.is_finite() {
                    return Err(format!("target temperature {target_c} is not a number"));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combinations_are_major_then_minor() {
        let config = SweepConfig::new(SweepMode::FrequencySweep {
            frequencies: vec![100],
        })
        .with_kinds(
            vec![ParameterKind::Z, ParameterKind::C],
            vec![ParameterKind::ThetaRad, ParameterKind::D],
        );
        let labels: Vec<String> = config.combinations().iter().map(|p| p.label()).collect();
        assert_eq!(labels, vec!["Z-THR", "Z-D", "C-THR", "C-D"]);
    }

    #[test]
    fn test_validation() {
        let ok = SweepConfig::new(SweepMode::Timed {
            frequency_hz: 1000,
            duration: Duration::from_secs(60),
        });
        assert!(ok.validate().is_ok());

        let cases = [
            ok.clone().with_averaging(0),
            ok.clone().with_voltage_mv(0),
            ok.clone().with_kinds(vec![], vec![ParameterKind::D]),
            ok.clone().with_setpoint(Some(1e6)),
            SweepConfig::new(SweepMode::FrequencySweep {
                frequencies: vec![],
            }),
            SweepConfig::new(SweepMode::FrequencySweepWithTemperature {
                frequencies: vec![100, 0],
            }),
            SweepConfig::new(SweepMode::TemperatureBounded {
                frequency_hz: 1000,
                target_c: f64::NAN,
            }),
        ];
        for config in cases {
            assert!(
                matches!(config.validate(), Err(DaqError::Configuration(_))),
                "accepted {config:?}"
            );
        }
    }

    #[test]
    fn test_mode_properties() {
        let freq = SweepMode::FrequencySweep { frequencies: vec![1] };
        let bounded = SweepMode::TemperatureBounded {
            frequency_hz: 1,
            target_c: 25.0,
        };
        assert!(!freq.uses_controller());
        assert!(!freq.is_fixed_frequency());
        assert!(bounded.uses_controller());
        assert!(bounded.is_fixed_frequency());
        assert_eq!(bounded.to_string(), "temperature-bounded sweep");
    }

    #[test]
    fn test_config_serializes_with_humantime_duration() {
        let config = SweepConfig::new(SweepMode::Timed {
            frequency_hz: 1000,
            duration: Duration::from_secs(90),
        });
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["mode"]["mode"], "timed");
        assert_eq!(json["mode"]["duration"], "1m 30s");
    }
}
