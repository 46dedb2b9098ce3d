//! Frequency-dependent settling dwell.
//!
//! After the test frequency changes the meter needs time before readings are
//! trustworthy, and low frequencies need much longer. The policy is a pure
//! threshold table:
//!
//! | frequency                   | dwell              |
//! |-----------------------------|--------------------|
//! | `f < low_limit`             | `low_dwell` (10 s) |
//! | `low_limit <= f <= mid_limit` | `mid_dwell` (2 s)  |
//! | `f > mid_limit`             | none               |

use crate::config::SettlingConfig;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlingPolicy {
    low_limit_hz: u32,
    mid_limit_hz: u32,
    low_dwell: Duration,
    mid_dwell: Duration,
}

impl Default for SettlingPolicy {
    fn default() -> Self {
        Self::from_config(&SettlingConfig::default())
    }
}

impl SettlingPolicy {
    pub fn from_config(config: &SettlingConfig) -> Self {
        Self {
            low_limit_hz: config.low_frequency_limit_hz,
            mid_limit_hz: config.mid_frequency_limit_hz,
            low_dwell: config.low_frequency_dwell,
            mid_dwell: config.mid_frequency_dwell,
        }
    }

    /// A policy that never waits (simulation and tests).
    pub fn immediate() -> Self {
        Self {
            low_dwell: Duration::ZERO,
            mid_dwell: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Dwell required after switching to `frequency_hz`.
    pub fn delay(&self, frequency_hz: u32) -> Duration {
        if frequency_hz < self.low_limit_hz {
            self.low_dwell
        } else if frequency_hz <= self.mid_limit_hz {
            self.mid_dwell
        } else {
            Duration::ZERO
        }
    }
}

/// Dwell for `frequency_hz` under the default policy.
pub fn settling_delay(frequency_hz: u32) -> Duration {
    SettlingPolicy::default().delay(frequency_hz)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        assert_eq!(settling_delay(20), Duration::from_secs(10));
        assert_eq!(settling_delay(99), Duration::from_secs(10));
        assert_eq!(settling_delay(100), Duration::from_secs(2));
        assert_eq!(settling_delay(1000), Duration::from_secs(2));
        assert_eq!(settling_delay(1001), Duration::ZERO);
        assert_eq!(settling_delay(100_000), Duration::ZERO);
    }

    #[test]
    fn test_configured_thresholds() {
        let config = SettlingConfig {
            low_frequency_limit_hz: 50,
            mid_frequency_limit_hz: 500,
            low_frequency_dwell: Duration::from_millis(1500),
            mid_frequency_dwell: Duration::from_millis(250),
        };
        let policy = SettlingPolicy::from_config(&config);
        assert_eq!(policy.delay(49), Duration::from_millis(1500));
        assert_eq!(policy.delay(50), Duration::from_millis(250));
        assert_eq!(policy.delay(501), Duration::ZERO);
    }

    #[test]
    fn test_immediate_policy() {
        let policy = SettlingPolicy::immediate();
        assert_eq!(policy.delay(1), Duration::ZERO);
        assert_eq!(policy.delay(500), Duration::ZERO);
    }
}
