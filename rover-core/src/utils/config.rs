//! Rover tunables.
//!
//! Every field has a firmware default; hosts may load overrides (the mock
//! rover reads JSON). [`RoverConfig::validate`] runs whenever a policy or
//! controller is built from one.

use embassy_time::Duration;
use serde::{Deserialize, Serialize};

use crate::utils::connection::packets::AXIS_CENTER;

pub const DEFAULT_DEADZONE: i32 = 1000;
pub const DEFAULT_LINK_TIMEOUT_MS: u64 = 500;
pub const DEFAULT_TELEMETRY_PERIOD_MS: u64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoverConfig {
    /// Half-width of the neutral band around the joystick center, per axis.
    pub deadzone: i32,
    /// Commands older than this are treated as a lost link.
    pub link_timeout_ms: u64,
    /// Cadence of telemetry packets back to the remote.
    pub telemetry_period_ms: u64,
    /// Drive every motion at this speed (percent) instead of scaling with stick deflection.
    pub fixed_speed: Option<u8>,
    /// Refuse forward motion when an obstacle is measured closer than this (cm).
    pub obstacle_stop_cm: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Deadzone must leave some travel on both sides of center.
    DeadzoneOutOfRange(i32),
    ZeroLinkTimeout,
    ZeroTelemetryPeriod,
    /// Fixed speed must be within `1..=100` percent.
    FixedSpeedOutOfRange(u8),
}

impl Default for RoverConfig {
    fn default() -> Self {
        Self {
            deadzone: DEFAULT_DEADZONE,
            link_timeout_ms: DEFAULT_LINK_TIMEOUT_MS,
            telemetry_period_ms: DEFAULT_TELEMETRY_PERIOD_MS,
            fixed_speed: None,
            obstacle_stop_cm: None,
        }
    }
}

impl RoverConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.deadzone < 0 || self.deadzone >= AXIS_CENTER - 1 {
            return Err(ConfigError::DeadzoneOutOfRange(self.deadzone));
        }
        if self.link_timeout_ms == 0 {
            return Err(ConfigError::ZeroLinkTimeout);
        }
        if self.telemetry_period_ms == 0 {
            return Err(ConfigError::ZeroTelemetryPeriod);
        }
        if let Some(speed) = self.fixed_speed {
            if !(1..=100).contains(&speed) {
                return Err(ConfigError::FixedSpeedOutOfRange(speed));
            }
        }
        Ok(())
    }

    pub fn link_timeout(&self) -> Duration {
        Duration::from_millis(self.link_timeout_ms)
    }

    pub fn telemetry_period(&self) -> Duration {
        Duration::from_millis(self.telemetry_period_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = RoverConfig::default();
        assert_eq!(cfg.validate(), Ok(()));
        assert_eq!(cfg.link_timeout(), Duration::from_millis(500));
        assert_eq!(cfg.telemetry_period(), Duration::from_millis(500));
    }

    #[test]
    fn rejects_deadzone_covering_full_travel() {
        let cfg = RoverConfig {
            deadzone: 2047,
            ..RoverConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::DeadzoneOutOfRange(2047)));
    }

    #[test]
    fn rejects_zero_intervals_and_bad_speed() {
        let zero_timeout = RoverConfig {
            link_timeout_ms: 0,
            ..RoverConfig::default()
        };
        assert_eq!(zero_timeout.validate(), Err(ConfigError::ZeroLinkTimeout));

        let zero_period = RoverConfig {
            telemetry_period_ms: 0,
            ..RoverConfig::default()
        };
        assert_eq!(zero_period.validate(), Err(ConfigError::ZeroTelemetryPeriod));

        let fast = RoverConfig {
            fixed_speed: Some(150),
            ..RoverConfig::default()
        };
        assert_eq!(fast.validate(), Err(ConfigError::FixedSpeedOutOfRange(150)));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: RoverConfig = serde_json::from_str(r#"{"deadzone": 600}"#).unwrap();
        assert_eq!(cfg.deadzone, 600);
        assert_eq!(cfg.link_timeout_ms, DEFAULT_LINK_TIMEOUT_MS);
        assert_eq!(cfg.fixed_speed, None);
    }
}
