//! Drive decision: joystick intent plus safety state to one drive action.
//!
//! Y dominates X: when both axes are deflected, driving forward or backward
//! wins over turning, which is what a tank-drive operator expects.

use crate::utils::{
    config::{ConfigError, RoverConfig},
    connection::packets::{Command, AXIS_CENTER, AXIS_MAX, AXIS_MIN},
    controllers::ranging::DistanceReading,
};

/// Motor speed in percent, `1..=100` for every moving action.
pub type Speed = u8;

pub const MAX_SPEED: Speed = 100;

/// One of five mutually exclusive drive actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveAction {
    Forward(Speed),
    Backward(Speed),
    TurnLeft(Speed),
    TurnRight(Speed),
    Stop,
}

impl DriveAction {
    pub fn speed(&self) -> Option<Speed> {
        match *self {
            DriveAction::Forward(s)
            | DriveAction::Backward(s)
            | DriveAction::TurnLeft(s)
            | DriveAction::TurnRight(s) => Some(s),
            DriveAction::Stop => None,
        }
    }

    /// Same action, ignoring speed.
    pub fn same_kind(
        &self,
        other: &DriveAction,
    ) -> bool {
        core::mem::discriminant(self) == core::mem::discriminant(other)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedMode {
    /// Scale with how far the stick is pushed past the deadzone.
    Proportional,
    /// Every motion runs at one speed.
    Fixed(Speed),
}

/// Axis-dominant thresholding around the joystick center.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrivePolicy {
    deadzone: i32,
    speed_mode: SpeedMode,
    obstacle_stop_cm: Option<u16>,
}

impl DrivePolicy {
    /// Policy with the given deadzone and speed mode, defaults for the rest.
    ///
    /// Rejects a deadzone outside `0..2047` and a fixed speed outside `1..=100`.
    pub fn new(
        deadzone: Option<i32>,
        speed_mode: Option<SpeedMode>,
    ) -> Result<Self, ConfigError> {
        let defaults = RoverConfig::default();
        let fixed_speed = match speed_mode {
            Some(SpeedMode::Fixed(speed)) => Some(speed),
            Some(SpeedMode::Proportional) | None => None,
        };
        Self::from_config(&RoverConfig {
            deadzone: deadzone.unwrap_or(defaults.deadzone),
            fixed_speed,
            ..defaults
        })
    }

    pub fn from_config(config: &RoverConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(DrivePolicy {
            deadzone: config.deadzone,
            speed_mode: config
                .fixed_speed
                .map(SpeedMode::Fixed)
                .unwrap_or(SpeedMode::Proportional),
            obstacle_stop_cm: config.obstacle_stop_cm,
        })
    }

    pub fn with_obstacle_stop(
        mut self,
        distance_cm: u16,
    ) -> Self {
        self.obstacle_stop_cm = Some(distance_cm);
        self
    }

    fn high_threshold(&self) -> i32 {
        AXIS_CENTER + self.deadzone
    }

    fn low_threshold(&self) -> i32 {
        AXIS_CENTER - self.deadzone
    }

    /// Pick the drive action for `command`. A dead link always stops.
    pub fn decide(
        &self,
        command: Command,
        link_alive: bool,
    ) -> DriveAction {
        if !link_alive {
            return DriveAction::Stop;
        }

        let Command { x, y } = command.clamped();
        let (low, high) = (self.low_threshold(), self.high_threshold());

        if y > high {
            DriveAction::Forward(self.speed_above(y))
        } else if y < low {
            DriveAction::Backward(self.speed_below(y))
        } else if x < low {
            DriveAction::TurnLeft(self.speed_below(x))
        } else if x > high {
            DriveAction::TurnRight(self.speed_above(x))
        } else {
            DriveAction::Stop
        }
    }

    /// [`decide`](Self::decide), then refuse to drive forward into a close
    /// obstacle. Backing away and turning stay available.
    pub fn decide_with_range(
        &self,
        command: Command,
        link_alive: bool,
        reading: DistanceReading,
    ) -> DriveAction {
        let action = self.decide(command, link_alive);
        match (action, self.obstacle_stop_cm, reading) {
            (DriveAction::Forward(_), Some(limit), DistanceReading::Range(cm)) if cm < limit => {
                DriveAction::Stop
            }
            _ => action,
        }
    }

    fn speed_above(
        &self,
        value: i32,
    ) -> Speed {
        let high = self.high_threshold();
        self.scale(value - high, AXIS_MAX - high)
    }

    fn speed_below(
        &self,
        value: i32,
    ) -> Speed {
        let low = self.low_threshold();
        self.scale(low - value, low - AXIS_MIN)
    }

    fn scale(
        &self,
        excess: i32,
        span: i32,
    ) -> Speed {
        match self.speed_mode {
            SpeedMode::Fixed(speed) => speed,
            SpeedMode::Proportional => {
                let pct = excess.saturating_mul(MAX_SPEED as i32) / span.max(1);
                pct.clamp(1, MAX_SPEED as i32) as Speed
            }
        }
    }
}

impl Default for DrivePolicy {
    fn default() -> Self {
        DrivePolicy {
            deadzone: crate::utils::config::DEFAULT_DEADZONE,
            speed_mode: SpeedMode::Proportional,
            obstacle_stop_cm: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(
        x: i32,
        y: i32,
    ) -> Command {
        Command { x, y }
    }

    #[test]
    fn dead_link_always_stops() {
        let policy = DrivePolicy::default();
        for c in [cmd(2048, 4095), cmd(0, 0), cmd(4095, 2048), cmd(2048, 2048)] {
            assert_eq!(policy.decide(c, false), DriveAction::Stop);
        }
    }

    #[test]
    fn center_stops() {
        assert_eq!(DrivePolicy::default().decide(cmd(2048, 2048), true), DriveAction::Stop);
    }

    #[test]
    fn y_above_threshold_is_forward_for_any_x() {
        let policy = DrivePolicy::default();
        for x in [0, 1000, 2048, 3100, 4095] {
            assert!(matches!(policy.decide(cmd(x, 3049), true), DriveAction::Forward(_)));
        }
    }

    #[test]
    fn threshold_itself_is_neutral() {
        let policy = DrivePolicy::default();
        assert_eq!(policy.decide(cmd(2048, 3048), true), DriveAction::Stop);
        assert_eq!(policy.decide(cmd(2048, 1048), true), DriveAction::Stop);
        assert_eq!(policy.decide(cmd(1048, 2048), true), DriveAction::Stop);
        assert_eq!(policy.decide(cmd(3048, 2048), true), DriveAction::Stop);
    }

    #[test]
    fn priority_order() {
        let policy = DrivePolicy::default();
        assert!(matches!(policy.decide(cmd(0, 0), true), DriveAction::Backward(_)));
        assert!(matches!(policy.decide(cmd(0, 2048), true), DriveAction::TurnLeft(_)));
        assert!(matches!(policy.decide(cmd(4095, 2048), true), DriveAction::TurnRight(_)));
    }

    #[test]
    fn speed_scales_to_full_deflection() {
        let policy = DrivePolicy::default();
        assert_eq!(policy.decide(cmd(2048, 4095), true), DriveAction::Forward(100));
        assert_eq!(policy.decide(cmd(2048, 0), true), DriveAction::Backward(100));
        assert_eq!(policy.decide(cmd(2048, 3049), true), DriveAction::Forward(1));
        // halfway between threshold (3048) and max (4095)
        assert_eq!(policy.decide(cmd(3572, 2048), true), DriveAction::TurnRight(50));
    }

    #[test]
    fn out_of_range_axes_are_clamped() {
        let policy = DrivePolicy::default();
        assert_eq!(policy.decide(cmd(2048, i32::MAX), true), DriveAction::Forward(100));
        assert_eq!(policy.decide(cmd(i32::MIN, 2048), true), DriveAction::TurnLeft(100));
    }

    #[test]
    fn fixed_speed_mode() {
        let policy = DrivePolicy::new(None, Some(SpeedMode::Fixed(100))).unwrap();
        assert_eq!(policy.decide(cmd(2048, 3100), true), DriveAction::Forward(100));
        assert_eq!(policy.decide(cmd(100, 2048), true), DriveAction::TurnLeft(100));
    }

    #[test]
    fn narrower_deadzone() {
        let policy = DrivePolicy::new(Some(200), None).unwrap();
        assert!(matches!(policy.decide(cmd(2048, 2300), true), DriveAction::Forward(_)));
        assert_eq!(DrivePolicy::default().decide(cmd(2048, 2300), true), DriveAction::Stop);
    }

    #[test]
    fn rejects_settings_that_break_the_speed_range() {
        assert_eq!(
            DrivePolicy::new(Some(-500), None),
            Err(ConfigError::DeadzoneOutOfRange(-500))
        );
        assert_eq!(
            DrivePolicy::new(None, Some(SpeedMode::Fixed(0))),
            Err(ConfigError::FixedSpeedOutOfRange(0))
        );
        let zero_speed = RoverConfig {
            fixed_speed: Some(0),
            ..RoverConfig::default()
        };
        assert_eq!(
            DrivePolicy::from_config(&zero_speed),
            Err(ConfigError::FixedSpeedOutOfRange(0))
        );
    }

    #[test]
    fn default_matches_default_config() {
        assert_eq!(
            DrivePolicy::from_config(&RoverConfig::default()),
            Ok(DrivePolicy::default())
        );
        assert_eq!(DrivePolicy::new(None, None), Ok(DrivePolicy::default()));
    }

    #[test]
    fn obstacle_blocks_only_forward() {
        let policy = DrivePolicy::default().with_obstacle_stop(20);
        let close = DistanceReading::Range(12);
        assert_eq!(policy.decide_with_range(cmd(2048, 4095), true, close), DriveAction::Stop);
        assert_eq!(
            policy.decide_with_range(cmd(2048, 0), true, close),
            DriveAction::Backward(100)
        );
        assert_eq!(
            policy.decide_with_range(cmd(4095, 2048), true, close),
            DriveAction::TurnRight(100)
        );
        assert_eq!(
            policy.decide_with_range(cmd(2048, 4095), true, DistanceReading::OutOfRange),
            DriveAction::Forward(100)
        );
        assert_eq!(
            policy.decide_with_range(cmd(2048, 4095), true, DistanceReading::Range(20)),
            DriveAction::Forward(100)
        );
    }

    #[test]
    fn no_obstacle_gate_by_default() {
        let policy = DrivePolicy::default();
        assert_eq!(
            policy.decide_with_range(cmd(2048, 4095), true, DistanceReading::Range(0)),
            DriveAction::Forward(100)
        );
    }
}
