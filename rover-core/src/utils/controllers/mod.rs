//! Module Exports
//!
//! Hardware-facing controllers and the control loop that ties them together.
//!
//! - `ranging`: non-blocking ultrasonic ranging state machine.
//! - `motors`: drive line backends and the motor actuator.

pub mod motors;
pub mod ranging;

use embassy_time::{Duration, Instant};
use embedded_hal::digital::{InputPin, OutputPin};

pub use motors::{ActuationError, DriveLines, MotorActuator, MotorLine, Pca9685DriveLines, PwmDriveLines};
pub use ranging::{DistanceReading, RangingEngine, RangingState};

use crate::utils::{
    config::{ConfigError, RoverConfig},
    connection::{
        channel::{CommandChannel, RadioTransport, SendError},
        packets::Telemetry,
    },
    policy::{
        drive::{DriveAction, DrivePolicy},
        freshness,
    },
};

/// Battery voltage, read once per telemetry cycle.
pub trait VoltageSource {
    fn read_volts(&mut self) -> f32;
}

/// What one control-loop iteration did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub action: DriveAction,
    pub link_alive: bool,
    pub reading: Option<DistanceReading>,
    /// Telemetry sent this tick, if it was due and went out.
    pub telemetry: Option<Telemetry>,
}

/// The rover control loop.
///
/// Sole owner of the motor actuator: nothing that handles radio input can
/// reach the motors except through [`tick`](Self::tick).
pub struct RoverController<'a, TRIG, ECHO, L, T, V> {
    ranging: RangingEngine<TRIG, ECHO>,
    channel: CommandChannel<'a, T>,
    motors: MotorActuator<L>,
    battery: V,
    policy: DrivePolicy,
    link_timeout: Duration,
    telemetry_period: Duration,
    next_telemetry: Option<Instant>,
    last_action: DriveAction,
    link_was_alive: bool,
}

impl<'a, TRIG, ECHO, L, T, V> RoverController<'a, TRIG, ECHO, L, T, V>
where
    TRIG: OutputPin,
    ECHO: InputPin,
    L: DriveLines,
    T: RadioTransport,
    V: VoltageSource,
{
    /// Assemble the loop. `config` defaults when absent and is validated
    /// either way.
    pub fn new(
        ranging: RangingEngine<TRIG, ECHO>,
        channel: CommandChannel<'a, T>,
        motors: MotorActuator<L>,
        battery: V,
        config: Option<RoverConfig>,
    ) -> Result<Self, ConfigError> {
        let config = config.unwrap_or_default();
        let policy = DrivePolicy::from_config(&config)?;
        Ok(RoverController {
            ranging,
            channel,
            motors,
            battery,
            policy,
            link_timeout: config.link_timeout(),
            telemetry_period: config.telemetry_period(),
            next_telemetry: None,
            last_action: DriveAction::Stop,
            link_was_alive: true,
        })
    }

    /// Bring the sensor and motors to a known idle state.
    pub fn initialize(&mut self) -> Result<(), ActuationError<L::Error>> {
        if let Err(error) = self.ranging.initialize() {
            tracing::warn!(?error, "ultrasonic trigger init failed");
        }
        self.motors.initialize()
    }

    /// One pass of the control loop at time `now`. Never blocks.
    ///
    /// An actuation failure is fatal: the motors are released as far as the
    /// hardware allows and the error is returned.
    pub fn tick(
        &mut self,
        now: Instant,
    ) -> Result<TickReport, ActuationError<L::Error>> {
        let reading = self.ranging.poll(now);

        let link = self.channel.snapshot();
        let link_alive = freshness::is_alive(now, link.received_at, self.link_timeout);
        if link_alive != self.link_was_alive {
            if link_alive {
                tracing::info!("command link restored");
            } else {
                tracing::warn!(last_packet = ?link.received_at, "command link lost, stopping");
            }
            self.link_was_alive = link_alive;
        }

        let action = self
            .policy
            .decide_with_range(link.command, link_alive, self.ranging.latest());

        if let Err(err) = self.motors.apply(action) {
            tracing::error!(line = ?err.line, error = ?err.error, ?action, "actuation failed");
            let _ = self.motors.stop();
            self.last_action = DriveAction::Stop;
            return Err(err);
        }
        if !action.same_kind(&self.last_action) {
            tracing::info!(?action, "drive action changed");
        }
        self.last_action = action;

        let telemetry = if self.telemetry_due(now) {
            self.send_telemetry()
        } else {
            None
        };

        Ok(TickReport {
            action,
            link_alive,
            reading,
            telemetry,
        })
    }

    fn telemetry_due(
        &mut self,
        now: Instant,
    ) -> bool {
        match self.next_telemetry {
            Some(at) if now < at => false,
            _ => {
                self.next_telemetry = Some(now + self.telemetry_period);
                true
            }
        }
    }

    fn send_telemetry(&mut self) -> Option<Telemetry> {
        let telemetry = Telemetry {
            voltage: self.battery.read_volts(),
            distance: self.ranging.latest().as_cm(),
        };
        match self.channel.send_telemetry(telemetry) {
            Ok(()) => Some(telemetry),
            Err(SendError::Transport(error)) => {
                tracing::warn!(?error, "telemetry send failed");
                None
            }
        }
    }

    /// Run the loop forever, yielding to the executor between iterations so
    /// other tasks (video, network) interleave with it.
    pub async fn run(&mut self) -> ActuationError<L::Error> {
        loop {
            if let Err(err) = self.tick(Instant::now()) {
                return err;
            }
            embassy_futures::yield_now().await;
        }
    }

    pub fn channel(&self) -> &CommandChannel<'a, T> {
        &self.channel
    }

    pub fn motors(&self) -> &MotorActuator<L> {
        &self.motors
    }

    pub fn ranging(&self) -> &RangingEngine<TRIG, ECHO> {
        &self.ranging
    }

    pub fn last_action(&self) -> DriveAction {
        self.last_action
    }
}
