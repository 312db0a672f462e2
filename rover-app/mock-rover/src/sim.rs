//! Simulated rover hardware for running the control core on a host.

use std::{
    cell::Cell,
    convert::Infallible,
    io::Write,
    rc::Rc,
    sync::{
        atomic::{AtomicI32, Ordering},
        Arc,
    },
};

use embedded_hal::{digital, pwm};
use rover_core::utils::{
    connection::{PeerAddress, RadioTransport},
    controllers::{MotorLine, VoltageSource},
    Instant,
};

/// Distance to the simulated obstacle in cm; negative means open space.
pub type ObstacleCm = Arc<AtomicI32>;

/// Echo starts this long after the trigger falls (µs).
const ECHO_DELAY_US: u64 = 200;

#[derive(Clone, Default)]
struct Pulse {
    fell_at: Rc<Cell<Option<Instant>>>,
    high: Rc<Cell<bool>>,
}

pub struct SimTrigger {
    pulse: Pulse,
}

pub struct SimEcho {
    pulse: Pulse,
    obstacle: ObstacleCm,
}

/// Trigger/echo pair behaving like an HC-SR04 facing `obstacle`.
pub fn ultrasonic(obstacle: ObstacleCm) -> (SimTrigger, SimEcho) {
    let pulse = Pulse::default();
    (
        SimTrigger {
            pulse: pulse.clone(),
        },
        SimEcho { pulse, obstacle },
    )
}

impl digital::ErrorType for SimTrigger {
    type Error = Infallible;
}

impl digital::OutputPin for SimTrigger {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        if self.pulse.high.replace(false) {
            self.pulse.fell_at.set(Some(Instant::now()));
        }
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.pulse.high.set(true);
        self.pulse.fell_at.set(None);
        Ok(())
    }
}

impl digital::ErrorType for SimEcho {
    type Error = Infallible;
}

impl digital::InputPin for SimEcho {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        let (Some(fell), Ok(cm)) = (
            self.pulse.fell_at.get(),
            u64::try_from(self.obstacle.load(Ordering::Relaxed)),
        ) else {
            return Ok(false);
        };
        let width_us = cm * 2000 / 34;
        let dt = Instant::now().saturating_duration_since(fell).as_micros();
        Ok(dt >= ECHO_DELAY_US && dt < ECHO_DELAY_US + width_us)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

/// PWM channel that logs duty changes.
pub struct LoggedPwm {
    line: MotorLine,
    duty: u16,
}

impl LoggedPwm {
    pub fn bank() -> [LoggedPwm; 4] {
        MotorLine::ALL.map(|line| LoggedPwm { line, duty: 0 })
    }
}

impl pwm::ErrorType for LoggedPwm {
    type Error = Infallible;
}

impl pwm::SetDutyCycle for LoggedPwm {
    fn max_duty_cycle(&self) -> u16 {
        255
    }

    fn set_duty_cycle(
        &mut self,
        duty: u16,
    ) -> Result<(), Self::Error> {
        if duty != self.duty {
            tracing::debug!(line = ?self.line, duty, "pwm");
            self.duty = duty;
        }
        Ok(())
    }
}

/// Radio that forwards telemetry to stdout as `TELE:<volts>,<cm>` lines,
/// the format the ground gateway prints on its serial port.
pub struct ConsoleRadio;

impl RadioTransport for ConsoleRadio {
    type Error = std::io::Error;

    fn add_peer(
        &mut self,
        peer: &PeerAddress,
    ) -> Result<(), Self::Error> {
        tracing::debug!(%peer, "peer registered");
        Ok(())
    }

    fn send(
        &mut self,
        _peer: &PeerAddress,
        payload: &[u8],
    ) -> Result<(), Self::Error> {
        let t = rover_core::utils::connection::Telemetry::decode(payload)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, format!("{e:?}")))?;
        let mut out = std::io::stdout().lock();
        writeln!(out, "TELE:{:.2},{}", t.voltage, t.distance)
    }
}

/// Battery that sags slowly from a full charge.
pub struct SimBattery {
    volts: f32,
    floor: f32,
}

impl SimBattery {
    pub fn new(volts: f32) -> Self {
        Self {
            volts,
            floor: volts * 0.8,
        }
    }
}

impl VoltageSource for SimBattery {
    fn read_volts(&mut self) -> f32 {
        self.volts = (self.volts - 0.001).max(self.floor);
        self.volts
    }
}
