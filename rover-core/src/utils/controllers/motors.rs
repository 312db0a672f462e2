//! Differential drive outputs.
//!
//! Two DC motors behind an H-bridge, four PWM lines: a forward and a backward
//! line per side. The bridge can be fed from MCU PWM pins ([`PwmDriveLines`])
//! or from a PCA9685 expander on I2C ([`Pca9685DriveLines`]).

use embedded_hal::{i2c::I2c, pwm::SetDutyCycle};
use pwm_pca9685::{Channel, Error as PwmError, Pca9685};

use crate::utils::policy::drive::{DriveAction, Speed};

/// The four drive lines, in wiring order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorLine {
    LeftForward,
    LeftBackward,
    RightForward,
    RightBackward,
}

impl MotorLine {
    pub const ALL: [MotorLine; 4] = [
        MotorLine::LeftForward,
        MotorLine::LeftBackward,
        MotorLine::RightForward,
        MotorLine::RightBackward,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Anything that can put a duty cycle (percent, 0 = off) on each drive line.
pub trait DriveLines {
    type Error: core::fmt::Debug;

    fn set_line(
        &mut self,
        line: MotorLine,
        percent: Speed,
    ) -> Result<(), Self::Error>;
}

/// A drive line failed to take its new duty cycle.
#[derive(Debug)]
pub struct ActuationError<E: core::fmt::Debug> {
    pub line: MotorLine,
    pub error: E,
}

/// Per-line duty (percent) for `action`, indexed by [`MotorLine::index`].
pub fn line_duties(action: DriveAction) -> [Speed; 4] {
    match action {
        DriveAction::Forward(s) => [s, 0, s, 0],
        DriveAction::Backward(s) => [0, s, 0, s],
        // spin in place: left wheels back, right wheels forward
        DriveAction::TurnLeft(s) => [0, s, s, 0],
        DriveAction::TurnRight(s) => [s, 0, 0, s],
        DriveAction::Stop => [0; 4],
    }
}

/// Four MCU PWM channels, one per line.
pub struct PwmDriveLines<P> {
    lines: [P; 4],
}

impl<P> PwmDriveLines<P>
where
    P: SetDutyCycle,
{
    /// `lines` in [`MotorLine::ALL`] order.
    pub fn new(lines: [P; 4]) -> Self {
        Self { lines }
    }

    pub fn release(self) -> [P; 4] {
        self.lines
    }
}

impl<P> DriveLines for PwmDriveLines<P>
where
    P: SetDutyCycle,
{
    type Error = P::Error;

    fn set_line(
        &mut self,
        line: MotorLine,
        percent: Speed,
    ) -> Result<(), Self::Error> {
        let pin = &mut self.lines[line.index()];
        if percent == 0 {
            pin.set_duty_cycle_fully_off()
        } else {
            pin.set_duty_cycle_percent(percent.min(100))
        }
    }
}

/// Drive lines on a PCA9685 PWM expander.
pub struct Pca9685DriveLines<I2C> {
    pub pwm: Pca9685<I2C>,
    channels: [Channel; 4],
}

impl<I2C, E> Pca9685DriveLines<I2C>
where
    I2C: I2c<Error = E>,
    E: core::fmt::Debug,
{
    const MAX_DUTY: u16 = 4095;

    /// `channels` in [`MotorLine::ALL`] order.
    pub fn new(
        pwm: Pca9685<I2C>,
        channels: [Channel; 4],
    ) -> Self {
        Self { pwm, channels }
    }

    /// Enable the expander outputs and set the PWM prescale.
    pub fn configure(
        &mut self,
        prescale: u8,
    ) -> Result<(), PwmError<E>> {
        self.pwm.enable()?;
        self.pwm.set_prescale(prescale)?;
        tracing::info!(prescale, "motor PWM expander enabled");
        Ok(())
    }
}

impl<I2C, E> DriveLines for Pca9685DriveLines<I2C>
where
    I2C: I2c<Error = E>,
    E: core::fmt::Debug,
{
    type Error = PwmError<E>;

    fn set_line(
        &mut self,
        line: MotorLine,
        percent: Speed,
    ) -> Result<(), Self::Error> {
        let off = (percent.min(100) as u32 * Self::MAX_DUTY as u32 / 100) as u16;
        self.pwm.set_channel_on_off(self.channels[line.index()], 0, off)
    }
}

/// Applies drive actions to the motor lines.
pub struct MotorActuator<L> {
    lines: L,
    applied: Option<DriveAction>,
}

impl<L> MotorActuator<L>
where
    L: DriveLines,
{
    pub fn new(lines: L) -> Self {
        Self {
            lines,
            applied: None,
        }
    }

    /// Put the motors in a known stopped state.
    pub fn initialize(&mut self) -> Result<(), ActuationError<L::Error>> {
        self.stop()?;
        tracing::info!("motor driver ready");
        Ok(())
    }

    /// Drive all four lines for `action`.
    ///
    /// Lines being switched off are written before lines being switched on,
    /// so one motor never has both directions energised.
    pub fn apply(
        &mut self,
        action: DriveAction,
    ) -> Result<(), ActuationError<L::Error>> {
        if action == DriveAction::Stop {
            return self.stop();
        }

        self.applied = None;
        let duties = line_duties(action);
        let off = MotorLine::ALL.into_iter().filter(|l| duties[l.index()] == 0);
        let on = MotorLine::ALL.into_iter().filter(|l| duties[l.index()] != 0);
        for line in off.chain(on) {
            self.lines
                .set_line(line, duties[line.index()])
                .map_err(|error| ActuationError { line, error })?;
        }
        self.applied = Some(action);
        tracing::trace!(?action, "drive applied");
        Ok(())
    }

    /// De-energise every line. Every line is attempted even if an earlier
    /// one fails; the first failure is returned.
    pub fn stop(&mut self) -> Result<(), ActuationError<L::Error>> {
        self.applied = None;
        let mut first_err = None;
        for line in MotorLine::ALL {
            if let Err(error) = self.lines.set_line(line, 0) {
                tracing::error!(?line, ?error, "failed to release drive line");
                first_err.get_or_insert(ActuationError { line, error });
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => {
                self.applied = Some(DriveAction::Stop);
                Ok(())
            }
        }
    }

    /// Last action that reached every line, `None` after a failure.
    pub fn applied(&self) -> Option<DriveAction> {
        self.applied
    }

    pub fn lines(&self) -> &L {
        &self.lines
    }

    pub fn lines_mut(&mut self) -> &mut L {
        &mut self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duty_table() {
        assert_eq!(line_duties(DriveAction::Forward(40)), [40, 0, 40, 0]);
        assert_eq!(line_duties(DriveAction::Backward(40)), [0, 40, 0, 40]);
        assert_eq!(line_duties(DriveAction::TurnLeft(40)), [0, 40, 40, 0]);
        assert_eq!(line_duties(DriveAction::TurnRight(40)), [40, 0, 0, 40]);
        assert_eq!(line_duties(DriveAction::Stop), [0, 0, 0, 0]);
    }

    #[test]
    fn no_line_pair_is_energised_together() {
        for action in [
            DriveAction::Forward(100),
            DriveAction::Backward(100),
            DriveAction::TurnLeft(100),
            DriveAction::TurnRight(100),
        ] {
            let d = line_duties(action);
            assert!(d[0] == 0 || d[1] == 0, "{action:?}");
            assert!(d[2] == 0 || d[3] == 0, "{action:?}");
        }
    }
}
