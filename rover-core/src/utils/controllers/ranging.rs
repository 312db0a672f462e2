//! Non-blocking ultrasonic ranging (HC-SR04 style trigger/echo sensor).
//!
//! A blocking pulse measurement would hold the CPU for up to tens of
//! milliseconds, stalling video and command handling that share the loop.
//! Instead the measurement is a four-state machine advanced by [`poll`], one
//! cheap step per call, with a hard timeout on each echo edge.
//!
//! The transition logic lives in [`RangingState::step`], a pure function of
//! the current state, the clock and the echo level, so every transition can be
//! tested without hardware. [`RangingEngine`] wires it to real pins.
//!
//! [`poll`]: RangingEngine::poll

use embassy_time::Instant;
use embedded_hal::digital::{InputPin, OutputPin};

/// Minimum trigger pulse width (µs).
pub const TRIGGER_PULSE_US: u64 = 10;
/// Give up on an echo edge after this long (µs).
pub const ECHO_TIMEOUT_US: u64 = 30_000;
/// Readings are clamped to the sensor's rated range (cm).
pub const MAX_DISTANCE_CM: u16 = 400;

/// Outcome of one completed measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceReading {
    /// Measured distance, `0..=400` cm.
    Range(u16),
    /// The echo never ended; nothing within range.
    OutOfRange,
}

impl DistanceReading {
    /// Distance as reported in telemetry; out of range is `999`.
    pub fn as_cm(&self) -> i32 {
        match *self {
            DistanceReading::Range(cm) => cm as i32,
            DistanceReading::OutOfRange => crate::utils::connection::packets::DISTANCE_OUT_OF_RANGE,
        }
    }
}

/// Round-trip echo time to distance: `(t * 0.034 cm/µs) / 2`, truncated.
pub fn echo_to_distance(duration_us: u64) -> DistanceReading {
    let cm = duration_us.saturating_mul(34) / 2000;
    DistanceReading::Range(cm.min(MAX_DISTANCE_CM as u64) as u16)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangingState {
    Idle,
    /// Trigger asserted at `since` (µs).
    TriggerHigh { since: u64 },
    /// Trigger pulse sent at `triggered_at`; waiting for the echo to rise.
    WaitEchoStart { triggered_at: u64 },
    /// Echo rose at `echo_at`; waiting for it to fall.
    WaitEchoEnd { echo_at: u64 },
}

/// What the machine sees on one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangingInput {
    pub now_us: u64,
    /// Echo line level; only meaningful while waiting for an edge.
    pub echo_high: bool,
}

/// Side effects requested by one transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RangingStep {
    /// New trigger level to drive, if it changes.
    pub trigger: Option<bool>,
    pub reading: Option<DistanceReading>,
}

impl RangingState {
    /// Whether this state needs the echo level sampled.
    pub fn samples_echo(&self) -> bool {
        matches!(
            self,
            RangingState::WaitEchoStart { .. } | RangingState::WaitEchoEnd { .. }
        )
    }

    /// Echo level that means "no edge yet" in this state. A failed echo read
    /// is treated as this level so the timeouts still run.
    pub fn no_edge_level(&self) -> bool {
        matches!(self, RangingState::WaitEchoEnd { .. })
    }

    pub fn step(
        self,
        input: RangingInput,
    ) -> (RangingState, RangingStep) {
        let now = input.now_us;
        match self {
            RangingState::Idle => (
                RangingState::TriggerHigh { since: now },
                RangingStep {
                    trigger: Some(true),
                    reading: None,
                },
            ),
            RangingState::TriggerHigh { since } => {
                if now.saturating_sub(since) >= TRIGGER_PULSE_US {
                    (
                        RangingState::WaitEchoStart { triggered_at: since },
                        RangingStep {
                            trigger: Some(false),
                            reading: None,
                        },
                    )
                } else {
                    (self, RangingStep::default())
                }
            }
            RangingState::WaitEchoStart { triggered_at } => {
                if input.echo_high {
                    (RangingState::WaitEchoEnd { echo_at: now }, RangingStep::default())
                } else if now.saturating_sub(triggered_at) > ECHO_TIMEOUT_US {
                    // sensor never answered; start over next poll
                    (RangingState::Idle, RangingStep::default())
                } else {
                    (self, RangingStep::default())
                }
            }
            RangingState::WaitEchoEnd { echo_at } => {
                let elapsed = now.saturating_sub(echo_at);
                if !input.echo_high {
                    (
                        RangingState::Idle,
                        RangingStep {
                            trigger: None,
                            reading: Some(echo_to_distance(elapsed)),
                        },
                    )
                } else if elapsed > ECHO_TIMEOUT_US {
                    (
                        RangingState::Idle,
                        RangingStep {
                            trigger: None,
                            reading: Some(DistanceReading::OutOfRange),
                        },
                    )
                } else {
                    (self, RangingStep::default())
                }
            }
        }
    }
}

/// Ranging sensor driver around the [`RangingState`] machine.
pub struct RangingEngine<TRIG, ECHO> {
    trigger: TRIG,
    echo: ECHO,
    state: RangingState,
    latest: DistanceReading,
}

impl<TRIG, ECHO> RangingEngine<TRIG, ECHO>
where
    TRIG: OutputPin,
    ECHO: InputPin,
{
    pub fn new(
        trigger: TRIG,
        echo: ECHO,
    ) -> Self {
        RangingEngine {
            trigger,
            echo,
            state: RangingState::Idle,
            latest: DistanceReading::OutOfRange,
        }
    }

    /// Drive the trigger low and reset the machine.
    pub fn initialize(&mut self) -> Result<(), TRIG::Error> {
        self.state = RangingState::Idle;
        self.trigger.set_low()?;
        tracing::info!("ultrasonic sensor initialized (non-blocking)");
        Ok(())
    }

    /// Advance one step. Returns a reading when a measurement completes.
    pub fn poll(
        &mut self,
        now: Instant,
    ) -> Option<DistanceReading> {
        let echo_high = if self.state.samples_echo() {
            match self.echo.is_high() {
                Ok(level) => level,
                Err(error) => {
                    tracing::warn!(?error, state = ?self.state, "echo read failed");
                    self.state.no_edge_level()
                }
            }
        } else {
            false
        };

        let input = RangingInput {
            now_us: now.as_micros(),
            echo_high,
        };
        let (next, step) = self.state.step(input);

        if let Some(high) = step.trigger {
            let res = if high {
                self.trigger.set_high()
            } else {
                self.trigger.set_low()
            };
            if let Err(error) = res {
                tracing::warn!(?error, "trigger write failed, restarting measurement");
                if let Err(error) = self.trigger.set_low() {
                    tracing::warn!(?error, "trigger still not writable, leaving it to the next cycle");
                }
                self.state = RangingState::Idle;
                return None;
            }
        }

        self.state = next;
        if let Some(reading) = step.reading {
            self.latest = reading;
        }
        step.reading
    }

    pub fn state(&self) -> RangingState {
        self.state
    }

    /// Most recent completed reading; out of range until the first one.
    pub fn latest(&self) -> DistanceReading {
        self.latest
    }

    pub fn release(self) -> (TRIG, ECHO) {
        (self.trigger, self.echo)
    }
}
