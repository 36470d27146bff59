//! DRV8833 dual H-bridge driver.
//!
//! One motor is driven through the bridge inputs IN1/IN2. Depending on direction and decay
//! mode, one input carries a static level and the other carries the PWM signal:
//!
//! | direction | decay | IN1         | IN2         |
//! |-----------|-------|-------------|-------------|
//! | forward   | slow  | high        | PWM         |
//! | forward   | fast  | PWM         | low         |
//! | backward  | slow  | PWM         | high        |
//! | backward  | fast  | low         | PWM         |
//!
//! A bridge input type must accept both kinds of command, and the most recent command on
//! an input wins (a static level stops the PWM output on that pin and vice versa).

use core::convert::Infallible;

use embedded_hal::digital::{self, OutputPin};
use embedded_hal::pwm::SetDutyCycle;
use tracing::{debug, trace};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::MotorError;
use crate::speed::{DEFAULT_SPEED_THRESHOLD, DUTY_RESOLUTION, normalize};
use crate::traits::motor::{MotorControl, MotorState};
use crate::{DecayMode, Direction};

/// Placeholder for a sleep line that is not wired.
///
/// Used as the sleep pin type by [`Drv8833::new`]; the driver never calls into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Unbound;

impl digital::ErrorType for Unbound {
    type Error = Infallible;
}

impl OutputPin for Unbound {
    fn set_low(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

/// Static driver parameters.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Drv8833Config {
    /// Low-end floor in percent below which the motor stalls.
    pub speed_threshold: u8,
    /// Decay mode in effect after construction.
    pub decay: DecayMode,
}

impl Default for Drv8833Config {
    fn default() -> Self {
        Self {
            speed_threshold: DEFAULT_SPEED_THRESHOLD,
            decay: DecayMode::SlowDecay,
        }
    }
}

/// DRV8833 driver bound to two bridge inputs and an optional sleep line.
///
/// The driver owns its pins. Nothing is written to the hardware until [`Drv8833::init`] or
/// the first drive command.
pub struct Drv8833<A, B, S = Unbound>
where
    A: OutputPin + SetDutyCycle,
    B: OutputPin + SetDutyCycle,
    S: OutputPin,
{
    in1: A,
    in2: B,
    sleep: Option<S>,
    speed_threshold: u8,
    decay: DecayMode,
    direction: Direction,
    commanded_speed: u8,
    normalized_speed: u16,
    awake: bool,
    halted: bool,
}

impl<A, B> Drv8833<A, B, Unbound>
where
    A: OutputPin + SetDutyCycle,
    B: OutputPin + SetDutyCycle,
{
    /// Create a driver whose sleep line is tied high in hardware.
    pub fn new(in1: A, in2: B, config: Drv8833Config) -> Self {
        Self::build(in1, in2, None, config)
    }
}

impl<A, B, S> Drv8833<A, B, S>
where
    A: OutputPin + SetDutyCycle,
    B: OutputPin + SetDutyCycle,
    S: OutputPin,
{
    /// Create a driver that also controls the nSLEEP (EEP) line.
    pub fn with_sleep(in1: A, in2: B, sleep: S, config: Drv8833Config) -> Self {
        Self::build(in1, in2, Some(sleep), config)
    }

    fn build(in1: A, in2: B, sleep: Option<S>, config: Drv8833Config) -> Self {
        let awake = sleep.is_none();
        Self {
            in1,
            in2,
            sleep,
            speed_threshold: config.speed_threshold,
            decay: config.decay,
            direction: Direction::Forward,
            commanded_speed: 0,
            normalized_speed: 0,
            awake,
            halted: true,
        }
    }

    /// Bring the bridge up: wake it and force both inputs off.
    pub fn init(&mut self) -> Result<(), MotorError> {
        self.wake()?;
        self.halt()
    }

    /// Drive the sleep line high. Does nothing when no sleep line is bound.
    pub fn wake(&mut self) -> Result<(), MotorError> {
        if let Some(ref mut pin) = self.sleep {
            pin.set_high().map_err(MotorError::output)?;
            self.awake = true;
            debug!("bridge awake");
        }
        Ok(())
    }

    /// Drive the sleep line low. Does nothing when no sleep line is bound.
    pub fn sleep(&mut self) -> Result<(), MotorError> {
        if let Some(ref mut pin) = self.sleep {
            pin.set_low().map_err(MotorError::output)?;
            self.awake = false;
            debug!("bridge asleep");
        }
        Ok(())
    }

    /// Select slow decay for the next drive command.
    pub fn set_slow_decay(&mut self) {
        self.set_decay(DecayMode::SlowDecay);
    }

    /// Select fast decay for the next drive command.
    pub fn set_fast_decay(&mut self) {
        self.set_decay(DecayMode::FastDecay);
    }

    /// Low-end floor this driver clamps to.
    #[inline]
    pub fn speed_threshold(&self) -> u8 {
        self.speed_threshold
    }

    /// Borrow the two bridge inputs.
    #[inline]
    pub fn channels(&self) -> (&A, &B) {
        (&self.in1, &self.in2)
    }

    /// Release the owned pins.
    pub fn release(self) -> (A, B, Option<S>) {
        (self.in1, self.in2, self.sleep)
    }

    /// Emit the drive pattern. The stored command only changes once both inputs have been
    /// written, so after an error `state()` still describes the last complete command.
    fn drive(&mut self, direction: Direction, speed_percent: u8) -> Result<(), MotorError> {
        let duty = normalize(speed_percent, self.speed_threshold);
        match (direction, self.decay) {
            (Direction::Forward, DecayMode::SlowDecay) => {
                set_level(&mut self.in1, true)?;
                set_duty(&mut self.in2, duty)?;
            }
            (Direction::Forward, DecayMode::FastDecay) => {
                set_duty(&mut self.in1, duty)?;
                set_level(&mut self.in2, false)?;
            }
            (Direction::Backward, DecayMode::SlowDecay) => {
                set_duty(&mut self.in1, duty)?;
                set_level(&mut self.in2, true)?;
            }
            (Direction::Backward, DecayMode::FastDecay) => {
                set_level(&mut self.in1, false)?;
                set_duty(&mut self.in2, duty)?;
            }
        }
        self.commanded_speed = speed_percent;
        self.normalized_speed = duty;
        self.direction = direction;
        self.halted = false;

        trace!(
            direction = %direction,
            decay = %self.decay,
            commanded = speed_percent,
            duty,
            "drive pattern emitted"
        );
        Ok(())
    }
}

impl<A, B, S> MotorControl for Drv8833<A, B, S>
where
    A: OutputPin + SetDutyCycle,
    B: OutputPin + SetDutyCycle,
    S: OutputPin,
{
    type Error = MotorError;

    fn forward(&mut self, speed_percent: u8) -> Result<(), Self::Error> {
        self.drive(Direction::Forward, speed_percent)
    }

    fn backward(&mut self, speed_percent: u8) -> Result<(), Self::Error> {
        self.drive(Direction::Backward, speed_percent)
    }

    fn set_speed(&mut self, speed_percent: u8) -> Result<(), Self::Error> {
        self.drive(self.direction, speed_percent)
    }

    fn invert_direction(&mut self) -> Result<(), Self::Error> {
        if self.commanded_speed == 0 {
            return Ok(());
        }
        self.drive(self.direction.inverted(), self.commanded_speed)
    }

    fn halt(&mut self) -> Result<(), Self::Error> {
        self.in1
            .set_duty_cycle_fully_off()
            .map_err(MotorError::pwm)?;
        self.in2
            .set_duty_cycle_fully_off()
            .map_err(MotorError::pwm)?;
        self.halted = true;
        debug!("motor halted");
        Ok(())
    }

    fn set_decay(&mut self, decay: DecayMode) {
        if self.decay != decay {
            debug!(decay = %decay, "decay mode changed");
        }
        self.decay = decay;
    }

    fn state(&self) -> MotorState {
        MotorState {
            awake: self.awake,
            halted: self.halted,
            direction: self.direction,
            decay: self.decay,
            commanded_speed: self.commanded_speed,
            normalized_speed: self.normalized_speed,
        }
    }
}

fn set_level<P: OutputPin>(pin: &mut P, high: bool) -> Result<(), MotorError> {
    let result = if high { pin.set_high() } else { pin.set_low() };
    result.map_err(MotorError::output)
}

fn set_duty<P: SetDutyCycle>(pin: &mut P, duty: u16) -> Result<(), MotorError> {
    pin.set_duty_cycle_fraction(duty, DUTY_RESOLUTION)
        .map_err(MotorError::pwm)
}
