use crate::{DecayMode, Direction};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Snapshot of a motor driver's commanded state.
///
/// This structure mirrors what the driver last emitted, so callers can report or compare
/// the drive state without touching the hardware.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MotorState {
    /// Whether the bridge is awake (sleep line high, or no sleep line bound).
    pub awake: bool,
    /// Whether the outputs are currently forced off by a halt.
    pub halted: bool,
    /// Last commanded direction.
    pub direction: Direction,
    /// Decay mode used by the next drive command.
    pub decay: DecayMode,
    /// Last raw speed request in percent, as given by the caller.
    pub commanded_speed: u8,
    /// Duty units derived from `commanded_speed`, in `0..=DUTY_RESOLUTION`.
    pub normalized_speed: u16,
}

/// Core trait defining the interface for percent-speed motor control
pub trait MotorControl {
    /// Error reported by the underlying hardware.
    type Error;

    /// Drive forward at `speed_percent`.
    fn forward(&mut self, speed_percent: u8) -> Result<(), Self::Error>;

    /// Drive backward at `speed_percent`.
    fn backward(&mut self, speed_percent: u8) -> Result<(), Self::Error>;

    /// Change the speed, keeping the direction currently in effect.
    fn set_speed(&mut self, speed_percent: u8) -> Result<(), Self::Error>;

    /// Re-issue the last speed in the opposite direction. Does nothing while stopped.
    fn invert_direction(&mut self) -> Result<(), Self::Error>;

    /// Force both outputs to zero duty without forgetting direction or speed.
    fn halt(&mut self) -> Result<(), Self::Error>;

    /// Select the decay mode used by the next drive command.
    fn set_decay(&mut self, decay: DecayMode);

    /// Get the current state of the motor
    fn state(&self) -> MotorState;
}
