#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![doc = "A `no_std` driver for DRV8833-style dual H-bridge motor controllers."]
#![doc = ""]
#![doc = "The driver owns the two bridge inputs (each usable both as a static output and as a"]
#![doc = "PWM channel) and an optional sleep/enable line. A commanded percent speed is clamped"]
#![doc = "to a low-end floor, mapped to duty units, and emitted as the decay-mode dependent"]
#![doc = "pattern described on [`devices::drv8833::Drv8833`]."]

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod devices;
pub mod error;
pub mod speed;
pub mod traits;

pub use devices::drv8833::{Drv8833, Drv8833Config};
pub use error::MotorError;
pub use speed::{DEFAULT_SPEED_THRESHOLD, DUTY_RESOLUTION, normalize};
pub use traits::motor::{MotorControl, MotorState};

/// Rotation direction of the motor shaft.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Forward rotation.
    #[default]
    Forward,
    /// Backward rotation.
    Backward,
}

impl Direction {
    /// Returns the opposite direction.
    pub const fn inverted(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => write!(f, "forward"),
            Direction::Backward => write!(f, "backward"),
        }
    }
}

/// Current decay mode of the bridge while the PWM signal is off.
///
/// In slow decay one input is held high as a direction anchor and the other is chopped,
/// so the motor brakes between pulses. In fast decay one input is held on the low rail and
/// the other is chopped, so the motor coasts between pulses.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecayMode {
    /// Slow decay (brake between pulses).
    #[default]
    SlowDecay,
    /// Fast decay (coast between pulses).
    FastDecay,
}

impl fmt::Display for DecayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecayMode::SlowDecay => write!(f, "slow decay"),
            DecayMode::FastDecay => write!(f, "fast decay"),
        }
    }
}
