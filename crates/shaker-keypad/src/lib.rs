#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![doc = "A `no_std` scanner for 4×4 matrix keypads."]
#![doc = ""]
#![doc = "[`MatrixKeypad`] strobes one column per [`MatrixKeypad::scan_step`] call, reads every row"]
#![doc = "on that column and runs a confirmation-counter debounce per key. Each key exposes a"]
#![doc = "debounced *pressed* flag and a *click* latch that is set on the press edge and stays set"]
#![doc = "until the caller consumes it with [`MatrixKeypad::take_click`] or"]
#![doc = "[`MatrixKeypad::take_clicks`]."]
#![doc = ""]
#![doc = "The caller owns the loop. `scan_step` must run often enough that `4 × threshold` steps"]
#![doc = "fit inside the contact-bounce settle time you are willing to wait for; at 1 ms per step"]
#![doc = "and a threshold of 6 a press is confirmed within about 24 ms."]

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod button;
pub mod error;
pub mod scanner;

pub use button::{ButtonState, Transition};
pub use error::KeypadError;
pub use scanner::{KeypadConfig, MatrixKeypad};

/// Number of matrix rows (input lines).
pub const ROWS: usize = 4;
/// Number of matrix columns (strobed output lines).
pub const COLS: usize = 4;
/// Number of keys in the matrix.
pub const KEYS: usize = ROWS * COLS;

/// Default number of consecutive contrary reads needed to accept a key change.
pub const DEFAULT_CONFIRMATION_THRESHOLD: u8 = 6;

/// Electrical sense of the matrix.
///
/// With `ActiveHigh` the live column is driven high and a closed key reads high on its
/// row. With `ActiveLow` the live column is pulled low and a closed key reads low, which
/// suits rows with pull-up resistors.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Polarity {
    /// Live column high, closed key reads high.
    #[default]
    ActiveHigh,
    /// Live column low, closed key reads low.
    ActiveLow,
}

impl Polarity {
    /// Output level (`true` = high) for a column that is live or idle.
    #[inline]
    pub const fn column_level(self, live: bool) -> bool {
        match self {
            Polarity::ActiveHigh => live,
            Polarity::ActiveLow => !live,
        }
    }

    /// Whether a raw row level (`true` = high) means the key is closed.
    #[inline]
    pub const fn is_closed(self, level_high: bool) -> bool {
        match self {
            Polarity::ActiveHigh => level_high,
            Polarity::ActiveLow => !level_high,
        }
    }
}

/// Row/column coordinates of a key.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyPosition {
    /// Row index, `0..ROWS`.
    pub row: usize,
    /// Column index, `0..COLS`.
    pub col: usize,
}

impl KeyPosition {
    /// Construct a key position.
    pub const fn new(row: usize, col: usize) -> Self {
        KeyPosition { row, col }
    }

    /// Whether the position lies inside the matrix.
    pub const fn in_range(&self) -> bool {
        self.row < ROWS && self.col < COLS
    }
}

impl fmt::Display for KeyPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(r{}, c{})", self.row, self.col)
    }
}
