//! Per-key debounce state.
//!
//! Each key counts consecutive raw reads that disagree with its debounced state. A read
//! that agrees resets the count, so contact bounce never accumulates across stable periods.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A committed change of a key's debounced state.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The key became pressed. The click latch was set.
    Pressed,
    /// The key was released.
    Released,
}

/// Debounce state of a single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ButtonState {
    pressed: bool,
    click_pending: bool,
    confirm_count: u8,
}

impl ButtonState {
    /// A released key with no pending click.
    pub const fn new() -> Self {
        Self {
            pressed: false,
            click_pending: false,
            confirm_count: 0,
        }
    }

    /// Feed one raw read into the debouncer.
    ///
    /// # Arguments
    ///
    /// * `closed`: Whether the raw read says the key contact is closed.
    /// * `threshold`: Consecutive contrary reads needed to commit a change. `0` acts as `1`.
    ///
    /// # Returns
    ///
    /// The committed transition, if this read completed one.
    pub fn update(&mut self, closed: bool, threshold: u8) -> Option<Transition> {
        if closed == self.pressed {
            self.confirm_count = 0;
            return None;
        }

        self.confirm_count = self.confirm_count.saturating_add(1);
        if self.confirm_count < threshold {
            return None;
        }

        self.pressed = !self.pressed;
        self.confirm_count = 0;
        if self.pressed {
            self.click_pending = true;
            Some(Transition::Pressed)
        } else {
            Some(Transition::Released)
        }
    }

    /// Debounced pressed flag.
    #[inline]
    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    /// Whether a press edge happened since the click was last taken. Does not clear it.
    #[inline]
    pub fn click_pending(&self) -> bool {
        self.click_pending
    }

    /// Consecutive contrary reads seen so far.
    #[inline]
    pub fn confirm_count(&self) -> u8 {
        self.confirm_count
    }

    /// Return the click latch and clear it.
    #[inline]
    pub fn take_click(&mut self) -> bool {
        core::mem::take(&mut self.click_pending)
    }
}
