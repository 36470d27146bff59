//! Front panel key map and the actions it drives.

use std::fmt;

use shaker_keypad::KeyPosition;
use shaker_motor::{DecayMode, MotorControl};
use tracing::{debug, info};

/// Setpoints bound to the third keypad row, left to right.
pub const PRESETS: [u8; 4] = [25, 50, 75, 100];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelAction {
    SpeedUp,
    SpeedDown,
    Invert,
    Halt,
    Forward,
    Backward,
    SlowDecay,
    FastDecay,
    Preset(u8),
    Lock,
}

impl fmt::Display for PanelAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PanelAction::SpeedUp => write!(f, "speed up"),
            PanelAction::SpeedDown => write!(f, "speed down"),
            PanelAction::Invert => write!(f, "invert"),
            PanelAction::Halt => write!(f, "halt"),
            PanelAction::Forward => write!(f, "forward"),
            PanelAction::Backward => write!(f, "backward"),
            PanelAction::SlowDecay => write!(f, "slow decay"),
            PanelAction::FastDecay => write!(f, "fast decay"),
            PanelAction::Preset(speed) => write!(f, "preset {}%", speed),
            PanelAction::Lock => write!(f, "lock"),
        }
    }
}

/// Action bound to a key, `None` for keys with no function.
pub fn action_for(key: KeyPosition) -> Option<PanelAction> {
    let action = match (key.row, key.col) {
        (0, 0) => PanelAction::SpeedUp,
        (0, 1) => PanelAction::SpeedDown,
        (0, 2) => PanelAction::Invert,
        (0, 3) => PanelAction::Halt,
        (1, 0) => PanelAction::Forward,
        (1, 1) => PanelAction::Backward,
        (1, 2) => PanelAction::SlowDecay,
        (1, 3) => PanelAction::FastDecay,
        (2, col) if col < PRESETS.len() => PanelAction::Preset(PRESETS[col]),
        (3, 0) => PanelAction::Lock,
        _ => return None,
    };
    Some(action)
}

/// What the loop has to do after an action was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    LockRequested,
}

/// Speed setpoint held by the panel between key presses.
#[derive(Debug, Clone)]
pub struct Panel {
    setpoint: u8,
    step: u8,
}

impl Panel {
    pub fn new(step: u8) -> Self {
        Self {
            setpoint: 0,
            step: step.clamp(1, 100),
        }
    }

    pub fn setpoint(&self) -> u8 {
        self.setpoint
    }

    pub fn apply<M: MotorControl>(
        &mut self,
        action: PanelAction,
        motor: &mut M,
    ) -> Result<Outcome, M::Error> {
        info!(action = %action, setpoint = self.setpoint, "panel key");
        match action {
            PanelAction::SpeedUp => {
                self.setpoint = self.setpoint.saturating_add(self.step).min(100);
                motor.set_speed(self.setpoint)?;
            }
            PanelAction::SpeedDown => {
                self.setpoint = self.setpoint.saturating_sub(self.step);
                motor.set_speed(self.setpoint)?;
            }
            PanelAction::Invert => motor.invert_direction()?,
            PanelAction::Halt => motor.halt()?,
            PanelAction::Forward => motor.forward(self.setpoint)?,
            PanelAction::Backward => motor.backward(self.setpoint)?,
            PanelAction::SlowDecay => self.change_decay(motor, DecayMode::SlowDecay)?,
            PanelAction::FastDecay => self.change_decay(motor, DecayMode::FastDecay)?,
            PanelAction::Preset(speed) => {
                self.setpoint = speed.min(100);
                motor.set_speed(self.setpoint)?;
            }
            PanelAction::Lock => return Ok(Outcome::LockRequested),
        }
        Ok(Outcome::Applied)
    }

    fn change_decay<M: MotorControl>(&self, motor: &mut M, decay: DecayMode) -> Result<(), M::Error> {
        motor.set_decay(decay);
        let state = motor.state();
        if !state.halted && state.commanded_speed > 0 {
            debug!(decay = %decay, "re-driving with new decay");
            motor.set_speed(state.commanded_speed)?;
        }
        Ok(())
    }
}
