//! This module defines the error type used by the `shaker-motor` crate.

use embedded_hal::{digital, pwm};
use thiserror::Error;

/// Error type for motor driver operations.
///
/// Speeds are never rejected, so the only failures are the ones reported by the
/// underlying HAL while driving a bridge input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MotorError {
    /// A static output level could not be applied.
    #[error("output line error: {0:?}")]
    Output(digital::ErrorKind),
    /// A PWM duty cycle could not be applied.
    #[error("pwm channel error: {0:?}")]
    Pwm(pwm::ErrorKind),
}

impl MotorError {
    pub(crate) fn output<E: digital::Error>(err: E) -> Self {
        MotorError::Output(digital::Error::kind(&err))
    }

    pub(crate) fn pwm<E: pwm::Error>(err: E) -> Self {
        MotorError::Pwm(pwm::Error::kind(&err))
    }
}
