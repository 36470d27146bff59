//! This module defines the error type used by the `shaker-keypad` crate.

use embedded_hal::digital;
use thiserror::Error;

/// Error type for keypad scanning.
///
/// Unbound lines and a disabled scanner are never errors. Only failures reported by the
/// HAL while strobing a column or reading a row end up here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum KeypadError {
    /// A column line could not be driven.
    #[error("column drive error: {0:?}")]
    Output(digital::ErrorKind),
    /// A row line could not be read.
    #[error("row read error: {0:?}")]
    Input(digital::ErrorKind),
}

impl KeypadError {
    pub(crate) fn output<E: digital::Error>(err: E) -> Self {
        KeypadError::Output(digital::Error::kind(&err))
    }

    pub(crate) fn input<E: digital::Error>(err: E) -> Self {
        KeypadError::Input(digital::Error::kind(&err))
    }
}
