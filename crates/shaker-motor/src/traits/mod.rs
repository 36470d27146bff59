//! Driver-independent motor interfaces.

pub mod motor;
