//! Concrete bridge drivers.

pub mod drv8833;
