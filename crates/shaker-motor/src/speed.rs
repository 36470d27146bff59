//! Speed normalization.
//!
//! Maps a commanded percent speed onto duty units. The mapping is pure: it depends only on
//! the commanded value and the low-end threshold below which the motor does not turn.

/// Default low-end floor, in percent. Below this the shaker motor stalls.
pub const DEFAULT_SPEED_THRESHOLD: u8 = 10;

/// Full-scale duty value. Duty units are applied as a fraction of this value, so the
/// mapping does not depend on the timer's own resolution.
pub const DUTY_RESOLUTION: u16 = 1023;

/// Upper bound of a commanded speed, in percent.
pub const MAX_SPEED_PERCENT: u8 = 100;

/// Clamp a commanded speed into `[threshold, 100]`, keeping `0` as an explicit stop.
///
/// A threshold above 100 is treated as 100.
pub const fn clamp_percent(speed_percent: u8, threshold: u8) -> u8 {
    if speed_percent == 0 {
        return 0;
    }

    let floor = if threshold > MAX_SPEED_PERCENT {
        MAX_SPEED_PERCENT
    } else {
        threshold
    };

    if speed_percent > MAX_SPEED_PERCENT {
        MAX_SPEED_PERCENT
    } else if speed_percent < floor {
        floor
    } else {
        speed_percent
    }
}

/// Convert a commanded speed to duty units in `0..=DUTY_RESOLUTION`.
///
/// # Arguments
///
/// * `speed_percent`: Requested speed in percent. Values above 100 are clamped to 100.
/// * `threshold`: Low-end floor in percent. Non-zero requests below it are raised to it.
///
/// # Returns
///
/// `0` for a zero request, otherwise `clamped * DUTY_RESOLUTION / 100`. The result is
/// monotonic in `speed_percent` and never inverted.
pub const fn normalize(speed_percent: u8, threshold: u8) -> u16 {
    let clamped = clamp_percent(speed_percent, threshold) as u32;
    (clamped * DUTY_RESOLUTION as u32 / MAX_SPEED_PERCENT as u32) as u16
}
