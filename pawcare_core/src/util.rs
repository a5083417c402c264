//! Sample-period and rounding helpers.

/// Number of milliseconds in one second.
pub const MILLIS_PER_SEC: u64 = 1_000;

/// Compute the period in milliseconds for a given sampling rate in Hz.
/// - Clamps `hz` to at least 1 to avoid division by zero.
/// - Ensures result is at least 1 millisecond.
#[inline]
pub fn period_ms(hz: u32) -> u64 {
    (MILLIS_PER_SEC / u64::from(hz.max(1))).max(1)
}

/// Round to one decimal place, the precision every published payload uses.
#[inline]
pub fn round1(x: f32) -> f32 {
    (x * 10.0).round() / 10.0
}

/// Round to two decimal places.
#[inline]
pub fn round2(x: f32) -> f32 {
    (x * 100.0).round() / 100.0
}
