use std::time::{Duration, Instant};

use crate::error::{HwError, Result};

/// Wait until the provided `is_high` predicate becomes false (line pulled low),
/// or a timeout expires. Sleeps in small intervals to avoid CPU spinning.
pub fn wait_until_low_with_timeout(
    mut is_high: impl FnMut() -> bool,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    while is_high() {
        if Instant::now() >= deadline {
            return Err(HwError::DataReadyTimeout);
        }
        std::thread::sleep(poll_interval);
    }
    Ok(())
}

/// Sign-extend a 24-bit two's complement value held in the low bits of an i32.
#[inline]
pub fn sign_extend_24(value: i32) -> i32 {
    if (value & 0x80_0000) != 0 {
        value | !0xFF_FFFF
    } else {
        value & 0xFF_FFFF
    }
}

/// Assemble an 18-bit MAX30102 FIFO sample from three big-endian bytes.
#[inline]
pub fn ppg_sample_18bit(bytes: [u8; 3]) -> u32 {
    ((u32::from(bytes[0]) << 16) | (u32::from(bytes[1]) << 8) | u32::from(bytes[2])) & 0x3_FFFF
}

/// MAX30102 die temperature from its integer and fractional registers.
#[inline]
pub fn die_temperature_c(integer: i8, fraction: u8) -> f32 {
    f32::from(integer) + f32::from(fraction & 0x0F) * 0.0625
}

/// Convert a big-endian 16-bit accelerometer register pair to g at the ±2 g range.
#[inline]
pub fn accel_counts_to_g(hi: u8, lo: u8) -> f32 {
    f32::from(i16::from_be_bytes([hi, lo])) / 16_384.0
}

/// TCA9548A control byte selecting a single downstream channel.
#[inline]
pub fn mux_channel_mask(channel: u8) -> Option<u8> {
    (channel < 8).then(|| 1 << channel)
}

/// VL53L1X raw range status 9 is the only "range valid" code.
#[inline]
pub fn vl53l1x_range_valid(raw_status: u8) -> bool {
    raw_status & 0x1F == 9
}

/// ADS1115 config word: single-shot, AINx against GND, ±4.096 V, 128 SPS,
/// comparator off.
#[inline]
pub fn ads1115_single_shot_config(channel: u8) -> u16 {
    0x8000 | (u16::from(4 + (channel & 0x03)) << 12) | (1 << 9) | (1 << 8) | (4 << 5) | 0x03
}

/// Rescale an ADS1115 conversion at ±4.096 V onto the 12-bit, 3.3 V scale the
/// battery conversion expects.
#[inline]
pub fn ads1115_to_adc12(counts: i16) -> u16 {
    let volts = f32::from(counts.max(0)) * 4.096 / 32_768.0;
    (volts / 3.3 * 4095.0).round().min(4095.0) as u16
}
