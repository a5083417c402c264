#![cfg(feature = "hardware")]

use std::time::Duration;

use pawcare_hardware::hardware::HardwareScale;
use pawcare_traits::Scale;

// Needs a Pi with nothing driving DT low on the given pins; the read must
// give up with a timeout instead of spinning.
#[test]
#[ignore = "requires Raspberry Pi GPIO"]
fn hx711_unwired_times_out() {
    let mut sc = HardwareScale::try_new(5, 6).expect("open gpio");
    let err = sc.read(Duration::from_millis(5)).expect_err("expect timeout");
    assert!(err.to_string().to_lowercase().contains("timeout"));
}
