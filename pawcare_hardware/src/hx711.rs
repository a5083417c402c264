use std::time::Duration;
use tracing::trace;

use crate::error::{HwError, Result};
use crate::util::{sign_extend_24, wait_until_low_with_timeout};

/// Bit-banged HX711 load-cell amplifier.
pub struct Hx711 {
    dt: rppal::gpio::InputPin,
    sck: rppal::gpio::OutputPin,
    gain_pulses: u8, // 25, 26, 27 based on gain/channel
}

impl Hx711 {
    pub fn open(dt_pin: u8, sck_pin: u8, gain_pulses: u8) -> Result<Self> {
        let gpio = rppal::gpio::Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let dt = gpio
            .get(dt_pin)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_input();
        let mut sck = gpio
            .get(sck_pin)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_output();
        sck.set_low(); // clock idle low
        Ok(Self {
            dt,
            sck,
            gain_pulses: gain_pulses.clamp(25, 27),
        })
    }

    pub fn read_with_timeout(&mut self, timeout: Duration) -> Result<i32> {
        // DT goes low when a conversion is ready
        let dt = &self.dt;
        wait_until_low_with_timeout(|| dt.is_high(), timeout, Duration::from_micros(200))
            .map_err(|_| HwError::Timeout)?;

        let mut value: i32 = 0;
        for _ in 0..24 {
            self.sck.set_high();
            std::hint::spin_loop();
            value = (value << 1) | i32::from(self.dt.is_high());
            self.sck.set_low();
            std::hint::spin_loop();
        }

        // Extra pulses select gain/channel for the next conversion
        for _ in 24..self.gain_pulses {
            self.sck.set_high();
            std::hint::spin_loop();
            self.sck.set_low();
            std::hint::spin_loop();
        }

        let value = sign_extend_24(value);
        trace!(raw = value, "hx711 raw read");
        Ok(value)
    }

    /// Pulse SCK high for >60 us to power the chip down, then release it.
    pub fn power_cycle(&mut self) {
        self.sck.set_high();
        std::thread::sleep(Duration::from_micros(100));
        self.sck.set_low();
    }
}
