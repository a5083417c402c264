//! Raspberry Pi drivers: HX711 load cell, PWM servos, MAX30102 oximeter, MPU6050 IMU,
//! VL53L1X rangers behind a TCA9548A multiplexer and an ADS1115 battery ADC.
use std::time::{Duration, Instant};

use pawcare_traits::{Accelerometer, BatteryGauge, DistanceSensor, PpgSensor, Scale, Servo};
use rppal::gpio::{Gpio, OutputPin};
use rppal::i2c::I2c;

use crate::error::HwError;
use crate::hx711::Hx711;
use crate::util::{
    accel_counts_to_g, ads1115_single_shot_config, ads1115_to_adc12, die_temperature_c,
    mux_channel_mask, ppg_sample_18bit, vl53l1x_range_valid,
};

const SERVO_PWM_HZ: f64 = 50.0;

pub struct HardwareScale {
    hx711: Hx711,
}

impl HardwareScale {
    /// Channel A at gain 128 (25 clock pulses per conversion).
    pub fn try_new(dt_pin: u8, sck_pin: u8) -> Result<Self, HwError> {
        Ok(Self {
            hx711: Hx711::open(dt_pin, sck_pin, 25)?,
        })
    }

    pub fn power_cycle(&mut self) {
        self.hx711.power_cycle();
    }
}

impl Scale for HardwareScale {
    fn read(&mut self, timeout: Duration) -> Result<i32, Box<dyn std::error::Error + Send + Sync>> {
        let max_attempts = 3;
        let mut attempts = 0;
        loop {
            match self.hx711.read_with_timeout(timeout) {
                Ok(raw) => {
                    tracing::debug!(raw, "hx711 sample");
                    return Ok(raw);
                }
                Err(HwError::Timeout) if attempts < max_attempts => {
                    attempts += 1;
                    tracing::warn!(retries = attempts, "scale timeout, retrying");
                }
                Err(e) => {
                    tracing::error!(error = %e, "scale read error");
                    return Err(Box::new(e));
                }
            }
        }
    }
}

/// Hobby servo on a GPIO pin driven by software PWM at 50 Hz.
pub struct PwmServo {
    pin: OutputPin,
}

impl PwmServo {
    pub fn try_new(pin: u8) -> Result<Self, HwError> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let mut pin = gpio
            .get(pin)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_output();
        pin.set_low();
        Ok(Self { pin })
    }
}

impl Servo for PwmServo {
    fn set_duty(&mut self, duty_pct: f32) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if duty_pct <= 0.0 {
            self.pin
                .clear_pwm()
                .map_err(|e| HwError::Pwm(e.to_string()))?;
            self.pin.set_low();
            return Ok(());
        }
        let duty = f64::from(duty_pct.min(100.0)) / 100.0;
        self.pin
            .set_pwm_frequency(SERVO_PWM_HZ, duty)
            .map_err(|e| HwError::Pwm(e.to_string()))?;
        Ok(())
    }
}

impl Drop for PwmServo {
    fn drop(&mut self) {
        let _ = self.pin.clear_pwm();
        self.pin.set_low();
    }
}

mod max30102 {
    pub const ADDR: u16 = 0x57;
    pub const FIFO_WR_PTR: u8 = 0x04;
    pub const OVF_COUNTER: u8 = 0x05;
    pub const FIFO_RD_PTR: u8 = 0x06;
    pub const FIFO_DATA: u8 = 0x07;
    pub const FIFO_CONFIG: u8 = 0x08;
    pub const MODE_CONFIG: u8 = 0x09;
    pub const SPO2_CONFIG: u8 = 0x0A;
    pub const LED1_PA: u8 = 0x0C;
    pub const LED2_PA: u8 = 0x0D;
    pub const TEMP_INT: u8 = 0x1F;
    pub const TEMP_FRAC: u8 = 0x20;
    pub const TEMP_CONFIG: u8 = 0x21;
}

fn i2c_err(e: rppal::i2c::Error) -> HwError {
    HwError::I2c(e.to_string())
}

/// MAX30102 in SpO2 mode (red on LED1, infrared on LED2).
pub struct Max30102 {
    i2c: I2c,
}

impl Max30102 {
    pub fn try_new(bus: u8) -> Result<Self, HwError> {
        use max30102::*;
        let mut i2c = I2c::with_bus(bus).map_err(i2c_err)?;
        i2c.set_slave_address(ADDR).map_err(i2c_err)?;
        i2c.smbus_write_byte(MODE_CONFIG, 0x40).map_err(i2c_err)?; // reset
        std::thread::sleep(Duration::from_millis(10));
        i2c.smbus_write_byte(FIFO_WR_PTR, 0).map_err(i2c_err)?;
        i2c.smbus_write_byte(OVF_COUNTER, 0).map_err(i2c_err)?;
        i2c.smbus_write_byte(FIFO_RD_PTR, 0).map_err(i2c_err)?;
        // sample averaging 4, rollover on
        i2c.smbus_write_byte(FIFO_CONFIG, 0x4F).map_err(i2c_err)?;
        i2c.smbus_write_byte(MODE_CONFIG, 0x03).map_err(i2c_err)?;
        // 4096 nA range, 100 sps, 411 us pulses
        i2c.smbus_write_byte(SPO2_CONFIG, 0x27).map_err(i2c_err)?;
        i2c.smbus_write_byte(LED1_PA, 0x24).map_err(i2c_err)?;
        i2c.smbus_write_byte(LED2_PA, 0x24).map_err(i2c_err)?;
        tracing::info!(bus, "max30102 initialized");
        Ok(Self { i2c })
    }

    fn pending(&self) -> Result<u8, HwError> {
        use max30102::*;
        let wr = self.i2c.smbus_read_byte(FIFO_WR_PTR).map_err(i2c_err)?;
        let rd = self.i2c.smbus_read_byte(FIFO_RD_PTR).map_err(i2c_err)?;
        Ok(wr.wrapping_sub(rd) & 0x1F)
    }
}

impl PpgSensor for Max30102 {
    fn read_sample(&mut self) -> Result<Option<(u32, u32)>, Box<dyn std::error::Error + Send + Sync>> {
        if self.pending()? == 0 {
            return Ok(None);
        }
        let mut buf = [0u8; 6];
        self.i2c
            .write_read(&[max30102::FIFO_DATA], &mut buf)
            .map_err(i2c_err)?;
        let red = ppg_sample_18bit([buf[0], buf[1], buf[2]]);
        let ir = ppg_sample_18bit([buf[3], buf[4], buf[5]]);
        Ok(Some((red, ir)))
    }

    fn read_temperature(&mut self) -> Result<f32, Box<dyn std::error::Error + Send + Sync>> {
        use max30102::*;
        self.i2c.smbus_write_byte(TEMP_CONFIG, 0x01).map_err(i2c_err)?;
        std::thread::sleep(Duration::from_millis(30));
        let int = self.i2c.smbus_read_byte(TEMP_INT).map_err(i2c_err)?;
        let frac = self.i2c.smbus_read_byte(TEMP_FRAC).map_err(i2c_err)?;
        Ok(die_temperature_c(int as i8, frac))
    }
}

/// MPU6050 accelerometer at its default ±2 g range.
pub struct Mpu6050 {
    i2c: I2c,
}

impl Mpu6050 {
    const ADDR: u16 = 0x68;
    const PWR_MGMT_1: u8 = 0x6B;
    const ACCEL_XOUT_H: u8 = 0x3B;

    pub fn try_new(bus: u8) -> Result<Self, HwError> {
        let mut i2c = I2c::with_bus(bus).map_err(i2c_err)?;
        i2c.set_slave_address(Self::ADDR).map_err(i2c_err)?;
        i2c.smbus_write_byte(Self::PWR_MGMT_1, 0).map_err(i2c_err)?; // wake
        tracing::info!(bus, "mpu6050 initialized");
        Ok(Self { i2c })
    }
}

impl Accelerometer for Mpu6050 {
    fn read_accel(&mut self) -> Result<(f32, f32, f32), Box<dyn std::error::Error + Send + Sync>> {
        let mut buf = [0u8; 6];
        self.i2c
            .write_read(&[Self::ACCEL_XOUT_H], &mut buf)
            .map_err(i2c_err)?;
        Ok((
            accel_counts_to_g(buf[0], buf[1]),
            accel_counts_to_g(buf[2], buf[3]),
            accel_counts_to_g(buf[4], buf[5]),
        ))
    }
}

mod vl53l1x {
    pub const ADDR: u16 = 0x29;
    pub const SOFT_RESET: u16 = 0x0000;
    pub const VHV_TIMEOUT_MACROP_LOOP_BOUND: u16 = 0x0008;
    pub const VHV_START: u16 = 0x000B;
    pub const DEFAULT_CONFIG_START: u16 = 0x002D;
    pub const GPIO_HV_MUX_CTRL: u16 = 0x0030;
    pub const GPIO_TIO_HV_STATUS: u16 = 0x0031;
    pub const INTERRUPT_CLEAR: u16 = 0x0086;
    pub const MODE_START: u16 = 0x0087;
    pub const RANGE_STATUS: u16 = 0x0089;
    pub const RANGE_MM: u16 = 0x0096;
    pub const FIRMWARE_SYSTEM_STATUS: u16 = 0x00E5;
    pub const MODEL_ID: u16 = 0x010F;
    pub const EXPECTED_MODEL_ID: u16 = 0xEACC;

    /// Register block 0x2D..=0x87 from ST's ultra-lite driver (interrupt on
    /// new sample, active-high, 100 ms timing budget).
    pub const DEFAULT_CONFIG: [u8; 91] = [
        0x00, 0x00, 0x00, 0x01, 0x02, 0x00, 0x02, 0x08, 0x00, 0x08, 0x10, 0x01, 0x01, 0x00,
        0x00, 0x00, 0x00, 0xFF, 0x00, 0x0F, 0x00, 0x00, 0x00, 0x00, 0x00, 0x20, 0x0B, 0x00,
        0x00, 0x02, 0x0A, 0x21, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00, 0x00, 0xC8, 0x00, 0x00,
        0x38, 0xFF, 0x01, 0x00, 0x08, 0x00, 0x00, 0x01, 0xCC, 0x0F, 0x01, 0xF1, 0x0D, 0x01,
        0x68, 0x00, 0x80, 0x08, 0xB8, 0x00, 0x00, 0x00, 0x00, 0x0F, 0x89, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x01, 0x0F, 0x0D, 0x0E, 0x0E, 0x00, 0x00, 0x02, 0xC7, 0xFF,
        0x9B, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00,
    ];
}

const RANGE_TIMEOUT: Duration = Duration::from_millis(300);
const RANGE_POLL: Duration = Duration::from_millis(2);

/// VL53L1X time-of-flight ranger on one TCA9548A channel.
///
/// Every transaction first selects the channel on the multiplexer, so two
/// rangers sharing address 0x29 can live on the same bus.
pub struct Vl53l1x {
    i2c: I2c,
    mux_address: u16,
    channel_mask: u8,
    channel: u8,
}

impl Vl53l1x {
    pub fn try_new(bus: u8, mux_address: u16, channel: u8) -> Result<Self, HwError> {
        let channel_mask = mux_channel_mask(channel)
            .ok_or_else(|| HwError::I2c(format!("mux channel {channel} out of range")))?;
        let i2c = I2c::with_bus(bus).map_err(i2c_err)?;
        let mut ranger = Self {
            i2c,
            mux_address,
            channel_mask,
            channel,
        };
        ranger.init()?;
        tracing::info!(bus, channel, "vl53l1x initialized");
        Ok(ranger)
    }

    fn select(&mut self) -> Result<(), HwError> {
        self.i2c.set_slave_address(self.mux_address).map_err(i2c_err)?;
        self.i2c.write(&[self.channel_mask]).map_err(i2c_err)?;
        self.i2c.set_slave_address(vl53l1x::ADDR).map_err(i2c_err)?;
        Ok(())
    }

    fn write_u8(&mut self, reg: u16, value: u8) -> Result<(), HwError> {
        let [hi, lo] = reg.to_be_bytes();
        self.i2c.write(&[hi, lo, value]).map_err(i2c_err)?;
        Ok(())
    }

    fn read_u8(&mut self, reg: u16) -> Result<u8, HwError> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(&reg.to_be_bytes(), &mut buf)
            .map_err(i2c_err)?;
        Ok(buf[0])
    }

    fn read_u16(&mut self, reg: u16) -> Result<u16, HwError> {
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(&reg.to_be_bytes(), &mut buf)
            .map_err(i2c_err)?;
        Ok(u16::from_be_bytes(buf))
    }

    fn init(&mut self) -> Result<(), HwError> {
        use vl53l1x::*;
        self.select()?;
        let model = self.read_u16(MODEL_ID)?;
        if model != EXPECTED_MODEL_ID {
            return Err(HwError::I2c(format!(
                "unexpected ranger model id {model:#06x} on mux channel {}",
                self.channel
            )));
        }
        self.write_u8(SOFT_RESET, 0x00)?;
        std::thread::sleep(Duration::from_micros(100));
        self.write_u8(SOFT_RESET, 0x01)?;
        self.wait_for(|r| Ok(r.read_u8(FIRMWARE_SYSTEM_STATUS)? & 0x01 == 0x01))?;

        let [hi, lo] = DEFAULT_CONFIG_START.to_be_bytes();
        let mut block = Vec::with_capacity(DEFAULT_CONFIG.len() + 2);
        block.extend_from_slice(&[hi, lo]);
        block.extend_from_slice(&DEFAULT_CONFIG);
        self.i2c.write(&block).map_err(i2c_err)?;

        // One throwaway measurement, then the VHV settings the ULD applies.
        self.write_u8(MODE_START, 0x40)?;
        self.wait_data_ready()?;
        self.write_u8(INTERRUPT_CLEAR, 0x01)?;
        self.write_u8(MODE_START, 0x00)?;
        self.write_u8(VHV_TIMEOUT_MACROP_LOOP_BOUND, 0x09)?;
        self.write_u8(VHV_START, 0x00)?;

        self.write_u8(MODE_START, 0x40)?;
        Ok(())
    }

    fn wait_for(
        &mut self,
        mut ready: impl FnMut(&mut Self) -> Result<bool, HwError>,
    ) -> Result<(), HwError> {
        let deadline = Instant::now() + RANGE_TIMEOUT;
        while !ready(self)? {
            if Instant::now() >= deadline {
                return Err(HwError::Timeout);
            }
            std::thread::sleep(RANGE_POLL);
        }
        Ok(())
    }

    fn wait_data_ready(&mut self) -> Result<(), HwError> {
        use vl53l1x::*;
        // bit 4 of HV_MUX_CTRL set means the interrupt line is active low
        let active_high = self.read_u8(GPIO_HV_MUX_CTRL)? & 0x10 == 0;
        let want = u8::from(active_high);
        self.wait_for(|r| Ok(r.read_u8(GPIO_TIO_HV_STATUS)? & 0x01 == want))
    }
}

impl DistanceSensor for Vl53l1x {
    fn read_mm(&mut self) -> Result<f32, Box<dyn std::error::Error + Send + Sync>> {
        use vl53l1x::*;
        self.select()?;
        self.wait_data_ready()?;
        let status = self.read_u8(RANGE_STATUS)?;
        let mm = self.read_u16(RANGE_MM)?;
        self.write_u8(INTERRUPT_CLEAR, 0x01)?;
        if !vl53l1x_range_valid(status) {
            tracing::debug!(channel = self.channel, status, mm, "ranging status not valid");
            return Err(Box::new(HwError::RangeStatus(status & 0x1F)));
        }
        tracing::trace!(channel = self.channel, mm, "vl53l1x range");
        Ok(f32::from(mm))
    }
}

impl Drop for Vl53l1x {
    fn drop(&mut self) {
        if self.select().is_ok() {
            let _ = self.write_u8(vl53l1x::MODE_START, 0x00);
        }
    }
}

/// ADS1115 reading the collar battery divider on one single-ended input.
pub struct Ads1115Battery {
    i2c: I2c,
    channel: u8,
}

impl Ads1115Battery {
    const ADDR: u16 = 0x48;
    const CONVERSION: u8 = 0x00;
    const CONFIG: u8 = 0x01;

    pub fn try_new(bus: u8, channel: u8) -> Result<Self, HwError> {
        let mut i2c = I2c::with_bus(bus).map_err(i2c_err)?;
        i2c.set_slave_address(Self::ADDR).map_err(i2c_err)?;
        // the config register reads back on any live ADS1115
        let mut buf = [0u8; 2];
        i2c.write_read(&[Self::CONFIG], &mut buf).map_err(i2c_err)?;
        tracing::info!(bus, channel, "ads1115 initialized");
        Ok(Self { i2c, channel })
    }
}

impl BatteryGauge for Ads1115Battery {
    fn read_raw(&mut self) -> Result<u16, Box<dyn std::error::Error + Send + Sync>> {
        let [hi, lo] = ads1115_single_shot_config(self.channel).to_be_bytes();
        self.i2c
            .write(&[Self::CONFIG, hi, lo])
            .map_err(i2c_err)?;
        // 128 SPS: one conversion takes ~8 ms
        let deadline = Instant::now() + Duration::from_millis(50);
        let mut buf = [0u8; 2];
        loop {
            std::thread::sleep(Duration::from_millis(2));
            self.i2c
                .write_read(&[Self::CONFIG], &mut buf)
                .map_err(i2c_err)?;
            if buf[0] & 0x80 != 0 {
                break;
            }
            if Instant::now() >= deadline {
                return Err(Box::new(HwError::Timeout));
            }
        }
        self.i2c
            .write_read(&[Self::CONVERSION], &mut buf)
            .map_err(i2c_err)?;
        let counts = i16::from_be_bytes(buf);
        Ok(ads1115_to_adc12(counts))
    }
}
