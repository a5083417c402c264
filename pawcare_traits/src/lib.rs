//! Device seams shared by the collar and feeder stacks.
//!
//! Every trait reports failures as `Box<dyn Error + Send + Sync>` so that
//! simulated, replayed, and real drivers can plug in without a shared error type.
pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Load cell returning raw ADC counts.
pub trait Scale {
    fn read(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<i32, Box<dyn std::error::Error + Send + Sync>>;
}

/// PWM-driven hobby servo. `duty_pct` is the percentage of the PWM period held high;
/// 0.0 releases the drive.
pub trait Servo {
    fn set_duty(&mut self, duty_pct: f32) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Time-of-flight ranging sensor.
pub trait DistanceSensor {
    /// Distance in millimetres, before any calibration scale is applied.
    fn read_mm(&mut self) -> Result<f32, Box<dyn std::error::Error + Send + Sync>>;
}

/// Red/infrared photoplethysmography front end.
pub trait PpgSensor {
    /// Pop one `(red, ir)` pair from the sensor FIFO; `Ok(None)` when the FIFO is empty.
    fn read_sample(&mut self) -> Result<Option<(u32, u32)>, Box<dyn std::error::Error + Send + Sync>>;

    /// Die temperature in degrees Celsius.
    fn read_temperature(&mut self) -> Result<f32, Box<dyn std::error::Error + Send + Sync>>;
}

/// Three-axis accelerometer reporting in units of g.
pub trait Accelerometer {
    fn read_accel(&mut self) -> Result<(f32, f32, f32), Box<dyn std::error::Error + Send + Sync>>;
}

/// Battery voltage divider behind a 12-bit ADC.
pub trait BatteryGauge {
    fn read_raw(&mut self) -> Result<u16, Box<dyn std::error::Error + Send + Sync>>;
}

impl<T: Scale + ?Sized> Scale for Box<T> {
    fn read(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<i32, Box<dyn std::error::Error + Send + Sync>> {
        (**self).read(timeout)
    }
}

impl<T: Servo + ?Sized> Servo for Box<T> {
    fn set_duty(&mut self, duty_pct: f32) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).set_duty(duty_pct)
    }
}

impl<T: DistanceSensor + ?Sized> DistanceSensor for Box<T> {
    fn read_mm(&mut self) -> Result<f32, Box<dyn std::error::Error + Send + Sync>> {
        (**self).read_mm()
    }
}

impl<T: PpgSensor + ?Sized> PpgSensor for Box<T> {
    fn read_sample(&mut self) -> Result<Option<(u32, u32)>, Box<dyn std::error::Error + Send + Sync>> {
        (**self).read_sample()
    }

    fn read_temperature(&mut self) -> Result<f32, Box<dyn std::error::Error + Send + Sync>> {
        (**self).read_temperature()
    }
}

impl<T: Accelerometer + ?Sized> Accelerometer for Box<T> {
    fn read_accel(&mut self) -> Result<(f32, f32, f32), Box<dyn std::error::Error + Send + Sync>> {
        (**self).read_accel()
    }
}

impl<T: BatteryGauge + ?Sized> BatteryGauge for Box<T> {
    fn read_raw(&mut self) -> Result<u16, Box<dyn std::error::Error + Send + Sync>> {
        (**self).read_raw()
    }
}
