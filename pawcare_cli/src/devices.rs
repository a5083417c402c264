//! Device assembly: simulated by default, Raspberry Pi drivers with the `hardware` feature.

use pawcare_config::{Config, TraceRow};
use pawcare_core::config::ScaleCalibration;
use pawcare_hardware::{ReplayImu, ReplayPpg, SimBowl, SimulatedBattery};
use pawcare_traits::{Accelerometer, BatteryGauge, DistanceSensor, PpgSensor, Scale, Servo};

use crate::cli::Channel;

/// Grams the simulated auger drops per servo move.
#[cfg(not(feature = "hardware"))]
pub const SIM_GRAMS_PER_MOVE: f32 = 2.5;
#[cfg(not(feature = "hardware"))]
pub const SIM_WASTE_MM: f32 = 120.0;
#[cfg(not(feature = "hardware"))]
pub const SIM_FEED_MM: f32 = 45.0;

#[cfg(feature = "hardware")]
const I2C_BUS: u8 = 1;

pub type BoxedScale = Box<dyn Scale + Send>;
pub type BoxedServo = Box<dyn Servo + Send>;
pub type BoxedRanger = Box<dyn DistanceSensor + Send>;

pub struct FeederDevices {
    pub scale: BoxedScale,
    pub feed_servo: BoxedServo,
    pub gate_servo: BoxedServo,
    /// Waste and feed-level rangers, when a driver exists.
    pub rangers: Option<(BoxedRanger, BoxedRanger)>,
    pub calibration: ScaleCalibration,
    /// Simulated bowl, so calibration can place a known mass on it.
    pub bowl: Option<SimBowl>,
}

pub struct CollarDevices {
    pub ppg: Box<dyn PpgSensor + Send>,
    pub imu: Box<dyn Accelerometer + Send>,
    pub battery: Box<dyn BatteryGauge + Send>,
}

#[cfg(feature = "hardware")]
fn hw(e: pawcare_hardware::error::HwError) -> eyre::Report {
    eyre::Report::new(pawcare_core::map_hw_error(&e))
}

#[cfg(not(feature = "hardware"))]
pub fn feeder_devices(cfg: &Config) -> eyre::Result<FeederDevices> {
    use pawcare_hardware::{SimulatedFeedServo, SimulatedRanger, SimulatedScale, SimulatedServo};

    let bowl = SimBowl::new(0.0);
    let scale = SimulatedScale::new(bowl.clone(), cfg.scale.reference_unit);
    let calibration = ScaleCalibration {
        reference_unit: cfg.scale.reference_unit,
        zero_counts: scale.zero_counts(),
    };
    tracing::info!(grams_per_move = SIM_GRAMS_PER_MOVE, "using simulated feeder devices");
    Ok(FeederDevices {
        scale: Box::new(scale),
        feed_servo: Box::new(SimulatedFeedServo::new(bowl.clone(), SIM_GRAMS_PER_MOVE)),
        gate_servo: Box::new(SimulatedServo::new()),
        rangers: Some((
            Box::new(SimulatedRanger::new(SIM_WASTE_MM)),
            Box::new(SimulatedRanger::new(SIM_FEED_MM)),
        )),
        calibration,
        bowl: Some(bowl),
    })
}

#[cfg(feature = "hardware")]
pub fn feeder_devices(cfg: &Config) -> eyre::Result<FeederDevices> {
    use pawcare_hardware::hardware::{HardwareScale, PwmServo};

    let scale = HardwareScale::try_new(cfg.scale.hx711_dt, cfg.scale.hx711_sck).map_err(hw)?;
    let feed_servo = PwmServo::try_new(cfg.feeder.servo_pin).map_err(hw)?;
    let gate_servo = PwmServo::try_new(cfg.gate.servo_pin).map_err(hw)?;
    let rangers = match (ranger(cfg, Channel::Waste, 0.0), ranger(cfg, Channel::Feed, 0.0)) {
        (Ok(waste), Ok(feed)) => Some((waste, feed)),
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "rangers unavailable; bin levels are reported as null");
            None
        }
    };
    Ok(FeederDevices {
        scale: Box::new(scale),
        feed_servo: Box::new(feed_servo),
        gate_servo: Box::new(gate_servo),
        rangers,
        calibration: ScaleCalibration::from(&cfg.scale),
        bowl: None,
    })
}

/// Replay devices for a recorded trace.
pub fn collar_replay(rows: &[TraceRow], temperature_c: f32) -> CollarDevices {
    CollarDevices {
        ppg: Box::new(ReplayPpg::new(
            rows.iter().map(|r| (r.red, r.ir)),
            temperature_c,
        )),
        imu: Box::new(ReplayImu::new(rows.iter().map(|r| (r.ax, r.ay, r.az)))),
        battery: Box::new(SimulatedBattery::default()),
    }
}

#[cfg(not(feature = "hardware"))]
pub fn collar_devices(cfg: &Config, bpm: f32, steps_per_min: u32) -> eyre::Result<CollarDevices> {
    use pawcare_hardware::{SimulatedImu, SimulatedPpg};

    let rate = cfg.collar.sample_rate_hz;
    tracing::info!(bpm, steps_per_min, rate, "using simulated collar devices");
    Ok(CollarDevices {
        ppg: Box::new(SimulatedPpg::new(rate, bpm)),
        imu: Box::new(SimulatedImu::new(rate, steps_per_min)),
        battery: Box::new(SimulatedBattery::default()),
    })
}

#[cfg(feature = "hardware")]
pub fn collar_devices(cfg: &Config, _bpm: f32, _steps_per_min: u32) -> eyre::Result<CollarDevices> {
    use pawcare_hardware::hardware::{Ads1115Battery, Max30102, Mpu6050};

    let ppg = Max30102::try_new(I2C_BUS).map_err(hw)?;
    let imu = Mpu6050::try_new(I2C_BUS).map_err(hw)?;
    let battery = Ads1115Battery::try_new(I2C_BUS, cfg.collar.battery_adc_channel).map_err(hw)?;
    Ok(CollarDevices {
        ppg: Box::new(ppg),
        imu: Box::new(imu),
        battery: Box::new(battery),
    })
}

#[cfg(not(feature = "hardware"))]
pub fn ranger(_cfg: &Config, channel: Channel, sim_raw_mm: f32) -> eyre::Result<BoxedRanger> {
    tracing::info!(?channel, sim_raw_mm, "using simulated ranger");
    Ok(Box::new(pawcare_hardware::SimulatedRanger::new(sim_raw_mm)))
}

/// VL53L1X on the multiplexer channel configured for `channel`.
#[cfg(feature = "hardware")]
pub fn ranger(cfg: &Config, channel: Channel, _sim_raw_mm: f32) -> eyre::Result<BoxedRanger> {
    use pawcare_hardware::hardware::Vl53l1x;

    let d = &cfg.distance;
    let mux_channel = match channel {
        Channel::Waste => d.waste_channel,
        Channel::Feed => d.feed_channel,
    };
    let sensor = Vl53l1x::try_new(d.i2c_bus, d.mux_address, mux_channel).map_err(hw)?;
    Ok(Box::new(sensor))
}
