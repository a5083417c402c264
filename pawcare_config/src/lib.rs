#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas, persisted calibration, and trace parsing for the collar and feeder.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//! - The distance scale is persisted as a small JSON document next to the config.
//! - Calibration procedures (trimmed means over raw samples) live here so the
//!   CLI and any future tooling compute identical factors.
//! - Sensor traces are CSV files with a fixed header.
use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod calibration;
pub mod trace;

pub use calibration::{
    DistanceCalibration, distance_scale_from_samples, reference_unit_from_samples,
    zero_counts_from_samples,
};
pub use trace::{TraceRow, load_trace_csv};

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CollarSection {
    pub pet_id: String,
    pub device_id: String,
    pub sample_rate_hz: u32,
    /// Both red and IR must exceed this to count as skin contact
    pub contact_floor: u32,
    pub window_capacity: usize,
    /// Samples needed before an estimate is attempted
    pub min_window: usize,
    /// Samples kept after an estimate so the next window overlaps
    pub keep_tail: usize,
    pub publish_interval_s: u64,
    pub battery_interval_s: u64,
    pub standby_timeout_s: u64,
    pub standby_check_interval_s: u64,
    /// Voltage divider ratio in front of the battery ADC
    pub battery_divider: f32,
    /// ADS1115 input (0..=3) wired to the divider
    pub battery_adc_channel: u8,
}

impl Default for CollarSection {
    fn default() -> Self {
        Self {
            pet_id: "collar-pet".to_string(),
            device_id: "collar-01".to_string(),
            sample_rate_hz: 50,
            contact_floor: 10_000,
            window_capacity: 150,
            min_window: 100,
            keep_tail: 50,
            publish_interval_s: 5,
            battery_interval_s: 60,
            standby_timeout_s: 180,
            standby_check_interval_s: 10,
            battery_divider: 2.0,
            battery_adc_channel: 0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EstimatorSection {
    pub min_samples: usize,
    pub min_signal_range: f32,
    pub peak_threshold_ratio: f32,
    pub peak_quality_floor: f32,
    pub min_peaks: usize,
    pub cv_threshold: f32,
    pub min_bpm: u16,
    pub max_bpm: u16,
    pub spo2_min_samples: usize,
    pub spo2_trim_ratio: f32,
    pub spo2_intercept: f32,
    pub spo2_slope: f32,
    pub smoother_window: usize,
    pub jump_warn_bpm: u16,
}

impl Default for EstimatorSection {
    fn default() -> Self {
        Self {
            min_samples: 50,
            min_signal_range: 1000.0,
            peak_threshold_ratio: 0.7,
            peak_quality_floor: 0.3,
            min_peaks: 4,
            cv_threshold: 0.25,
            min_bpm: 40,
            max_bpm: 200,
            spo2_min_samples: 100,
            spo2_trim_ratio: 0.1,
            spo2_intercept: 110.0,
            spo2_slope: 25.0,
            smoother_window: 5,
            jump_warn_bpm: 20,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StepsSection {
    /// Magnitude (g) a sample must exceed to count as a step impact
    pub threshold_g: f32,
    pub avg_ratio: f32,
    /// Rearm once magnitude falls below threshold_g * rearm_ratio
    pub rearm_ratio: f32,
    pub min_step_interval_ms: u64,
    pub ring_len: usize,
}

impl Default for StepsSection {
    fn default() -> Self {
        Self {
            threshold_g: 1.5,
            avg_ratio: 1.2,
            rearm_ratio: 0.8,
            min_step_interval_ms: 500,
            ring_len: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FeederSection {
    pub pet_id: String,
    pub food_type: String,
    /// Reported supply voltage; the feeder has no battery gauge
    pub power: f32,
    pub servo_pin: u8,
    pub max_loops: u32,
    pub estimated_grams: f32,
    pub primary_duty: f32,
    pub secondary_duty: f32,
    pub pulse_ms: u64,
    pub settle_ms: u64,
    pub loop_settle_ms: u64,
    pub weight_samples: usize,
    pub weight_min_samples: usize,
    pub weight_sample_gap_ms: u64,
    pub calories_per_gram: f32,
    pub status_interval_s: u64,
}

impl Default for FeederSection {
    fn default() -> Self {
        Self {
            pet_id: "feeder-pet".to_string(),
            food_type: "default_food".to_string(),
            power: 3.7,
            servo_pin: 16,
            max_loops: 20,
            estimated_grams: 10.0,
            primary_duty: 12.0,
            secondary_duty: 4.0,
            pulse_ms: 2000,
            settle_ms: 500,
            loop_settle_ms: 1000,
            weight_samples: 20,
            weight_min_samples: 5,
            weight_sample_gap_ms: 30,
            calories_per_gram: 2.0,
            status_interval_s: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GateSection {
    pub servo_pin: u8,
    pub open_duty: f32,
    pub close_duty: f32,
    /// Intermediate duty steps between endpoints; 1 jumps straight to the target
    pub ramp_steps: u32,
    pub ramp_step_ms: u64,
    pub hold_ms: u64,
}

impl Default for GateSection {
    fn default() -> Self {
        Self {
            servo_pin: 12,
            open_duty: 2.0,
            close_duty: 12.0,
            ramp_steps: 10,
            ramp_step_ms: 30,
            hold_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScaleSection {
    pub hx711_dt: u8,
    pub hx711_sck: u8,
    pub read_timeout_ms: u64,
    /// Raw counts per gram
    pub reference_unit: f32,
    /// Raw reading with an empty bowl
    pub zero_counts: i32,
    pub calibration_samples: usize,
    pub calibration_trim: usize,
}

impl Default for ScaleSection {
    fn default() -> Self {
        Self {
            hx711_dt: 5,
            hx711_sck: 6,
            read_timeout_ms: 150,
            reference_unit: 1.0,
            zero_counts: 0,
            calibration_samples: 10,
            calibration_trim: 2,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DistanceSection {
    /// JSON file holding the persisted `distance_scale`
    pub calibration_file: String,
    pub calibration_samples: usize,
    pub trim_ratio: f32,
    pub i2c_bus: u8,
    /// TCA9548A multiplexer in front of the two VL53L1X rangers
    pub mux_address: u16,
    pub waste_channel: u8,
    pub feed_channel: u8,
}

impl Default for DistanceSection {
    fn default() -> Self {
        Self {
            calibration_file: "config.json".to_string(),
            calibration_samples: 30,
            trim_ratio: 0.05,
            i2c_bus: 1,
            mux_address: 0x70,
            waste_channel: 2,
            feed_channel: 6,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TopicsSection {
    /// Prefix for every feeder response topic
    pub feeder_prefix: String,
    pub collar_health: String,
    pub collar_battery: String,
}

impl Default for TopicsSection {
    fn default() -> Self {
        Self {
            feeder_prefix: "pet/manager/topic".to_string(),
            collar_health: "pet/manager/topic/collar".to_string(),
            collar_battery: "pet/manager/topic/battery".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub collar: CollarSection,
    pub estimator: EstimatorSection,
    pub steps: StepsSection,
    pub feeder: FeederSection,
    pub gate: GateSection,
    pub scale: ScaleSection,
    pub distance: DistanceSection,
    pub topics: TopicsSection,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read and parse a TOML config file. Validation is left to the caller.
pub fn load_file(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {}: {}", path.display(), e))?;
    load_toml(&text).map_err(|e| eyre::eyre!("parse config {}: {}", path.display(), e))
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Collar
        let c = &self.collar;
        if c.pet_id.trim().is_empty() {
            eyre::bail!("collar.pet_id must not be empty");
        }
        if c.sample_rate_hz == 0 || c.sample_rate_hz > 1000 {
            eyre::bail!("collar.sample_rate_hz must be in 1..=1000");
        }
        if c.window_capacity < c.min_window {
            eyre::bail!("collar.window_capacity must be >= collar.min_window");
        }
        if c.min_window < self.estimator.min_samples {
            eyre::bail!("collar.min_window must be >= estimator.min_samples");
        }
        if c.keep_tail >= c.min_window {
            eyre::bail!("collar.keep_tail must be < collar.min_window");
        }
        if c.publish_interval_s == 0 {
            eyre::bail!("collar.publish_interval_s must be >= 1");
        }
        if c.battery_interval_s == 0 {
            eyre::bail!("collar.battery_interval_s must be >= 1");
        }
        if c.standby_check_interval_s == 0 {
            eyre::bail!("collar.standby_check_interval_s must be >= 1");
        }
        if !(c.battery_divider.is_finite() && c.battery_divider >= 1.0) {
            eyre::bail!("collar.battery_divider must be >= 1.0");
        }
        if c.battery_adc_channel > 3 {
            eyre::bail!("collar.battery_adc_channel must be in 0..=3");
        }

        // Estimator
        let e = &self.estimator;
        if e.min_samples < 5 {
            eyre::bail!("estimator.min_samples must be >= 5");
        }
        if e.min_signal_range.is_sign_negative() {
            eyre::bail!("estimator.min_signal_range must be >= 0");
        }
        if !(e.peak_threshold_ratio > 0.0 && e.peak_threshold_ratio < 1.0) {
            eyre::bail!("estimator.peak_threshold_ratio must be in (0.0, 1.0)");
        }
        if !(0.0..1.0).contains(&e.peak_quality_floor) {
            eyre::bail!("estimator.peak_quality_floor must be in [0.0, 1.0)");
        }
        if e.min_peaks < 2 {
            eyre::bail!("estimator.min_peaks must be >= 2");
        }
        if e.cv_threshold <= 0.0 {
            eyre::bail!("estimator.cv_threshold must be > 0.0");
        }
        if e.min_bpm == 0 || e.min_bpm >= e.max_bpm {
            eyre::bail!("estimator.min_bpm must be > 0 and < estimator.max_bpm");
        }
        if !(0.0..0.5).contains(&e.spo2_trim_ratio) {
            eyre::bail!("estimator.spo2_trim_ratio must be in [0.0, 0.5)");
        }
        if e.spo2_min_samples < 2 {
            eyre::bail!("estimator.spo2_min_samples must be >= 2");
        }
        if e.smoother_window == 0 {
            eyre::bail!("estimator.smoother_window must be >= 1");
        }

        // Steps
        let s = &self.steps;
        if s.threshold_g <= 0.0 {
            eyre::bail!("steps.threshold_g must be > 0.0");
        }
        if s.avg_ratio < 1.0 {
            eyre::bail!("steps.avg_ratio must be >= 1.0");
        }
        if !(s.rearm_ratio > 0.0 && s.rearm_ratio <= 1.0) {
            eyre::bail!("steps.rearm_ratio must be in (0.0, 1.0]");
        }
        if s.ring_len == 0 {
            eyre::bail!("steps.ring_len must be >= 1");
        }

        // Feeder
        let f = &self.feeder;
        if f.max_loops == 0 {
            eyre::bail!("feeder.max_loops must be >= 1");
        }
        if f.estimated_grams <= 0.0 {
            eyre::bail!("feeder.estimated_grams must be > 0.0");
        }
        for (name, duty) in [
            ("feeder.primary_duty", f.primary_duty),
            ("feeder.secondary_duty", f.secondary_duty),
            ("gate.open_duty", self.gate.open_duty),
            ("gate.close_duty", self.gate.close_duty),
        ] {
            if !(duty > 0.0 && duty <= 100.0) {
                eyre::bail!("{name} must be in (0.0, 100.0]");
            }
        }
        if f.weight_samples == 0 {
            eyre::bail!("feeder.weight_samples must be >= 1");
        }
        if f.weight_min_samples == 0 || f.weight_min_samples > f.weight_samples {
            eyre::bail!("feeder.weight_min_samples must be in 1..=feeder.weight_samples");
        }
        if f.status_interval_s == 0 {
            eyre::bail!("feeder.status_interval_s must be >= 1");
        }

        // Gate
        if self.gate.ramp_steps == 0 {
            eyre::bail!("gate.ramp_steps must be >= 1");
        }

        // Scale
        if !(self.scale.reference_unit.is_finite() && self.scale.reference_unit != 0.0) {
            eyre::bail!("scale.reference_unit must be finite and non-zero");
        }
        if self.scale.read_timeout_ms == 0 {
            eyre::bail!("scale.read_timeout_ms must be >= 1");
        }
        if self.scale.calibration_samples <= 2 * self.scale.calibration_trim {
            eyre::bail!("scale.calibration_samples must exceed 2 * scale.calibration_trim");
        }

        // Pins
        let pins = [
            ("scale.hx711_dt", self.scale.hx711_dt),
            ("scale.hx711_sck", self.scale.hx711_sck),
            ("feeder.servo_pin", f.servo_pin),
            ("gate.servo_pin", self.gate.servo_pin),
        ];
        for (i, (a, pa)) in pins.iter().enumerate() {
            for (b, pb) in &pins[i + 1..] {
                if pa == pb {
                    eyre::bail!("{a} and {b} must use different GPIO pins");
                }
            }
        }

        // Distance
        if self.distance.calibration_samples < 5 {
            eyre::bail!("distance.calibration_samples must be >= 5");
        }
        if !(0.0..0.5).contains(&self.distance.trim_ratio) {
            eyre::bail!("distance.trim_ratio must be in [0.0, 0.5)");
        }
        let d = &self.distance;
        if d.waste_channel > 7 || d.feed_channel > 7 {
            eyre::bail!("distance.waste_channel and distance.feed_channel must be in 0..=7");
        }
        if d.waste_channel == d.feed_channel {
            eyre::bail!("distance.waste_channel and distance.feed_channel must differ");
        }
        if !(0x70..=0x77).contains(&d.mux_address) {
            eyre::bail!("distance.mux_address must be in 0x70..=0x77");
        }

        // Topics
        if self.topics.feeder_prefix.trim().is_empty() {
            eyre::bail!("topics.feeder_prefix must not be empty");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}

/// Serializable mirror used when dumping the effective config.
#[derive(Debug, Serialize)]
pub struct EffectiveSummary<'a> {
    pub collar_pet_id: &'a str,
    pub feeder_pet_id: &'a str,
    pub sample_rate_hz: u32,
    pub max_loops: u32,
    pub distance_calibration_file: &'a str,
}

impl Config {
    pub fn summary(&self) -> EffectiveSummary<'_> {
        EffectiveSummary {
            collar_pet_id: &self.collar.pet_id,
            feeder_pet_id: &self.feeder.pet_id,
            sample_rate_hz: self.collar.sample_rate_hz,
            max_loops: self.feeder.max_loops,
            distance_calibration_file: &self.distance.calibration_file,
        }
    }
}
