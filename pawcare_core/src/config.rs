//! Runtime configuration for the estimator, step detector, collar loop and feeder.
//!
//! These are separate from the TOML-deserialized config in `pawcare_config`;
//! see `conversions` for the bridge. Defaults reproduce the deployed constants.

/// Heart-rate and SpO2 estimation parameters.
#[derive(Debug, Clone)]
pub struct EstimatorCfg {
    /// Shortest window (samples) worth estimating over.
    pub min_samples: usize,
    /// Filtered max-min below this means no skin contact.
    pub min_signal_range: f32,
    /// Peak threshold as a fraction of the range above the minimum.
    pub peak_threshold_ratio: f32,
    /// Minimum normalized peak height `(v - min) / range`.
    pub peak_quality_floor: f32,
    pub min_peaks: usize,
    /// Above this coefficient of variation the median interval is used instead of the mean.
    pub cv_threshold: f32,
    pub min_bpm: u16,
    pub max_bpm: u16,
    pub spo2_min_samples: usize,
    /// Fraction trimmed from each tail of each channel before SpO2 statistics.
    pub spo2_trim_ratio: f32,
    /// `spo2 = intercept - slope * R`. Uncalibrated; not a clinical estimate.
    pub spo2_intercept: f32,
    pub spo2_slope: f32,
}

impl Default for EstimatorCfg {
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
        }
    }
}

/// Output smoothing applied by the collar before publishing.
#[derive(Debug, Clone)]
pub struct SmootherCfg {
    pub window: usize,
    pub jump_warn_bpm: u16,
}

impl Default for SmootherCfg {
    fn default() -> Self {
        Self {
            window: 5,
            jump_warn_bpm: 20,
        }
    }
}

/// Step detector thresholds.
#[derive(Debug, Clone)]
pub struct StepCfg {
    pub threshold_g: f32,
    pub avg_ratio: f32,
    pub rearm_ratio: f32,
    pub min_step_interval_ms: u64,
    pub ring_len: usize,
}

impl Default for StepCfg {
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

/// Collar acquisition loop timing and identity.
#[derive(Debug, Clone)]
pub struct CollarCfg {
    pub pet_id: String,
    pub device_id: String,
    pub sample_rate_hz: u32,
    pub contact_floor: u32,
    pub window_capacity: usize,
    pub min_window: usize,
    pub keep_tail: usize,
    pub publish_interval_ms: u64,
    pub battery_interval_ms: u64,
    pub standby_timeout_ms: u64,
    pub standby_check_interval_ms: u64,
    pub battery_divider: f32,
    pub health_topic: String,
    pub battery_topic: String,
}

impl Default for CollarCfg {
    fn default() -> Self {
        Self {
            pet_id: "collar-pet".into(),
            device_id: "collar-01".into(),
            sample_rate_hz: 50,
            contact_floor: 10_000,
            window_capacity: 150,
            min_window: 100,
            keep_tail: 50,
            publish_interval_ms: 5_000,
            battery_interval_ms: 60_000,
            standby_timeout_ms: 180_000,
            standby_check_interval_ms: 10_000,
            battery_divider: 2.0,
            health_topic: "pet/manager/topic/collar".into(),
            battery_topic: "pet/manager/topic/battery".into(),
        }
    }
}

/// Raw HX711 counts to grams: `(raw - zero_counts) / reference_unit`.
#[derive(Debug, Clone, Copy)]
pub struct ScaleCalibration {
    /// Counts per gram.
    pub reference_unit: f32,
    pub zero_counts: i32,
}

impl Default for ScaleCalibration {
    fn default() -> Self {
        Self {
            reference_unit: 1.0,
            zero_counts: 0,
        }
    }
}

impl ScaleCalibration {
    pub fn to_grams(&self, raw: i32) -> f32 {
        (raw.saturating_sub(self.zero_counts)) as f32 / self.reference_unit
    }
}

/// Dispense pulse shape, closed-loop limits and the weight filter.
#[derive(Debug, Clone)]
pub struct DosingCfg {
    pub max_loops: u32,
    /// Open-loop yield reported by a single `feed`.
    pub estimated_grams: f32,
    pub primary_duty: f32,
    pub secondary_duty: f32,
    pub pulse_ms: u64,
    pub settle_ms: u64,
    /// Extra settle after each closed-loop pulse before re-weighing.
    pub loop_settle_ms: u64,
    pub weight_samples: usize,
    pub weight_min_samples: usize,
    pub weight_sample_gap_ms: u64,
    pub read_timeout_ms: u64,
}

impl Default for DosingCfg {
    fn default() -> Self {
        Self {
            max_loops: 20,
            estimated_grams: 10.0,
            primary_duty: 12.0,
            secondary_duty: 4.0,
            pulse_ms: 2_000,
            settle_ms: 500,
            loop_settle_ms: 1_000,
            weight_samples: 20,
            weight_min_samples: 5,
            weight_sample_gap_ms: 30,
            read_timeout_ms: 150,
        }
    }
}

/// Waste gate servo endpoints and ramp.
#[derive(Debug, Clone)]
pub struct GateCfg {
    pub open_duty: f32,
    pub close_duty: f32,
    pub ramp_steps: u32,
    pub ramp_step_ms: u64,
    pub hold_ms: u64,
}

impl Default for GateCfg {
    fn default() -> Self {
        Self {
            open_duty: 2.0,
            close_duty: 12.0,
            ramp_steps: 10,
            ramp_step_ms: 30,
            hold_ms: 500,
        }
    }
}

/// Identity and topic naming for feeder responses.
#[derive(Debug, Clone)]
pub struct FeederIdentity {
    pub pet_id: String,
    pub food_type: String,
    pub power: f32,
    pub calories_per_gram: f32,
    pub topic_prefix: String,
    pub status_interval_ms: u64,
}

impl Default for FeederIdentity {
    fn default() -> Self {
        Self {
            pet_id: "feeder-pet".into(),
            food_type: "default_food".into(),
            power: 3.7,
            calories_per_gram: 2.0,
            topic_prefix: "pet/manager/topic".into(),
            status_interval_ms: 30_000,
        }
    }
}
