//! `From` implementations bridging `pawcare_config` sections to runtime configs.

use crate::config::{
    CollarCfg, DosingCfg, EstimatorCfg, FeederIdentity, GateCfg, ScaleCalibration, SmootherCfg,
    StepCfg,
};

// ── EstimatorCfg ─────────────────────────────────────────────────────────────

impl From<&pawcare_config::EstimatorSection> for EstimatorCfg {
    fn from(c: &pawcare_config::EstimatorSection) -> Self {
        Self {
            min_samples: c.min_samples,
            min_signal_range: c.min_signal_range,
            peak_threshold_ratio: c.peak_threshold_ratio,
            peak_quality_floor: c.peak_quality_floor,
            min_peaks: c.min_peaks,
            cv_threshold: c.cv_threshold,
            min_bpm: c.min_bpm,
            max_bpm: c.max_bpm,
            spo2_min_samples: c.spo2_min_samples,
            spo2_trim_ratio: c.spo2_trim_ratio,
            spo2_intercept: c.spo2_intercept,
            spo2_slope: c.spo2_slope,
        }
    }
}

impl From<&pawcare_config::EstimatorSection> for SmootherCfg {
    fn from(c: &pawcare_config::EstimatorSection) -> Self {
        Self {
            window: c.smoother_window,
            jump_warn_bpm: c.jump_warn_bpm,
        }
    }
}

// ── StepCfg ──────────────────────────────────────────────────────────────────

impl From<&pawcare_config::StepsSection> for StepCfg {
    fn from(c: &pawcare_config::StepsSection) -> Self {
        Self {
            threshold_g: c.threshold_g,
            avg_ratio: c.avg_ratio,
            rearm_ratio: c.rearm_ratio,
            min_step_interval_ms: c.min_step_interval_ms,
            ring_len: c.ring_len,
        }
    }
}

// ── CollarCfg ────────────────────────────────────────────────────────────────

impl From<&pawcare_config::Config> for CollarCfg {
    fn from(c: &pawcare_config::Config) -> Self {
        let s = &c.collar;
        Self {
            pet_id: s.pet_id.clone(),
            device_id: s.device_id.clone(),
            sample_rate_hz: s.sample_rate_hz,
            contact_floor: s.contact_floor,
            window_capacity: s.window_capacity,
            min_window: s.min_window,
            keep_tail: s.keep_tail,
            publish_interval_ms: s.publish_interval_s.saturating_mul(1000),
            battery_interval_ms: s.battery_interval_s.saturating_mul(1000),
            standby_timeout_ms: s.standby_timeout_s.saturating_mul(1000),
            standby_check_interval_ms: s.standby_check_interval_s.saturating_mul(1000),
            battery_divider: s.battery_divider,
            health_topic: c.topics.collar_health.clone(),
            battery_topic: c.topics.collar_battery.clone(),
        }
    }
}

// ── Feeder ───────────────────────────────────────────────────────────────────

impl From<&pawcare_config::Config> for DosingCfg {
    fn from(c: &pawcare_config::Config) -> Self {
        let f = &c.feeder;
        Self {
            max_loops: f.max_loops,
            estimated_grams: f.estimated_grams,
            primary_duty: f.primary_duty,
            secondary_duty: f.secondary_duty,
            pulse_ms: f.pulse_ms,
            settle_ms: f.settle_ms,
            loop_settle_ms: f.loop_settle_ms,
            weight_samples: f.weight_samples,
            weight_min_samples: f.weight_min_samples,
            weight_sample_gap_ms: f.weight_sample_gap_ms,
            read_timeout_ms: c.scale.read_timeout_ms,
        }
    }
}

impl From<&pawcare_config::GateSection> for GateCfg {
    fn from(c: &pawcare_config::GateSection) -> Self {
        Self {
            open_duty: c.open_duty,
            close_duty: c.close_duty,
            ramp_steps: c.ramp_steps,
            ramp_step_ms: c.ramp_step_ms,
            hold_ms: c.hold_ms,
        }
    }
}

impl From<&pawcare_config::ScaleSection> for ScaleCalibration {
    fn from(c: &pawcare_config::ScaleSection) -> Self {
        Self {
            reference_unit: c.reference_unit,
            zero_counts: c.zero_counts,
        }
    }
}

impl From<&pawcare_config::Config> for FeederIdentity {
    fn from(c: &pawcare_config::Config) -> Self {
        Self {
            pet_id: c.feeder.pet_id.clone(),
            food_type: c.feeder.food_type.clone(),
            power: c.feeder.power,
            calories_per_gram: c.feeder.calories_per_gram,
            topic_prefix: c.topics.feeder_prefix.clone(),
            status_interval_ms: c.feeder.status_interval_s.saturating_mul(1000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_defaults_match_runtime_defaults() {
        let cfg = pawcare_config::Config::default();
        let est = EstimatorCfg::from(&cfg.estimator);
        let def = EstimatorCfg::default();
        assert_eq!(est.min_samples, def.min_samples);
        assert_eq!(est.spo2_intercept, def.spo2_intercept);

        let collar = CollarCfg::from(&cfg);
        assert_eq!(collar.publish_interval_ms, 5_000);
        assert_eq!(collar.standby_timeout_ms, CollarCfg::default().standby_timeout_ms);
        assert_eq!(collar.health_topic, CollarCfg::default().health_topic);

        let dosing = DosingCfg::from(&cfg);
        assert_eq!(dosing.max_loops, DosingCfg::default().max_loops);
        assert_eq!(dosing.read_timeout_ms, 150);

        let gate = GateCfg::from(&cfg.gate);
        assert_eq!(gate.close_duty, 12.0);

        let steps = StepCfg::from(&cfg.steps);
        assert_eq!(steps.min_step_interval_ms, 500);

        let id = FeederIdentity::from(&cfg);
        assert_eq!(id.status_interval_ms, 30_000);
        assert_eq!(id.topic_prefix, "pet/manager/topic");
    }
}
