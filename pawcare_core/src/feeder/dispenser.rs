//! Dispense mechanism: pulse shape, filtered weighing and the closed-loop dose.
use std::sync::Arc;
use std::time::Duration;

use pawcare_traits::{Clock, Scale, Servo};

use crate::config::{DosingCfg, ScaleCalibration};
use crate::hw_error::map_hw_error;
use crate::util::round1;

/// How a closed-loop dose ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DosingOutcome {
    TargetReached { actual: f32, loops: u32 },
    /// Loop cap hit before the bowl reached the target; usually a jam or an empty hopper.
    SafetyStop { actual: f32, loops: u32 },
}

impl DosingOutcome {
    pub fn actual(&self) -> f32 {
        match *self {
            Self::TargetReached { actual, .. } | Self::SafetyStop { actual, .. } => actual,
        }
    }

    pub fn loops(&self) -> u32 {
        match *self {
            Self::TargetReached { loops, .. } | Self::SafetyStop { loops, .. } => loops,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::TargetReached { .. })
    }

    /// Status string carried in dose reports.
    pub fn status(&self) -> &'static str {
        match self {
            Self::TargetReached { .. } => "fed_until",
            Self::SafetyStop { .. } => "safety_stop",
        }
    }
}

/// Load cell plus feed servo. Actuator failures are logged and never abort a
/// dose; weighing degrades to whatever reads succeeded.
pub struct Dispenser<S: Scale, M: Servo> {
    scale: S,
    servo: M,
    cfg: DosingCfg,
    calibration: ScaleCalibration,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl<S: Scale, M: Servo> Dispenser<S, M> {
    pub fn new(
        scale: S,
        servo: M,
        cfg: DosingCfg,
        calibration: ScaleCalibration,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        Self {
            scale,
            servo,
            cfg,
            calibration,
            clock,
        }
    }

    pub fn cfg(&self) -> &DosingCfg {
        &self.cfg
    }

    pub fn calibration(&self) -> ScaleCalibration {
        self.calibration
    }

    pub fn set_calibration(&mut self, calibration: ScaleCalibration) {
        self.calibration = calibration;
    }

    fn sleep_ms(&self, ms: u64) {
        self.clock.sleep(Duration::from_millis(ms));
    }

    fn drive(&mut self, duty: f32) {
        if let Err(e) = self.servo.set_duty(duty) {
            let err = map_hw_error(&*e);
            tracing::warn!(duty, error = %err, "feed servo command failed");
        }
    }

    /// One dispense motion: primary pulse, release, settle, secondary pulse, release.
    pub fn dispense_pulse(&mut self) {
        let (primary, secondary, pulse, settle) = (
            self.cfg.primary_duty,
            self.cfg.secondary_duty,
            self.cfg.pulse_ms,
            self.cfg.settle_ms,
        );
        self.drive(0.0);
        self.drive(primary);
        self.sleep_ms(pulse);
        self.drive(0.0);
        self.sleep_ms(settle);
        self.drive(secondary);
        self.sleep_ms(pulse);
        self.drive(0.0);
        tracing::trace!(primary, secondary, pulse_ms = pulse, "dispense pulse done");
    }

    /// Open-loop feed. Returns the configured yield estimate, not a measurement.
    pub fn feed_once(&mut self) -> f32 {
        self.dispense_pulse();
        tracing::info!(estimated_g = self.cfg.estimated_grams, "open-loop feed done");
        self.cfg.estimated_grams
    }

    /// Raw counts from the load cell, or `None` on a failed read.
    pub fn read_raw(&mut self) -> Option<i32> {
        let timeout = Duration::from_millis(self.cfg.read_timeout_ms);
        match self.scale.read(timeout) {
            Ok(raw) => Some(raw),
            Err(e) => {
                let err = map_hw_error(&*e);
                tracing::debug!(error = %err, "scale read failed");
                None
            }
        }
    }

    /// Median of up to `weight_samples` reads with the extremes dropped, in grams.
    ///
    /// Returns 0.0 when fewer than `weight_min_samples` reads succeed.
    pub fn filtered_weight(&mut self) -> f32 {
        let n = self.cfg.weight_samples;
        let mut grams = Vec::with_capacity(n);
        for i in 0..n {
            if let Some(raw) = self.read_raw() {
                grams.push(self.calibration.to_grams(raw));
            }
            if i + 1 < n {
                self.sleep_ms(self.cfg.weight_sample_gap_ms);
            }
        }
        if grams.len() < self.cfg.weight_min_samples || grams.is_empty() {
            tracing::warn!(
                got = grams.len(),
                wanted = self.cfg.weight_min_samples,
                "too few scale reads, reporting 0 g"
            );
            return 0.0;
        }
        grams.sort_by(f32::total_cmp);
        let kept = if grams.len() > 3 {
            &grams[1..grams.len() - 1]
        } else {
            &grams[..]
        };
        round1(kept[kept.len() / 2].max(0.0))
    }

    /// Pulse until the filtered weight reaches `target_g`, at most `max_loops` pulses.
    pub fn feed_until_target(&mut self, target_g: f32) -> DosingOutcome {
        let mut loops = 0u32;
        loop {
            let current = self.filtered_weight();
            if current >= target_g {
                tracing::info!(target_g, actual_g = current, loops, "target weight reached");
                return DosingOutcome::TargetReached {
                    actual: current,
                    loops,
                };
            }
            if loops >= self.cfg.max_loops {
                tracing::warn!(
                    target_g,
                    actual_g = current,
                    loops,
                    "loop cap reached before target, stopping"
                );
                return DosingOutcome::SafetyStop {
                    actual: current,
                    loops,
                };
            }
            tracing::debug!(loop_idx = loops, current_g = current, target_g, "dispensing");
            self.dispense_pulse();
            self.sleep_ms(self.cfg.loop_settle_ms);
            loops += 1;
        }
    }

    /// Release the feed servo drive.
    pub fn release(&mut self) {
        self.drive(0.0);
    }
}
