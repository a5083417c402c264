//! Accelerometer step detection with a hysteresis latch and refractory interval.
use std::collections::VecDeque;

use crate::config::StepCfg;

#[derive(Debug, Clone)]
pub struct StepCounter {
    cfg: StepCfg,
    step_count: u32,
    last_step_ms: Option<u64>,
    peak_detected: bool,
    recent: VecDeque<f32>,
}

impl StepCounter {
    pub fn new(cfg: StepCfg) -> Self {
        let ring = cfg.ring_len.max(1);
        Self {
            cfg: StepCfg { ring_len: ring, ..cfg },
            step_count: 0,
            last_step_ms: None,
            peak_detected: false,
            recent: VecDeque::with_capacity(ring),
        }
    }

    /// Process one sample taken at `now_ms` (monotonic milliseconds) and return
    /// the cumulative step count, which never decreases.
    pub fn detect_step(&mut self, ax: f32, ay: f32, az: f32, now_ms: u64) -> u32 {
        let magnitude = (ax * ax + ay * ay + az * az).sqrt();
        if !magnitude.is_finite() {
            return self.step_count;
        }
        if self.recent.len() == self.cfg.ring_len {
            self.recent.pop_front();
        }
        self.recent.push_back(magnitude);
        let avg = self.recent.iter().sum::<f32>() / self.recent.len() as f32;

        if magnitude > self.cfg.threshold_g
            && magnitude > avg * self.cfg.avg_ratio
            && !self.peak_detected
        {
            let refractory_over = self
                .last_step_ms
                .is_none_or(|t| now_ms.saturating_sub(t) > self.cfg.min_step_interval_ms);
            if refractory_over {
                self.step_count = self.step_count.saturating_add(1);
                self.last_step_ms = Some(now_ms);
                self.peak_detected = true;
                tracing::trace!(steps = self.step_count, magnitude, "step");
            }
        }

        if magnitude < self.cfg.threshold_g * self.cfg.rearm_ratio {
            self.peak_detected = false;
        }
        self.step_count
    }

    pub fn steps(&self) -> u32 {
        self.step_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_count_per_impact_with_rearm() {
        let mut sc = StepCounter::new(StepCfg::default());
        let mut t = 0;
        for _ in 0..4 {
            sc.detect_step(0.0, 0.0, 1.0, t);
            t += 20;
        }
        assert_eq!(sc.detect_step(0.0, 0.0, 2.2, t), 1);
        // still above the rearm level: latched, no double count
        assert_eq!(sc.detect_step(0.0, 0.0, 2.4, t + 600), 1);
        sc.detect_step(0.0, 0.0, 1.0, t + 620);
        for _ in 0..3 {
            sc.detect_step(0.0, 0.0, 1.0, t + 640);
        }
        assert_eq!(sc.detect_step(0.0, 0.0, 2.2, t + 700), 2);
    }

    #[test]
    fn refractory_interval_debounces_fast_impacts() {
        let mut sc = StepCounter::new(StepCfg::default());
        let mut t = 0;
        let mut count = 0;
        // impacts every 200 ms, rearmed in between
        for _ in 0..10 {
            for _ in 0..4 {
                sc.detect_step(0.0, 0.0, 1.0, t);
                t += 40;
            }
            count = sc.detect_step(0.0, 0.0, 2.2, t);
            t += 40;
        }
        // impacts at 160, 360, ..., 1960 ms; only every third clears 500 ms
        assert_eq!(count, 4);
    }
}
