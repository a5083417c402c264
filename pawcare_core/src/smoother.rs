//! Trailing average over recent valid heart-rate estimates.
use std::collections::VecDeque;

use crate::config::SmootherCfg;
use crate::estimator::HeartRate;

#[derive(Debug, Clone)]
pub struct HeartRateSmoother {
    recent: VecDeque<u16>,
    window: usize,
    jump_warn_bpm: u16,
    last_stable: Option<u16>,
}

impl HeartRateSmoother {
    pub fn new(cfg: &SmootherCfg) -> Self {
        let window = cfg.window.max(1);
        Self {
            recent: VecDeque::with_capacity(window),
            window,
            jump_warn_bpm: cfg.jump_warn_bpm,
            last_stable: None,
        }
    }

    /// Feed one estimate and return the smoothed rate.
    ///
    /// `HeartRate::NONE` is ignored; the previous stable value (or `NONE` if
    /// there is none yet) is returned unchanged.
    pub fn push(&mut self, hr: HeartRate) -> HeartRate {
        if !hr.is_reading() {
            return self.current();
        }
        if self.recent.len() == self.window {
            self.recent.pop_front();
        }
        self.recent.push_back(hr.bpm());
        let sum: u32 = self.recent.iter().map(|&b| u32::from(b)).sum();
        let stable = (sum / self.recent.len() as u32) as u16;
        if let Some(prev) = self.last_stable
            && prev.abs_diff(stable) > self.jump_warn_bpm
        {
            tracing::warn!(prev, stable, "heart rate jumped");
        }
        self.last_stable = Some(stable);
        HeartRate(stable)
    }

    pub fn current(&self) -> HeartRate {
        self.last_stable.map_or(HeartRate::NONE, HeartRate)
    }

    pub fn reset(&mut self) {
        self.recent.clear();
        self.last_stable = None;
    }
}
