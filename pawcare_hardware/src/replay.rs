//! Devices that play back a recorded sensor trace.
use pawcare_traits::{Accelerometer, PpgSensor};
use std::collections::VecDeque;

/// Replays recorded `(red, ir)` pairs; reports an empty FIFO once the trace is exhausted.
pub struct ReplayPpg {
    samples: VecDeque<(u32, u32)>,
    temperature_c: f32,
}

impl ReplayPpg {
    pub fn new(samples: impl IntoIterator<Item = (u32, u32)>, temperature_c: f32) -> Self {
        Self {
            samples: samples.into_iter().collect(),
            temperature_c,
        }
    }

    pub fn remaining(&self) -> usize {
        self.samples.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.samples.is_empty()
    }
}

impl PpgSensor for ReplayPpg {
    fn read_sample(&mut self) -> Result<Option<(u32, u32)>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.samples.pop_front())
    }

    fn read_temperature(&mut self) -> Result<f32, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.temperature_c)
    }
}

/// Replays recorded accelerometer triples, then holds still at 1 g.
pub struct ReplayImu {
    samples: VecDeque<(f32, f32, f32)>,
}

impl ReplayImu {
    pub fn new(samples: impl IntoIterator<Item = (f32, f32, f32)>) -> Self {
        Self {
            samples: samples.into_iter().collect(),
        }
    }
}

impl Accelerometer for ReplayImu {
    fn read_accel(&mut self) -> Result<(f32, f32, f32), Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.samples.pop_front().unwrap_or((0.0, 0.0, 1.0)))
    }
}
