//! Simulated devices for running the collar and feeder stacks off-target.
//!
//! The feeder simulation shares one `SimBowl` between the scale and the feed
//! servo so that dispensing visibly raises the measured weight.
use pawcare_traits::{Accelerometer, BatteryGauge, DistanceSensor, PpgSensor, Scale, Servo};
use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Food currently sitting in the simulated bowl.
#[derive(Debug, Clone, Default)]
pub struct SimBowl {
    grams: Arc<Mutex<f32>>,
}

impl SimBowl {
    pub fn new(grams: f32) -> Self {
        Self {
            grams: Arc::new(Mutex::new(grams.max(0.0))),
        }
    }

    pub fn grams(&self) -> f32 {
        self.grams.lock().map(|g| *g).unwrap_or(0.0)
    }

    pub fn add(&self, grams: f32) {
        if let Ok(mut g) = self.grams.lock() {
            *g = (*g + grams).max(0.0);
        }
    }

    pub fn set(&self, grams: f32) {
        if let Ok(mut g) = self.grams.lock() {
            *g = grams.max(0.0);
        }
    }
}

/// Load cell over a `SimBowl`, reporting raw counts as an HX711 would.
pub struct SimulatedScale {
    bowl: SimBowl,
    reference_unit: f32,
    zero_counts: i32,
    reads: u32,
}

impl SimulatedScale {
    pub fn new(bowl: SimBowl, reference_unit: f32) -> Self {
        Self {
            bowl,
            reference_unit,
            zero_counts: 8_400,
            reads: 0,
        }
    }

    pub fn zero_counts(&self) -> i32 {
        self.zero_counts
    }
}

impl Scale for SimulatedScale {
    fn read(
        &mut self,
        _timeout: std::time::Duration,
    ) -> Result<i32, Box<dyn std::error::Error + Send + Sync>> {
        // Deterministic +-1 count jitter so filters have something to reject
        let jitter = (self.reads % 3) as i32 - 1;
        self.reads = self.reads.wrapping_add(1);
        let raw = self.zero_counts + (self.bowl.grams() * self.reference_unit).round() as i32 + jitter;
        Ok(raw)
    }
}

/// Feed auger servo: every non-zero duty command drops `grams_per_move` into the bowl.
pub struct SimulatedFeedServo {
    bowl: SimBowl,
    grams_per_move: f32,
    duties: Arc<Mutex<Vec<f32>>>,
}

impl SimulatedFeedServo {
    pub fn new(bowl: SimBowl, grams_per_move: f32) -> Self {
        Self {
            bowl,
            grams_per_move,
            duties: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared handle on every duty value commanded so far.
    pub fn history(&self) -> Arc<Mutex<Vec<f32>>> {
        Arc::clone(&self.duties)
    }
}

impl Servo for SimulatedFeedServo {
    fn set_duty(&mut self, duty_pct: f32) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if let Ok(mut d) = self.duties.lock() {
            d.push(duty_pct);
        }
        if duty_pct > 0.0 {
            self.bowl.add(self.grams_per_move);
            debug!(duty_pct, bowl_g = self.bowl.grams(), "feed servo move (simulated)");
        }
        Ok(())
    }
}

/// Positional servo that only records the commanded duty values.
#[derive(Default)]
pub struct SimulatedServo {
    duties: Arc<Mutex<Vec<f32>>>,
}

impl SimulatedServo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Arc<Mutex<Vec<f32>>> {
        Arc::clone(&self.duties)
    }
}

impl Servo for SimulatedServo {
    fn set_duty(&mut self, duty_pct: f32) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if let Ok(mut d) = self.duties.lock() {
            d.push(duty_pct);
        }
        Ok(())
    }
}

/// Ranging sensor reporting a settable distance.
#[derive(Debug, Clone)]
pub struct SimulatedRanger {
    mm: Arc<Mutex<f32>>,
}

impl SimulatedRanger {
    pub fn new(mm: f32) -> Self {
        Self {
            mm: Arc::new(Mutex::new(mm)),
        }
    }

    pub fn set_mm(&self, mm: f32) {
        if let Ok(mut v) = self.mm.lock() {
            *v = mm;
        }
    }
}

impl DistanceSensor for SimulatedRanger {
    fn read_mm(&mut self) -> Result<f32, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.mm.lock().map(|v| *v).unwrap_or(0.0))
    }
}

/// Synthetic pulse oximeter front end producing a sinusoidal pulse at `bpm`.
pub struct SimulatedPpg {
    sample_rate_hz: f32,
    bpm: f32,
    dc_red: f32,
    dc_ir: f32,
    ac_red: f32,
    ac_ir: f32,
    temperature_c: f32,
    n: u64,
    contact: Arc<AtomicBool>,
}

impl SimulatedPpg {
    pub fn new(sample_rate_hz: u32, bpm: f32) -> Self {
        Self {
            sample_rate_hz: sample_rate_hz.max(1) as f32,
            bpm,
            dc_red: 60_000.0,
            dc_ir: 80_000.0,
            ac_red: 1_800.0,
            ac_ir: 4_000.0,
            temperature_c: 38.5,
            n: 0,
            contact: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Shared flag toggling whether the sensor is pressed against skin.
    pub fn contact_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.contact)
    }
}

impl PpgSensor for SimulatedPpg {
    fn read_sample(&mut self) -> Result<Option<(u32, u32)>, Box<dyn std::error::Error + Send + Sync>> {
        let t = self.n as f32 / self.sample_rate_hz;
        self.n = self.n.wrapping_add(1);
        if !self.contact.load(Ordering::Relaxed) {
            return Ok(Some((400, 350)));
        }
        let phase = (TAU * self.bpm / 60.0 * t).sin();
        let red = self.dc_red + self.ac_red * phase;
        let ir = self.dc_ir + self.ac_ir * phase;
        Ok(Some((red.max(0.0) as u32, ir.max(0.0) as u32)))
    }

    fn read_temperature(&mut self) -> Result<f32, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.temperature_c)
    }
}

/// Accelerometer that produces one impact spike per simulated step on top of 1 g gravity.
pub struct SimulatedImu {
    samples_per_step: u64,
    n: u64,
}

impl SimulatedImu {
    pub fn new(sample_rate_hz: u32, steps_per_minute: u32) -> Self {
        let per_step = u64::from(sample_rate_hz.max(1)) * 60 / u64::from(steps_per_minute.max(1));
        Self {
            samples_per_step: per_step.max(1),
            n: 0,
        }
    }
}

impl Accelerometer for SimulatedImu {
    fn read_accel(&mut self) -> Result<(f32, f32, f32), Box<dyn std::error::Error + Send + Sync>> {
        let phase = self.n % self.samples_per_step;
        self.n = self.n.wrapping_add(1);
        let z = match phase {
            0 => 2.1,
            1 => 1.6,
            _ => 1.0,
        };
        Ok((0.05, -0.02, z))
    }
}

/// Battery ADC returning a fixed raw reading.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedBattery {
    pub raw: u16,
}

impl Default for SimulatedBattery {
    fn default() -> Self {
        // ~3.9 V behind the 1:2 divider
        Self { raw: 2_420 }
    }
}

impl BatteryGauge for SimulatedBattery {
    fn read_raw(&mut self) -> Result<u16, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.raw)
    }
}
