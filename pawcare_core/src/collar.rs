//! Collar acquisition loop: PPG and accelerometer polling, periodic health and
//! battery publishes, and a low-duty standby when nothing useful is measured.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use pawcare_traits::{Accelerometer, BatteryGauge, Clock, PpgSensor};
use serde::Serialize;

use crate::bus::{Publisher, publish_json};
use crate::config::{CollarCfg, EstimatorCfg, SmootherCfg, StepCfg};
use crate::estimator::{estimate_heart_rate, estimate_spo2};
use crate::smoother::HeartRateSmoother;
use crate::steps::StepCounter;
use crate::util::{period_ms, round1, round2};
use crate::vitals::{VitalsReading, battery_percent, battery_voltage, plausible_heart_rate};
use crate::window::SampleWindow;

/// Published on the collar topic every publish interval when something changed.
/// Missing vitals are reported as 0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthPayload {
    pub pet_id: String,
    pub temperature: f32,
    pub heart_rate: u16,
    pub oxygen_level: f32,
    pub steps_value: u32,
    pub power: u8,
}

impl HealthPayload {
    pub fn from_reading(pet_id: &str, r: &VitalsReading) -> Self {
        Self {
            pet_id: pet_id.to_string(),
            temperature: r.temperature_c.map_or(0.0, round1),
            heart_rate: r.heart_rate_bpm.unwrap_or(0),
            oxygen_level: r.spo2_pct.map_or(0.0, f32::from),
            steps_value: r.steps,
            power: r.battery_pct,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatteryPayload {
    pub device_id: String,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    pub battery_percent: u8,
    pub battery_voltage: f32,
    pub status: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollarMode {
    Active,
    Standby,
}

/// What a single `tick` did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub sample_accepted: bool,
    pub estimated: bool,
    pub contact_lost: bool,
    pub published_health: bool,
    pub published_battery: bool,
}

pub struct CollarMonitor<P, A, B> {
    cfg: CollarCfg,
    estimator: EstimatorCfg,
    ppg: P,
    imu: A,
    battery: B,
    clock: Arc<dyn Clock + Send + Sync>,
    bus: Arc<dyn Publisher>,
    window: SampleWindow,
    steps: StepCounter,
    smoother: HeartRateSmoother,
    epoch: Instant,
    pending: VitalsReading,
    last_published_steps: u32,
    battery_pct: u8,
    mode: CollarMode,
    last_valid: Instant,
    last_publish: Option<Instant>,
    last_battery: Option<Instant>,
    last_standby_check: Option<Instant>,
}

impl<P: PpgSensor, A: Accelerometer, B: BatteryGauge> CollarMonitor<P, A, B> {
    pub fn new(
        cfg: CollarCfg,
        estimator: EstimatorCfg,
        smoother: &SmootherCfg,
        steps: StepCfg,
        devices: (P, A, B),
        clock: Arc<dyn Clock + Send + Sync>,
        bus: Arc<dyn Publisher>,
    ) -> Self {
        let (ppg, imu, battery) = devices;
        let now = clock.now();
        let window = SampleWindow::new(cfg.window_capacity, cfg.min_window);
        Self {
            cfg,
            estimator,
            ppg,
            imu,
            battery,
            clock,
            bus,
            window,
            steps: StepCounter::new(steps),
            smoother: HeartRateSmoother::new(smoother),
            epoch: now,
            pending: VitalsReading::new(0, 0, Utc::now()),
            last_published_steps: 0,
            battery_pct: 0,
            mode: CollarMode::Active,
            last_valid: now,
            last_publish: None,
            last_battery: None,
            last_standby_check: None,
        }
    }

    pub fn mode(&self) -> CollarMode {
        self.mode
    }

    pub fn steps(&self) -> u32 {
        self.steps.steps()
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    fn due(&self, last: Option<Instant>, interval_ms: u64, now: Instant) -> bool {
        last.is_none_or(|t| now.saturating_duration_since(t) >= Duration::from_millis(interval_ms))
    }

    fn read_ppg(&mut self) -> Option<(u32, u32)> {
        match self.ppg.read_sample() {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "ppg read failed");
                None
            }
        }
    }

    fn poll_steps(&mut self) -> u32 {
        match self.imu.read_accel() {
            Ok((ax, ay, az)) => {
                let t = self.clock.ms_since(self.epoch);
                self.steps.detect_step(ax, ay, az, t)
            }
            Err(e) => {
                tracing::warn!(error = %e, "accelerometer read failed");
                self.steps.steps()
            }
        }
    }

    fn has_contact(&self, red: u32, ir: u32) -> bool {
        red > self.cfg.contact_floor && ir > self.cfg.contact_floor
    }

    /// Estimate over the current window, retain plausible values, then trim the
    /// window to its tail. Returns whether any value was retained.
    fn estimate(&mut self) -> bool {
        let sample_period = Duration::from_millis(period_ms(self.cfg.sample_rate_hz));
        let elapsed = self.window.span(sample_period).as_secs_f32();
        let (red, ir) = self.window.channels();

        let (hr, _stats) = estimate_heart_rate(&ir, elapsed, &self.estimator);
        let mut retained = false;
        if plausible_heart_rate(hr) {
            let smoothed = self.smoother.push(hr);
            retained |= self.pending.offer_heart_rate(smoothed);
        }
        retained |= self.pending.offer_spo2(estimate_spo2(&red, &ir, &self.estimator));
        match self.ppg.read_temperature() {
            Ok(t) => retained |= self.pending.offer_temperature(t),
            Err(e) => tracing::warn!(error = %e, "temperature read failed"),
        }
        tracing::debug!(
            bpm = hr.bpm(),
            samples = ir.len(),
            elapsed_s = elapsed,
            retained,
            "vitals window processed"
        );

        self.window.retain_tail(self.cfg.keep_tail);
        retained
    }

    fn publish_health(&mut self, steps: u32) -> bool {
        let mut reading = std::mem::replace(
            &mut self.pending,
            VitalsReading::new(steps, self.battery_pct, Utc::now()),
        );
        reading.steps = steps;
        reading.battery_pct = self.battery_pct;
        reading.timestamp = Utc::now();
        let payload = HealthPayload::from_reading(&self.cfg.pet_id, &reading);
        tracing::info!(
            heart_rate = payload.heart_rate,
            spo2 = payload.oxygen_level,
            temperature = payload.temperature,
            steps,
            power = payload.power,
            "health data"
        );
        self.last_published_steps = steps;
        publish_json(self.bus.as_ref(), &self.cfg.health_topic, &payload)
    }

    fn publish_battery(&mut self) -> bool {
        let raw = match self.battery.read_raw() {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "battery read failed");
                return false;
            }
        };
        let voltage = battery_voltage(raw, self.cfg.battery_divider);
        let percent = battery_percent(voltage);
        self.battery_pct = percent;
        let payload = BatteryPayload {
            device_id: self.cfg.device_id.clone(),
            timestamp: Utc::now().timestamp_millis() as f64 / 1000.0,
            battery_percent: percent,
            battery_voltage: round2(voltage),
            status: if percent > 20 { "normal" } else { "low" },
        };
        tracing::info!(percent, voltage = payload.battery_voltage, "battery status");
        publish_json(self.bus.as_ref(), &self.cfg.battery_topic, &payload)
    }

    /// One poll of the sensors plus any periodic work that has come due.
    pub fn tick(&mut self) -> TickSummary {
        let now = self.clock.now();
        match self.mode {
            CollarMode::Active => self.tick_active(now),
            CollarMode::Standby => self.tick_standby(now),
        }
    }

    fn tick_active(&mut self, now: Instant) -> TickSummary {
        let mut summary = TickSummary::default();
        let mut has_valid = false;

        match self.read_ppg() {
            Some((red, ir)) if self.has_contact(red, ir) => {
                self.window.push(red, ir, now);
                summary.sample_accepted = true;
                if self.window.len() >= self.cfg.min_window {
                    summary.estimated = true;
                    has_valid |= self.estimate();
                }
            }
            Some(_) if !self.window.is_empty() => {
                tracing::warn!(discarded = self.window.len(), "sensor contact lost, clearing window");
                self.window.clear();
                summary.contact_lost = true;
            }
            _ => {}
        }

        let steps = self.poll_steps();
        if steps != self.last_published_steps {
            has_valid = true;
        }
        if has_valid {
            self.last_valid = now;
        }

        if now.saturating_duration_since(self.last_valid)
            >= Duration::from_millis(self.cfg.standby_timeout_ms)
        {
            tracing::info!(
                idle_ms = self.cfg.standby_timeout_ms,
                "no valid data, entering standby"
            );
            self.mode = CollarMode::Standby;
            self.last_standby_check = Some(now);
            return summary;
        }

        if self.due(self.last_publish, self.cfg.publish_interval_ms, now) {
            if self.pending.has_vitals() || steps != self.last_published_steps {
                summary.published_health = self.publish_health(steps);
            }
            self.last_publish = Some(now);
        }

        if self.due(self.last_battery, self.cfg.battery_interval_ms, now) {
            summary.published_battery = self.publish_battery();
            self.last_battery = Some(now);
        }
        summary
    }

    fn tick_standby(&mut self, now: Instant) -> TickSummary {
        let mut summary = TickSummary::default();
        if self.due(self.last_battery, self.cfg.battery_interval_ms, now) {
            summary.published_battery = self.publish_battery();
            self.last_battery = Some(now);
        }
        if self.due(self.last_standby_check, self.cfg.standby_check_interval_ms, now) {
            let contact = self
                .read_ppg()
                .is_some_and(|(red, ir)| self.has_contact(red, ir));
            let steps = self.poll_steps();
            if contact || steps != self.last_published_steps {
                tracing::info!(contact, steps, "activity detected, leaving standby");
                self.mode = CollarMode::Active;
                self.last_valid = now;
                self.window.clear();
            }
            self.last_standby_check = Some(now);
        }
        summary
    }

    /// Poll until `shutdown` is set or `max_ticks` ticks have run.
    ///
    /// Active ticks are paced at the sample period; standby ticks at the
    /// standby check interval, sliced so shutdown stays responsive.
    pub fn run(&mut self, shutdown: &AtomicBool, max_ticks: Option<u64>) -> u64 {
        let sample_period = Duration::from_millis(period_ms(self.cfg.sample_rate_hz));
        let slice = Duration::from_millis(100);
        let mut ticks = 0u64;
        tracing::info!(pet_id = %self.cfg.pet_id, "collar monitor started");
        while !shutdown.load(Ordering::Relaxed) && max_ticks.is_none_or(|m| ticks < m) {
            self.tick();
            ticks += 1;
            match self.mode {
                CollarMode::Active => self.clock.sleep(sample_period),
                CollarMode::Standby => {
                    let mut left = Duration::from_millis(self.cfg.standby_check_interval_ms);
                    while !left.is_zero() && !shutdown.load(Ordering::Relaxed) {
                        let d = left.min(slice);
                        self.clock.sleep(d);
                        left -= d;
                    }
                }
            }
        }
        tracing::info!(ticks, steps = self.steps.steps(), "collar monitor stopped");
        ticks
    }
}
