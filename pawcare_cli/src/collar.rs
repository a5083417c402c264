//! `pawcare collar`: run the acquisition loop against simulated, replayed or real sensors.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use eyre::WrapErr;
use pawcare_config::Config;
use pawcare_core::bus::{JsonLinesBus, Publisher};
use pawcare_core::collar::CollarMonitor;
use pawcare_core::config::{CollarCfg, EstimatorCfg, SmootherCfg, StepCfg};
use pawcare_traits::clock::{Clock, MonotonicClock};

use crate::devices::{self, CollarDevices};

pub struct CollarArgs<'a> {
    pub trace: Option<&'a Path>,
    pub ticks: Option<u64>,
    pub fast: bool,
    pub sim_bpm: f32,
    pub sim_steps_per_min: u32,
    pub trace_temperature: f32,
}

pub fn clock_for(fast: bool) -> Arc<dyn Clock + Send + Sync> {
    if fast {
        Arc::new(pawcare_traits::clock::test_clock::TestClock::new())
    } else {
        Arc::new(MonotonicClock::new())
    }
}

/// Warn when a trace was recorded at a different rate than the loop will replay it.
fn check_trace_rate(rows: &[pawcare_config::TraceRow], sample_rate_hz: u32) {
    let (Some(first), Some(last)) = (rows.first(), rows.last()) else {
        return;
    };
    if rows.len() < 2 || sample_rate_hz == 0 {
        return;
    }
    let recorded_ms = (last.t_ms - first.t_ms) as f32 / (rows.len() - 1) as f32;
    let expected_ms = 1000.0 / sample_rate_hz as f32;
    if (recorded_ms - expected_ms).abs() > expected_ms * 0.2 {
        tracing::warn!(
            recorded_ms,
            expected_ms,
            "trace sample spacing differs from collar.sample_rate_hz; rates will be skewed"
        );
    }
}

pub fn run_collar(cfg: &Config, args: &CollarArgs<'_>, shutdown: &AtomicBool) -> eyre::Result<u64> {
    let (devs, ticks) = match args.trace {
        Some(path) => {
            let rows = pawcare_config::load_trace_csv(path)
                .wrap_err_with(|| format!("load trace {}", path.display()))?;
            check_trace_rate(&rows, cfg.collar.sample_rate_hz);
            tracing::info!(rows = rows.len(), path = %path.display(), "replaying trace");
            let ticks = args.ticks.unwrap_or(rows.len() as u64);
            (devices::collar_replay(&rows, args.trace_temperature), Some(ticks))
        }
        None => (
            devices::collar_devices(cfg, args.sim_bpm, args.sim_steps_per_min)?,
            args.ticks,
        ),
    };
    let CollarDevices { ppg, imu, battery } = devs;

    let bus: Arc<dyn Publisher> = Arc::new(JsonLinesBus::new(std::io::stdout()));
    let mut monitor = CollarMonitor::new(
        CollarCfg::from(cfg),
        EstimatorCfg::from(&cfg.estimator),
        &SmootherCfg::from(&cfg.estimator),
        StepCfg::from(&cfg.steps),
        (ppg, imu, battery),
        clock_for(args.fast),
        bus,
    );
    let ran = monitor.run(shutdown, ticks);
    tracing::info!(ticks = ran, steps = monitor.steps(), mode = ?monitor.mode(), "collar finished");
    Ok(ran)
}
