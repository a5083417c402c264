//! Operator calibration procedures for the ranging sensors and the load cell.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::WrapErr;
use pawcare_config::{
    Config, DistanceCalibration, distance_scale_from_samples, reference_unit_from_samples,
    zero_counts_from_samples,
};
use pawcare_traits::Scale;
use serde_json::json;

use crate::cli::Channel;
use crate::devices;
use crate::feeder::resolve_near_config;

const DISTANCE_SAMPLE_GAP: Duration = Duration::from_millis(20);
const SCALE_SAMPLE_GAP: Duration = Duration::from_millis(30);

pub struct DistanceArgs<'a> {
    pub config_path: Option<&'a Path>,
    pub actual_mm: f32,
    pub channel: Channel,
    pub output: Option<&'a Path>,
    pub sim_raw_mm: f32,
}

/// Sample the ranger, compute `actual / trimmed_mean(raw)` and persist it.
pub fn calibrate_distance(cfg: &Config, args: &DistanceArgs<'_>) -> eyre::Result<f32> {
    let mut ranger = devices::ranger(cfg, args.channel, args.sim_raw_mm)?;
    let wanted = cfg.distance.calibration_samples;
    let mut raw = Vec::with_capacity(wanted);
    for i in 0..wanted {
        match ranger.read_mm() {
            Ok(mm) => raw.push(mm),
            Err(e) => tracing::warn!(sample = i, error = %e, "distance read failed"),
        }
        std::thread::sleep(DISTANCE_SAMPLE_GAP);
    }
    let scale = distance_scale_from_samples(&raw, args.actual_mm, cfg.distance.trim_ratio)?;

    let path: PathBuf = match args.output {
        Some(p) => p.to_path_buf(),
        None => resolve_near_config(args.config_path, &cfg.distance.calibration_file),
    };
    DistanceCalibration {
        distance_scale: scale,
    }
    .save(&path)?;

    println!(
        "{}",
        json!({
            "channel": format!("{:?}", args.channel).to_lowercase(),
            "samples": raw.len(),
            "distance_scale": scale,
            "file": path.display().to_string(),
        })
    );
    Ok(scale)
}

fn collect_raw(scale: &mut dyn Scale, n: usize, timeout: Duration) -> Vec<i32> {
    let mut raw = Vec::with_capacity(n);
    for i in 0..n {
        match scale.read(timeout) {
            Ok(v) => raw.push(v),
            Err(e) => tracing::warn!(sample = i, error = %e, "scale read failed"),
        }
        std::thread::sleep(SCALE_SAMPLE_GAP);
    }
    raw
}

/// Tare, then weigh a known mass. Prints the `[scale]` values to put in the config.
pub fn calibrate_scale(
    cfg: &Config,
    known_grams: f32,
    no_wait: bool,
    mut input: impl BufRead,
) -> eyre::Result<(i32, f32)> {
    if !(known_grams.is_finite() && known_grams > 0.0) {
        eyre::bail!("known weight must be a positive number of grams");
    }
    let mut devs = devices::feeder_devices(cfg)?;
    let n = cfg.scale.calibration_samples;
    let trim = cfg.scale.calibration_trim;
    let timeout = Duration::from_millis(cfg.scale.read_timeout_ms);

    tracing::info!(samples = n, "taring: keep the bowl empty");
    let empty = collect_raw(devs.scale.as_mut(), n, timeout);
    let zero_counts = zero_counts_from_samples(&empty, trim)?;

    if let Some(bowl) = &devs.bowl {
        bowl.add(known_grams);
    } else if !no_wait {
        eprintln!("Place {known_grams} g on the scale, then press Enter.");
        let mut line = String::new();
        input.read_line(&mut line).wrap_err("wait for operator")?;
    }

    let loaded = collect_raw(devs.scale.as_mut(), n, timeout);
    let deltas: Vec<i32> = loaded.iter().map(|r| r.saturating_sub(zero_counts)).collect();
    let reference_unit = reference_unit_from_samples(&deltas, known_grams, trim)?;
    tracing::info!(zero_counts, reference_unit, "scale calibrated; copy into [scale]");

    println!(
        "{}",
        json!({
            "zero_counts": zero_counts,
            "reference_unit": reference_unit,
            "known_grams": known_grams,
        })
    );
    Ok((zero_counts, reference_unit))
}
