//! Calibration procedures and the persisted distance scale.
use std::{fs, io::Write, path::Path};

use serde::{Deserialize, Serialize};

pub const DEFAULT_DISTANCE_SCALE: f32 = 1.0;

/// Multiplier applied to every raw ranging reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceCalibration {
    #[serde(default = "default_scale")]
    pub distance_scale: f32,
}

fn default_scale() -> f32 {
    DEFAULT_DISTANCE_SCALE
}

impl Default for DistanceCalibration {
    fn default() -> Self {
        Self {
            distance_scale: DEFAULT_DISTANCE_SCALE,
        }
    }
}

impl DistanceCalibration {
    /// Load the scale from `path`. A missing, unreadable or malformed file,
    /// or a non-positive value, falls back to the default of 1.0.
    pub fn load_or_default(path: &Path) -> Self {
        let parsed = fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str::<Self>(&s).ok());
        match parsed {
            Some(c) if c.distance_scale.is_finite() && c.distance_scale > 0.0 => c,
            Some(c) => {
                tracing::warn!(scale = c.distance_scale, path = %path.display(), "ignoring invalid distance scale");
                Self::default()
            }
            None => {
                tracing::debug!(path = %path.display(), "no distance calibration, using default");
                Self::default()
            }
        }
    }

    /// Persist the scale, preserving any unrelated keys already in the file.
    pub fn save(&self, path: &Path) -> eyre::Result<()> {
        let mut doc = fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str::<serde_json::Value>(&s).ok())
            .filter(serde_json::Value::is_object)
            .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()));
        if let Some(obj) = doc.as_object_mut() {
            obj.insert(
                "distance_scale".to_string(),
                serde_json::Value::from(f64::from(self.distance_scale)),
            );
        }
        let bytes = serde_json::to_vec_pretty(&doc)?;
        write_atomic(path, &bytes)
            .map_err(|e| eyre::eyre!("write distance calibration {}: {}", path.display(), e))?;
        tracing::info!(scale = self.distance_scale, path = %path.display(), "distance calibration saved");
        Ok(())
    }
}

pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("new");
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(tmp, path)
}

/// Compute `actual_mm / trimmed_mean(raw)`.
///
/// Samples are sorted and `max(1, len * trim_ratio)` are dropped from each end.
/// Fewer than 5 samples, or a trim that leaves nothing, is an error. A
/// non-positive mean yields the default scale rather than an error.
pub fn distance_scale_from_samples(raw: &[f32], actual_mm: f32, trim_ratio: f32) -> eyre::Result<f32> {
    if !(actual_mm.is_finite() && actual_mm > 0.0) {
        eyre::bail!("actual distance must be a positive number of millimetres");
    }
    let mut samples: Vec<f32> = raw.iter().copied().filter(|v| v.is_finite()).collect();
    if samples.len() < 5 {
        eyre::bail!("not enough distance samples: got {}, need at least 5", samples.len());
    }
    samples.sort_by(f32::total_cmp);
    let trim = ((samples.len() as f32 * trim_ratio) as usize).max(1);
    if 2 * trim >= samples.len() {
        eyre::bail!("trim ratio leaves no samples (len {}, trim {})", samples.len(), trim);
    }
    let kept = &samples[trim..samples.len() - trim];
    let mean = kept.iter().sum::<f32>() / kept.len() as f32;
    if mean <= 0.0 {
        tracing::warn!(mean, "mean distance not positive, keeping default scale");
        return Ok(DEFAULT_DISTANCE_SCALE);
    }
    Ok(actual_mm / mean)
}

fn trimmed_mean_i32(raw: &[i32], trim: usize) -> eyre::Result<f64> {
    if raw.len() <= 2 * trim {
        eyre::bail!("not enough scale samples: got {}, need more than {}", raw.len(), 2 * trim);
    }
    let mut samples = raw.to_vec();
    samples.sort_unstable();
    let kept = &samples[trim..samples.len() - trim];
    Ok(kept.iter().map(|&v| f64::from(v)).sum::<f64>() / kept.len() as f64)
}

/// Raw reading of the empty scale, dropping `trim` readings from each end.
pub fn zero_counts_from_samples(raw: &[i32], trim: usize) -> eyre::Result<i32> {
    Ok(trimmed_mean_i32(raw, trim)?.round() as i32)
}

/// Compute raw counts per gram from samples taken with a known mass on the
/// scale, dropping `trim` readings from each end after sorting. Samples must
/// already have the zero offset removed.
pub fn reference_unit_from_samples(raw: &[i32], known_grams: f32, trim: usize) -> eyre::Result<f32> {
    if !(known_grams.is_finite() && known_grams > 0.0) {
        eyre::bail!("known weight must be a positive number of grams");
    }
    let avg = trimmed_mean_i32(raw, trim)?;
    let unit = (avg / f64::from(known_grams)) as f32;
    if unit == 0.0 || !unit.is_finite() {
        eyre::bail!("calibration produced an unusable reference unit ({unit})");
    }
    Ok(unit)
}
