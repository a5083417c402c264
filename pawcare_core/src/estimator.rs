//! Heart-rate and SpO2 estimation from PPG sample windows.
//!
//! Both estimators are total: every input produces an answer, and "no reading"
//! is expressed as a sentinel (`HeartRate::NONE`, SpO2 `0`) rather than an error.
//! Callers must treat the sentinel as unknown, never as a measured zero.
use serde::Serialize;

use crate::config::EstimatorCfg;
use crate::filter::weighted_moving_average;
use crate::stats::{Quartiles, mean, min_max, std_dev, upper_median};

/// Beats per minute; `HeartRate::NONE` (0) means no reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct HeartRate(pub u16);

impl HeartRate {
    pub const NONE: Self = Self(0);

    #[inline]
    pub fn bpm(self) -> u16 {
        self.0
    }

    #[inline]
    pub fn is_reading(self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for HeartRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_reading() {
            write!(f, "{} bpm", self.0)
        } else {
            f.write_str("no reading")
        }
    }
}

/// Which central interval estimate produced the rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalMethod {
    Mean,
    Median,
}

/// Peak-interval statistics behind a heart-rate estimate. Intervals are in samples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntervalStats {
    pub peak_count: usize,
    pub interval_count: usize,
    pub valid_interval_count: usize,
    pub mean_interval: f32,
    pub median_interval: f32,
    pub std_dev: f32,
    pub cv: f32,
    pub method: IntervalMethod,
    pub signal_range: f32,
    pub q1: f32,
    pub q3: f32,
    pub iqr: f32,
}

/// Why a window produced no heart-rate reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoReading {
    /// Too few samples or a non-positive elapsed time.
    InsufficientData { samples: usize },
    /// Filtered signal range below the contact floor.
    LowSignal { range: f32 },
    TooFewPeaks { found: usize },
    /// Computed rate outside the plausible band.
    OutOfRange { bpm: f32 },
}

impl std::fmt::Display for NoReading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientData { samples } => write!(f, "insufficient data ({samples} samples)"),
            Self::LowSignal { range } => write!(f, "signal range {range:.0} below floor"),
            Self::TooFewPeaks { found } => write!(f, "only {found} peaks found"),
            Self::OutOfRange { bpm } => write!(f, "rate {bpm:.1} bpm outside plausible band"),
        }
    }
}

/// Indices of accepted peaks in a filtered window.
///
/// A peak beats the threshold, is strictly greater than two neighbours on each
/// side, lies more than `min_distance` samples after the previous accepted
/// peak, and clears the normalized quality floor.
fn find_peaks(filtered: &[f32], min: f32, range: f32, cfg: &EstimatorCfg) -> Vec<usize> {
    let n = filtered.len();
    let threshold = min + range * cfg.peak_threshold_ratio;
    let min_distance = (n / 20).max(8);
    let mut peaks = Vec::new();
    let mut last_peak: Option<usize> = None;
    for i in 2..n.saturating_sub(2) {
        let v = filtered[i];
        let is_local_max = v > filtered[i - 1]
            && v > filtered[i - 2]
            && v > filtered[i + 1]
            && v > filtered[i + 2];
        let spaced = last_peak.is_none_or(|p| i - p > min_distance);
        if v > threshold && is_local_max && spaced && (v - min) / range > cfg.peak_quality_floor {
            peaks.push(i);
            last_peak = Some(i);
        }
    }
    peaks
}

/// Estimate heart rate from IR samples collected over `elapsed_s` seconds.
///
/// Returns the rounded rate with its interval statistics, or the reason no
/// reading was produced.
pub fn try_estimate_heart_rate(
    ir: &[f32],
    elapsed_s: f32,
    cfg: &EstimatorCfg,
) -> Result<(HeartRate, IntervalStats), NoReading> {
    if ir.len() < cfg.min_samples || !(elapsed_s.is_finite() && elapsed_s > 0.0) {
        return Err(NoReading::InsufficientData { samples: ir.len() });
    }

    let filtered = weighted_moving_average(ir);
    let (min, max) = min_max(&filtered).ok_or(NoReading::InsufficientData { samples: 0 })?;
    let range = max - min;
    if range < cfg.min_signal_range || range <= 0.0 {
        return Err(NoReading::LowSignal { range });
    }

    let peaks = find_peaks(&filtered, min, range, cfg);
    if peaks.len() < cfg.min_peaks.max(2) {
        return Err(NoReading::TooFewPeaks { found: peaks.len() });
    }

    let mut intervals: Vec<f32> = peaks.windows(2).map(|w| (w[1] - w[0]) as f32).collect();
    intervals.sort_by(f32::total_cmp);
    let quartiles = Quartiles::from_sorted(&intervals).ok_or(NoReading::TooFewPeaks {
        found: peaks.len(),
    })?;
    let (lower, upper) = quartiles.fences(1.5);
    let mut valid: Vec<f32> = intervals
        .iter()
        .copied()
        .filter(|iv| (lower..=upper).contains(iv))
        .collect();
    if valid.len() < 2 {
        valid.clone_from(&intervals);
    }

    let mean_interval = mean(&valid).unwrap_or(0.0);
    let median_interval = upper_median(&valid).unwrap_or(0.0);
    let sd = std_dev(&valid, mean_interval);
    let cv = if mean_interval > 0.0 { sd / mean_interval } else { 0.0 };
    let (method, chosen) = if cv > cfg.cv_threshold {
        (IntervalMethod::Median, median_interval)
    } else {
        (IntervalMethod::Mean, mean_interval)
    };

    let stats = IntervalStats {
        peak_count: peaks.len(),
        interval_count: intervals.len(),
        valid_interval_count: valid.len(),
        mean_interval,
        median_interval,
        std_dev: sd,
        cv,
        method,
        signal_range: range,
        q1: quartiles.q1,
        q3: quartiles.q3,
        iqr: quartiles.iqr(),
    };

    let sample_rate = ir.len() as f32 / elapsed_s;
    let bpm = 60.0 * sample_rate / chosen;
    if !bpm.is_finite() || bpm < f32::from(cfg.min_bpm) || bpm > f32::from(cfg.max_bpm) {
        return Err(NoReading::OutOfRange { bpm });
    }
    Ok((HeartRate(bpm.round() as u16), stats))
}

/// Sentinel-returning wrapper around [`try_estimate_heart_rate`].
pub fn estimate_heart_rate(
    ir: &[f32],
    elapsed_s: f32,
    cfg: &EstimatorCfg,
) -> (HeartRate, Option<IntervalStats>) {
    match try_estimate_heart_rate(ir, elapsed_s, cfg) {
        Ok((hr, stats)) => {
            tracing::debug!(
                bpm = hr.bpm(),
                peaks = stats.peak_count,
                cv = stats.cv,
                method = ?stats.method,
                "heart rate estimated"
            );
            (hr, Some(stats))
        }
        Err(reason) => {
            tracing::debug!(%reason, "no heart rate reading");
            (HeartRate::NONE, None)
        }
    }
}

/// Order-statistic trim: keep `sorted[n*ratio .. n*(1-ratio)]`.
fn trimmed_channel(xs: &[f32], ratio: f32) -> Vec<f32> {
    let mut v = xs.to_vec();
    v.sort_by(f32::total_cmp);
    let n = v.len() as f64;
    let lo = (n * f64::from(ratio)) as usize;
    let hi = ((n * (1.0 - f64::from(ratio))) as usize).min(v.len());
    if lo >= hi {
        return Vec::new();
    }
    v[lo..hi].to_vec()
}

/// SpO2 percentage from raw red/IR channels; `0` means no reading.
///
/// `R = (red_ac / red_mean) / (ir_ac / ir_mean)` over each channel's trimmed
/// samples, then `intercept - slope * R` truncated and clamped to `0..=100`.
pub fn estimate_spo2(red: &[f32], ir: &[f32], cfg: &EstimatorCfg) -> u8 {
    if red.len() < cfg.spo2_min_samples || ir.len() < cfg.spo2_min_samples {
        return 0;
    }
    let red_t = trimmed_channel(red, cfg.spo2_trim_ratio);
    let ir_t = trimmed_channel(ir, cfg.spo2_trim_ratio);
    let (Some(red_mean), Some(ir_mean)) = (mean(&red_t), mean(&ir_t)) else {
        return 0;
    };
    if red_mean == 0.0 || ir_mean == 0.0 {
        return 0;
    }
    let (Some((red_lo, red_hi)), Some((ir_lo, ir_hi))) = (min_max(&red_t), min_max(&ir_t)) else {
        return 0;
    };
    let ir_ratio = (ir_hi - ir_lo) / ir_mean;
    if ir_ratio <= 0.0 {
        tracing::debug!("flat IR channel, no SpO2 reading");
        return 0;
    }
    let r = ((red_hi - red_lo) / red_mean) / ir_ratio;
    let spo2 = (cfg.spo2_intercept - cfg.spo2_slope * r).trunc();
    spo2.clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pulse(n: usize, period: f32, dc: f32, ac: f32) -> Vec<f32> {
        (0..n)
            .map(|i| dc + ac * (std::f32::consts::TAU * i as f32 / period).sin())
            .collect()
    }

    #[test]
    fn short_window_is_insufficient() {
        let cfg = EstimatorCfg::default();
        let ir = pulse(49, 25.0, 80_000.0, 4_000.0);
        assert_eq!(
            try_estimate_heart_rate(&ir, 1.0, &cfg),
            Err(NoReading::InsufficientData { samples: 49 })
        );
    }

    #[test]
    fn zero_elapsed_is_insufficient() {
        let cfg = EstimatorCfg::default();
        let ir = pulse(150, 25.0, 80_000.0, 4_000.0);
        assert_eq!(estimate_heart_rate(&ir, 0.0, &cfg), (HeartRate::NONE, None));
    }

    #[test]
    fn clean_pulse_uses_mean_interval() {
        let cfg = EstimatorCfg::default();
        // 50 Hz, 25-sample period => 120 bpm
        let ir = pulse(150, 25.0, 80_000.0, 4_000.0);
        let (hr, stats) = try_estimate_heart_rate(&ir, 3.0, &cfg).unwrap();
        assert_eq!(hr, HeartRate(120));
        assert_eq!(stats.method, IntervalMethod::Mean);
        assert_eq!(stats.peak_count, stats.interval_count + 1);
        assert!(stats.cv < 0.05);
    }

    /// Baseline with a sharp symmetric pulse centred on each position.
    fn pulse_train(n: usize, positions: &[usize]) -> Vec<f32> {
        let mut x = vec![80_000.0; n];
        for &p in positions {
            x[p - 2] += 1_000.0;
            x[p - 1] += 2_000.0;
            x[p] += 4_000.0;
            x[p + 1] += 2_000.0;
            x[p + 2] += 1_000.0;
        }
        x
    }

    fn positions_from_gaps(start: usize, gaps: &[usize]) -> Vec<usize> {
        let mut at = start;
        let mut out = vec![at];
        for g in gaps {
            at += g;
            out.push(at);
        }
        out
    }

    #[test]
    fn flat_signal_has_no_reading() {
        let cfg = EstimatorCfg::default();
        let flat = vec![80_000.0; 200];
        assert!(matches!(
            try_estimate_heart_rate(&flat, 4.0, &cfg),
            Err(NoReading::LowSignal { range }) if range < 1.0
        ));
        assert_eq!(estimate_heart_rate(&flat, 4.0, &cfg), (HeartRate::NONE, None));
        assert_eq!(estimate_spo2(&flat, &flat, &cfg), 0);
    }

    #[test]
    fn range_just_under_floor_has_no_reading() {
        let cfg = EstimatorCfg::default();
        // filtered peak-to-peak of a 500-unit sine at 25 samples/period is ~960
        let ir = pulse(200, 25.0, 80_000.0, 500.0);
        match try_estimate_heart_rate(&ir, 4.0, &cfg) {
            Err(NoReading::LowSignal { range }) => {
                assert!(range > 900.0 && range < cfg.min_signal_range, "range {range}");
            }
            other => panic!("expected low signal, got {other:?}"),
        }
        assert_eq!(estimate_heart_rate(&ir, 4.0, &cfg), (HeartRate::NONE, None));
    }

    #[test]
    fn irregular_rhythm_uses_median_interval() {
        let cfg = EstimatorCfg::default();
        let gaps = [12, 30, 12, 30, 12, 30, 12, 30];
        let ir = pulse_train(200, &positions_from_gaps(10, &gaps));
        let (hr, stats) = try_estimate_heart_rate(&ir, 4.0, &cfg).unwrap();
        assert_eq!(stats.peak_count, 9);
        assert_eq!(stats.valid_interval_count, 8);
        assert!((stats.cv - 9.0 / 21.0).abs() < 1e-3, "cv {}", stats.cv);
        assert_eq!(stats.method, IntervalMethod::Median);
        assert_eq!(stats.median_interval, 30.0);
        // 50 Hz over a 30-sample median interval
        assert_eq!(hr, HeartRate(100));
    }

    #[test]
    fn outlier_gap_is_fenced_out() {
        let cfg = EstimatorCfg::default();
        let gaps = [25, 25, 25, 60, 25, 25, 25];
        let ir = pulse_train(250, &positions_from_gaps(10, &gaps));
        let (hr, stats) = try_estimate_heart_rate(&ir, 5.0, &cfg).unwrap();
        assert_eq!(stats.interval_count, 7);
        assert_eq!(stats.valid_interval_count, 6);
        assert_eq!(stats.iqr, 0.0);
        assert_eq!(stats.method, IntervalMethod::Mean);
        assert_eq!(stats.mean_interval, 25.0);
        assert_eq!(hr, HeartRate(120));
    }

    #[test]
    fn spo2_zero_when_short() {
        let cfg = EstimatorCfg::default();
        let x = vec![1000.0; 99];
        assert_eq!(estimate_spo2(&x, &x, &cfg), 0);
    }

    #[test]
    fn spo2_equal_channels_is_85() {
        let cfg = EstimatorCfg::default();
        let x = pulse(150, 25.0, 50_000.0, 1_000.0);
        assert_eq!(estimate_spo2(&x, &x, &cfg), 85);
    }
}
