//! Signal conditioning for PPG windows.

/// 5-tap kernel; tap `j` weights the sample `j` positions behind the current one.
pub const WMA_WEIGHTS: [f32; 5] = [0.1, 0.2, 0.4, 0.2, 0.1];

/// Windows shorter than this are returned unfiltered.
const MIN_FILTER_LEN: usize = 10;

/// Weighted moving average over `samples`.
///
/// Output has the same length as the input. The first `WMA_WEIGHTS.len() - 1`
/// samples have no full history and pass through unchanged.
pub fn weighted_moving_average(samples: &[f32]) -> Vec<f32> {
    if samples.len() < MIN_FILTER_LEN {
        return samples.to_vec();
    }
    let taps = WMA_WEIGHTS.len();
    samples
        .iter()
        .enumerate()
        .map(|(i, &s)| {
            if i + 1 < taps {
                s
            } else {
                WMA_WEIGHTS
                    .iter()
                    .enumerate()
                    .map(|(j, w)| samples[i - j] * w)
                    .sum()
            }
        })
        .collect()
}
