// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::f64::consts::SQRT_2;

/// Quantile of `|w1|` that sits at `sigma * sqrt(2)` for Gaussian noise.
pub const NOISE_QUANTILE: f64 = 0.682;

/// Level-1 Haar coefficients: plain first differences.
pub fn first_differences(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|pair| pair[1] - pair[0]).collect()
}

/// Robust noise scale from first differences.
///
/// Returns `0.0` when fewer than two differences are available; callers
/// must treat that as a degenerate input.
pub fn noise_from_differences(w1: &[f64]) -> f64 {
    if w1.len() <= 1 {
        return 0.0;
    }

    let mut magnitudes: Vec<f64> = w1.iter().map(|d| d.abs()).collect();
    magnitudes.sort_unstable_by(f64::total_cmp);

    let rank = (NOISE_QUANTILE * w1.len() as f64).round_ties_even() as usize;
    let idx = rank.min(magnitudes.len() - 1);
    magnitudes[idx] / SQRT_2
}

/// Global per-sample noise estimate for a series.
pub fn estimate_noise(values: &[f64]) -> f64 {
    noise_from_differences(&first_differences(values))
}
