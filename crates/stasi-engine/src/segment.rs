// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::noise::estimate_noise;
use stasi_core::{Breakpoints, ExecutionContext, StasiError};
use std::ops::Range;

/// Critical value of the two-sample shift statistic.
pub const DEFAULT_THRESHOLD: f64 = 3.174;

/// Windows shorter than this close without being tested.
pub const MIN_TESTABLE_LEN: usize = 3;

/// Which noise scale the shift test divides by.
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NoiseScope {
    /// One estimate for the whole series.
    #[default]
    Global,
    /// Re-estimate from each window's own differences. Noise estimates
    /// shrink toward zero inside truly constant windows, so this tends to
    /// over-split.
    PerSegment,
}

impl NoiseScope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::PerSegment => "per_segment",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Window {
    start: usize,
    end: usize,
    closed: bool,
}

impl Window {
    fn open(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            closed: false,
        }
    }

    fn close(self) -> Self {
        Self {
            closed: true,
            ..self
        }
    }

    /// Samples tested for this window; the window ending at the last
    /// sample owns that sample.
    fn samples(self, last: usize) -> Range<usize> {
        if self.end == last {
            self.start..self.end + 1
        } else {
            self.start..self.end
        }
    }
}

/// Shift statistic for splitting `window` after local index `i`.
///
/// Compares `window[..=i]` against `window[i + 1..]`. Returns 0 when `sigma`
/// is not positive or `i` leaves the right side empty.
pub fn shift_statistic(window: &[f64], i: usize, sigma: f64) -> f64 {
    let len = window.len();
    if sigma <= 0.0 || i + 1 >= len {
        return 0.0;
    }
    let left = &window[..=i];
    let right = &window[i + 1..];
    let left_mean = left.iter().sum::<f64>() / left.len() as f64;
    let right_mean = right.iter().sum::<f64>() / right.len() as f64;
    shift_ratio(left_mean, right_mean, i, len, sigma)
}

fn shift_ratio(left_mean: f64, right_mean: f64, i: usize, len: usize, sigma: f64) -> f64 {
    let scale = (1.0 / (i + 1) as f64 + 1.0 / (len - i + 1) as f64).sqrt();
    (right_mean - left_mean).abs() / (sigma * scale)
}

/// Local index of the strongest significant shift in `window`, if any.
///
/// Ties resolve to the earliest candidate.
pub fn find_transition(window: &[f64], sigma: f64, threshold: f64) -> Option<usize> {
    let len = window.len();
    if len < 2 || sigma <= 0.0 {
        return None;
    }

    let total: f64 = window.iter().sum();
    let mut left_sum = 0.0;
    let mut best_idx = 0usize;
    let mut best_stat = 0.0;
    for (i, &value) in window[..len - 1].iter().enumerate() {
        left_sum += value;
        let left_mean = left_sum / (i + 1) as f64;
        let right_mean = (total - left_sum) / (len - i - 1) as f64;
        let stat = shift_ratio(left_mean, right_mean, i, len, sigma);
        if stat > best_stat {
            best_stat = stat;
            best_idx = i;
        }
    }

    (best_stat > threshold).then_some(best_idx)
}

/// Splits `values` into segments by repeated binary shift tests.
///
/// Windows are kept in an explicit worklist and processed pass by pass
/// until every window is closed.
pub fn segment_series(
    values: &[f64],
    sigma: f64,
    threshold: f64,
    noise_scope: NoiseScope,
    ctx: &ExecutionContext<'_>,
    cancel_check_every: usize,
) -> Result<Breakpoints, StasiError> {
    let n = values.len();
    if n < 2 {
        return Err(StasiError::invalid_input(format!(
            "segmentation requires n >= 2; got n={n}"
        )));
    }
    let last = n - 1;

    let mut windows = vec![Window::open(0, last)];
    let mut tested = 0usize;
    let mut passes = 0usize;
    while windows.iter().any(|window| !window.closed) {
        let mut next = Vec::with_capacity(windows.len() * 2);
        for window in windows {
            if window.closed {
                next.push(window);
                continue;
            }

            let samples = &values[window.samples(last)];
            if samples.len() < MIN_TESTABLE_LEN {
                next.push(window.close());
                continue;
            }

            ctx.check_cancelled_every(tested, cancel_check_every)?;
            tested += 1;

            let local_sigma = match noise_scope {
                NoiseScope::Global => sigma,
                NoiseScope::PerSegment => estimate_noise(samples),
            };
            match find_transition(samples, local_sigma, threshold) {
                Some(offset) if offset > 0 && window.start + offset < window.end => {
                    let split = window.start + offset;
                    next.push(Window::open(window.start, split));
                    next.push(Window::open(split, window.end));
                }
                _ => next.push(window.close()),
            }
        }

        ctx.check_segment_limit(next.len())?;
        windows = next;
        passes += 1;

        let settled: usize = windows
            .iter()
            .filter(|window| window.closed)
            .map(|window| window.samples(last).len())
            .sum();
        ctx.report_progress(settled as f32 / n as f32);
    }

    tracing::trace!(passes, windows_tested = tested, "segmentation converged");

    let mut points = Vec::with_capacity(windows.len() + 1);
    points.push(0);
    points.extend(windows.iter().map(|window| window.end));
    Breakpoints::new(n, points)
}
