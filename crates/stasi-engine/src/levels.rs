// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use stasi_core::{Breakpoints, LevelStats, StateAssignment};

/// Median of `values`, averaging the two middle samples for even lengths.
///
/// Sorts `values` in place. Returns `None` when empty.
pub fn median_in_place(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some(0.5 * (values[mid - 1] + values[mid]))
    }
}

/// Dispersion heuristic treating the level as a Poisson count.
///
/// `None` when `median < -1`, where the square root is undefined.
pub fn poisson_sdev(median: f64) -> Option<f64> {
    let shifted = median + 1.0;
    (shifted >= 0.0).then(|| shifted.sqrt())
}

/// Concatenates each state's member segments, in segment order.
pub fn state_samples(
    values: &[f64],
    breakpoints: &Breakpoints,
    assignment: &StateAssignment,
) -> Vec<Vec<f64>> {
    let mut samples = vec![Vec::new(); assignment.num_states()];
    for (segment, range) in breakpoints.segment_ranges().enumerate() {
        let state = assignment.state_of(segment);
        samples[state - 1].extend_from_slice(&values[range]);
    }
    samples
}

/// Per-state point counts, indexed by `state - 1`.
pub fn state_counts(breakpoints: &Breakpoints, assignment: &StateAssignment) -> Vec<usize> {
    let mut counts = vec![0usize; assignment.num_states()];
    for (segment, range) in breakpoints.segment_ranges().enumerate() {
        counts[assignment.state_of(segment) - 1] += range.len();
    }
    counts
}

/// Median and Poisson-style sdev of every state at one pooling level.
pub fn level_stats(
    values: &[f64],
    breakpoints: &Breakpoints,
    assignment: &StateAssignment,
) -> LevelStats {
    let (medians, sdevs) = state_samples(values, breakpoints, assignment)
        .into_iter()
        .map(|mut samples| {
            // Every state owns at least one non-empty segment.
            let median = median_in_place(&mut samples).unwrap_or(f64::NAN);
            (median, poisson_sdev(median))
        })
        .unzip();
    LevelStats { medians, sdevs }
}

/// Piecewise-constant reconstruction of one pooling level.
///
/// Each segment fills `bp[k]..=bp[k+1]` in order, so a shared boundary
/// sample takes the later segment's median.
pub fn fit_function(
    breakpoints: &Breakpoints,
    assignment: &StateAssignment,
    stats: &LevelStats,
) -> Vec<f64> {
    let points = breakpoints.as_slice();
    let mut fit = vec![0.0; breakpoints.series_len()];
    for (segment, pair) in points.windows(2).enumerate() {
        let median = stats.median(assignment.state_of(segment));
        fit[pair[0]..=pair[1]].fill(median);
    }
    fit
}
