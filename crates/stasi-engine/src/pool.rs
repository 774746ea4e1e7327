// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

#[cfg(feature = "rayon")]
use rayon::prelude::*;
use stasi_core::{Breakpoints, ExecutionContext, PoolingLadder, StasiError, StateAssignment};

/// Below this many candidate pairs the parallel path is not worth scheduling.
#[cfg(feature = "rayon")]
const PARALLEL_MIN_PAIRS: usize = 256;

/// Point count and sum of one state's data.
///
/// Acts as the merge-candidate cache: merits only need counts and means, and
/// merging two states just adds their summaries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StateSummary {
    pub count: usize,
    pub sum: f64,
}

impl StateSummary {
    pub fn from_samples(samples: &[f64]) -> Self {
        Self {
            count: samples.len(),
            sum: samples.iter().sum(),
        }
    }

    pub fn mean(&self) -> f64 {
        self.sum / self.count as f64
    }

    pub fn combine(&self, other: &Self) -> Self {
        Self {
            count: self.count + other.count,
            sum: self.sum + other.sum,
        }
    }
}

/// Log-likelihood merit of pooling two states; larger means less is lost.
///
/// Equals `-(m_i m_j / (m_i + m_j)) (mean_i - mean_j)^2`, so it is never positive.
pub fn merit(a: &StateSummary, b: &StateSummary) -> f64 {
    let m_i = a.count as f64;
    let m_j = b.count as f64;
    let mean_i = a.mean();
    let mean_j = b.mean();
    let pooled = a.combine(b).mean();
    (m_i + m_j) * pooled * pooled - (m_i * mean_i * mean_i + m_j * mean_j * mean_j)
}

/// 1-based pair `(keep, absorbed)` with the highest merit, first pair on ties.
fn best_pair(
    summaries: &[StateSummary],
    ctx: &ExecutionContext<'_>,
) -> Result<(usize, usize, f64), StasiError> {
    let k = summaries.len();

    #[cfg(feature = "rayon")]
    {
        if can_use_parallel(ctx) && k * (k - 1) / 2 >= PARALLEL_MIN_PAIRS {
            let pairs: Vec<(usize, usize)> = (0..k)
                .flat_map(|i| (i + 1..k).map(move |j| (i, j)))
                .collect();
            let merits: Vec<f64> = pairs
                .par_iter()
                .map(|&(i, j)| merit(&summaries[i], &summaries[j]))
                .collect();
            return pick_best(pairs.into_iter().zip(merits));
        }
    }

    #[cfg(not(feature = "rayon"))]
    let _ = ctx;

    pick_best((0..k).flat_map(|i| {
        (i + 1..k).map(move |j| ((i, j), merit(&summaries[i], &summaries[j])))
    }))
}

fn pick_best(
    scored: impl Iterator<Item = ((usize, usize), f64)>,
) -> Result<(usize, usize, f64), StasiError> {
    let mut best: Option<(usize, usize, f64)> = None;
    for ((i, j), value) in scored {
        if !value.is_finite() {
            return Err(StasiError::numerical_issue(format!(
                "non-finite merit for states ({}, {}): {value}",
                i + 1,
                j + 1
            )));
        }
        if best.is_none_or(|(_, _, current)| value > current) {
            best = Some((i + 1, j + 1, value));
        }
    }
    best.ok_or_else(|| StasiError::invalid_input("state pooling requires at least two states"))
}

#[cfg(feature = "rayon")]
fn can_use_parallel(ctx: &ExecutionContext<'_>) -> bool {
    ctx.cancel.is_none()
}

/// Builds the pooling ladder from one-state-per-segment down to a single state.
pub fn build_ladder(
    values: &[f64],
    breakpoints: &Breakpoints,
    ctx: &ExecutionContext<'_>,
) -> Result<PoolingLadder, StasiError> {
    if breakpoints.series_len() != values.len() {
        return Err(StasiError::invalid_input(format!(
            "breakpoints cover n={} but series has n={}",
            breakpoints.series_len(),
            values.len()
        )));
    }

    let num_segments = breakpoints.num_segments();
    let mut summaries: Vec<StateSummary> = breakpoints
        .segment_ranges()
        .map(|range| StateSummary::from_samples(&values[range]))
        .collect();

    let mut current = StateAssignment::distinct(num_segments);
    let mut levels = Vec::with_capacity(num_segments);
    levels.push(current.clone());

    let mut merges = 0usize;
    while summaries.len() > 1 {
        ctx.check_cancelled()?;

        let (keep, absorbed, best_merit) = best_pair(&summaries, ctx)?;
        summaries[keep - 1] = summaries[keep - 1].combine(&summaries[absorbed - 1]);
        summaries.remove(absorbed - 1);

        current = current.merged(keep, absorbed);
        tracing::trace!(
            keep,
            absorbed,
            merit = best_merit,
            states = summaries.len(),
            "pooled states"
        );
        levels.push(current.clone());

        merges += 1;
        ctx.report_progress(merges as f32 / num_segments.max(1) as f32);
    }

    PoolingLadder::new(levels)
}
