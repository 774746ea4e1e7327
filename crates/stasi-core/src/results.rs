// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::Diagnostics;

/// A maximal run of consecutive segments that share one state.
///
/// `start` and `stop` are breakpoint indices; the row covers samples
/// `start..=stop` when expanded. `sdev` is `None` when the median is below -1.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SegmentRow {
    pub start: usize,
    pub stop: usize,
    pub median: f64,
    pub sdev: Option<f64>,
    pub state: usize,
}

/// Per-state central value and dispersion for one pooling level.
///
/// Vectors are indexed by `state - 1`. An sdev is `None` when its state's
/// median is below -1.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct LevelStats {
    pub medians: Vec<f64>,
    pub sdevs: Vec<Option<f64>>,
}

impl LevelStats {
    /// Median of a 1-based state id.
    pub fn median(&self, state: usize) -> f64 {
        self.medians[state - 1]
    }

    pub fn sdev(&self, state: usize) -> Option<f64> {
        self.sdevs[state - 1]
    }
}

/// The two halves of a description length.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MdlTerms {
    /// L1 misfit scaled by twice the global noise.
    pub fit_cost: f64,
    pub complexity_cost: f64,
}

impl MdlTerms {
    pub fn total(&self) -> f64 {
        self.fit_cost + self.complexity_cost
    }
}

/// Output of a successful fit at the selected pooling level.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct FitResult {
    pub fit_function: Vec<f64>,
    pub means: Vec<f64>,
    pub sdevs: Vec<Option<f64>>,
    pub segment_table: Vec<SegmentRow>,
    pub mdl_curve: Vec<f64>,
    pub sigma: f64,
    pub breakpoints: Vec<usize>,
    pub selected_level: usize,
    pub num_states: usize,
    pub diagnostics: Diagnostics,
}

impl FitResult {
    /// Expands the segment table back into a full-length piecewise-constant series.
    ///
    /// Rows are applied in order with inclusive bounds, so a shared boundary
    /// takes the later row's median.
    pub fn reconstruct(&self) -> Vec<f64> {
        let n = self
            .segment_table
            .last()
            .map_or(0, |row| row.stop.saturating_add(1));
        let mut out = vec![0.0; n];
        for row in &self.segment_table {
            out[row.start..=row.stop].fill(row.median);
        }
        out
    }
}

/// Outcome of a fit that did not fail.
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "status", rename_all = "snake_case")
)]
#[derive(Clone, Debug, PartialEq)]
pub enum FitOutcome {
    Fitted(FitResult),
    /// The noise estimate was exactly zero, so no test statistic is defined.
    DegenerateNoise { n: usize },
}

impl FitOutcome {
    pub fn fitted(&self) -> Option<&FitResult> {
        match self {
            Self::Fitted(result) => Some(result),
            Self::DegenerateNoise { .. } => None,
        }
    }

    pub fn into_fitted(self) -> Option<FitResult> {
        match self {
            Self::Fitted(result) => Some(result),
            Self::DegenerateNoise { .. } => None,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        matches!(self, Self::DegenerateNoise { .. })
    }
}
