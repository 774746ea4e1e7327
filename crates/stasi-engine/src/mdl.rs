// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::levels::state_counts;
use stasi_core::{Breakpoints, MdlTerms, SeriesView, StasiError, StateAssignment};
use std::f64::consts::PI;

/// Description-length scorer shared by every pooling level of one fit.
///
/// Holds the level-independent quantities: global noise, series range and
/// the transition count, which is fixed by the segmentation.
#[derive(Clone, Copy, Debug)]
pub struct MdlScorer<'a> {
    values: &'a [f64],
    breakpoints: &'a Breakpoints,
    sigma: f64,
    log_range: f64,
    transition_term: f64,
}

impl<'a> MdlScorer<'a> {
    pub fn new(
        values: &'a [f64],
        breakpoints: &'a Breakpoints,
        sigma: f64,
    ) -> Result<Self, StasiError> {
        if !sigma.is_finite() || sigma <= 0.0 {
            return Err(StasiError::invalid_input(format!(
                "MDL scoring requires a finite sigma > 0; got {sigma}"
            )));
        }
        if breakpoints.series_len() != values.len() {
            return Err(StasiError::invalid_input(format!(
                "breakpoints cover n={} but series has n={}",
                breakpoints.series_len(),
                values.len()
            )));
        }

        let range = SeriesView::new(values)?
            .value_range()
            .ok_or_else(|| StasiError::invalid_input("MDL scoring requires a non-empty series"))?;
        let n = values.len() as f64;
        let n_tp = breakpoints.transitions().len() as f64;

        Ok(Self {
            values,
            breakpoints,
            sigma,
            log_range: (range / sigma).ln(),
            transition_term: 0.5 * n_tp * n.ln(),
        })
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// L1 misfit scaled by `2 sigma`.
    pub fn fit_cost(&self, fit: &[f64]) -> f64 {
        let residual: f64 = self
            .values
            .iter()
            .zip(fit)
            .map(|(x, f)| (x - f).abs())
            .sum();
        residual / (2.0 * self.sigma)
    }

    /// Model complexity of one pooling level.
    ///
    /// Only transitions where the fit steps up contribute a jump term;
    /// downward steps are skipped.
    pub fn complexity_cost(&self, assignment: &StateAssignment, fit: &[f64]) -> f64 {
        let k = assignment.num_states() as f64;

        let log_counts: f64 = state_counts(self.breakpoints, assignment)
            .into_iter()
            .map(|count| (count as f64).ln())
            .sum();

        let log_jumps: f64 = self
            .breakpoints
            .transitions()
            .iter()
            .map(|&tp| fit[tp + 1] - fit[tp - 1])
            .filter(|&jump| jump > 0.0)
            .map(|jump| (jump / self.sigma).powi(2).ln())
            .sum();

        0.5 * k * (1.0 / (2.0 * PI)).ln()
            + k * self.log_range
            + self.transition_term
            + 0.5 * (log_counts + log_jumps)
    }

    pub fn score(&self, assignment: &StateAssignment, fit: &[f64]) -> MdlTerms {
        MdlTerms {
            fit_cost: self.fit_cost(fit),
            complexity_cost: self.complexity_cost(assignment, fit),
        }
    }
}
