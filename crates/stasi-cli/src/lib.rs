// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use stasi_core::{Constraints, ExecutionContext, FitOutcome, SeriesView, StasiError};
use stasi_engine::{Stasi, StasiConfig, StasiModel};

/// Fits `values` and returns the MDL-selected level, or `level` when given.
pub fn run_fit(
    values: &[f64],
    config: StasiConfig,
    constraints: &Constraints,
    level: Option<usize>,
) -> Result<FitOutcome, StasiError> {
    let Some(level) = level else {
        let view = SeriesView::new(values)?;
        let ctx = ExecutionContext::new(constraints);
        return Stasi::new(config)?.fit(&view, &ctx);
    };

    Ok(match run_analyze(values, config, constraints)? {
        Some(model) => FitOutcome::Fitted(model.result_at(level)?),
        None => FitOutcome::DegenerateNoise { n: values.len() },
    })
}

/// Runs the pipeline keeping every pooling level.
pub fn run_analyze(
    values: &[f64],
    config: StasiConfig,
    constraints: &Constraints,
) -> Result<Option<StasiModel>, StasiError> {
    let view = SeriesView::new(values)?;
    let ctx = ExecutionContext::new(constraints);
    Stasi::new(config)?.analyze(&view, &ctx)
}

/// CLI support for the `stasi` binary.
pub fn crate_name() -> &'static str {
    let _ = (stasi_core::crate_name(), stasi_engine::crate_name());
    "stasi-cli"
}
