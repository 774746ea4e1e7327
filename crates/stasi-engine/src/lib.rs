// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod assemble;
pub mod levels;
pub mod mdl;
pub mod noise;
pub mod pool;
pub mod segment;
pub mod select;
pub mod stasi;

pub use assemble::assemble_segment_table;
pub use levels::{fit_function, level_stats};
pub use mdl::MdlScorer;
pub use noise::estimate_noise;
pub use pool::build_ladder;
pub use segment::{DEFAULT_THRESHOLD, NoiseScope, segment_series};
pub use select::{CurveShape, classify_curve, select_level};
pub use stasi::{LevelEvaluation, Stasi, StasiConfig, StasiModel};

use stasi_core::{Constraints, ExecutionContext, FitOutcome, SeriesView, StasiError};

/// Fits `values` with the default configuration and an unconstrained context.
pub fn fit(values: &[f64]) -> Result<FitOutcome, StasiError> {
    let view = SeriesView::new(values)?;
    let constraints = Constraints::default();
    let ctx = ExecutionContext::new(&constraints);
    Stasi::new(StasiConfig::default())?.fit(&view, &ctx)
}

/// STaSI pipeline stages and the detector that chains them.
pub fn crate_name() -> &'static str {
    let _ = stasi_core::crate_name();
    "stasi-engine"
}
