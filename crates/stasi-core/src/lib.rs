// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod constraints;
pub mod control;
pub mod diagnostics;
pub mod error;
pub mod execution_context;
pub mod observability;
pub mod results;
pub mod segmentation;
pub mod series;

pub use constraints::{Constraints, validate_constraints};
pub use control::{BudgetMode, BudgetStatus, CancelToken};
pub use diagnostics::{DIAGNOSTICS_SCHEMA_VERSION, Diagnostics};
pub use error::StasiError;
pub use execution_context::ExecutionContext;
pub use observability::{ProgressSink, TelemetrySink};
pub use results::{FitOutcome, FitResult, LevelStats, MdlTerms, SegmentRow};
pub use segmentation::{Breakpoints, PoolingLadder, StateAssignment, validate_breakpoints};
pub use series::SeriesView;

/// Core shared types and traits for the STaSI engine.
pub fn crate_name() -> &'static str {
    "stasi-core"
}
