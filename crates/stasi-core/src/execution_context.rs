// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::StasiError;
use crate::constraints::Constraints;
use crate::control::{BudgetMode, BudgetStatus, CancelToken};
use crate::observability::{ProgressSink, TelemetrySink};
use std::time::Instant;

/// Unified execution context passed through a fit.
///
/// Everything here is optional plumbing; a fit run with
/// [`ExecutionContext::new`] behaves as a plain pure function.
pub struct ExecutionContext<'a> {
    pub constraints: &'a Constraints,
    pub cancel: Option<&'a CancelToken>,
    pub budget_mode: BudgetMode,
    pub progress: Option<&'a dyn ProgressSink>,
    pub telemetry: Option<&'a dyn TelemetrySink>,
}

impl<'a> ExecutionContext<'a> {
    /// Creates a context with no optional hooks.
    pub fn new(constraints: &'a Constraints) -> Self {
        Self {
            constraints,
            cancel: None,
            budget_mode: BudgetMode::HardFail,
            progress: None,
            telemetry: None,
        }
    }

    pub fn with_cancel(mut self, cancel: &'a CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_budget_mode(mut self, budget_mode: BudgetMode) -> Self {
        self.budget_mode = budget_mode;
        self
    }

    pub fn with_progress_sink(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_telemetry_sink(mut self, telemetry: &'a dyn TelemetrySink) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(CancelToken::is_cancelled)
    }

    pub fn check_cancelled(&self) -> Result<(), StasiError> {
        if self.is_cancelled() {
            return Err(StasiError::cancelled());
        }
        Ok(())
    }

    /// Checks cancellation every `every` iterations; zero is treated as one.
    pub fn check_cancelled_every(&self, iteration: usize, every: usize) -> Result<(), StasiError> {
        let every = every.max(1);
        if !iteration.is_multiple_of(every) {
            return Ok(());
        }
        self.check_cancelled()
    }

    /// Fails with `ResourceLimit` when `segments` exceeds `constraints.max_segments`.
    pub fn check_segment_limit(&self, segments: usize) -> Result<(), StasiError> {
        match self.constraints.max_segments {
            Some(limit) if segments > limit => Err(StasiError::resource_limit(format!(
                "constraints.max_segments exceeded: segments={segments}, limit={limit}"
            ))),
            _ => Ok(()),
        }
    }

    /// Checks elapsed time against the budget and reports status per the budget mode.
    pub fn check_time_budget(&self, started_at: Instant) -> Result<BudgetStatus, StasiError> {
        let Some(limit_ms) = self.constraints.time_budget_ms else {
            return Ok(BudgetStatus::WithinBudget);
        };

        let elapsed_ms = started_at.elapsed().as_millis();
        if elapsed_ms <= u128::from(limit_ms) {
            return Ok(BudgetStatus::WithinBudget);
        }

        match self.budget_mode {
            BudgetMode::HardFail => Err(StasiError::resource_limit(format!(
                "constraints.time_budget_ms exceeded: elapsed_ms={elapsed_ms}, limit_ms={limit_ms}, budget_mode=HardFail"
            ))),
            BudgetMode::SoftDegrade => Ok(BudgetStatus::ExceededSoftDegrade),
        }
    }

    /// Emits clamped progress to the sink, if configured.
    pub fn report_progress(&self, fraction: f32) {
        if !fraction.is_finite() {
            return;
        }

        if let Some(sink) = self.progress {
            sink.on_progress(fraction.clamp(0.0, 1.0));
        }
    }

    pub fn record_scalar(&self, key: &'static str, value: f64) {
        if let Some(sink) = self.telemetry {
            sink.record_scalar(key, value);
        }
    }
}
