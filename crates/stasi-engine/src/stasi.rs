// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::assemble::assemble_segment_table;
use crate::levels::{fit_function, level_stats};
use crate::mdl::MdlScorer;
use crate::noise::estimate_noise;
use crate::pool::build_ladder;
use crate::segment::{DEFAULT_THRESHOLD, NoiseScope, segment_series};
use crate::select::{CurveShape, classify_curve, select_level};
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use stasi_core::{
    Breakpoints, BudgetStatus, Diagnostics, ExecutionContext, FitOutcome, FitResult, LevelStats,
    MdlTerms, PoolingLadder, ProgressSink, SeriesView, StasiError, StateAssignment,
    validate_constraints,
};
use std::borrow::Cow;
use std::time::Instant;

const DEFAULT_CANCEL_CHECK_EVERY: usize = 1000;

/// Fewer levels than this are evaluated sequentially even with `rayon`.
#[cfg(feature = "rayon")]
const PARALLEL_MIN_LEVELS: usize = 64;

// Progress fractions at which each stage hands over to the next.
const SEGMENT_STAGE_END: f32 = 0.4;
const POOL_STAGE_END: f32 = 0.8;
const LEVEL_STAGE_END: f32 = 0.95;

/// Configuration for [`Stasi`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StasiConfig {
    /// Critical value a shift statistic must exceed to split a window.
    pub threshold: f64,
    pub noise_scope: NoiseScope,
    pub cancel_check_every: usize,
}

impl Default for StasiConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            noise_scope: NoiseScope::Global,
            cancel_check_every: DEFAULT_CANCEL_CHECK_EVERY,
        }
    }
}

impl StasiConfig {
    pub fn validate(&self) -> Result<(), StasiError> {
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(StasiError::invalid_input(format!(
                "StasiConfig.threshold must be finite and > 0; got {}",
                self.threshold
            )));
        }
        Ok(())
    }

    fn normalized_cancel_check_every(&self) -> usize {
        self.cancel_check_every.max(1)
    }
}

/// Everything computed for one pooling level.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct LevelEvaluation {
    pub assignment: StateAssignment,
    pub stats: LevelStats,
    pub fit_function: Vec<f64>,
    pub mdl: MdlTerms,
}

impl LevelEvaluation {
    pub fn num_states(&self) -> usize {
        self.assignment.num_states()
    }
}

/// All intermediate artifacts of one STaSI run.
///
/// Any pooling level can be materialized into a [`FitResult`] with
/// [`StasiModel::result_at`], not only the MDL-selected one.
#[derive(Clone, Debug, PartialEq)]
pub struct StasiModel {
    n: usize,
    sigma: f64,
    breakpoints: Breakpoints,
    ladder: PoolingLadder,
    levels: Vec<LevelEvaluation>,
    mdl_curve: Vec<f64>,
    selected_level: usize,
    curve_shape: CurveShape,
    diagnostics: Diagnostics,
}

impl StasiModel {
    pub fn n(&self) -> usize {
        self.n
    }

    /// Global noise estimate used by the segmenter and the MDL scorer.
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    pub fn breakpoints(&self) -> &Breakpoints {
        &self.breakpoints
    }

    pub fn ladder(&self) -> &PoolingLadder {
        &self.ladder
    }

    pub fn levels(&self) -> &[LevelEvaluation] {
        &self.levels
    }

    pub fn mdl_curve(&self) -> &[f64] {
        &self.mdl_curve
    }

    pub fn selected_level(&self) -> usize {
        self.selected_level
    }

    pub fn curve_shape(&self) -> CurveShape {
        self.curve_shape
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Materializes pooling level `level` (0 = one state per segment).
    pub fn result_at(&self, level: usize) -> Result<FitResult, StasiError> {
        if level >= self.levels.len() {
            return Err(StasiError::invalid_input(format!(
                "pooling level {level} out of range; model has {} levels",
                self.levels.len()
            )));
        }
        Ok(self.materialize(level))
    }

    /// Materializes the MDL-selected level.
    pub fn best(&self) -> FitResult {
        self.materialize(self.selected_level)
    }

    fn materialize(&self, level: usize) -> FitResult {
        let evaluation = &self.levels[level];
        let mut diagnostics = self.diagnostics.clone();
        if level != self.selected_level {
            diagnostics.notes.push(format!(
                "materialized pooling level {level}; MDL-selected level is {}",
                self.selected_level
            ));
        }

        FitResult {
            fit_function: evaluation.fit_function.clone(),
            means: evaluation.stats.medians.clone(),
            sdevs: evaluation.stats.sdevs.clone(),
            segment_table: assemble_segment_table(
                &self.breakpoints,
                &evaluation.assignment,
                &evaluation.stats,
            ),
            mdl_curve: self.mdl_curve.clone(),
            sigma: self.sigma,
            breakpoints: self.breakpoints.as_slice().to_vec(),
            selected_level: level,
            num_states: evaluation.num_states(),
            diagnostics,
        }
    }
}

/// Step Transition and State Identification detector.
#[derive(Clone, Debug, Default)]
pub struct Stasi {
    config: StasiConfig,
}

impl Stasi {
    pub fn new(config: StasiConfig) -> Result<Self, StasiError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &StasiConfig {
        &self.config
    }

    /// Runs the full pipeline and returns the selected level.
    ///
    /// A zero noise estimate is reported as [`FitOutcome::DegenerateNoise`].
    pub fn fit(
        &self,
        x: &SeriesView<'_>,
        ctx: &ExecutionContext<'_>,
    ) -> Result<FitOutcome, StasiError> {
        Ok(match self.analyze(x, ctx)? {
            Some(model) => FitOutcome::Fitted(model.best()),
            None => FitOutcome::DegenerateNoise { n: x.len() },
        })
    }

    /// Runs the full pipeline and keeps every pooling level.
    ///
    /// Returns `Ok(None)` when the noise estimate is zero.
    pub fn analyze(
        &self,
        x: &SeriesView<'_>,
        ctx: &ExecutionContext<'_>,
    ) -> Result<Option<StasiModel>, StasiError> {
        self.config.validate()?;
        validate_constraints(ctx.constraints)?;
        if x.is_empty() {
            return Err(StasiError::EmptyInput);
        }

        let started_at = Instant::now();
        let cancel_check_every = self.config.normalized_cancel_check_every();
        let values = x.values();
        let n = values.len();
        let mut soft_budget_exceeded = false;

        let sigma = estimate_noise(values);
        ctx.record_scalar("stasi.sigma", sigma);
        if sigma == 0.0 {
            tracing::debug!(n, "noise estimate is zero; fit is degenerate");
            ctx.report_progress(1.0);
            return Ok(None);
        }
        tracing::debug!(n, sigma, "estimated noise");
        ctx.check_cancelled()?;

        let breakpoints = {
            let progress = ScaledProgress::new(ctx.progress, 0.0, SEGMENT_STAGE_END);
            segment_series(
                values,
                sigma,
                self.config.threshold,
                self.config.noise_scope,
                &progress.attach(ctx),
                cancel_check_every,
            )?
        };
        let num_segments = breakpoints.num_segments();
        tracing::debug!(segments = num_segments, "segmented series");
        ctx.report_progress(SEGMENT_STAGE_END);
        soft_budget_exceeded |= check_budget(ctx, started_at)?;

        let ladder = {
            let progress = ScaledProgress::new(ctx.progress, SEGMENT_STAGE_END, POOL_STAGE_END);
            build_ladder(values, &breakpoints, &progress.attach(ctx))?
        };
        tracing::debug!(levels = ladder.num_levels(), "built pooling ladder");
        ctx.report_progress(POOL_STAGE_END);
        soft_budget_exceeded |= check_budget(ctx, started_at)?;

        let scorer = MdlScorer::new(values, &breakpoints, sigma)?;
        let (levels, used_parallel) = {
            let progress = ScaledProgress::new(ctx.progress, POOL_STAGE_END, LEVEL_STAGE_END);
            evaluate_levels(
                values,
                &breakpoints,
                &ladder,
                &scorer,
                &progress.attach(ctx),
                cancel_check_every,
            )?
        };
        ctx.report_progress(LEVEL_STAGE_END);
        soft_budget_exceeded |= check_budget(ctx, started_at)?;

        let mdl_curve: Vec<f64> = levels.iter().map(|level| level.mdl.total()).collect();
        let selected_level = select_level(&mdl_curve)?;
        let curve_shape = classify_curve(&mdl_curve, selected_level);
        let selected = &levels[selected_level];
        tracing::debug!(
            selected_level,
            states = selected.num_states(),
            mdl = mdl_curve[selected_level],
            curve_shape = curve_shape.as_str(),
            "selected pooling level"
        );

        let mut warnings = vec![];
        if !curve_shape.is_reliable() {
            warnings.push(format!(
                "MDL curve is {}; selected level {selected_level} may not be a well-defined minimum",
                curve_shape.as_str()
            ));
        }
        for (idx, (median, sdev)) in selected
            .stats
            .medians
            .iter()
            .zip(&selected.stats.sdevs)
            .enumerate()
        {
            if sdev.is_none() {
                warnings.push(format!(
                    "state {} has median {median} < -1; Poisson sdev is undefined",
                    idx + 1
                ));
            }
        }
        if soft_budget_exceeded {
            warnings.push(
                "budget exceeded under SoftDegrade mode; run continued without fallback"
                    .to_string(),
            );
        }

        let runtime_ms = u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX);

        ctx.record_scalar("stasi.segments", num_segments as f64);
        ctx.record_scalar("stasi.pooling_levels", ladder.num_levels() as f64);
        ctx.record_scalar("stasi.selected_states", selected.num_states() as f64);
        ctx.record_scalar("stasi.runtime_ms", runtime_ms as f64);
        ctx.report_progress(1.0);

        let notes = vec![
            format!(
                "sigma={sigma}, threshold={}, noise_scope={}",
                self.config.threshold,
                self.config.noise_scope.as_str()
            ),
            format!(
                "segments={num_segments}, pooling_levels={}, selected_level={selected_level}, selected_states={}, curve_shape={}, used_parallel={used_parallel}",
                ladder.num_levels(),
                selected.num_states(),
                curve_shape.as_str()
            ),
        ];

        #[cfg(feature = "rayon")]
        let thread_count = if used_parallel {
            Some(rayon::current_num_threads())
        } else {
            None
        };

        #[cfg(not(feature = "rayon"))]
        let thread_count = None;

        let diagnostics = Diagnostics {
            n,
            runtime_ms: Some(runtime_ms),
            notes,
            warnings,
            algorithm: Cow::Borrowed("stasi"),
            noise_scope: Cow::Borrowed(self.config.noise_scope.as_str()),
            threshold: Some(self.config.threshold),
            segments: num_segments,
            pooling_levels: ladder.num_levels(),
            thread_count,
            #[cfg(feature = "serde")]
            params_json: serde_json::to_value(self.config).ok(),
            ..Diagnostics::default()
        };

        Ok(Some(StasiModel {
            n,
            sigma,
            breakpoints,
            ladder,
            levels,
            mdl_curve,
            selected_level,
            curve_shape,
            diagnostics,
        }))
    }
}

/// Returns whether a soft budget was exceeded; hard budgets error out.
fn check_budget(ctx: &ExecutionContext<'_>, started_at: Instant) -> Result<bool, StasiError> {
    ctx.check_cancelled()?;
    Ok(match ctx.check_time_budget(started_at)? {
        BudgetStatus::WithinBudget => false,
        BudgetStatus::ExceededSoftDegrade => true,
    })
}

fn evaluate_level(
    values: &[f64],
    breakpoints: &Breakpoints,
    assignment: &StateAssignment,
    scorer: &MdlScorer<'_>,
) -> LevelEvaluation {
    let stats = level_stats(values, breakpoints, assignment);
    let fit_function = fit_function(breakpoints, assignment, &stats);
    let mdl = scorer.score(assignment, &fit_function);
    LevelEvaluation {
        assignment: assignment.clone(),
        stats,
        fit_function,
        mdl,
    }
}

/// Evaluates every ladder level in order. The flag reports whether the
/// parallel path ran.
fn evaluate_levels(
    values: &[f64],
    breakpoints: &Breakpoints,
    ladder: &PoolingLadder,
    scorer: &MdlScorer<'_>,
    ctx: &ExecutionContext<'_>,
    cancel_check_every: usize,
) -> Result<(Vec<LevelEvaluation>, bool), StasiError> {
    #[cfg(feature = "rayon")]
    {
        if ctx.cancel.is_none() && ladder.num_levels() >= PARALLEL_MIN_LEVELS {
            let levels = ladder
                .levels()
                .par_iter()
                .map(|assignment| evaluate_level(values, breakpoints, assignment, scorer))
                .collect();
            return Ok((levels, true));
        }
    }

    let total = ladder.num_levels().max(1) as f32;
    let mut levels = Vec::with_capacity(ladder.num_levels());
    for (idx, assignment) in ladder.levels().iter().enumerate() {
        ctx.check_cancelled_every(idx, cancel_check_every)?;
        levels.push(evaluate_level(values, breakpoints, assignment, scorer));
        ctx.report_progress((idx + 1) as f32 / total);
    }
    Ok((levels, false))
}

/// Maps a stage's own `[0, 1]` progress into a slice of the overall run.
struct ScaledProgress<'a> {
    inner: Option<&'a dyn ProgressSink>,
    from: f32,
    to: f32,
}

impl<'a> ScaledProgress<'a> {
    fn new(inner: Option<&'a dyn ProgressSink>, from: f32, to: f32) -> Self {
        Self { inner, from, to }
    }

    fn attach<'s>(&'s self, ctx: &ExecutionContext<'s>) -> ExecutionContext<'s> {
        ExecutionContext {
            constraints: ctx.constraints,
            cancel: ctx.cancel,
            budget_mode: ctx.budget_mode,
            progress: self.inner.map(|_| self as &dyn ProgressSink),
            telemetry: ctx.telemetry,
        }
    }
}

impl ProgressSink for ScaledProgress<'_> {
    fn on_progress(&self, fraction: f32) {
        if let Some(sink) = self.inner {
            let scaled = self.from + (self.to - self.from) * fraction;
            sink.on_progress(scaled.min(self.to));
        }
    }
}
