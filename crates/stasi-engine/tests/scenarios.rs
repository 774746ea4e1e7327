// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

mod common;

use common::gaussian_steps;
use stasi_core::{Constraints, ExecutionContext, FitOutcome, SeriesView, StasiError};
use stasi_engine::{
    MdlScorer, NoiseScope, Stasi, StasiConfig, build_ladder, fit, fit_function, level_stats,
    segment_series, select_level,
};

/// Deterministic bounded noise; its first-difference estimate is about `1.157 * amplitude`.
fn sin_noise(i: usize, amplitude: f64) -> f64 {
    amplitude * (2.4 * i as f64).sin()
}

fn step_signal(levels: &[(f64, usize)], amplitude: f64) -> Vec<f64> {
    let mut values = Vec::new();
    for &(level, len) in levels {
        for _ in 0..len {
            let i = values.len();
            values.push(level + sin_noise(i, amplitude));
        }
    }
    values
}

fn fitted(values: &[f64]) -> stasi_core::FitResult {
    fit(values)
        .expect("fit should succeed")
        .into_fitted()
        .expect("noise estimate should be non-zero")
}

#[test]
fn zero_length_series_is_rejected() {
    let err = fit(&[]).expect_err("empty input must fail");
    assert!(matches!(err, StasiError::EmptyInput));
    assert_eq!(err.code(), "empty_input");
}

#[test]
fn non_finite_samples_are_rejected_at_the_boundary() {
    let err = fit(&[1.0, f64::NAN, 2.0]).expect_err("NaN must be rejected");
    assert!(matches!(err, StasiError::InvalidInput(_)));
    let err = fit(&[1.0, f64::INFINITY, 2.0]).expect_err("inf must be rejected");
    assert!(matches!(err, StasiError::InvalidInput(_)));
}

#[test]
fn noiseless_two_level_series_is_degenerate() {
    let values = [1.0, 1.0, 1.0, 1.0, 1.0, 9.0, 9.0, 9.0, 9.0, 9.0];
    let outcome = fit(&values).expect("degenerate noise is not an error");
    assert_eq!(outcome, FitOutcome::DegenerateNoise { n: 10 });
    assert!(outcome.is_degenerate());
}

#[test]
fn constant_series_with_supplied_noise_is_one_state() {
    let values = vec![4.0; 12];
    let constraints = Constraints::default();
    let ctx = ExecutionContext::new(&constraints);
    let sigma = 1.0;

    let breakpoints = segment_series(&values, sigma, 3.174, NoiseScope::Global, &ctx, 1000)
        .expect("segmentation should succeed");
    assert_eq!(breakpoints.as_slice(), &[0, 11]);

    let ladder = build_ladder(&values, &breakpoints, &ctx).expect("ladder should build");
    assert_eq!(ladder.num_levels(), 1);

    let scorer = MdlScorer::new(&values, &breakpoints, sigma).expect("valid scorer");
    let curve: Vec<f64> = ladder
        .levels()
        .iter()
        .map(|assignment| {
            let stats = level_stats(&values, &breakpoints, assignment);
            let fit = fit_function(&breakpoints, assignment, &stats);
            scorer.score(assignment, &fit).total()
        })
        .collect();
    assert_eq!(select_level(&curve).expect("finite curve"), 0);
    assert_eq!(ladder.levels()[0].num_states(), 1);
}

#[test]
fn single_step_is_found_and_pooled_into_two_states() {
    let values = step_signal(&[(0.0, 100), (10.0, 100)], 0.432);
    let result = fitted(&values);

    assert!((result.sigma - 0.5).abs() < 0.05, "sigma={}", result.sigma);
    assert_eq!(result.breakpoints.len(), 3);
    let transition = result.breakpoints[1];
    assert!(
        (97..=103).contains(&transition),
        "transition {transition} not within 3 of 100"
    );
    assert_eq!(result.num_states, 2);
    assert_eq!(result.segment_table.len(), 2);

    let mut medians = result.means.clone();
    medians.sort_by(f64::total_cmp);
    assert!(medians[0].abs() < 0.5, "low median {}", medians[0]);
    assert!((medians[1] - 10.0).abs() < 0.5, "high median {}", medians[1]);
}

#[test]
fn noise_without_transitions_selects_one_state() {
    let values = step_signal(&[(5.0, 200)], 0.432);
    let result = fitted(&values);

    assert_eq!(result.breakpoints, vec![0, 199]);
    assert_eq!(result.selected_level, 0);
    assert_eq!(result.num_states, 1);
    assert_eq!(result.mdl_curve.len(), 1);
    assert_eq!(result.segment_table.len(), 1);
    assert!((result.means[0] - 5.0).abs() < 0.5);
}

#[test]
fn recurring_level_is_pooled_into_one_state() {
    let values = step_signal(&[(0.0, 60), (8.0, 60), (0.0, 60), (8.0, 60)], 0.432);
    let result = fitted(&values);

    assert_eq!(result.breakpoints.len(), 5, "breakpoints={:?}", result.breakpoints);
    assert_eq!(result.num_states, 2);
    let states: Vec<usize> = result.segment_table.iter().map(|row| row.state).collect();
    assert_eq!(states, vec![1, 2, 1, 2]);
}

#[test]
fn segment_table_expands_to_the_fit_function() {
    let values = step_signal(&[(2.0, 50), (6.0, 40), (3.0, 70)], 0.3);
    let result = fitted(&values);

    assert_eq!(result.fit_function.len(), values.len());
    assert_eq!(result.reconstruct(), result.fit_function);
    let last = result.segment_table.last().expect("at least one row");
    assert_eq!(last.stop, values.len() - 1);
}

#[test]
fn every_level_of_the_model_is_consistent() {
    let values = step_signal(&[(0.0, 40), (5.0, 40), (12.0, 40)], 0.432);
    let view = SeriesView::new(&values).expect("finite series");
    let constraints = Constraints::default();
    let ctx = ExecutionContext::new(&constraints);
    let model = Stasi::new(StasiConfig::default())
        .expect("default config is valid")
        .analyze(&view, &ctx)
        .expect("analysis should succeed")
        .expect("noise estimate should be non-zero");

    let segments = model.breakpoints().num_segments();
    assert_eq!(model.ladder().num_levels(), segments);
    assert_eq!(model.mdl_curve().len(), segments);
    for (idx, level) in model.levels().iter().enumerate() {
        assert_eq!(level.num_states(), segments - idx);
        assert_eq!(level.fit_function.len(), values.len());
        let materialized = model.result_at(idx).expect("level exists");
        assert_eq!(materialized.reconstruct(), level.fit_function);
    }
}

#[test]
fn max_segments_limit_surfaces_as_resource_limit() {
    let values = step_signal(&[(0.0, 30), (9.0, 30), (0.0, 30), (9.0, 30)], 0.2);
    let view = SeriesView::new(&values).expect("finite series");
    let constraints = Constraints {
        max_segments: Some(2),
        ..Constraints::default()
    };
    let ctx = ExecutionContext::new(&constraints);
    let err = Stasi::default()
        .fit(&view, &ctx)
        .expect_err("segment limit must abort the fit");
    assert!(matches!(err, StasiError::ResourceLimit(_)));
}

const GAUSSIAN_SEEDS: u64 = 100;

/// Per-seed outcomes of one noisy scenario.
#[derive(Default)]
struct SeedSweep {
    passed: u64,
    failed_seeds: Vec<u64>,
    /// Seeds where the segmenter produced extra segments but the selected
    /// level still had the true state count.
    collapsed_seeds: Vec<u64>,
}

fn sweep_seeds(
    levels: &[(f64, usize)],
    accept: impl Fn(&stasi_core::FitResult) -> bool,
) -> SeedSweep {
    let mut sweep = SeedSweep::default();
    for seed in 0..GAUSSIAN_SEEDS {
        let values = gaussian_steps(levels, 0.5, seed);
        let result = fitted(&values);
        assert!(
            (result.sigma - 0.5).abs() < 0.15,
            "seed {seed}: sigma={}",
            result.sigma
        );
        assert_eq!(result.reconstruct(), result.fit_function, "seed {seed}");

        if accept(&result) {
            sweep.passed += 1;
            if result.breakpoints.len() - 1 > levels.len() {
                sweep.collapsed_seeds.push(seed);
            }
        } else {
            sweep.failed_seeds.push(seed);
        }
        assert!(result.num_states >= 1 && result.num_states < result.breakpoints.len());
    }
    sweep
}

fn finds_single_step(result: &stasi_core::FitResult) -> bool {
    if result.num_states != 2 || result.segment_table.len() != 2 {
        return false;
    }
    let transition = result.segment_table[0].stop;
    let mut medians = result.means.clone();
    medians.sort_by(f64::total_cmp);
    (97..=103).contains(&transition) && medians[0].abs() < 0.5 && (medians[1] - 10.0).abs() < 0.5
}

#[test]
fn gaussian_single_step_is_recovered_for_most_seeds() {
    let step = sweep_seeds(&[(0.0, 100), (10.0, 100)], finds_single_step);
    assert!(
        step.passed >= 80,
        "recovered {}/{GAUSSIAN_SEEDS}; failed seeds {:?}",
        step.passed,
        step.failed_seeds
    );

    let flat = sweep_seeds(&[(5.0, 500)], |result| result.num_states == 1);
    assert!(
        flat.passed >= 85,
        "one state on {}/{GAUSSIAN_SEEDS}; failed seeds {:?}",
        flat.passed,
        flat.failed_seeds
    );

    // Extra splits from noise tails must still be pooled away on some seeds.
    assert!(
        !step.collapsed_seeds.is_empty() || !flat.collapsed_seeds.is_empty(),
        "no seed exercised pooling of spurious segments"
    );
}

#[test]
fn spurious_split_in_a_flat_stretch_merges_first() {
    let values = gaussian_steps(&[(0.0, 100), (10.0, 100)], 0.5, 7);
    let constraints = Constraints::default();
    let ctx = ExecutionContext::new(&constraints);
    let sigma = stasi_engine::estimate_noise(&values);
    let breakpoints = stasi_core::Breakpoints::new(values.len(), vec![0, 50, 100, 199])
        .expect("valid breakpoints");

    let ladder = build_ladder(&values, &breakpoints, &ctx).expect("ladder should build");
    // The two flat halves are far closer to each other than to the high level.
    assert_eq!(ladder.levels()[1].as_slice(), &[1, 1, 2]);
    assert_eq!(ladder.levels()[2].as_slice(), &[1, 1, 1]);

    let scorer = MdlScorer::new(&values, &breakpoints, sigma).expect("valid scorer");
    let curve: Vec<f64> = ladder
        .levels()
        .iter()
        .map(|assignment| {
            let stats = level_stats(&values, &breakpoints, assignment);
            let fit = fit_function(&breakpoints, assignment, &stats);
            scorer.score(assignment, &fit).total()
        })
        .collect();
    // Pooling everything is far worse than either two- or three-state level.
    assert!(curve[2] > curve[0] && curve[2] > curve[1], "curve={curve:?}");
}
