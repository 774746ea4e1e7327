// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

mod common;

use common::gaussian_steps;
use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};
use stasi_core::{Constraints, ExecutionContext, SeriesView, StasiError, validate_breakpoints};
use stasi_engine::{Stasi, StasiConfig, StasiModel};

const MIN_PROPTEST_CASES: u32 = 1000;

fn proptest_cases() -> u32 {
    std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .map(|parsed| parsed.max(MIN_PROPTEST_CASES))
        .unwrap_or(MIN_PROPTEST_CASES)
}

fn analyze(values: &[f64]) -> Result<Option<StasiModel>, StasiError> {
    let view = SeriesView::new(values)?;
    let constraints = Constraints::default();
    let ctx = ExecutionContext::new(&constraints);
    Stasi::new(StasiConfig::default())?.analyze(&view, &ctx)
}

fn piecewise_signal(levels: &[(f64, usize)], amplitude: f64) -> Vec<f64> {
    let mut values = Vec::new();
    for &(level, len) in levels {
        for _ in 0..len {
            let i = values.len() as f64;
            values.push(level + amplitude * (2.4 * i).sin());
        }
    }
    values
}

fn assert_model_invariants(values: &[f64], model: &StasiModel) -> Result<(), TestCaseError> {
    let n = values.len();
    let breakpoints = model.breakpoints().as_slice();
    prop_assert!(validate_breakpoints(n, breakpoints).is_ok());
    prop_assert_eq!(breakpoints[0], 0);
    prop_assert_eq!(breakpoints[breakpoints.len() - 1], n - 1);

    let segments = model.breakpoints().num_segments();
    prop_assert_eq!(model.ladder().num_levels(), segments);
    prop_assert_eq!(model.levels().len(), segments);
    prop_assert_eq!(model.mdl_curve().len(), segments);

    for (idx, level) in model.levels().iter().enumerate() {
        prop_assert_eq!(level.num_states(), segments - idx);
        prop_assert_eq!(level.fit_function.len(), n);
    }
    prop_assert_eq!(model.levels()[segments - 1].num_states(), 1);

    let selected = model.selected_level();
    let best = model.mdl_curve()[selected];
    prop_assert!(model.mdl_curve()[..selected].iter().all(|v| *v > best));
    prop_assert!(model.mdl_curve()[selected..].iter().all(|v| *v >= best));

    let result = model.best();
    prop_assert_eq!(result.reconstruct(), result.fit_function.clone());
    prop_assert_eq!(result.means.len(), result.num_states);
    prop_assert_eq!(result.sdevs.len(), result.num_states);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: proptest_cases(),
        max_shrink_iters: 1024,
        failure_persistence: Some(Box::new(FileFailurePersistence::Direct("proptest-regressions/tests/proptest_invariants.txt"))),
        .. ProptestConfig::default()
    })]

    #[test]
    fn arbitrary_series_respect_model_invariants(
        values in prop::collection::vec(-50.0f64..50.0, 3..96),
    ) {
        let model = analyze(&values).map_err(|err| TestCaseError::fail(err.to_string()))?;
        if let Some(model) = model {
            assert_model_invariants(&values, &model)?;
        }
    }

    #[test]
    fn piecewise_series_respect_model_invariants(
        levels in prop::collection::vec((-20.0f64..20.0, 8usize..40), 1..6),
        amplitude in 0.05f64..1.0,
    ) {
        let values = piecewise_signal(&levels, amplitude);
        prop_assume!(values.len() >= 3);
        let model = analyze(&values)
            .map_err(|err| TestCaseError::fail(err.to_string()))?;
        let model = model.ok_or_else(|| TestCaseError::fail("sin noise has non-zero sigma"))?;
        assert_model_invariants(&values, &model)?;
    }

    #[test]
    fn gaussian_piecewise_series_respect_model_invariants(
        levels in prop::collection::vec((-20.0f64..20.0, 8usize..60), 1..6),
        sd in 0.05f64..2.0,
        seed in any::<u64>(),
    ) {
        let values = gaussian_steps(&levels, sd, seed);
        let model = analyze(&values)
            .map_err(|err| TestCaseError::fail(err.to_string()))?
            .ok_or_else(|| TestCaseError::fail("gaussian noise has non-zero sigma"))?;
        assert_model_invariants(&values, &model)?;
    }

    #[test]
    fn repeated_fits_are_identical(
        values in prop::collection::vec(-10.0f64..10.0, 3..64),
    ) {
        let first = analyze(&values).map_err(|err| TestCaseError::fail(err.to_string()))?;
        let second = analyze(&values).map_err(|err| TestCaseError::fail(err.to_string()))?;
        match (first, second) {
            (Some(first), Some(second)) => {
                prop_assert_eq!(first.breakpoints(), second.breakpoints());
                prop_assert_eq!(first.ladder(), second.ladder());
                prop_assert_eq!(first.mdl_curve(), second.mdl_curve());
                prop_assert_eq!(first.selected_level(), second.selected_level());
                prop_assert_eq!(&first.best().fit_function, &second.best().fit_function);
            }
            (None, None) => {}
            _ => prop_assert!(false, "degenerate outcome differs between runs"),
        }
    }
}
