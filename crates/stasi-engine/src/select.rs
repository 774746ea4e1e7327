// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use stasi_core::StasiError;

/// Relative tolerance under which two MDL values count as equal.
const FLAT_TOLERANCE: f64 = 1e-12;

/// Index of the minimum-MDL level; the first one wins ties.
pub fn select_level(curve: &[f64]) -> Result<usize, StasiError> {
    if curve.is_empty() {
        return Err(StasiError::invalid_input(
            "model selection requires a non-empty MDL curve",
        ));
    }
    if let Some((idx, value)) = curve.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(StasiError::numerical_issue(format!(
            "MDL curve is non-finite at level {idx}: {value}"
        )));
    }

    let mut best = 0usize;
    for (idx, value) in curve.iter().enumerate().skip(1) {
        if *value < curve[best] {
            best = idx;
        }
    }
    Ok(best)
}

/// Coarse shape of an MDL curve, used to flag fits without a clear optimum.
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CurveShape {
    SingleLevel,
    /// Every level scores the same.
    Flat,
    /// The minimum sits at the first or last level.
    Monotone,
    InteriorMinimum,
}

impl CurveShape {
    /// Whether the selected level can be trusted without looking at the curve.
    pub fn is_reliable(self) -> bool {
        matches!(self, Self::SingleLevel | Self::InteriorMinimum)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SingleLevel => "single_level",
            Self::Flat => "flat",
            Self::Monotone => "monotone",
            Self::InteriorMinimum => "interior_minimum",
        }
    }
}

/// Classifies a finite curve given the level chosen by [`select_level`].
pub fn classify_curve(curve: &[f64], selected: usize) -> CurveShape {
    if curve.len() <= 1 {
        return CurveShape::SingleLevel;
    }

    let (lo, hi) = curve
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let scale = lo.abs().max(hi.abs()).max(1.0);
    if (hi - lo) <= FLAT_TOLERANCE * scale {
        return CurveShape::Flat;
    }

    if selected == 0 || selected + 1 == curve.len() {
        CurveShape::Monotone
    } else {
        CurveShape::InteriorMinimum
    }
}
