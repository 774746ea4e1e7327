// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::StasiError;

/// Resource limits applied to a single fit.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Constraints {
    /// Upper bound on the number of segments the segmenter may produce.
    ///
    /// State pooling is cubic in the segment count, so this is the knob for
    /// keeping pathological inputs bounded.
    pub max_segments: Option<usize>,
    pub time_budget_ms: Option<u64>,
}

/// Validates user-supplied constraints.
pub fn validate_constraints(constraints: &Constraints) -> Result<(), StasiError> {
    if constraints.max_segments == Some(0) {
        return Err(StasiError::invalid_input(
            "constraints.max_segments must be >= 1; got 0",
        ));
    }
    if constraints.time_budget_ms == Some(0) {
        return Err(StasiError::invalid_input(
            "constraints.time_budget_ms must be >= 1; got 0",
        ));
    }
    Ok(())
}
