// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::StasiError;

/// Zero-copy, validated view over a univariate series in time order.
///
/// Construction rejects NaN and infinities so downstream stages can assume
/// every sample is finite. Empty views are allowed; fitting one reports
/// [`StasiError::EmptyInput`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SeriesView<'a> {
    values: &'a [f64],
}

impl<'a> SeriesView<'a> {
    /// Constructs a validated `SeriesView`.
    pub fn new(values: &'a [f64]) -> Result<Self, StasiError> {
        if let Some((idx, value)) = values
            .iter()
            .copied()
            .enumerate()
            .find(|(_, v)| !v.is_finite())
        {
            return Err(StasiError::invalid_input(format!(
                "series must contain only finite values: index {idx} has {value}"
            )));
        }
        Ok(Self { values })
    }

    pub fn values(&self) -> &'a [f64] {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns `max - min` over the series, or `None` when empty.
    pub fn value_range(&self) -> Option<f64> {
        let (&first, rest) = self.values.split_first()?;
        let (lo, hi) = rest
            .iter()
            .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        Some(hi - lo)
    }
}
