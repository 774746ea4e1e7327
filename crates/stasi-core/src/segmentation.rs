// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::StasiError;
use std::ops::Range;

/// Validates the breakpoint contract for a series of length `n`.
///
/// Breakpoints must be strictly increasing, start at 0 and end at `n - 1`.
pub fn validate_breakpoints(n: usize, breakpoints: &[usize]) -> Result<(), StasiError> {
    if n < 2 {
        return Err(StasiError::invalid_input(format!(
            "breakpoints require a series of length >= 2; got n={n}"
        )));
    }
    if breakpoints.len() < 2 {
        return Err(StasiError::invalid_input(format!(
            "breakpoints must contain at least the two endpoints; got {}",
            breakpoints.len()
        )));
    }
    if breakpoints[0] != 0 {
        return Err(StasiError::invalid_input(format!(
            "first breakpoint must be 0; got {}",
            breakpoints[0]
        )));
    }
    let last = breakpoints[breakpoints.len() - 1];
    if last != n - 1 {
        return Err(StasiError::invalid_input(format!(
            "last breakpoint must be n-1={}; got {last}",
            n - 1
        )));
    }
    if let Some(pair) = breakpoints.windows(2).find(|pair| pair[0] >= pair[1]) {
        return Err(StasiError::invalid_input(format!(
            "breakpoints must be strictly increasing; found {} followed by {}",
            pair[0], pair[1]
        )));
    }
    Ok(())
}

/// Ordered segment boundaries over a series.
///
/// Segment `k` covers `[bp[k], bp[k+1])`, except the last segment which also
/// includes sample `n - 1`. Segment point counts therefore sum to `n`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Breakpoints {
    points: Vec<usize>,
}

impl Breakpoints {
    pub fn new(n: usize, points: Vec<usize>) -> Result<Self, StasiError> {
        validate_breakpoints(n, &points)?;
        Ok(Self { points })
    }

    /// The single-segment partition `[0, n - 1]`.
    pub fn whole(n: usize) -> Result<Self, StasiError> {
        Self::new(n, vec![0, n.saturating_sub(1)])
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.points
    }

    pub fn into_vec(self) -> Vec<usize> {
        self.points
    }

    /// Length of the series these breakpoints partition.
    pub fn series_len(&self) -> usize {
        self.points[self.points.len() - 1] + 1
    }

    pub fn num_segments(&self) -> usize {
        self.points.len() - 1
    }

    /// Interior breakpoints, excluding both endpoints.
    pub fn transitions(&self) -> &[usize] {
        &self.points[1..self.points.len() - 1]
    }

    /// Sample range owned by segment `k`.
    pub fn segment_range(&self, k: usize) -> Range<usize> {
        let start = self.points[k];
        let end = self.points[k + 1];
        if k + 1 == self.num_segments() {
            start..end + 1
        } else {
            start..end
        }
    }

    pub fn segment_ranges(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        (0..self.num_segments()).map(|k| self.segment_range(k))
    }
}

/// Mapping from segment index to a 1-based, gap-free state id.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateAssignment {
    states: Vec<usize>,
}

impl StateAssignment {
    /// Validates that `states` uses every id in `1..=max` at least once.
    pub fn new(states: Vec<usize>) -> Result<Self, StasiError> {
        if states.is_empty() {
            return Err(StasiError::invalid_input(
                "state assignment must cover at least one segment",
            ));
        }
        let num_states = states.iter().copied().max().unwrap_or(0);
        let mut seen = vec![false; num_states];
        for (segment, &state) in states.iter().enumerate() {
            if state == 0 {
                return Err(StasiError::invalid_input(format!(
                    "state ids are 1-based; segment {segment} has state 0"
                )));
            }
            seen[state - 1] = true;
        }
        if let Some(missing) = seen.iter().position(|present| !present) {
            return Err(StasiError::invalid_input(format!(
                "state ids must be contiguous; state {} is unused while max is {num_states}",
                missing + 1
            )));
        }
        Ok(Self { states })
    }

    /// Every segment in its own state: segment `k` gets state `k + 1`.
    pub fn distinct(num_segments: usize) -> Self {
        Self {
            states: (1..=num_segments).collect(),
        }
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.states
    }

    pub fn num_segments(&self) -> usize {
        self.states.len()
    }

    pub fn num_states(&self) -> usize {
        self.states.iter().copied().max().unwrap_or(0)
    }

    pub fn state_of(&self, segment: usize) -> usize {
        self.states[segment]
    }

    /// Folds state `absorbed` into `keep` and renumbers every higher id down by one.
    ///
    /// Requires `keep < absorbed`.
    pub fn merged(&self, keep: usize, absorbed: usize) -> Self {
        debug_assert!(keep < absorbed);
        let states = self
            .states
            .iter()
            .map(|&state| {
                if state == absorbed {
                    keep
                } else if state > absorbed {
                    state - 1
                } else {
                    state
                }
            })
            .collect();
        Self { states }
    }
}

/// Successive state assignments, each with exactly one fewer state.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolingLadder {
    levels: Vec<StateAssignment>,
}

impl PoolingLadder {
    pub fn new(levels: Vec<StateAssignment>) -> Result<Self, StasiError> {
        let Some(first) = levels.first() else {
            return Err(StasiError::invalid_input(
                "pooling ladder must contain at least one level",
            ));
        };
        if first.num_states() != first.num_segments() {
            return Err(StasiError::invalid_input(format!(
                "first pooling level must give every segment its own state; got {} states for {} segments",
                first.num_states(),
                first.num_segments()
            )));
        }
        for (idx, pair) in levels.windows(2).enumerate() {
            if pair[1].num_states() + 1 != pair[0].num_states() {
                return Err(StasiError::invalid_input(format!(
                    "pooling level {} must have exactly one fewer state than level {idx}; got {} then {}",
                    idx + 1,
                    pair[0].num_states(),
                    pair[1].num_states()
                )));
            }
        }
        if levels.iter().any(|level| level.num_segments() != first.num_segments()) {
            return Err(StasiError::invalid_input(
                "every pooling level must assign the same number of segments",
            ));
        }
        let last = &levels[levels.len() - 1];
        if last.num_states() != 1 {
            return Err(StasiError::invalid_input(format!(
                "last pooling level must have exactly one state; got {}",
                last.num_states()
            )));
        }
        Ok(Self { levels })
    }

    pub fn levels(&self) -> &[StateAssignment] {
        &self.levels
    }

    /// Never zero; construction rejects an empty ladder.
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }
}
