// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::fmt;

/// Error taxonomy shared by every STaSI crate.
///
/// A degenerate noise estimate is deliberately absent: it is reported through
/// [`crate::FitOutcome::DegenerateNoise`] so batch callers can skip a series
/// without treating it as a failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StasiError {
    /// The input series has no samples.
    EmptyInput,
    InvalidInput(String),
    NumericalIssue(String),
    ResourceLimit(String),
    Cancelled,
}

impl StasiError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn numerical_issue(msg: impl Into<String>) -> Self {
        Self::NumericalIssue(msg.into())
    }

    pub fn resource_limit(msg: impl Into<String>) -> Self {
        Self::ResourceLimit(msg.into())
    }

    pub fn cancelled() -> Self {
        Self::Cancelled
    }

    /// Stable machine-readable code for envelopes and logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyInput => "empty_input",
            Self::InvalidInput(_) => "invalid_input",
            Self::NumericalIssue(_) => "numerical_issue",
            Self::ResourceLimit(_) => "resource_limit",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for StasiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput => write!(f, "empty input: series must contain at least one sample"),
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::NumericalIssue(msg) => write!(f, "numerical issue: {msg}"),
            Self::ResourceLimit(msg) => write!(f, "resource limit: {msg}"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::error::Error for StasiError {}
