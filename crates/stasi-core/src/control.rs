// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative cancellation flag shared between a caller and a running fit.
#[derive(Debug, Default)]
pub struct CancelToken {
    cancelled: AtomicBool,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// What to do when a configured budget is exceeded.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BudgetMode {
    #[default]
    HardFail,
    /// Keep running and record a warning in the diagnostics.
    SoftDegrade,
}

/// Result of a budget check under [`BudgetMode::SoftDegrade`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BudgetStatus {
    WithinBudget,
    ExceededSoftDegrade,
}

#[cfg(test)]
mod tests {
    use super::{BudgetMode, CancelToken};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn cancel_token_flips_once_cancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancel_is_visible_across_threads() {
        let token = Arc::new(CancelToken::new());
        let remote = Arc::clone(&token);
        thread::spawn(move || remote.cancel())
            .join()
            .expect("cancelling thread should not panic");
        assert!(token.is_cancelled());
    }

    #[test]
    fn budget_mode_defaults_to_hard_fail() {
        assert_eq!(BudgetMode::default(), BudgetMode::HardFail);
    }
}
