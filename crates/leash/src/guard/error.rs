//! Guard violations.
//!
//! Every budget check in [`GuardState`](super::GuardState) fails with a
//! [`GuardError`]. All four kinds share the same shape (`budget_type`,
//! `limit`, `current`, `message`) so callers can branch on the kind without
//! matching on strings.

use thiserror::Error;

/// A budget limit was hit at a guard checkpoint.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GuardError {
    /// Cumulative spend reached the cost ceiling.
    #[error("Cost budget exceeded: ${current:.4} >= ${limit:.4}")]
    Cost {
        /// Cost ceiling in USD.
        limit: f64,
        /// Spend so far in USD.
        current: f64,
    },

    /// Wall-clock time since the task started passed the runtime ceiling.
    #[error("Runtime limit exceeded: {current:.2}s > {limit:.2}s")]
    Runtime {
        /// Runtime ceiling in seconds.
        limit: f64,
        /// Elapsed seconds.
        current: f64,
    },

    /// The estimated size of a single subcall is over the per-call ceiling.
    #[error("Token limit exceeded: {current} > {limit} per subcall")]
    Tokens {
        /// Per-subcall token ceiling.
        limit: u64,
        /// Estimated tokens for the rejected call.
        current: u64,
    },

    /// A subcall was attempted while another one was already in flight.
    #[error("Recursion depth violation: attempted depth={current}, max={limit}")]
    Recursion {
        /// Maximum depth (always 1).
        limit: usize,
        /// Depth the rejected call would have run at.
        current: usize,
    },
}

impl GuardError {
    /// Short name of the exhausted budget: `cost`, `runtime`, `tokens` or `recursion`.
    pub fn budget_type(&self) -> &'static str {
        match self {
            GuardError::Cost { .. } => "cost",
            GuardError::Runtime { .. } => "runtime",
            GuardError::Tokens { .. } => "tokens",
            GuardError::Recursion { .. } => "recursion",
        }
    }

    /// The configured ceiling that was hit.
    pub fn limit(&self) -> f64 {
        match *self {
            GuardError::Cost { limit, .. } | GuardError::Runtime { limit, .. } => limit,
            GuardError::Tokens { limit, .. } => limit as f64,
            GuardError::Recursion { limit, .. } => limit as f64,
        }
    }

    /// The observed value that tripped the check.
    pub fn current(&self) -> f64 {
        match *self {
            GuardError::Cost { current, .. } | GuardError::Runtime { current, .. } => current,
            GuardError::Tokens { current, .. } => current as f64,
            GuardError::Recursion { current, .. } => current as f64,
        }
    }

    /// Human-readable description of the violation.
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Whether this violation means a budget ran out over time (cost or
    /// runtime), as opposed to a single call breaking the rules.
    ///
    /// The task runner reports exhaustion as `partial` and structural
    /// violations as `error`.
    pub fn is_exhaustion(&self) -> bool {
        matches!(self, GuardError::Cost { .. } | GuardError::Runtime { .. })
    }

    /// Kind name used in diagnostics (`CostLimit`, `RuntimeLimit`, ...).
    pub fn kind(&self) -> &'static str {
        match self {
            GuardError::Cost { .. } => "CostLimit",
            GuardError::Runtime { .. } => "RuntimeLimit",
            GuardError::Tokens { .. } => "TokenLimit",
            GuardError::Recursion { .. } => "RecursionDepth",
        }
    }

    /// Message the task runner puts in the `error` field of its output.
    pub fn status_message(&self) -> String {
        match *self {
            GuardError::Cost { limit, current } => {
                format!("Cost budget exceeded: ${current:.4} >= ${limit:.4}")
            }
            GuardError::Runtime { limit, current } => {
                format!("Runtime limit exceeded: {current:.2}s >= {limit:.2}s")
            }
            GuardError::Tokens { limit, current } => {
                format!("Token limit exceeded on subcall: {current} > {limit}")
            }
            GuardError::Recursion { limit, current } => {
                format!("Recursion depth violation: attempted depth={current}, max={limit}")
            }
        }
    }
}
