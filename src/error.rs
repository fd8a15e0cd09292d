//! Error types for netgraph-core

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or analyzing a network
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Invalid input: unknown node/link reference, unsupported mode string,
    /// malformed condition, negative iteration/round count, etc.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration conflict detected at construction time (e.g. EQUAL_BALANCED
    /// without a bounded max_flow_count, static_paths count mismatch).
    #[error("configuration conflict: {0}")]
    ConfigConflict(String),

    /// A FlowPolicy termination guard tripped (safety net, not a feasibility result).
    #[error("termination guard tripped in policy '{policy}': {reason}")]
    TerminationGuard {
        /// Name or description of the policy/step that tripped the guard
        policy: String,
        /// Human-readable explanation naming the likely misconfiguration
        reason: String,
    },

    /// Maximum Supported Demand search could not find a feasible alpha down to alpha_min.
    #[error("no bracket found: {0}")]
    NoBracketFound(String),

    /// An analysis function failed inside a Monte Carlo worker; the whole run fails.
    #[error("worker failure: {0}")]
    WorkerFailure(String),

    /// Dimension mismatch in input
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension
        got: usize,
    },

    /// Numeric overflow during computation (e.g. edge-id counter)
    #[error("numeric overflow: {0}")]
    Overflow(String),

    /// Internal error (bug)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a configuration conflict error
    pub fn config_conflict(msg: impl Into<String>) -> Self {
        Self::ConfigConflict(msg.into())
    }

    /// Create a termination guard error
    pub fn termination_guard(policy: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TerminationGuard {
            policy: policy.into(),
            reason: reason.into(),
        }
    }

    /// Create a no-bracket-found error
    pub fn no_bracket_found(msg: impl Into<String>) -> Self {
        Self::NoBracketFound(msg.into())
    }

    /// Create a worker failure error
    pub fn worker_failure(msg: impl Into<String>) -> Self {
        Self::WorkerFailure(msg.into())
    }

    /// Create a dimension mismatch error
    pub fn dimension_mismatch(expected: usize, got: usize) -> Self {
        Self::DimensionMismatch { expected, got }
    }
}
