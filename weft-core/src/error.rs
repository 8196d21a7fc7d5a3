//! Error types for the reactive runtime.
//!
//! Most failures inside user closures are panics and unwind through the
//! write that triggered them. The variants here cover the misuse and
//! runaway cases the runtime itself detects.

use thiserror::Error;

/// Errors raised by the reactive runtime.
#[derive(Debug, Error)]
pub enum ReactiveError {
    /// `teardown` was called inside an inert region, such as the tracked
    /// expression of a watch or memo.
    #[error("teardown registered inside an inert region")]
    TeardownRejected,

    /// The trigger phase of one drain ran more callbacks than allowed.
    #[error("notification drain exceeded {limit} steps; computations are re-triggering each other")]
    DrainLimitExceeded {
        /// The configured `max_drain_steps`.
        limit: usize,
    },

    /// A computation re-queued itself more often than allowed in one unfold loop.
    #[error("computation re-ran {limit} times in one unfold loop; it keeps invalidating itself")]
    UnfoldLimitExceeded {
        /// The configured `max_unfold_passes`.
        limit: usize,
    },

    /// The runtime configuration failed validation.
    #[error("invalid runtime configuration: {0}")]
    InvalidConfig(String),

    /// The runtime configuration could not be parsed.
    #[error("failed to parse runtime configuration")]
    Config(#[from] serde_json::Error),
}

/// Result alias used throughout the crate.
pub type Result<T, E = ReactiveError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_errors_name_the_limit() {
        let err = ReactiveError::DrainLimitExceeded { limit: 64 };
        assert!(err.to_string().contains("64"));

        let err = ReactiveError::UnfoldLimitExceeded { limit: 7 };
        assert!(err.to_string().contains('7'));
    }

    #[test]
    fn json_errors_convert() {
        let parse = serde_json::from_str::<u32>("nope").unwrap_err();
        let err: ReactiveError = parse.into();
        assert!(matches!(err, ReactiveError::Config(_)));
    }
}
