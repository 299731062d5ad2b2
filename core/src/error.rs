//! Error type for the localization filter.
//!
//! Every failure the core can report is local and recoverable: the caller decides whether to
//! reinitialize around a new prior, fall back to uniform weights, widen the motion noise or abort.
//! Nothing in this crate exits the process or substitutes a plausible-looking value for a failed
//! computation.
use thiserror::Error;

/// Errors reported by the particle set, motion models and the filter engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    /// A caller supplied value violates the operation's contract (particle count, sigma,
    /// malformed control pair, negative likelihood, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// `predict`, `update` or `estimate` was called before `initialize`.
    #[error("particle filter has not been initialized")]
    NotInitialized,
    /// All weights are zero or the weight sum is not finite.
    #[error("degenerate particle distribution (weight sum = {weight_sum})")]
    DegenerateDistribution { weight_sum: f64 },
}

impl FilterError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        FilterError::InvalidArgument(message.into())
    }
}

/// Result alias used across the crate
pub type FilterResult<T> = Result<T, FilterError>;
