//! Error types for the Cause algebra.
//!
//! Every Cause operation is total, so the crate has few errors:
//!
//! - [`CauseError`]: a cause squashed into a single `std::error::Error`,
//!   for crossing into `?`-based code
//! - [`ConfigError`]: invalid trace configuration from the environment
//!
//! Internal invariant violations are bugs in the algebra, not conditions a
//! caller can recover from. They go through [`bug`], which logs and panics.

use crate::tracing_compat::error;
use crate::types::{Defect, FiberId};
use thiserror::Error;

/// The most significant failure of a cause.
///
/// Produced by `Cause::squash`: a typed failure wins over a defect, which
/// wins over interruption.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CauseError<E> {
    /// An expected, typed failure.
    #[error("{0}")]
    Failure(E),
    /// An unexpected defect.
    #[error("{0}")]
    Defect(Defect),
    /// Interruption by the given (possibly composite) fiber.
    #[error("interrupted by fiber {0}")]
    Interrupted(FiberId),
    /// The cause held no failure.
    #[error("empty cause")]
    Empty,
}

impl<E> CauseError<E> {
    /// Returns true for [`CauseError::Failure`].
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// Returns true for [`CauseError::Interrupted`].
    #[must_use]
    pub const fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted(_))
    }

    /// Maps the typed failure.
    pub fn map<E2, F: FnOnce(E) -> E2>(self, f: F) -> CauseError<E2> {
        match self {
            Self::Failure(e) => CauseError::Failure(f(e)),
            Self::Defect(d) => CauseError::Defect(d),
            Self::Interrupted(id) => CauseError::Interrupted(id),
            Self::Empty => CauseError::Empty,
        }
    }
}

/// Invalid configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A variable held a value that could not be parsed.
    #[error("invalid value {value:?} for {key}: expected {expected}")]
    InvalidValue {
        /// Variable name.
        key: &'static str,
        /// Raw value found.
        value: String,
        /// Description of accepted values.
        expected: &'static str,
    },
}

/// Reports a violated internal invariant and aborts the current operation.
///
/// Reaching this is a bug in the algebra's implementation, never a
/// user-triggered condition.
#[cold]
#[track_caller]
pub(crate) fn bug(message: &str) -> ! {
    error!(invariant = %message, "cause algebra invariant violated");
    panic!("bug in cause algebra: {message}")
}
