//! Untyped defect payloads.
//!
//! A defect is a failure the program did not anticipate: a caught panic, a
//! violated invariant, an error from a layer that has no typed channel. The
//! payload is reduced to a message so defects can be compared, hashed and
//! moved across fibers.

use core::fmt;
use std::any::Any;

/// Payload of a `Die` cause.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Defect {
    message: String,
}

impl Defect {
    /// Creates a defect with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Creates a defect from an error value, keeping its display form.
    #[must_use]
    pub fn from_error<E: std::error::Error + ?Sized>(error: &E) -> Self {
        Self::new(error.to_string())
    }

    /// Creates a defect from a payload caught by `std::panic::catch_unwind`.
    #[must_use]
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        if let Some(message) = payload.downcast_ref::<&'static str>() {
            Self::new(*message)
        } else if let Some(message) = payload.downcast_ref::<String>() {
            Self::new(message.clone())
        } else {
            Self::new("non-string panic payload")
        }
    }

    /// Returns the defect message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Defect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "defect: {}", self.message)
    }
}

impl From<&str> for Defect {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for Defect {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}
