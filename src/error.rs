//! Error taxonomy shared by every layer of the crate.
//!
//! Backends map their native failures onto these variants so callers can
//! branch on meaning rather than on which store produced the error.

use thiserror::Error;

use crate::document::FormatError;

#[derive(Error, Debug)]
pub enum Error {
    /// A session or document lookup missed.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An insert collided with an existing key.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Caller-supplied input failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Markdown text could not be parsed into a document.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// Stored state violated an internal consistency rule.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// The backend could not be reached or timed out.
    #[error("Unavailable: {0}")]
    Unavailable(String),
}

impl Error {
    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an already exists error
    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::AlreadyExists(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an invariant violation error
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    /// Create an unavailable error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Check if the operation may succeed on retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unavailable_is_retryable() {
        assert!(Error::unavailable("pool timed out").is_retryable());
        assert!(!Error::not_found("session x").is_retryable());
        assert!(!Error::already_exists("session x").is_retryable());
        assert!(!Error::validation("score out of range").is_retryable());
        assert!(!Error::invariant("corrupt history").is_retryable());
    }

    #[test]
    fn test_display_prefixes() {
        assert_eq!(
            Error::not_found("session abc").to_string(),
            "Not found: session abc"
        );
        assert_eq!(
            Error::validation("bad score").to_string(),
            "Validation error: bad score"
        );
    }
}
