//! Error types for identity and subject handling.

use thiserror::Error;

/// Identity error types.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// A dynamic value could not be interpreted as a domain object.
    #[error("expected a JSON object value, \"{0}\" given")]
    UnexpectedType(String),
}

/// Result type for identity operations.
pub type IdentityResult<T> = Result<T, IdentityError>;
