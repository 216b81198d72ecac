//! Error types for docvault core.

use thiserror::Error;

use crate::kind::DocumentKind;

/// Core errors raised while resolving kinds or decoding stored rows.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown document kind: {0}")]
    UnknownKind(String),

    #[error("invalid entity registry: {0}")]
    InvalidRegistry(String),

    #[error("decoding error: {0}")]
    Decode(String),
}

/// Payload and input validation errors.
///
/// These are always raised before any store I/O is attempted.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{kind} is missing required field `{field}`")]
    MissingField {
        kind: DocumentKind,
        field: &'static str,
    },

    #[error("{kind} field `{field}` is invalid: {reason}")]
    InvalidField {
        kind: DocumentKind,
        field: &'static str,
        reason: String,
    },

    #[error("payload kind mismatch: expected {expected}, got {got}")]
    KindMismatch {
        expected: DocumentKind,
        got: DocumentKind,
    },

    #[error("{0} documents do not carry child records")]
    ChildrenNotSupported(DocumentKind),

    #[error("child record `{child}` cannot be attached to {kind}")]
    ChildKindMismatch {
        kind: DocumentKind,
        child: &'static str,
    },

    #[error("page size must be greater than zero")]
    InvalidPageSize,

    #[error("`{column}` is not a registered lookup column of {kind}")]
    UnknownLookup {
        kind: DocumentKind,
        column: String,
    },

    #[error("a principal cannot revoke its own access entry")]
    SelfRevoke,
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
