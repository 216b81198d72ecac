//! Error types for the repository.

use docvault_core::{DocumentId, DocumentKind, ValidationError};
use docvault_perms::Capability;
use docvault_store::StoreError;
use thiserror::Error;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The payload or request was rejected before any store I/O.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The store failed; any open transaction was rolled back.
    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// The kind has no registered table family.
    #[error("unknown document kind: {0}")]
    UnknownKind(DocumentKind),

    /// The document does not exist, or is not visible to the principal.
    #[error("{kind} {id} not found")]
    NotFound { kind: DocumentKind, id: DocumentId },

    /// The document exists but the principal lacks the capability.
    #[error("{capability} access to {kind} {id} denied")]
    AccessDenied {
        kind: DocumentKind,
        id: DocumentId,
        capability: Capability,
    },
}

impl VaultError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied { .. })
    }
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, VaultError>;
