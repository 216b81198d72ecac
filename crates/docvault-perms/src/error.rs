//! Error types for the permissions module.

use thiserror::Error;

use docvault_core::{DocumentId, PrincipalId};

use crate::grant::Capability;

/// Errors raised when a gate decision is turned into a hard failure.
#[derive(Debug, Error)]
pub enum PermsError {
    /// The principal does not hold the capability on the document.
    #[error("principal {reader} lacks {capability} on document {document}")]
    Denied {
        document: DocumentId,
        reader: PrincipalId,
        capability: Capability,
    },

    /// A grant would hand out a flag the grantor does not hold.
    #[error("cannot delegate {capability}: grantor does not hold it")]
    Escalation { capability: Capability },

    /// The document is not in the ledger.
    #[error("document not found in ledger: {0}")]
    UnknownDocument(DocumentId),
}

/// Result type for permission operations.
pub type Result<T> = std::result::Result<T, PermsError>;
