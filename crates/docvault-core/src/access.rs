//! Access entries: the rows of the per-kind access ledger.

use serde::{Deserialize, Serialize};

use crate::types::{DocumentId, PrincipalId};

/// One `(document, principal)` permission record.
///
/// The existence of the entry grants read visibility; the flags gate
/// mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessEntry {
    pub document: DocumentId,
    pub reader: PrincipalId,
    pub can_edit: bool,
    pub can_delete: bool,
}

impl AccessEntry {
    /// The default ownership grant created with every document.
    pub const fn owner(document: DocumentId, reader: PrincipalId) -> Self {
        Self {
            document,
            reader,
            can_edit: true,
            can_delete: true,
        }
    }

    /// Visibility without mutation rights.
    pub const fn read_only(document: DocumentId, reader: PrincipalId) -> Self {
        Self {
            document,
            reader,
            can_edit: false,
            can_delete: false,
        }
    }
}
