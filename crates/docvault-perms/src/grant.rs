//! Capabilities and grants.

use std::fmt;

use serde::{Deserialize, Serialize};

use docvault_core::{AccessEntry, DocumentId, PrincipalId};

/// What a principal wants to do with a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Read,
    Edit,
    Delete,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Edit => "edit",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flags handed to `reader` for one document.
///
/// A grant always implies read visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Grant {
    /// The principal receiving access.
    pub reader: PrincipalId,

    /// May update the document.
    pub can_edit: bool,

    /// May delete the document.
    pub can_delete: bool,
}

impl Grant {
    /// Full rights, as given to a document's author.
    pub const fn owner(reader: PrincipalId) -> Self {
        Self {
            reader,
            can_edit: true,
            can_delete: true,
        }
    }

    /// Visibility only.
    pub const fn read_only(reader: PrincipalId) -> Self {
        Self {
            reader,
            can_edit: false,
            can_delete: false,
        }
    }

    pub const fn with_edit(mut self) -> Self {
        self.can_edit = true;
        self
    }

    pub const fn with_delete(mut self) -> Self {
        self.can_delete = true;
        self
    }

    /// Check whether this grant carries `capability`.
    pub fn holds(&self, capability: Capability) -> bool {
        match capability {
            Capability::Read => true,
            Capability::Edit => self.can_edit,
            Capability::Delete => self.can_delete,
        }
    }

    /// The ledger row this grant produces for `document`.
    pub fn entry(&self, document: DocumentId) -> AccessEntry {
        AccessEntry {
            document,
            reader: self.reader,
            can_edit: self.can_edit,
            can_delete: self.can_delete,
        }
    }
}

impl From<AccessEntry> for Grant {
    fn from(entry: AccessEntry) -> Self {
        Self {
            reader: entry.reader,
            can_edit: entry.can_edit,
            can_delete: entry.can_delete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_grant_matches_owner_entry() {
        let doc = DocumentId::generate();
        let reader = PrincipalId::new(3);
        assert_eq!(Grant::owner(reader).entry(doc), AccessEntry::owner(doc, reader));
        assert_eq!(
            Grant::read_only(reader).entry(doc),
            AccessEntry::read_only(doc, reader)
        );
    }

    #[test]
    fn test_holds() {
        let grant = Grant::read_only(PrincipalId::new(1)).with_edit();
        assert!(grant.holds(Capability::Read));
        assert!(grant.holds(Capability::Edit));
        assert!(!grant.holds(Capability::Delete));
    }
}
