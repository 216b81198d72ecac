//! Permission gate.
//!
//! Pure decisions over the acting principal's own access entry. Stores read
//! the entry inside the same transaction as the mutation it gates and only
//! issue the statement on [`GateDecision::Allowed`].

use docvault_core::{AccessEntry, DocumentId, PrincipalId};

use crate::error::{PermsError, Result};
use crate::grant::{Capability, Grant};

/// Outcome of a gated write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allowed,
    /// The document does not exist.
    NotFound,
    /// The document exists but the principal lacks the capability.
    Denied(Capability),
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// Turn a refusal into a [`PermsError`].
    pub fn into_result(self, document: DocumentId, reader: PrincipalId) -> Result<()> {
        match self {
            Self::Allowed => Ok(()),
            Self::NotFound => Err(PermsError::UnknownDocument(document)),
            Self::Denied(capability) => Err(PermsError::Denied {
                document,
                reader,
                capability,
            }),
        }
    }
}

/// Stateless permission checks.
pub struct PermissionGate;

impl PermissionGate {
    /// Read requires an entry; Edit and Delete require the matching flag.
    pub fn allows(entry: Option<&AccessEntry>, capability: Capability) -> bool {
        match (entry, capability) {
            (None, _) => false,
            (Some(_), Capability::Read) => true,
            (Some(e), Capability::Edit) => e.can_edit,
            (Some(e), Capability::Delete) => e.can_delete,
        }
    }

    /// Decide a write on a document.
    ///
    /// Write paths distinguish a missing document from a missing right, so
    /// `exists` is consulted before the entry.
    pub fn decide(
        entry: Option<&AccessEntry>,
        exists: bool,
        capability: Capability,
    ) -> GateDecision {
        if !exists {
            return GateDecision::NotFound;
        }
        if Self::allows(entry, capability) {
            GateDecision::Allowed
        } else {
            GateDecision::Denied(capability)
        }
    }

    /// Check that `grantor` holds every flag carried by `grant`.
    pub fn check_delegation(grantor: &AccessEntry, grant: &Grant) -> Result<()> {
        if grant.can_edit && !grantor.can_edit {
            return Err(PermsError::Escalation {
                capability: Capability::Edit,
            });
        }
        if grant.can_delete && !grantor.can_delete {
            return Err(PermsError::Escalation {
                capability: Capability::Delete,
            });
        }
        Ok(())
    }

    /// The first flag held by `target` that `actor` lacks.
    ///
    /// An actor may only overwrite or remove entries it could have granted.
    pub fn outranks(actor: &AccessEntry, target: &AccessEntry) -> Option<Capability> {
        if target.can_edit && !actor.can_edit {
            return Some(Capability::Edit);
        }
        if target.can_delete && !actor.can_delete {
            return Some(Capability::Delete);
        }
        None
    }

    /// Decide whether `grantor_entry` may hand `grant` to another principal.
    ///
    /// Granting requires Edit, no flag may be escalated, and an existing
    /// `target_entry` may not carry a flag the grantor lacks.
    pub fn authorize_grant(
        grantor_entry: Option<&AccessEntry>,
        target_entry: Option<&AccessEntry>,
        exists: bool,
        grant: &Grant,
    ) -> GateDecision {
        let decision = Self::decide(grantor_entry, exists, Capability::Edit);
        if !decision.is_allowed() {
            return decision;
        }
        let Some(grantor) = grantor_entry else {
            return GateDecision::Denied(Capability::Edit);
        };
        if let Err(PermsError::Escalation { capability }) = Self::check_delegation(grantor, grant) {
            return GateDecision::Denied(capability);
        }
        Self::authorize_target(grantor, target_entry)
    }

    /// Decide whether `revoker_entry` may remove `target_entry`.
    ///
    /// Revoking requires Edit and the target may not outrank the revoker.
    pub fn authorize_revoke(
        revoker_entry: Option<&AccessEntry>,
        target_entry: Option<&AccessEntry>,
        exists: bool,
    ) -> GateDecision {
        let decision = Self::decide(revoker_entry, exists, Capability::Edit);
        if !decision.is_allowed() {
            return decision;
        }
        match revoker_entry {
            Some(revoker) => Self::authorize_target(revoker, target_entry),
            None => GateDecision::Denied(Capability::Edit),
        }
    }

    fn authorize_target(actor: &AccessEntry, target: Option<&AccessEntry>) -> GateDecision {
        match target.and_then(|target| Self::outranks(actor, target)) {
            Some(capability) => GateDecision::Denied(capability),
            None => GateDecision::Allowed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(can_edit: bool, can_delete: bool) -> AccessEntry {
        AccessEntry {
            document: DocumentId::generate(),
            reader: PrincipalId::new(1),
            can_edit,
            can_delete,
        }
    }

    #[test]
    fn test_read_requires_entry() {
        assert!(!PermissionGate::allows(None, Capability::Read));
        assert!(PermissionGate::allows(Some(&entry(false, false)), Capability::Read));
    }

    #[test]
    fn test_flags_gate_mutation() {
        let e = entry(true, false);
        assert!(PermissionGate::allows(Some(&e), Capability::Edit));
        assert!(!PermissionGate::allows(Some(&e), Capability::Delete));
    }

    #[test]
    fn test_decide_separates_missing_from_denied() {
        assert_eq!(
            PermissionGate::decide(None, false, Capability::Edit),
            GateDecision::NotFound
        );
        assert_eq!(
            PermissionGate::decide(None, true, Capability::Edit),
            GateDecision::Denied(Capability::Edit)
        );
        assert_eq!(
            PermissionGate::decide(Some(&entry(true, true)), true, Capability::Delete),
            GateDecision::Allowed
        );
    }

    #[test]
    fn test_grant_needs_edit() {
        let reader_only = entry(false, false);
        let grant = Grant::read_only(PrincipalId::new(2));
        assert_eq!(
            PermissionGate::authorize_grant(Some(&reader_only), None, true, &grant),
            GateDecision::Denied(Capability::Edit)
        );
    }

    #[test]
    fn test_grant_cannot_escalate_delete() {
        let editor = entry(true, false);
        let grant = Grant::owner(PrincipalId::new(2));
        assert_eq!(
            PermissionGate::authorize_grant(Some(&editor), None, true, &grant),
            GateDecision::Denied(Capability::Delete)
        );
        let narrower = Grant::read_only(PrincipalId::new(2)).with_edit();
        assert!(PermissionGate::authorize_grant(Some(&editor), None, true, &narrower).is_allowed());
    }

    #[test]
    fn test_editor_cannot_demote_owner() {
        let editor = entry(true, false);
        let owner = entry(true, true);
        let demote = Grant::read_only(owner.reader);
        assert_eq!(
            PermissionGate::authorize_grant(Some(&editor), Some(&owner), true, &demote),
            GateDecision::Denied(Capability::Delete)
        );
        assert_eq!(
            PermissionGate::authorize_revoke(Some(&editor), Some(&owner), true),
            GateDecision::Denied(Capability::Delete)
        );

        let peer = entry(true, false);
        assert!(PermissionGate::authorize_grant(Some(&editor), Some(&peer), true, &demote).is_allowed());
        assert!(PermissionGate::authorize_revoke(Some(&editor), Some(&peer), true).is_allowed());
    }

    #[test]
    fn test_revoke_needs_edit() {
        let reader_only = entry(false, false);
        assert_eq!(
            PermissionGate::authorize_revoke(Some(&reader_only), None, true),
            GateDecision::Denied(Capability::Edit)
        );
        assert_eq!(
            PermissionGate::authorize_revoke(None, None, false),
            GateDecision::NotFound
        );
        assert_eq!(PermissionGate::outranks(&entry(true, true), &entry(true, true)), None);
    }

    #[test]
    fn test_into_result() {
        let doc = DocumentId::generate();
        let reader = PrincipalId::new(4);
        assert!(GateDecision::Allowed.into_result(doc, reader).is_ok());
        assert!(matches!(
            GateDecision::Denied(Capability::Delete).into_result(doc, reader),
            Err(PermsError::Denied { capability: Capability::Delete, .. })
        ));
        assert!(matches!(
            GateDecision::NotFound.into_result(doc, reader),
            Err(PermsError::UnknownDocument(d)) if d == doc
        ));
    }
}
