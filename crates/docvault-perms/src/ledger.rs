//! In-memory access ledger.
//!
//! Holds the access entries of one document kind, indexed by
//! `(document, reader)`, by document, and by reader. A document is
//! considered present while it has at least one entry.

use std::collections::{BTreeSet, HashMap};

use docvault_core::{AccessEntry, DocumentId, PrincipalId};

use crate::error::{PermsError, Result};
use crate::gate::PermissionGate;
use crate::grant::Grant;

/// Aggregated access state for one kind.
#[derive(Debug, Default, Clone)]
pub struct AccessLedger {
    /// All entries indexed by `(document, reader)`.
    entries: HashMap<(DocumentId, PrincipalId), AccessEntry>,

    /// Index: document -> readers holding an entry.
    by_document: HashMap<DocumentId, BTreeSet<PrincipalId>>,

    /// Index: reader -> documents they can see.
    by_reader: HashMap<PrincipalId, BTreeSet<DocumentId>>,
}

impl AccessLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry. Returns the previous entry, if any.
    pub fn upsert(&mut self, entry: AccessEntry) -> Option<AccessEntry> {
        self.by_document
            .entry(entry.document)
            .or_default()
            .insert(entry.reader);
        self.by_reader
            .entry(entry.reader)
            .or_default()
            .insert(entry.document);
        self.entries.insert((entry.document, entry.reader), entry)
    }

    /// Get the entry of `reader` on `document`.
    pub fn entry(&self, document: DocumentId, reader: PrincipalId) -> Option<&AccessEntry> {
        self.entries.get(&(document, reader))
    }

    /// Whether any entry exists for `document`.
    pub fn contains_document(&self, document: DocumentId) -> bool {
        self.by_document.contains_key(&document)
    }

    /// All entries of `document`, ordered by reader.
    pub fn entries_for(&self, document: DocumentId) -> Vec<AccessEntry> {
        self.by_document
            .get(&document)
            .map(|readers| {
                readers
                    .iter()
                    .filter_map(|reader| self.entries.get(&(document, *reader)).copied())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Documents visible to `reader`.
    pub fn documents_for(&self, reader: PrincipalId) -> impl Iterator<Item = DocumentId> + '_ {
        self.by_reader
            .get(&reader)
            .into_iter()
            .flat_map(|docs| docs.iter().copied())
    }

    /// Hand `grant` to another principal on behalf of `grantor`.
    pub fn delegate(
        &mut self,
        document: DocumentId,
        grantor: PrincipalId,
        grant: Grant,
    ) -> Result<()> {
        let decision = PermissionGate::authorize_grant(
            self.entry(document, grantor),
            self.entry(document, grant.reader),
            self.contains_document(document),
            &grant,
        );
        decision.into_result(document, grantor)?;
        self.upsert(grant.entry(document));
        Ok(())
    }

    /// Remove `reader`'s entry on behalf of `revoker`, who needs Edit and
    /// every flag `reader` holds.
    ///
    /// Returns whether an entry was removed.
    pub fn revoke(
        &mut self,
        document: DocumentId,
        revoker: PrincipalId,
        reader: PrincipalId,
    ) -> Result<bool> {
        let decision = PermissionGate::authorize_revoke(
            self.entry(document, revoker),
            self.entry(document, reader),
            self.contains_document(document),
        );
        decision.into_result(document, revoker)?;
        Ok(self.remove(document, reader).is_some())
    }

    /// Remove a single entry without gating.
    pub fn remove(&mut self, document: DocumentId, reader: PrincipalId) -> Option<AccessEntry> {
        let removed = self.entries.remove(&(document, reader))?;
        if let Some(readers) = self.by_document.get_mut(&document) {
            readers.remove(&reader);
            if readers.is_empty() {
                self.by_document.remove(&document);
            }
        }
        if let Some(docs) = self.by_reader.get_mut(&reader) {
            docs.remove(&document);
            if docs.is_empty() {
                self.by_reader.remove(&reader);
            }
        }
        Some(removed)
    }

    /// Remove every entry of `document`. Returns how many were removed.
    pub fn remove_document(&mut self, document: DocumentId) -> usize {
        let readers = self.by_document.remove(&document).unwrap_or_default();
        for reader in &readers {
            self.entries.remove(&(document, *reader));
            if let Some(docs) = self.by_reader.get_mut(reader) {
                docs.remove(&document);
                if docs.is_empty() {
                    self.by_reader.remove(reader);
                }
            }
        }
        readers.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
