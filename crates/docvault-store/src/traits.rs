//! Store trait: the abstract interface for document persistence.
//!
//! Implementations include SQLite over a connection pool (primary) and
//! in-memory (for tests).

use async_trait::async_trait;

use docvault_core::{
    AccessEntry, ChildRecord, Document, DocumentBody, DocumentId, DocumentKind, EntityRegistry,
    FieldValue, PrincipalId,
};
use docvault_perms::{Capability, GateDecision, Grant};

use crate::error::Result;

/// Result of a gated mutation.
///
/// Missing documents and missing rights are expected outcomes, not faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The mutation was committed.
    Applied,
    /// The document does not exist.
    NotFound,
    /// The document exists but the principal lacks the capability.
    Denied(Capability),
}

impl WriteOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

impl From<GateDecision> for WriteOutcome {
    fn from(decision: GateDecision) -> Self {
        match decision {
            GateDecision::Allowed => Self::Applied,
            GateDecision::NotFound => Self::NotFound,
            GateDecision::Denied(capability) => Self::Denied(capability),
        }
    }
}

/// A page of documents and the access-filtered total, read from one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ListPage {
    pub documents: Vec<Document>,
    pub total: u64,
}

/// The Store trait: async interface for document persistence.
///
/// Every read is filtered through the kind's access table; every mutation
/// other than insert is gated on the acting principal's own entry, read
/// inside the same transaction as the mutation.
///
/// # Design Notes
///
/// - **Atomic inserts**: main row, owner entry, and children commit together
///   or not at all.
/// - **Conflated reads**: `find` returns `None` both for absent documents
///   and for documents the principal cannot see.
/// - **Separated writes**: mutations report `NotFound` and `Denied` apart.
#[async_trait]
pub trait Store: Send + Sync {
    /// The registry this store was opened with.
    fn registry(&self) -> &EntityRegistry;

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// Documents of `kind` visible to `principal`, ordered by `reg_date` then
    /// insertion order. A `limit` of 0 means unlimited.
    async fn list(
        &self,
        kind: DocumentKind,
        principal: PrincipalId,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Document>>;

    /// Number of documents of `kind` visible to `principal`.
    async fn count(&self, kind: DocumentKind, principal: PrincipalId) -> Result<u64>;

    /// `count` and `list` read from one snapshot.
    async fn list_page(
        &self,
        kind: DocumentKind,
        principal: PrincipalId,
        limit: u64,
        offset: u64,
    ) -> Result<ListPage>;

    /// A single document, if it exists and `principal` holds an entry.
    async fn find(
        &self,
        kind: DocumentKind,
        id: DocumentId,
        principal: PrincipalId,
    ) -> Result<Option<Document>>;

    /// Child records of a visible document, in insertion order.
    async fn children(
        &self,
        kind: DocumentKind,
        id: DocumentId,
        principal: PrincipalId,
    ) -> Result<Option<Vec<ChildRecord>>>;

    /// Every access entry of a document visible to `principal`.
    async fn access_entries(
        &self,
        kind: DocumentKind,
        id: DocumentId,
        principal: PrincipalId,
    ) -> Result<Option<Vec<AccessEntry>>>;

    /// Newest-first documents whose lookup `column` equals `value`.
    async fn list_by_reference(
        &self,
        kind: DocumentKind,
        principal: PrincipalId,
        column: &str,
        value: FieldValue,
        limit: u64,
    ) -> Result<Vec<Document>>;

    /// Consumption records visible to `principal` whose vehicle belongs to
    /// the owner with `telegram_name`, ordered like [`list`](Self::list).
    ///
    /// Only the consumption ledger is consulted; the vehicle and owner rows
    /// are followed by reference. A `limit` of 0 means unlimited.
    async fn list_by_owner_name(
        &self,
        principal: PrincipalId,
        telegram_name: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Document>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a document, its owner entry, and its children in one unit.
    async fn insert(
        &self,
        body: DocumentBody,
        principal: PrincipalId,
        children: Vec<ChildRecord>,
    ) -> Result<DocumentId>;

    /// Replace the body of a document. Requires Edit.
    async fn update(
        &self,
        id: DocumentId,
        body: DocumentBody,
        principal: PrincipalId,
    ) -> Result<WriteOutcome>;

    /// Delete a document with its children and entries. Requires Delete.
    async fn delete(
        &self,
        kind: DocumentKind,
        id: DocumentId,
        principal: PrincipalId,
    ) -> Result<WriteOutcome>;

    /// Add or replace another principal's entry. Requires Edit, no escalation.
    async fn grant(
        &self,
        kind: DocumentKind,
        id: DocumentId,
        grantor: PrincipalId,
        grant: Grant,
    ) -> Result<WriteOutcome>;

    /// Remove `reader`'s entry. Requires Edit.
    async fn revoke(
        &self,
        kind: DocumentKind,
        id: DocumentId,
        revoker: PrincipalId,
        reader: PrincipalId,
    ) -> Result<WriteOutcome>;
}

/// Outcome of [`StoreExt::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted(DocumentId),
    Updated(DocumentId),
    /// The update branch was refused.
    Refused(WriteOutcome),
}

/// Extension trait for common store patterns.
pub trait StoreExt: Store {
    /// Insert when `id` is `None`, otherwise update.
    fn upsert(
        &self,
        id: Option<DocumentId>,
        body: DocumentBody,
        principal: PrincipalId,
        children: Vec<ChildRecord>,
    ) -> impl std::future::Future<Output = Result<UpsertOutcome>> + Send;
}

impl<S: Store + ?Sized> StoreExt for S {
    async fn upsert(
        &self,
        id: Option<DocumentId>,
        body: DocumentBody,
        principal: PrincipalId,
        children: Vec<ChildRecord>,
    ) -> Result<UpsertOutcome> {
        match id {
            None => {
                let id = self.insert(body, principal, children).await?;
                Ok(UpsertOutcome::Inserted(id))
            }
            Some(id) => match self.update(id, body, principal).await? {
                WriteOutcome::Applied => Ok(UpsertOutcome::Updated(id)),
                refused => Ok(UpsertOutcome::Refused(refused)),
            },
        }
    }
}
