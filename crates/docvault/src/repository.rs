//! The document repository: per-kind operations over a [`Store`].
//!
//! Every operation resolves the kind against the store's registry and
//! validates its input before touching the store. Reads conflate a missing
//! document with an invisible one; writes report them apart.

use std::sync::Arc;

use serde::Deserialize;

use docvault_core::{
    validate_body, validate_children, AccessEntry, ChildRecord, Document, DocumentBody,
    DocumentId, DocumentKind, EntityNaming, FieldValue, PageRequest, PageView, PrincipalId,
    ValidationError,
};
use docvault_perms::Grant;
use docvault_store::{Store, StoreExt, UpsertOutcome, WriteOutcome};

use crate::error::{Result, VaultError};

/// Configuration for the repository.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Page size used when a caller does not ask for one.
    pub default_page_size: u32,
    /// Larger requested page sizes are clamped to this.
    pub max_page_size: u32,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 100,
        }
    }
}

impl VaultConfig {
    /// Turn a caller's page and optional size into a validated request.
    pub fn page_request(&self, page: u32, size: Option<u32>) -> Result<PageRequest> {
        let size = size
            .unwrap_or(self.default_page_size)
            .min(self.max_page_size.max(1));
        Ok(PageRequest::new(page, size)?)
    }
}

/// Access-controlled repository over any [`Store`].
pub struct DocumentRepository<S: Store> {
    /// The storage backend.
    store: Arc<S>,
    /// Configuration.
    config: VaultConfig,
}

impl<S: Store> Clone for DocumentRepository<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: Store> DocumentRepository<S> {
    /// Create a repository owning `store`.
    pub fn new(store: S, config: VaultConfig) -> Self {
        Self::with_shared(Arc::new(store), config)
    }

    /// Create a repository over a shared store.
    pub fn with_shared(store: Arc<S>, config: VaultConfig) -> Self {
        Self { store, config }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    fn naming(&self, kind: DocumentKind) -> Result<&EntityNaming> {
        self.store
            .registry()
            .resolve(kind)
            .map_err(|_| VaultError::UnknownKind(kind))
    }

    fn check_write(
        kind: DocumentKind,
        id: DocumentId,
        principal: PrincipalId,
        operation: &'static str,
        outcome: WriteOutcome,
    ) -> Result<()> {
        match outcome {
            WriteOutcome::Applied => {
                tracing::debug!(%kind, %id, %principal, operation, "write applied");
                Ok(())
            }
            WriteOutcome::NotFound => {
                tracing::debug!(%kind, %id, %principal, operation, "write target not found");
                Err(VaultError::NotFound { kind, id })
            }
            WriteOutcome::Denied(capability) => {
                tracing::warn!(%kind, %id, %principal, operation, %capability, "write denied");
                Err(VaultError::AccessDenied {
                    kind,
                    id,
                    capability,
                })
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// Documents of `kind` visible to `principal`, oldest first.
    ///
    /// A `limit` of 0 returns every visible document.
    pub async fn list(
        &self,
        kind: DocumentKind,
        principal: PrincipalId,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Document>> {
        self.naming(kind)?;
        Ok(self.store.list(kind, principal, limit, offset).await?)
    }

    /// Number of documents of `kind` visible to `principal`.
    pub async fn count(&self, kind: DocumentKind, principal: PrincipalId) -> Result<u64> {
        self.naming(kind)?;
        Ok(self.store.count(kind, principal).await?)
    }

    /// A document, or `None` if it is absent or not visible to `principal`.
    pub async fn find_by_id(
        &self,
        kind: DocumentKind,
        id: DocumentId,
        principal: PrincipalId,
    ) -> Result<Option<Document>> {
        self.naming(kind)?;
        Ok(self.store.find(kind, id, principal).await?)
    }

    /// Like [`find_by_id`](Self::find_by_id), failing with `NotFound`.
    pub async fn get(
        &self,
        kind: DocumentKind,
        id: DocumentId,
        principal: PrincipalId,
    ) -> Result<Document> {
        self.find_by_id(kind, id, principal)
            .await?
            .ok_or(VaultError::NotFound { kind, id })
    }

    /// One page of visible documents with its paging counters.
    ///
    /// `size` defaults to the configured page size and is clamped to the
    /// configured maximum; a size of 0 is rejected. Pages past the end are
    /// empty.
    pub async fn page(
        &self,
        kind: DocumentKind,
        principal: PrincipalId,
        page: u32,
        size: Option<u32>,
    ) -> Result<PageView<Document>> {
        self.naming(kind)?;
        let request = self.config.page_request(page, size)?;
        let listed = self
            .store
            .list_page(kind, principal, request.limit(), request.offset())
            .await?;
        Ok(PageView::new(listed.documents, listed.total, request))
    }

    /// Child records of a visible document, in insertion order.
    pub async fn children(
        &self,
        kind: DocumentKind,
        id: DocumentId,
        principal: PrincipalId,
    ) -> Result<Vec<ChildRecord>> {
        self.naming(kind)?;
        self.store
            .children(kind, id, principal)
            .await?
            .ok_or(VaultError::NotFound { kind, id })
    }

    /// The full access ledger of a visible document.
    pub async fn access_list(
        &self,
        kind: DocumentKind,
        id: DocumentId,
        principal: PrincipalId,
    ) -> Result<Vec<AccessEntry>> {
        self.naming(kind)?;
        self.store
            .access_entries(kind, id, principal)
            .await?
            .ok_or(VaultError::NotFound { kind, id })
    }

    /// Visible documents whose lookup `column` equals `value`, newest first.
    pub async fn list_by_reference(
        &self,
        kind: DocumentKind,
        principal: PrincipalId,
        column: &str,
        value: impl Into<FieldValue>,
        limit: u64,
    ) -> Result<Vec<Document>> {
        let naming = self.naming(kind)?;
        if !naming.has_lookup(column) {
            return Err(ValidationError::UnknownLookup {
                kind,
                column: column.to_string(),
            }
            .into());
        }
        Ok(self
            .store
            .list_by_reference(kind, principal, column, value.into(), limit)
            .await?)
    }

    /// Consumption records of every vehicle owned by `telegram_name`.
    ///
    /// Visibility follows the consumption ledger alone. A `limit` of 0 means
    /// unlimited.
    pub async fn consumings_of_owner(
        &self,
        principal: PrincipalId,
        telegram_name: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Document>> {
        for kind in [DocumentKind::Consuming, DocumentKind::Vehicle, DocumentKind::Owner] {
            self.naming(kind)?;
        }
        Ok(self
            .store
            .list_by_owner_name(principal, telegram_name, limit, offset)
            .await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    fn validate(
        &self,
        kind: DocumentKind,
        body: &DocumentBody,
        children: &[ChildRecord],
    ) -> Result<()> {
        let naming = self.naming(kind)?;
        validate_body(kind, body)?;
        validate_children(kind, naming, children)?;
        Ok(())
    }

    /// Create a document with its owner entry and children in one unit.
    ///
    /// `principal` receives full rights. Anonymous principals may author
    /// documents like any other.
    pub async fn insert(
        &self,
        kind: DocumentKind,
        body: DocumentBody,
        principal: PrincipalId,
        children: Vec<ChildRecord>,
    ) -> Result<DocumentId> {
        self.validate(kind, &body, &children)?;
        let id = self.store.insert(body, principal, children).await?;
        Ok(id)
    }

    /// Replace a document's body. Requires Edit.
    ///
    /// Author, creation date, and children are left unchanged.
    pub async fn update(
        &self,
        kind: DocumentKind,
        id: DocumentId,
        body: DocumentBody,
        principal: PrincipalId,
    ) -> Result<()> {
        self.validate(kind, &body, &[])?;
        let outcome = self.store.update(id, body, principal).await?;
        Self::check_write(kind, id, principal, "update", outcome)
    }

    /// Delete a document with its children and access entries. Requires Delete.
    pub async fn delete(
        &self,
        kind: DocumentKind,
        id: DocumentId,
        principal: PrincipalId,
    ) -> Result<()> {
        self.naming(kind)?;
        let outcome = self.store.delete(kind, id, principal).await?;
        Self::check_write(kind, id, principal, "delete", outcome)
    }

    /// Insert when `id` is `None`, otherwise update and return `id`.
    ///
    /// `children` are only written on insert.
    pub async fn upsert(
        &self,
        kind: DocumentKind,
        id: Option<DocumentId>,
        body: DocumentBody,
        principal: PrincipalId,
        children: Vec<ChildRecord>,
    ) -> Result<DocumentId> {
        self.validate(kind, &body, &children)?;
        match self.store.upsert(id, body, principal, children).await? {
            UpsertOutcome::Inserted(id) | UpsertOutcome::Updated(id) => Ok(id),
            UpsertOutcome::Refused(outcome) => {
                // Refusals only come from the update branch.
                let id = id.unwrap_or(DocumentId::NIL);
                Self::check_write(kind, id, principal, "upsert", outcome)?;
                Ok(id)
            }
        }
    }

    /// Give `grant` to another principal. Requires Edit; flags the grantor
    /// does not hold cannot be handed out.
    pub async fn grant(
        &self,
        kind: DocumentKind,
        id: DocumentId,
        grantor: PrincipalId,
        grant: Grant,
    ) -> Result<()> {
        self.naming(kind)?;
        let outcome = self.store.grant(kind, id, grantor, grant).await?;
        Self::check_write(kind, id, grantor, "grant", outcome)
    }

    /// Remove `reader`'s entry. Requires Edit.
    ///
    /// A principal cannot revoke its own entry, so every document keeps at
    /// least one.
    pub async fn revoke(
        &self,
        kind: DocumentKind,
        id: DocumentId,
        revoker: PrincipalId,
        reader: PrincipalId,
    ) -> Result<()> {
        self.naming(kind)?;
        if revoker == reader {
            return Err(ValidationError::SelfRevoke.into());
        }
        let outcome = self.store.revoke(kind, id, revoker, reader).await?;
        Self::check_write(kind, id, revoker, "revoke", outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_defaults_and_clamps() {
        let config = VaultConfig::default();
        assert_eq!(config.page_request(1, None).unwrap().size(), 10);
        assert_eq!(config.page_request(1, Some(500)).unwrap().size(), 100);
        assert!(matches!(
            config.page_request(1, Some(0)),
            Err(VaultError::Validation(ValidationError::InvalidPageSize))
        ));
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: VaultConfig = serde_json::from_str(r#"{ "max_page_size": 50 }"#).unwrap();
        assert_eq!(config.default_page_size, 10);
        assert_eq!(config.max_page_size, 50);
    }
}
