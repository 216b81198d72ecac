//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence. Inserts run the same
//! [`InsertPlan`] as the SQLite store against a staged copy of the kind's
//! tables, which replaces the live copy only when every step succeeded.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use uuid::Uuid;

use docvault_core::{
    now_millis, AccessEntry, ChildRecord, Document, DocumentBody, DocumentId, DocumentKind,
    DocumentMeta, EntityNaming, EntityRegistry, FieldValue, PrincipalId,
};
use docvault_perms::{AccessLedger, Capability, Grant, PermissionGate, PermsError};

use crate::coordinator::{InsertPlan, WriteStep};
use crate::error::{Result, StoreError};
use crate::statements::OWNER_CHAIN;
use crate::traits::{ListPage, Store, WriteOutcome};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    registry: Arc<EntityRegistry>,
    inner: RwLock<HashMap<DocumentKind, KindTables>>,
}

/// The tables of one kind.
#[derive(Debug, Clone, Default)]
struct KindTables {
    rows: HashMap<DocumentId, StoredRow>,
    ledger: AccessLedger,
    children: HashMap<DocumentId, Vec<ChildRecord>>,
    /// Insertion counter standing in for SQLite's rowid.
    next_seq: u64,
}

#[derive(Debug, Clone)]
struct StoredRow {
    seq: u64,
    meta: DocumentMeta,
    body: DocumentBody,
}

impl KindTables {
    fn document(&self, kind: DocumentKind, id: DocumentId, reader: PrincipalId) -> Option<Document> {
        let row = self.rows.get(&id)?;
        let access = *self.ledger.entry(id, reader)?;
        Some(Document {
            id,
            kind,
            meta: row.meta,
            body: row.body.clone(),
            access,
        })
    }

    /// Visible ids ordered by `reg_date`, then insertion order.
    fn visible(&self, reader: PrincipalId) -> Vec<DocumentId> {
        let mut ids: Vec<(i64, u64, DocumentId)> = self
            .ledger
            .documents_for(reader)
            .filter_map(|id| self.rows.get(&id).map(|row| (row.meta.reg_date, row.seq, id)))
            .collect();
        ids.sort_unstable_by_key(|(reg_date, seq, _)| (*reg_date, *seq));
        ids.into_iter().map(|(_, _, id)| id).collect()
    }

    fn list(
        &self,
        kind: DocumentKind,
        reader: PrincipalId,
        limit: u64,
        offset: u64,
    ) -> Vec<Document> {
        let take = if limit == 0 { usize::MAX } else { to_usize(limit) };
        self.visible(reader)
            .into_iter()
            .skip(to_usize(offset))
            .take(take)
            .filter_map(|id| self.document(kind, id, reader))
            .collect()
    }

    fn apply_step(&mut self, naming: &EntityNaming, id: DocumentId, step: &WriteStep) -> Result<()> {
        match step {
            WriteStep::InsertDocument { id, meta, body } => {
                if self.rows.contains_key(id) {
                    return Err(StoreError::Constraint(format!("duplicate id {id}")));
                }
                let seq = self.next_seq;
                self.next_seq += 1;
                self.rows.insert(
                    *id,
                    StoredRow {
                        seq,
                        meta: *meta,
                        body: body.clone(),
                    },
                );
                Ok(())
            }
            WriteStep::GrantOwner(entry) => {
                if !self.rows.contains_key(&entry.document) {
                    return Err(StoreError::Constraint(format!(
                        "access entry references missing document {}",
                        entry.document
                    )));
                }
                if self.ledger.entry(entry.document, entry.reader).is_some() {
                    return Err(StoreError::Constraint(format!(
                        "duplicate access entry for {} on {}",
                        entry.reader, entry.document
                    )));
                }
                self.ledger.upsert(*entry);
                Ok(())
            }
            WriteStep::InsertChild(record) => {
                let child = naming.child.as_ref().ok_or_else(|| {
                    StoreError::InvalidData(format!("{} has no child table", naming.main_table))
                })?;
                if !self.rows.contains_key(&id) {
                    return Err(StoreError::Constraint(format!(
                        "child references missing document {id}"
                    )));
                }

                let unique: Vec<usize> = child
                    .unique
                    .iter()
                    .filter_map(|name| child.columns.iter().position(|c| c.name == *name))
                    .collect();
                let siblings = self.children.entry(id).or_default();
                if !unique.is_empty() {
                    let key = unique_key(&record.encode(), &unique);
                    if siblings
                        .iter()
                        .any(|other| unique_key(&other.encode(), &unique) == key)
                    {
                        return Err(StoreError::Constraint(format!(
                            "duplicate ({}) in {}",
                            child.unique.join(", "),
                            child.name
                        )));
                    }
                }
                siblings.push(record.clone());
                Ok(())
            }
        }
    }
}

fn unique_key(values: &[FieldValue], positions: &[usize]) -> Vec<FieldValue> {
    positions.iter().filter_map(|&i| values.get(i).cloned()).collect()
}

fn to_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

fn ledger_outcome(result: docvault_perms::Result<()>) -> WriteOutcome {
    match result {
        Ok(()) => WriteOutcome::Applied,
        Err(PermsError::UnknownDocument(_)) => WriteOutcome::NotFound,
        Err(PermsError::Denied { capability, .. }) | Err(PermsError::Escalation { capability }) => {
            WriteOutcome::Denied(capability)
        }
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store for `registry`.
    pub fn new(registry: Arc<EntityRegistry>) -> Self {
        Self {
            registry,
            inner: RwLock::new(HashMap::new()),
        }
    }

    fn naming(&self, kind: DocumentKind) -> Result<&EntityNaming> {
        Ok(self.registry.resolve(kind)?)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<DocumentKind, KindTables>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<DocumentKind, KindTables>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` on `kind`'s tables (empty when nothing was written yet).
    fn with_tables<T>(&self, kind: DocumentKind, f: impl FnOnce(&KindTables) -> T) -> Result<T> {
        self.naming(kind)?;
        let inner = self.read();
        match inner.get(&kind) {
            Some(tables) => Ok(f(tables)),
            None => Ok(f(&KindTables::default())),
        }
    }

    /// Run a gated mutation on `kind`'s tables.
    fn gated(
        &self,
        kind: DocumentKind,
        id: DocumentId,
        principal: PrincipalId,
        capability: Capability,
        apply: impl FnOnce(&mut KindTables),
    ) -> Result<WriteOutcome> {
        self.naming(kind)?;
        let mut inner = self.write();
        let tables = inner.entry(kind).or_default();
        let decision = PermissionGate::decide(
            tables.ledger.entry(id, principal),
            tables.rows.contains_key(&id),
            capability,
        );
        if decision.is_allowed() {
            apply(tables);
        }
        Ok(decision.into())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Arc::new(EntityRegistry::standard()))
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    async fn list(
        &self,
        kind: DocumentKind,
        principal: PrincipalId,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Document>> {
        self.with_tables(kind, |t| t.list(kind, principal, limit, offset))
    }

    async fn count(&self, kind: DocumentKind, principal: PrincipalId) -> Result<u64> {
        self.with_tables(kind, |t| t.visible(principal).len() as u64)
    }

    async fn list_page(
        &self,
        kind: DocumentKind,
        principal: PrincipalId,
        limit: u64,
        offset: u64,
    ) -> Result<ListPage> {
        self.with_tables(kind, |t| ListPage {
            documents: t.list(kind, principal, limit, offset),
            total: t.visible(principal).len() as u64,
        })
    }

    async fn find(
        &self,
        kind: DocumentKind,
        id: DocumentId,
        principal: PrincipalId,
    ) -> Result<Option<Document>> {
        self.with_tables(kind, |t| t.document(kind, id, principal))
    }

    async fn children(
        &self,
        kind: DocumentKind,
        id: DocumentId,
        principal: PrincipalId,
    ) -> Result<Option<Vec<ChildRecord>>> {
        self.with_tables(kind, |t| {
            t.document(kind, id, principal)
                .map(|_| t.children.get(&id).cloned().unwrap_or_default())
        })
    }

    async fn access_entries(
        &self,
        kind: DocumentKind,
        id: DocumentId,
        principal: PrincipalId,
    ) -> Result<Option<Vec<AccessEntry>>> {
        self.with_tables(kind, |t| {
            t.document(kind, id, principal)
                .map(|_| t.ledger.entries_for(id))
        })
    }

    async fn list_by_reference(
        &self,
        kind: DocumentKind,
        principal: PrincipalId,
        column: &str,
        value: FieldValue,
        limit: u64,
    ) -> Result<Vec<Document>> {
        let naming = self.naming(kind)?;
        let position = naming
            .columns
            .iter()
            .position(|c| c.name == column)
            .filter(|_| naming.has_lookup(column))
            .ok_or_else(|| {
                StoreError::InvalidData(format!("`{column}` is not a lookup column of {kind}"))
            })?;

        self.with_tables(kind, |t| {
            let mut matches: Vec<Document> = t
                .visible(principal)
                .into_iter()
                .rev()
                .filter_map(|id| t.document(kind, id, principal))
                .filter(|doc| doc.body.encode().get(position) == Some(&value))
                .collect();
            if limit > 0 {
                matches.truncate(to_usize(limit));
            }
            matches
        })
    }

    async fn list_by_owner_name(
        &self,
        principal: PrincipalId,
        telegram_name: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Document>> {
        for kind in OWNER_CHAIN {
            self.naming(kind)?;
        }
        let inner = self.read();
        let empty = KindTables::default();
        let tables = |kind| inner.get(&kind).unwrap_or(&empty);

        let owners: HashSet<Uuid> = tables(DocumentKind::Owner)
            .rows
            .iter()
            .filter(|(_, row)| {
                matches!(&row.body, DocumentBody::Owner(o) if o.telegram_name == telegram_name)
            })
            .map(|(id, _)| *id.as_uuid())
            .collect();
        let vehicles: HashSet<Uuid> = tables(DocumentKind::Vehicle)
            .rows
            .iter()
            .filter(|(_, row)| {
                matches!(&row.body, DocumentBody::Vehicle(v) if owners.contains(&v.owner))
            })
            .map(|(id, _)| *id.as_uuid())
            .collect();

        let consumings = tables(DocumentKind::Consuming);
        let take = if limit == 0 { usize::MAX } else { to_usize(limit) };
        Ok(consumings
            .visible(principal)
            .into_iter()
            .filter_map(|id| consumings.document(DocumentKind::Consuming, id, principal))
            .filter(|doc| {
                matches!(&doc.body, DocumentBody::Consuming(c) if vehicles.contains(&c.vehicle))
            })
            .skip(to_usize(offset))
            .take(take)
            .collect())
    }

    async fn insert(
        &self,
        body: DocumentBody,
        principal: PrincipalId,
        children: Vec<ChildRecord>,
    ) -> Result<DocumentId> {
        let kind = body.kind();
        let naming = self.naming(kind)?;
        let plan = InsertPlan::new(body, principal, now_millis(), children);

        let mut inner = self.write();
        let mut staged = inner.get(&kind).cloned().unwrap_or_default();
        for step in plan.steps() {
            staged
                .apply_step(naming, plan.id(), step)
                .map_err(|source| StoreError::WriteStep {
                    step: step.name(),
                    table: step.table(naming),
                    source: Box::new(source),
                })?;
        }
        inner.insert(kind, staged);

        tracing::debug!(%kind, id = %plan.id(), children = plan.child_count(), "committed insert");
        Ok(plan.id())
    }

    async fn update(
        &self,
        id: DocumentId,
        body: DocumentBody,
        principal: PrincipalId,
    ) -> Result<WriteOutcome> {
        let kind = body.kind();
        let now = now_millis();
        self.gated(kind, id, principal, Capability::Edit, |tables| {
            if let Some(row) = tables.rows.get_mut(&id) {
                row.body = body;
                row.meta.last_mod_user = principal;
                row.meta.last_mod_date = now;
            }
        })
    }

    async fn delete(
        &self,
        kind: DocumentKind,
        id: DocumentId,
        principal: PrincipalId,
    ) -> Result<WriteOutcome> {
        self.gated(kind, id, principal, Capability::Delete, |tables| {
            tables.children.remove(&id);
            tables.ledger.remove_document(id);
            tables.rows.remove(&id);
        })
    }

    async fn grant(
        &self,
        kind: DocumentKind,
        id: DocumentId,
        grantor: PrincipalId,
        grant: Grant,
    ) -> Result<WriteOutcome> {
        self.naming(kind)?;
        let mut inner = self.write();
        let tables = inner.entry(kind).or_default();
        Ok(ledger_outcome(tables.ledger.delegate(id, grantor, grant)))
    }

    async fn revoke(
        &self,
        kind: DocumentKind,
        id: DocumentId,
        revoker: PrincipalId,
        reader: PrincipalId,
    ) -> Result<WriteOutcome> {
        self.naming(kind)?;
        let mut inner = self.write();
        let tables = inner.entry(kind).or_default();
        Ok(ledger_outcome(
            tables.ledger.revoke(id, revoker, reader).map(|_| ()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docvault_core::{Consuming, Owner, Project, Task, Vehicle};
    use proptest::prelude::*;
    use uuid::Uuid;

    const ALICE: PrincipalId = PrincipalId::new(1);
    const BOB: PrincipalId = PrincipalId::new(2);

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryStore::default();
        let id = store
            .insert(Owner::new("@alice").into(), ALICE, vec![])
            .await
            .unwrap();

        let doc = store.find(DocumentKind::Owner, id, ALICE).await.unwrap().unwrap();
        assert_eq!(doc.access, AccessEntry::owner(id, ALICE));
        assert!(store.find(DocumentKind::Owner, id, BOB).await.unwrap().is_none());
        assert_eq!(store.count(DocumentKind::Owner, ALICE).await.unwrap(), 1);
        assert_eq!(store.count(DocumentKind::Owner, BOB).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_label_voids_insert() {
        let store = MemoryStore::default();
        let label = Uuid::new_v4();
        let err = store
            .insert(
                Task::new("Labelled").into(),
                ALICE,
                vec![ChildRecord::label(label), ChildRecord::label(label)],
            )
            .await
            .unwrap_err();

        assert_eq!(err.step(), Some("insert_child"));
        assert!(err.is_constraint());
        assert_eq!(store.count(DocumentKind::Task, ALICE).await.unwrap(), 0);
        assert!(store.read().get(&DocumentKind::Task).is_none());
    }

    #[tokio::test]
    async fn test_gated_update() {
        let store = MemoryStore::default();
        let id = store.insert(Task::new("Mine").into(), ALICE, vec![]).await.unwrap();

        assert_eq!(
            store.update(id, Task::new("Nope").into(), BOB).await.unwrap(),
            WriteOutcome::Denied(Capability::Edit)
        );
        assert_eq!(
            store
                .update(DocumentId::generate(), Task::new("Nope").into(), ALICE)
                .await
                .unwrap(),
            WriteOutcome::NotFound
        );
        assert!(store
            .update(id, Task::new("Yes").into(), ALICE)
            .await
            .unwrap()
            .is_applied());
        let doc = store.find(DocumentKind::Task, id, ALICE).await.unwrap().unwrap();
        assert_eq!(doc.body.as_task().unwrap().title, "Yes");
    }

    #[tokio::test]
    async fn test_grant_revoke_outcomes() {
        let store = MemoryStore::default();
        let id = store.insert(Task::new("Shared").into(), ALICE, vec![]).await.unwrap();

        assert_eq!(
            store
                .grant(DocumentKind::Task, id, BOB, Grant::read_only(BOB))
                .await
                .unwrap(),
            WriteOutcome::Denied(Capability::Edit)
        );
        assert!(store
            .grant(DocumentKind::Task, id, ALICE, Grant::read_only(BOB))
            .await
            .unwrap()
            .is_applied());
        assert_eq!(store.count(DocumentKind::Task, BOB).await.unwrap(), 1);

        assert_eq!(
            store
                .revoke(DocumentKind::Task, DocumentId::generate(), ALICE, BOB)
                .await
                .unwrap(),
            WriteOutcome::NotFound
        );
        store.revoke(DocumentKind::Task, id, ALICE, BOB).await.unwrap();
        assert_eq!(store.count(DocumentKind::Task, BOB).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_editor_cannot_demote_owner() {
        let store = MemoryStore::default();
        let id = store.insert(Project::new("Owned").into(), ALICE, vec![]).await.unwrap();
        store
            .grant(DocumentKind::Project, id, ALICE, Grant::read_only(BOB).with_edit())
            .await
            .unwrap();

        assert_eq!(
            store
                .grant(DocumentKind::Project, id, BOB, Grant::read_only(ALICE))
                .await
                .unwrap(),
            WriteOutcome::Denied(Capability::Delete)
        );
        assert_eq!(
            store.revoke(DocumentKind::Project, id, BOB, ALICE).await.unwrap(),
            WriteOutcome::Denied(Capability::Delete)
        );
        let doc = store.find(DocumentKind::Project, id, ALICE).await.unwrap().unwrap();
        assert_eq!(doc.access, AccessEntry::owner(id, ALICE));
        assert_eq!(
            store.delete(DocumentKind::Project, id, ALICE).await.unwrap(),
            WriteOutcome::Applied
        );
    }

    #[tokio::test]
    async fn test_list_by_owner_name_pages() {
        let store = MemoryStore::default();
        let owner = store.insert(Owner::new("@driver").into(), ALICE, vec![]).await.unwrap();
        let car = store
            .insert(Vehicle::new(*owner.as_uuid()).into(), ALICE, vec![])
            .await
            .unwrap();
        let stray = store
            .insert(Vehicle::new(Uuid::new_v4()).into(), ALICE, vec![])
            .await
            .unwrap();

        let mut expected = Vec::new();
        for km in [10.0, 20.0, 30.0] {
            let id = store
                .insert(Consuming::new(*car.as_uuid(), km, 1.0, 1.0).into(), ALICE, vec![])
                .await
                .unwrap();
            expected.push(id);
        }
        store
            .insert(Consuming::new(*stray.as_uuid(), 5.0, 1.0, 1.0).into(), ALICE, vec![])
            .await
            .unwrap();

        let ids = |docs: Vec<Document>| docs.into_iter().map(|d| d.id).collect::<Vec<_>>();
        assert_eq!(ids(store.list_by_owner_name(ALICE, "@driver", 0, 0).await.unwrap()), expected);
        assert_eq!(
            ids(store.list_by_owner_name(ALICE, "@driver", 2, 1).await.unwrap()),
            expected[1..].to_vec()
        );
        assert!(store.list_by_owner_name(BOB, "@driver", 0, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_kind() {
        let registry = EntityRegistry::builder()
            .register(DocumentKind::Owner, docvault_core::standard_naming(DocumentKind::Owner))
            .build()
            .unwrap();
        let store = MemoryStore::new(Arc::new(registry));
        let err = store.list(DocumentKind::Task, ALICE, 0, 0).await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownKind(_)));
        let err = store.list_by_owner_name(ALICE, "@driver", 0, 0).await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownKind(_)));
    }

    proptest! {
        #[test]
        fn pages_concatenate_to_full_listing(total in 0usize..30, size in 1u64..8) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            runtime.block_on(async {
                let store = MemoryStore::default();
                for i in 0..total {
                    store
                        .insert(Task::new(format!("t{i}")).into(), ALICE, vec![])
                        .await
                        .unwrap();
                }

                let full = store.list(DocumentKind::Task, ALICE, 0, 0).await.unwrap();
                let mut paged = Vec::new();
                let mut offset = 0;
                loop {
                    let page = store
                        .list_page(DocumentKind::Task, ALICE, size, offset)
                        .await
                        .unwrap();
                    assert_eq!(page.total, total as u64);
                    if page.documents.is_empty() {
                        break;
                    }
                    offset += page.documents.len() as u64;
                    paged.extend(page.documents);
                }
                assert_eq!(paged, full);
            });
        }
    }
}
