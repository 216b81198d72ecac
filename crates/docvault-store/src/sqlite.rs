//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend. It uses rusqlite with bundled
//! SQLite over a [`ConnectionPool`]; every call runs on tokio's blocking pool
//! with a leased connection.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::Connection;

use docvault_core::{
    now_millis, AccessEntry, ChildRecord, Document, DocumentBody, DocumentId, DocumentKind,
    EntityRegistry, FieldValue, PrincipalId,
};
use docvault_perms::{Capability, Grant, PermissionGate};

use crate::codec::{self, id_param, limit_param, offset_param, to_sql};
use crate::config::StoreConfig;
use crate::coordinator::{InsertPlan, TransactionCoordinator};
use crate::error::{Result, StoreError};
use crate::migration;
use crate::pool::ConnectionPool;
use crate::statements::{KindStatements, StatementSet};
use crate::traits::{ListPage, Store, WriteOutcome};

/// SQLite-based store implementation.
///
/// SQL text for every registered kind is compiled once at open.
pub struct SqliteStore {
    pool: ConnectionPool,
    registry: Arc<EntityRegistry>,
    statements: Arc<StatementSet>,
}

impl SqliteStore {
    /// Open a store as described by `config`, migrating the schema.
    pub fn open(config: &StoreConfig, registry: Arc<EntityRegistry>) -> Result<Self> {
        let pool = ConnectionPool::open(config, |conn| migration::migrate(conn, &registry))?;
        let statements = Arc::new(StatementSet::compile(&registry));
        Ok(Self {
            pool,
            registry,
            statements,
        })
    }

    /// Open a SQLite database file with default pool settings.
    pub fn open_path(path: impl AsRef<Path>, registry: Arc<EntityRegistry>) -> Result<Self> {
        Self::open(&StoreConfig::file(path.as_ref()), registry)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory(registry: Arc<EntityRegistry>) -> Result<Self> {
        Self::open(&StoreConfig::memory(), registry)
    }

    /// The underlying pool.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Run `job` with `kind`'s statements on a pooled connection.
    async fn with_kind<F, T>(&self, kind: DocumentKind, job: F) -> Result<T>
    where
        F: FnOnce(&mut Connection, &KindStatements) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        // Fail unknown kinds before taking a connection.
        self.statements.get(kind)?;
        let statements = self.statements.clone();
        self.pool
            .run(move |conn| {
                let stmts = statements.get(kind)?;
                job(conn, stmts)
            })
            .await
    }
}

#[async_trait]
impl Store for SqliteStore {
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
        self.with_kind(kind, move |conn, stmts| {
            codec::query_documents(
                conn,
                stmts,
                &stmts.list,
                rusqlite::params![principal.get(), limit_param(limit), offset_param(offset)],
            )
        })
        .await
    }

    async fn count(&self, kind: DocumentKind, principal: PrincipalId) -> Result<u64> {
        self.with_kind(kind, move |conn, stmts| {
            let mut stmt = conn.prepare_cached(&stmts.count)?;
            let count: i64 = stmt.query_row([principal.get()], |row| row.get(0))?;
            u64::try_from(count).map_err(|_| StoreError::InvalidData(format!("negative count {count}")))
        })
        .await
    }

    async fn list_page(
        &self,
        kind: DocumentKind,
        principal: PrincipalId,
        limit: u64,
        offset: u64,
    ) -> Result<ListPage> {
        self.with_kind(kind, move |conn, stmts| {
            let tx = conn.transaction()?;
            let total: i64 = tx
                .prepare_cached(&stmts.count)?
                .query_row([principal.get()], |row| row.get(0))?;
            let documents = codec::query_documents(
                &tx,
                stmts,
                &stmts.list,
                rusqlite::params![principal.get(), limit_param(limit), offset_param(offset)],
            )?;
            tx.commit()?;
            Ok(ListPage {
                documents,
                total: u64::try_from(total).unwrap_or_default(),
            })
        })
        .await
    }

    async fn find(
        &self,
        kind: DocumentKind,
        id: DocumentId,
        principal: PrincipalId,
    ) -> Result<Option<Document>> {
        self.with_kind(kind, move |conn, stmts| {
            let found = codec::query_documents(
                conn,
                stmts,
                &stmts.find,
                rusqlite::params![principal.get(), id_param(id)],
            )?;
            Ok(found.into_iter().next())
        })
        .await
    }

    async fn children(
        &self,
        kind: DocumentKind,
        id: DocumentId,
        principal: PrincipalId,
    ) -> Result<Option<Vec<ChildRecord>>> {
        self.with_kind(kind, move |conn, stmts| {
            let tx = conn.transaction()?;
            if codec::access_entry(&tx, stmts, id, principal)?.is_none() {
                return Ok(None);
            }
            let records = codec::children(&tx, stmts, id)?;
            tx.commit()?;
            Ok(Some(records))
        })
        .await
    }

    async fn access_entries(
        &self,
        kind: DocumentKind,
        id: DocumentId,
        principal: PrincipalId,
    ) -> Result<Option<Vec<AccessEntry>>> {
        self.with_kind(kind, move |conn, stmts| {
            let tx = conn.transaction()?;
            if codec::access_entry(&tx, stmts, id, principal)?.is_none() {
                return Ok(None);
            }
            let entries = codec::access_list(&tx, stmts, id)?;
            tx.commit()?;
            Ok(Some(entries))
        })
        .await
    }

    async fn list_by_reference(
        &self,
        kind: DocumentKind,
        principal: PrincipalId,
        column: &str,
        value: FieldValue,
        limit: u64,
    ) -> Result<Vec<Document>> {
        let column = column.to_string();
        self.with_kind(kind, move |conn, stmts| {
            let sql = stmts.lookup(&column).ok_or_else(|| {
                StoreError::InvalidData(format!("`{column}` is not a lookup column of {kind}"))
            })?;
            codec::query_documents(
                conn,
                stmts,
                sql,
                rusqlite::params![principal.get(), to_sql(&value), limit_param(limit)],
            )
        })
        .await
    }

    async fn list_by_owner_name(
        &self,
        principal: PrincipalId,
        telegram_name: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Document>> {
        let sql = self.statements.owned_consumings()?.to_string();
        let telegram_name = telegram_name.to_string();
        self.with_kind(DocumentKind::Consuming, move |conn, stmts| {
            codec::query_documents(
                conn,
                stmts,
                &sql,
                rusqlite::params![
                    principal.get(),
                    telegram_name,
                    limit_param(limit),
                    offset_param(offset)
                ],
            )
        })
        .await
    }

    async fn insert(
        &self,
        body: DocumentBody,
        principal: PrincipalId,
        children: Vec<ChildRecord>,
    ) -> Result<DocumentId> {
        let kind = body.kind();
        let plan = InsertPlan::new(body, principal, now_millis(), children);
        self.with_kind(kind, move |conn, stmts| {
            TransactionCoordinator::new(stmts).insert(conn, &plan)
        })
        .await
    }

    async fn update(
        &self,
        id: DocumentId,
        body: DocumentBody,
        principal: PrincipalId,
    ) -> Result<WriteOutcome> {
        let kind = body.kind();
        let now = now_millis();
        self.with_kind(kind, move |conn, stmts| {
            TransactionCoordinator::new(stmts).gated(
                conn,
                id,
                principal,
                |entry, exists| PermissionGate::decide(entry, exists, Capability::Edit),
                |tx, stmts| {
                    let mut values: Vec<_> = body.encode().iter().map(to_sql).collect();
                    values.push(principal.get().into());
                    values.push(now.into());
                    values.push(rusqlite::types::Value::Text(id_param(id)));
                    tx.prepare_cached(&stmts.update)?
                        .execute(rusqlite::params_from_iter(values))?;
                    Ok(())
                },
            )
        })
        .await
    }

    async fn delete(
        &self,
        kind: DocumentKind,
        id: DocumentId,
        principal: PrincipalId,
    ) -> Result<WriteOutcome> {
        let outcome = self
            .with_kind(kind, move |conn, stmts| {
                TransactionCoordinator::new(stmts).gated(
                    conn,
                    id,
                    principal,
                    |entry, exists| PermissionGate::decide(entry, exists, Capability::Delete),
                    |tx, stmts| {
                        if let Some(child) = &stmts.child {
                            tx.prepare_cached(&child.delete)?.execute([id_param(id)])?;
                        }
                        tx.prepare_cached(&stmts.delete_access)?
                            .execute([id_param(id)])?;
                        tx.prepare_cached(&stmts.delete_document)?
                            .execute([id_param(id)])?;
                        Ok(())
                    },
                )
            })
            .await?;
        if outcome.is_applied() {
            tracing::debug!(%kind, %id, %principal, "deleted document");
        }
        Ok(outcome)
    }

    async fn grant(
        &self,
        kind: DocumentKind,
        id: DocumentId,
        grantor: PrincipalId,
        grant: Grant,
    ) -> Result<WriteOutcome> {
        self.with_kind(kind, move |conn, stmts| {
            TransactionCoordinator::new(stmts).gated_on(
                conn,
                id,
                grantor,
                grant.reader,
                |entry, target, exists| {
                    PermissionGate::authorize_grant(entry, target, exists, &grant)
                },
                |tx, stmts| {
                    tx.prepare_cached(&stmts.upsert_access)?.execute(rusqlite::params![
                        grant.reader.get(),
                        id_param(id),
                        grant.can_edit,
                        grant.can_delete
                    ])?;
                    Ok(())
                },
            )
        })
        .await
    }

    async fn revoke(
        &self,
        kind: DocumentKind,
        id: DocumentId,
        revoker: PrincipalId,
        reader: PrincipalId,
    ) -> Result<WriteOutcome> {
        self.with_kind(kind, move |conn, stmts| {
            TransactionCoordinator::new(stmts).gated_on(
                conn,
                id,
                revoker,
                reader,
                |entry, target, exists| PermissionGate::authorize_revoke(entry, target, exists),
                |tx, stmts| {
                    tx.prepare_cached(&stmts.revoke)?
                        .execute(rusqlite::params![id_param(id), reader.get()])?;
                    Ok(())
                },
            )
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::StoreExt;
    use docvault_core::{Consuming, Image, Owner, Project, Task, Vehicle};
    use uuid::Uuid;

    const ALICE: PrincipalId = PrincipalId::new(1);
    const BOB: PrincipalId = PrincipalId::new(2);

    fn store() -> SqliteStore {
        SqliteStore::open_memory(Arc::new(EntityRegistry::standard())).unwrap()
    }

    #[tokio::test]
    async fn test_insert_then_find() {
        let store = store();
        let id = store
            .insert(Task::new("Fix bug").priority(1).into(), ALICE, vec![])
            .await
            .unwrap();

        let doc = store.find(DocumentKind::Task, id, ALICE).await.unwrap().unwrap();
        assert_eq!(doc.id, id);
        assert_eq!(doc.meta.author, ALICE);
        assert_eq!(doc.access, AccessEntry::owner(id, ALICE));
        assert_eq!(doc.body.as_task().unwrap().title, "Fix bug");

        assert!(store.find(DocumentKind::Task, id, BOB).await.unwrap().is_none());
        assert!(store
            .find(DocumentKind::Task, DocumentId::generate(), ALICE)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_list_is_access_filtered_and_ordered() {
        let store = store();
        let mut ids = Vec::new();
        for i in 0..3 {
            ids.push(
                store
                    .insert(Project::new(format!("p{i}")).into(), ALICE, vec![])
                    .await
                    .unwrap(),
            );
        }
        store
            .insert(Project::new("bob's").into(), BOB, vec![])
            .await
            .unwrap();

        let listed: Vec<_> = store
            .list(DocumentKind::Project, ALICE, 0, 0)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(listed, ids);
        assert_eq!(store.count(DocumentKind::Project, ALICE).await.unwrap(), 3);

        let page = store.list_page(DocumentKind::Project, ALICE, 2, 2).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.documents.len(), 1);
        assert_eq!(page.documents[0].id, ids[2]);
    }

    #[tokio::test]
    async fn test_update_keeps_author_and_children() {
        let store = store();
        let label = Uuid::new_v4();
        let id = store
            .insert(Task::new("Draft").into(), ALICE, vec![ChildRecord::label(label)])
            .await
            .unwrap();

        let outcome = store
            .update(id, Task::new("Final").status(2).into(), ALICE)
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Applied);

        let doc = store.find(DocumentKind::Task, id, ALICE).await.unwrap().unwrap();
        assert_eq!(doc.body.as_task().unwrap().title, "Final");
        assert_eq!(doc.meta.author, ALICE);
        assert_eq!(doc.meta.last_mod_user, ALICE);
        let children = store.children(DocumentKind::Task, id, ALICE).await.unwrap().unwrap();
        assert_eq!(children, vec![ChildRecord::label(label)]);
    }

    #[tokio::test]
    async fn test_update_denied_and_missing() {
        let store = store();
        let id = store.insert(Task::new("Mine").into(), ALICE, vec![]).await.unwrap();

        let outcome = store.update(id, Task::new("Theirs").into(), BOB).await.unwrap();
        assert_eq!(outcome, WriteOutcome::Denied(Capability::Edit));
        let doc = store.find(DocumentKind::Task, id, ALICE).await.unwrap().unwrap();
        assert_eq!(doc.body.as_task().unwrap().title, "Mine");

        let outcome = store
            .update(DocumentId::generate(), Task::new("Ghost").into(), ALICE)
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let store = store();
        let vehicle = Uuid::new_v4();
        let id = store
            .insert(
                Consuming::new(vehicle, 1000.0, 40.0, 60.0).into(),
                ALICE,
                vec![ChildRecord::Image(Image::new(vec![1u8, 2, 3], "receipt", 0))],
            )
            .await
            .unwrap();
        store
            .grant(DocumentKind::Consuming, id, ALICE, Grant::read_only(BOB))
            .await
            .unwrap();

        assert_eq!(
            store.delete(DocumentKind::Consuming, id, BOB).await.unwrap(),
            WriteOutcome::Denied(Capability::Delete)
        );
        assert_eq!(
            store.delete(DocumentKind::Consuming, id, ALICE).await.unwrap(),
            WriteOutcome::Applied
        );
        assert!(store.find(DocumentKind::Consuming, id, ALICE).await.unwrap().is_none());
        assert_eq!(store.count(DocumentKind::Consuming, BOB).await.unwrap(), 0);
        assert_eq!(
            store.delete(DocumentKind::Consuming, id, ALICE).await.unwrap(),
            WriteOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_grant_and_revoke() {
        let store = store();
        let id = store.insert(Project::new("Shared").into(), ALICE, vec![]).await.unwrap();

        let outcome = store
            .grant(DocumentKind::Project, id, ALICE, Grant::read_only(BOB).with_edit())
            .await
            .unwrap();
        assert!(outcome.is_applied());
        let doc = store.find(DocumentKind::Project, id, BOB).await.unwrap().unwrap();
        assert!(doc.access.can_edit);
        assert!(!doc.access.can_delete);

        // Bob cannot hand out delete.
        let outcome = store
            .grant(DocumentKind::Project, id, BOB, Grant::owner(PrincipalId::new(3)))
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Denied(Capability::Delete));

        let entries = store
            .access_entries(DocumentKind::Project, id, BOB)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entries.len(), 2);

        store.revoke(DocumentKind::Project, id, ALICE, BOB).await.unwrap();
        assert!(store.find(DocumentKind::Project, id, BOB).await.unwrap().is_none());
        assert!(store
            .access_entries(DocumentKind::Project, id, BOB)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_list_by_reference_newest_first() {
        let store = store();
        let vehicle = Uuid::new_v4();
        let mut ids = Vec::new();
        for km in [100.0, 200.0, 300.0] {
            ids.push(
                store
                    .insert(Consuming::new(vehicle, km, 10.0, 15.0).into(), ALICE, vec![])
                    .await
                    .unwrap(),
            );
        }
        store
            .insert(Consuming::new(Uuid::new_v4(), 50.0, 1.0, 1.0).into(), ALICE, vec![])
            .await
            .unwrap();

        let last_two: Vec<_> = store
            .list_by_reference(
                DocumentKind::Consuming,
                ALICE,
                "vehicle_id",
                FieldValue::uuid(vehicle),
                2,
            )
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(last_two, vec![ids[2], ids[1]]);

        let err = store
            .list_by_reference(DocumentKind::Consuming, ALICE, "total_km", FieldValue::Null, 2)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidData(_)));
    }

    #[tokio::test]
    async fn test_list_by_owner_name_follows_vehicle() {
        let store = store();
        let owner = store.insert(Owner::new("@driver").into(), ALICE, vec![]).await.unwrap();
        let other = store.insert(Owner::new("@walker").into(), ALICE, vec![]).await.unwrap();
        let car = store
            .insert(Vehicle::new(*owner.as_uuid()).into(), ALICE, vec![])
            .await
            .unwrap();
        let bike = store
            .insert(Vehicle::new(*other.as_uuid()).into(), ALICE, vec![])
            .await
            .unwrap();

        let mine = store
            .insert(Consuming::new(*car.as_uuid(), 100.0, 5.0, 8.0).into(), ALICE, vec![])
            .await
            .unwrap();
        store
            .insert(Consuming::new(*bike.as_uuid(), 10.0, 1.0, 1.0).into(), ALICE, vec![])
            .await
            .unwrap();
        // Visible only to Bob.
        let hidden = store
            .insert(Consuming::new(*car.as_uuid(), 200.0, 5.0, 8.0).into(), BOB, vec![])
            .await
            .unwrap();

        let listed: Vec<_> = store
            .list_by_owner_name(ALICE, "@driver", 0, 0)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(listed, vec![mine]);

        // Bob sees only the record Bob wrote, not the vehicle or owner rows.
        let listed: Vec<_> = store
            .list_by_owner_name(BOB, "@driver", 0, 0)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(listed, vec![hidden]);
        assert!(store
            .list_by_owner_name(ALICE, "@nobody", 0, 0)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_upsert() {
        let store = store();
        let outcome = store
            .upsert(None, Project::new("New").into(), ALICE, vec![])
            .await
            .unwrap();
        let crate::traits::UpsertOutcome::Inserted(id) = outcome else {
            panic!("expected insert, got {outcome:?}");
        };
        let outcome = store
            .upsert(Some(id), Project::new("Renamed").into(), ALICE, vec![])
            .await
            .unwrap();
        assert_eq!(outcome, crate::traits::UpsertOutcome::Updated(id));
    }

    #[tokio::test]
    async fn test_editor_cannot_demote_owner() {
        let store = store();
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
    async fn test_unknown_kind_fails_before_io() {
        let registry = EntityRegistry::builder()
            .register(DocumentKind::Project, docvault_core::standard_naming(DocumentKind::Project))
            .build()
            .unwrap();
        let store = SqliteStore::open_memory(Arc::new(registry)).unwrap();
        let err = store.count(DocumentKind::Task, ALICE).await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownKind(k) if k == "task"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_file_store_concurrent_inserts() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::file(dir.path().join("vault.db")).with_pool_size(4);
        let store = Arc::new(SqliteStore::open(&config, Arc::new(EntityRegistry::standard())).unwrap());

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .insert(
                        Task::new(format!("task {i}")).into(),
                        ALICE,
                        vec![ChildRecord::label(Uuid::new_v4())],
                    )
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.count(DocumentKind::Task, ALICE).await.unwrap(), 16);
        assert_eq!(store.pool().idle(), 4);

        // Reopening sees the same data.
        drop(store);
        let reopened = SqliteStore::open(&config, Arc::new(EntityRegistry::standard())).unwrap();
        assert_eq!(reopened.count(DocumentKind::Task, ALICE).await.unwrap(), 16);
    }
}
