//! SQL text compiled once per registered kind.
//!
//! Every identifier comes from the [`EntityRegistry`], which validated it when
//! it was built. Values are always bound as parameters.

use std::collections::BTreeMap;
use std::fmt::Write;

use docvault_core::{DocumentKind, EntityNaming, EntityRegistry, META_COLUMNS};

use crate::error::{Result, StoreError};

/// Child table statements.
#[derive(Debug, Clone)]
pub struct ChildStatements {
    pub insert: String,
    pub select: String,
    pub delete: String,
}

/// The statements of one document kind.
#[derive(Debug, Clone)]
pub struct KindStatements {
    pub kind: DocumentKind,
    pub naming: EntityNaming,
    /// Main row insert; yields the stored id.
    pub insert: String,
    pub insert_access: String,
    /// Insert or replace the flags of one `(reader, entity_id)` entry.
    pub upsert_access: String,
    /// Access-filtered listing: `?1` reader, `?2` limit, `?3` offset.
    pub list: String,
    pub count: String,
    pub find: String,
    pub access_entry: String,
    pub exists: String,
    pub update: String,
    pub delete_access: String,
    pub delete_document: String,
    pub access_list: String,
    pub revoke: String,
    pub child: Option<ChildStatements>,
    lookups: BTreeMap<&'static str, String>,
}

/// Position of the first access column in a document row.
pub fn access_offset(naming: &EntityNaming) -> usize {
    META_COLUMNS.len() + naming.columns.len()
}

fn placeholders(from: usize, count: usize) -> String {
    (from..from + count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn document_select(naming: &EntityNaming) -> String {
    let mut sql = String::from("SELECT ");
    for column in META_COLUMNS.iter().copied().chain(naming.column_names()) {
        let _ = write!(sql, "d.{column}, ");
    }
    let _ = write!(
        sql,
        "a.reader, a.can_edit, a.can_delete FROM {main} d JOIN {access} a ON a.entity_id = d.id",
        main = naming.main_table,
        access = naming.access_table,
    );
    sql
}

impl KindStatements {
    /// Build the statements for `kind`.
    pub fn compile(kind: DocumentKind, naming: &EntityNaming) -> Self {
        let main = naming.main_table;
        let access = naming.access_table;
        let body_columns: Vec<&str> = naming.column_names().collect();
        let select = document_select(naming);

        let insert_columns = META_COLUMNS
            .iter()
            .copied()
            .chain(body_columns.iter().copied())
            .collect::<Vec<_>>();
        let insert = format!(
            "INSERT INTO {main} ({}) VALUES ({}) RETURNING id",
            insert_columns.join(", "),
            placeholders(1, insert_columns.len()),
        );

        let mut update = format!("UPDATE {main} SET ");
        for (i, column) in body_columns.iter().enumerate() {
            let _ = write!(update, "{column} = ?{}, ", i + 1);
        }
        let n = body_columns.len();
        let _ = write!(
            update,
            "last_mod_user = ?{}, last_mod_date = ?{} WHERE id = ?{}",
            n + 1,
            n + 2,
            n + 3
        );

        let child = naming.child.as_ref().map(|child| {
            let columns: Vec<&str> = child.columns.iter().map(|c| c.name).collect();
            ChildStatements {
                insert: format!(
                    "INSERT INTO {table} ({parent}, {columns}) VALUES ({values})",
                    table = child.name,
                    parent = child.parent_column,
                    columns = columns.join(", "),
                    values = placeholders(1, columns.len() + 1),
                ),
                select: format!(
                    "SELECT {columns} FROM {table} WHERE {parent} = ?1 ORDER BY rowid",
                    columns = columns.join(", "),
                    table = child.name,
                    parent = child.parent_column,
                ),
                delete: format!(
                    "DELETE FROM {table} WHERE {parent} = ?1",
                    table = child.name,
                    parent = child.parent_column,
                ),
            }
        });

        let lookups = naming
            .lookups
            .iter()
            .map(|column| {
                let sql = format!(
                    "{select} WHERE a.reader = ?1 AND d.{column} = ?2 \
                     ORDER BY d.reg_date DESC, d.rowid DESC LIMIT ?3"
                );
                (*column, sql)
            })
            .collect();

        Self {
            kind,
            naming: naming.clone(),
            insert,
            insert_access: format!(
                "INSERT INTO {access} (reader, entity_id, can_edit, can_delete) VALUES (?1, ?2, ?3, ?4)"
            ),
            upsert_access: format!(
                "INSERT INTO {access} (reader, entity_id, can_edit, can_delete) VALUES (?1, ?2, ?3, ?4) \
                 ON CONFLICT(reader, entity_id) DO UPDATE SET \
                 can_edit = excluded.can_edit, can_delete = excluded.can_delete"
            ),
            list: format!(
                "{select} WHERE a.reader = ?1 ORDER BY d.reg_date, d.rowid LIMIT ?2 OFFSET ?3"
            ),
            count: format!(
                "SELECT COUNT(*) FROM {main} d JOIN {access} a ON a.entity_id = d.id WHERE a.reader = ?1"
            ),
            find: format!("{select} WHERE a.reader = ?1 AND d.id = ?2"),
            access_entry: format!(
                "SELECT reader, can_edit, can_delete FROM {access} WHERE entity_id = ?1 AND reader = ?2"
            ),
            exists: format!("SELECT EXISTS(SELECT 1 FROM {main} WHERE id = ?1)"),
            update,
            delete_access: format!("DELETE FROM {access} WHERE entity_id = ?1"),
            delete_document: format!("DELETE FROM {main} WHERE id = ?1"),
            access_list: format!(
                "SELECT reader, can_edit, can_delete FROM {access} WHERE entity_id = ?1 ORDER BY reader"
            ),
            revoke: format!("DELETE FROM {access} WHERE entity_id = ?1 AND reader = ?2"),
            child,
            lookups,
        }
    }

    /// Reference listing for a registered lookup column:
    /// `?1` reader, `?2` value, `?3` limit.
    pub fn lookup(&self, column: &str) -> Option<&str> {
        self.lookups.get(column).map(String::as_str)
    }
}

/// Kinds joined by the owner listing, in join order.
pub const OWNER_CHAIN: [DocumentKind; 3] =
    [DocumentKind::Consuming, DocumentKind::Vehicle, DocumentKind::Owner];

/// Consumption records of vehicles whose owner has a telegram name,
/// filtered by the consumption ledger: `?1` reader, `?2` telegram name,
/// `?3` limit, `?4` offset.
fn owner_chain(registry: &EntityRegistry) -> Option<String> {
    let consuming = registry.resolve(DocumentKind::Consuming).ok()?;
    let vehicle = registry.resolve(DocumentKind::Vehicle).ok()?;
    let owner = registry.resolve(DocumentKind::Owner).ok()?;
    let has = |naming: &EntityNaming, column: &str| naming.column_names().any(|c| c == column);
    if !has(consuming, "vehicle_id") || !has(vehicle, "owner_id") || !has(owner, "telegram_name") {
        return None;
    }
    Some(format!(
        "{select} JOIN {vehicles} v ON v.id = d.vehicle_id JOIN {owners} o ON o.id = v.owner_id \
         WHERE a.reader = ?1 AND o.telegram_name = ?2 \
         ORDER BY d.reg_date, d.rowid LIMIT ?3 OFFSET ?4",
        select = document_select(consuming),
        vehicles = vehicle.main_table,
        owners = owner.main_table,
    ))
}

/// Statements for every kind of a registry.
#[derive(Debug, Clone)]
pub struct StatementSet {
    kinds: BTreeMap<DocumentKind, KindStatements>,
    owned_consumings: Option<String>,
}

impl StatementSet {
    pub fn compile(registry: &EntityRegistry) -> Self {
        let kinds = registry
            .iter()
            .map(|(kind, naming)| (kind, KindStatements::compile(kind, naming)))
            .collect();
        Self {
            kinds,
            owned_consumings: owner_chain(registry),
        }
    }

    /// The owner listing; fails if a kind of [`OWNER_CHAIN`] is missing.
    pub fn owned_consumings(&self) -> Result<&str> {
        for kind in OWNER_CHAIN {
            self.get(kind)?;
        }
        self.owned_consumings.as_deref().ok_or_else(|| {
            StoreError::InvalidData("owner chain columns are not registered".into())
        })
    }

    pub fn get(&self, kind: DocumentKind) -> Result<&KindStatements> {
        self.kinds
            .get(&kind)
            .ok_or_else(|| StoreError::UnknownKind(kind.to_string()))
    }
}
