//! Database schema migrations for SQLite.
//!
//! The schema is versioned through a `schema_migrations` table. Kind tables
//! are generated from the [`EntityRegistry`]: one main table, one access
//! table keyed by `(reader, entity_id)`, and an optional child table per
//! kind. Table creation is idempotent, so kinds registered after the first
//! run get their tables on the next open.

use std::fmt::Write;

use rusqlite::Connection;

use docvault_core::{now_millis, EntityNaming, EntityRegistry};

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection, registry: &EntityRegistry) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    let tx = conn.transaction()?;
    if current < CURRENT_VERSION {
        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version, registry)?;
            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }
        tracing::debug!(from = current, to = CURRENT_VERSION, "migrated schema");
    } else {
        create_kind_tables(&tx, registry)?;
    }
    tx.commit()?;

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32, registry: &EntityRegistry) -> Result<()> {
    match version {
        1 => create_kind_tables(conn, registry),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

fn create_kind_tables(conn: &Connection, registry: &EntityRegistry) -> Result<()> {
    for (kind, naming) in registry.iter() {
        conn.execute_batch(&kind_ddl(naming)).map_err(|e| {
            StoreError::Migration(format!("creating tables for {kind}: {e}"))
        })?;
    }
    Ok(())
}

/// DDL for one kind's table family.
pub fn kind_ddl(naming: &EntityNaming) -> String {
    let main = naming.main_table;
    let access = naming.access_table;
    let mut sql = String::new();

    let _ = write!(
        sql,
        "CREATE TABLE IF NOT EXISTS {main} (
            id TEXT PRIMARY KEY NOT NULL,
            author INTEGER NOT NULL,
            reg_date INTEGER NOT NULL,
            last_mod_user INTEGER NOT NULL,
            last_mod_date INTEGER NOT NULL"
    );
    for column in naming.columns {
        let _ = write!(sql, ",\n            {} {}", column.name, column.column_type.sql_name());
        if column.required {
            sql.push_str(" NOT NULL");
        }
    }
    sql.push_str("\n        );\n");
    let _ = writeln!(
        sql,
        "CREATE INDEX IF NOT EXISTS idx_{main}_reg_date ON {main}(reg_date);"
    );
    for column in naming.lookups {
        let _ = writeln!(
            sql,
            "CREATE INDEX IF NOT EXISTS idx_{main}_{column} ON {main}({column});"
        );
    }

    let _ = writeln!(
        sql,
        "CREATE TABLE IF NOT EXISTS {access} (
            reader INTEGER NOT NULL,
            entity_id TEXT NOT NULL REFERENCES {main}(id),
            can_edit INTEGER NOT NULL DEFAULT 0,
            can_delete INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (reader, entity_id)
        );
        CREATE INDEX IF NOT EXISTS idx_{access}_entity ON {access}(entity_id);"
    );

    if let Some(child) = &naming.child {
        let table = child.name;
        let parent = child.parent_column;
        let _ = write!(
            sql,
            "CREATE TABLE IF NOT EXISTS {table} (
            {parent} TEXT NOT NULL REFERENCES {main}(id)"
        );
        for column in child.columns {
            let _ = write!(sql, ",\n            {} {}", column.name, column.column_type.sql_name());
            if column.required {
                sql.push_str(" NOT NULL");
            }
        }
        if !child.unique.is_empty() {
            let _ = write!(
                sql,
                ",\n            PRIMARY KEY ({parent}, {})",
                child.unique.join(", ")
            );
        }
        sql.push_str("\n        );\n");
        let _ = writeln!(
            sql,
            "CREATE INDEX IF NOT EXISTS idx_{table}_parent ON {table}({parent});"
        );
    }

    sql
}
