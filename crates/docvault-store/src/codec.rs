//! Conversions between rusqlite rows and docvault types.

use rusqlite::types::{Value, ValueRef};
use rusqlite::{Connection, OptionalExtension, Params, Row};

use docvault_core::{
    AccessEntry, ChildRecord, Document, DocumentBody, DocumentId, DocumentMeta, FieldValue,
    PrincipalId,
};

use crate::error::{Result, StoreError};
use crate::statements::{access_offset, KindStatements};

/// Owned SQL value for binding.
pub fn to_sql(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Integer(i) => Value::Integer(*i),
        FieldValue::Real(r) => Value::Real(*r),
        FieldValue::Text(s) => Value::Text(s.clone()),
        FieldValue::Blob(b) => Value::Blob(b.to_vec()),
    }
}

/// Column value as read from a row.
pub fn field_value(value: ValueRef<'_>) -> Result<FieldValue> {
    Ok(match value {
        ValueRef::Null => FieldValue::Null,
        ValueRef::Integer(i) => FieldValue::Integer(i),
        ValueRef::Real(r) => FieldValue::Real(r),
        ValueRef::Text(bytes) => FieldValue::Text(
            std::str::from_utf8(bytes)
                .map_err(|e| StoreError::InvalidData(format!("non-UTF-8 text column: {e}")))?
                .to_string(),
        ),
        ValueRef::Blob(bytes) => FieldValue::Blob(bytes.to_vec().into()),
    })
}

/// Document id column.
pub fn document_id(text: &str) -> Result<DocumentId> {
    text.parse()
        .map_err(|e| StoreError::InvalidData(format!("bad document id `{text}`: {e}")))
}

/// Bound form of a document id.
pub fn id_param(id: DocumentId) -> String {
    id.to_string()
}

/// SQLite treats a negative limit as unbounded.
pub fn limit_param(limit: u64) -> i64 {
    if limit == 0 {
        -1
    } else {
        i64::try_from(limit).unwrap_or(i64::MAX)
    }
}

pub fn offset_param(offset: u64) -> i64 {
    i64::try_from(offset).unwrap_or(i64::MAX)
}

/// Decode a document row: meta columns, body columns, then the reader's
/// access columns.
pub fn read_document(stmts: &KindStatements, row: &Row<'_>) -> Result<Document> {
    let naming = &stmts.naming;
    let id: String = row.get(0)?;
    let id = document_id(&id)?;

    let meta = DocumentMeta {
        author: PrincipalId(row.get(1)?),
        reg_date: row.get(2)?,
        last_mod_user: PrincipalId(row.get(3)?),
        last_mod_date: row.get(4)?,
    };

    let start = docvault_core::META_COLUMNS.len();
    let values = (start..access_offset(naming))
        .map(|i| field_value(row.get_ref(i)?))
        .collect::<Result<Vec<_>>>()?;
    let body = DocumentBody::decode(stmts.kind, naming.columns, &values)?;

    let at = access_offset(naming);
    let access = AccessEntry {
        document: id,
        reader: PrincipalId(row.get(at)?),
        can_edit: row.get(at + 1)?,
        can_delete: row.get(at + 2)?,
    };

    Ok(Document {
        id,
        kind: stmts.kind,
        meta,
        body,
        access,
    })
}

/// Run a document query and decode every row.
pub fn query_documents<P: Params>(
    conn: &Connection,
    stmts: &KindStatements,
    sql: &str,
    params: P,
) -> Result<Vec<Document>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let mut rows = stmt.query(params)?;
    let mut documents = Vec::new();
    while let Some(row) = rows.next()? {
        documents.push(read_document(stmts, row)?);
    }
    Ok(documents)
}

fn read_access(document: DocumentId, row: &Row<'_>) -> rusqlite::Result<AccessEntry> {
    Ok(AccessEntry {
        document,
        reader: PrincipalId(row.get(0)?),
        can_edit: row.get(1)?,
        can_delete: row.get(2)?,
    })
}

/// The entry of `reader` on `id`, if any.
pub fn access_entry(
    conn: &Connection,
    stmts: &KindStatements,
    id: DocumentId,
    reader: PrincipalId,
) -> Result<Option<AccessEntry>> {
    let mut stmt = conn.prepare_cached(&stmts.access_entry)?;
    let entry = stmt
        .query_row(rusqlite::params![id_param(id), reader.get()], |row| {
            read_access(id, row)
        })
        .optional()?;
    Ok(entry)
}

/// Every entry of `id`, ordered by reader.
pub fn access_list(
    conn: &Connection,
    stmts: &KindStatements,
    id: DocumentId,
) -> Result<Vec<AccessEntry>> {
    let mut stmt = conn.prepare_cached(&stmts.access_list)?;
    let entries = stmt
        .query_map([id_param(id)], |row| read_access(id, row))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(entries)
}

pub fn document_exists(conn: &Connection, stmts: &KindStatements, id: DocumentId) -> Result<bool> {
    let mut stmt = conn.prepare_cached(&stmts.exists)?;
    Ok(stmt.query_row([id_param(id)], |row| row.get(0))?)
}

/// Children of `id` in insertion order. Kinds without a child table have none.
pub fn children(
    conn: &Connection,
    stmts: &KindStatements,
    id: DocumentId,
) -> Result<Vec<ChildRecord>> {
    let (Some(child), Some(sql)) = (&stmts.naming.child, &stmts.child) else {
        return Ok(Vec::new());
    };
    let mut stmt = conn.prepare_cached(&sql.select)?;
    let mut rows = stmt.query([id_param(id)])?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let values = (0..child.columns.len())
            .map(|i| field_value(row.get_ref(i)?))
            .collect::<Result<Vec<_>>>()?;
        records.push(ChildRecord::decode(child.shape, child.columns, &values)?);
    }
    Ok(records)
}
