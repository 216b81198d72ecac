//! # docvault core
//!
//! Pure primitives for docvault: document kinds, table naming, payloads,
//! validation, and pagination.
//!
//! This crate contains no I/O. Stores and the repository build on it.
//!
//! ## Key Types
//!
//! - [`DocumentKind`] - The logical entity types
//! - [`EntityRegistry`] - Immutable kind → table family mapping
//! - [`DocumentBody`] - Kind-tagged payload encoded as [`FieldValue`]s
//! - [`Document`] - Stored read model, carrying the reader's [`AccessEntry`]
//! - [`ChildRecord`] - Rows owned by a parent document
//! - [`PageRequest`] / [`PageView`] - Pagination over access-filtered counts

pub mod access;
pub mod body;
pub mod child;
pub mod document;
pub mod error;
pub mod fields;
pub mod kind;
pub mod naming;
pub mod pagination;
pub mod types;
pub mod validation;

pub use access::AccessEntry;
pub use body::{Consuming, Owner, Project, Task, Vehicle};
pub use child::{ChildRecord, Image, LabelLink};
pub use document::{Document, DocumentBody, DocumentMeta};
pub use error::{CoreError, ValidationError};
pub use fields::{FieldReader, FieldValue};
pub use kind::DocumentKind;
pub use naming::{
    standard_naming, ChildShape, ChildTable, ColumnDef, ColumnType, EntityNaming, EntityRegistry,
    EntityRegistryBuilder, META_COLUMNS,
};
pub use pagination::{count_max_page, start_entry, PageRequest, PageView};
pub use types::{now_millis, DocumentId, PrincipalId};
pub use validation::{validate_body, validate_children};
