//! # docvault
//!
//! An access-controlled, transactional document repository.
//!
//! ## Overview
//!
//! docvault persists heterogeneous documents (tasks, projects, vehicles,
//! vehicle owners, consumption records) while enforcing per-document,
//! per-principal access control:
//!
//! - **Table families**: Each kind maps to a main table, an access table,
//!   and an optional child table through an immutable registry
//! - **Access ledger**: A document is visible to a principal only through an
//!   access entry; edit and delete rights are flags on that entry
//! - **Atomic inserts**: Main row, owner entry, and children commit together
//! - **Pagination**: Page counts derived from the same access predicate as
//!   listings
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use docvault::{DocumentKind, DocumentRepository, EntityRegistry, PrincipalId, Task, VaultConfig};
//! use docvault::store::{SqliteStore, StoreConfig};
//!
//! async fn example() -> docvault::Result<()> {
//!     let registry = Arc::new(EntityRegistry::standard());
//!     let store = SqliteStore::open(&StoreConfig::file("vault.db"), registry)?;
//!     let repo = DocumentRepository::new(store, VaultConfig::default());
//!
//!     let alice = PrincipalId::new(1);
//!     let id = repo
//!         .insert(DocumentKind::Task, Task::new("Write docs").into(), alice, vec![])
//!         .await?;
//!
//!     let page = repo.page(DocumentKind::Task, alice, 1, None).await?;
//!     assert_eq!(page.entries[0].id, id);
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `docvault::core` - Kinds, naming, bodies, pagination
//! - `docvault::perms` - Capabilities, grants, and the permission gate
//! - `docvault::store` - Storage abstraction, SQLite, and in-memory stores

pub mod error;
pub mod repository;

// Re-export component crates
pub use docvault_core as core;
pub use docvault_perms as perms;
pub use docvault_store as store;

// Re-export main types for convenience
pub use error::{Result, VaultError};
pub use repository::{DocumentRepository, VaultConfig};

// Re-export commonly used types
pub use docvault_core::{
    AccessEntry, ChildRecord, Consuming, Document, DocumentBody, DocumentId, DocumentKind,
    EntityRegistry, FieldValue, Image, Owner, PageView, PrincipalId, Project, Task, Vehicle,
};
pub use docvault_perms::{Capability, Grant};
