//! # docvault store
//!
//! Storage abstraction for docvault. Provides a trait-based interface for
//! access-controlled document persistence with SQLite and in-memory
//! implementations.
//!
//! ## Overview
//!
//! The [`Store`] trait hides where documents live. [`SqliteStore`] is the
//! primary implementation and runs every call on a pooled connection off the
//! async runtime; [`MemoryStore`] has the same semantics for tests.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`ConnectionPool`] - Fixed-size pool of SQLite connections
//! - [`TransactionCoordinator`] / [`InsertPlan`] - Ordered multi-table writes
//! - [`WriteOutcome`] - Result of a gated mutation
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use docvault_core::{DocumentKind, EntityRegistry, PrincipalId, Task};
//! use docvault_store::{SqliteStore, Store, StoreConfig};
//!
//! async fn example() -> docvault_store::Result<()> {
//!     let registry = Arc::new(EntityRegistry::standard());
//!     let store = SqliteStore::open(&StoreConfig::file("vault.db"), registry)?;
//!
//!     let author = PrincipalId::new(1);
//!     let id = store.insert(Task::new("Write docs").into(), author, vec![]).await?;
//!     let doc = store.find(DocumentKind::Task, id, author).await?;
//!     assert!(doc.is_some());
//!     Ok(())
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Atomic inserts**: Main row, owner entry, and children share one transaction
//! - **Gated writes**: The permission check runs inside the mutating transaction
//! - **Compiled statements**: SQL text is built once per kind from the registry

mod codec;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod memory;
pub mod migration;
pub mod pool;
pub mod sqlite;
pub mod statements;
pub mod traits;

pub use config::StoreConfig;
pub use coordinator::{InsertPlan, TransactionCoordinator, WriteStep};
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use pool::ConnectionPool;
pub use sqlite::SqliteStore;
pub use statements::{KindStatements, StatementSet};
pub use traits::{ListPage, Store, StoreExt, UpsertOutcome, WriteOutcome};
