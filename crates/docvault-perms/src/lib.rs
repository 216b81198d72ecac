//! # docvault permissions
//!
//! Row-level access control for stored documents.
//!
//! ## Overview
//!
//! Every document carries one or more [`AccessEntry`](docvault_core::AccessEntry)
//! rows in its kind's access table. The existence of an entry grants read
//! visibility; the `can_edit` and `can_delete` flags gate mutation.
//!
//! ## Key Concepts
//!
//! - **Capability**: Read, Edit, or Delete
//! - **Grant**: The flags handed to a principal for one document
//! - **PermissionGate**: Pure decision over an optional entry
//! - **AccessLedger**: In-memory ledger indexed by document and by reader
//!
//! ## Usage
//!
//! ```rust
//! use docvault_core::{AccessEntry, DocumentId, PrincipalId};
//! use docvault_perms::{Capability, GateDecision, PermissionGate};
//!
//! let entry = AccessEntry::read_only(DocumentId::generate(), PrincipalId::new(7));
//! assert!(PermissionGate::allows(Some(&entry), Capability::Read));
//! assert_eq!(
//!     PermissionGate::decide(Some(&entry), true, Capability::Edit),
//!     GateDecision::Denied(Capability::Edit)
//! );
//! ```

pub mod error;
pub mod gate;
pub mod grant;
pub mod ledger;

pub use error::{PermsError, Result};
pub use gate::{GateDecision, PermissionGate};
pub use grant::{Capability, Grant};
pub use ledger::AccessLedger;
