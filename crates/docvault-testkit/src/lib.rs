//! # docvault testkit
//!
//! Testing utilities for docvault.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: Stores, principals, and sample bodies for test scenarios
//! - **Generators**: Proptest strategies for property-based testing
//!
//! ## Property Testing
//!
//! Use the generators with proptest:
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use docvault_testkit::generators::InsertParams;
//!
//! proptest! {
//!     #[test]
//!     fn bodies_validate(params: InsertParams) {
//!         prop_assert!(docvault_core::validate_body(params.body.kind(), &params.body).is_ok());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! Quickly set up test scenarios:
//!
//! ```rust
//! use docvault_testkit::fixtures::{sample_body, TestFixture};
//! use docvault_core::DocumentKind;
//!
//! let fixture = TestFixture::new();
//! let body = sample_body(DocumentKind::Consuming);
//! assert_eq!(body.kind(), DocumentKind::Consuming);
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{multi_party_fixtures, sample_body, FileFixture, TestFixture, ALICE, BOB, CAROL};
pub use generators::{document_body, InsertParams};
