//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;
use uuid::Uuid;

use docvault_core::{
    Consuming, DocumentBody, DocumentKind, EntityRegistry, Image, Owner, PrincipalId, Project,
    Task, Vehicle,
};
use docvault_store::{MemoryStore, SqliteStore, StoreConfig};

pub const ALICE: PrincipalId = PrincipalId::new(1);
pub const BOB: PrincipalId = PrincipalId::new(2);
pub const CAROL: PrincipalId = PrincipalId::new(3);

/// A test fixture with an acting principal and a store.
pub struct TestFixture<S = MemoryStore> {
    pub principal: PrincipalId,
    pub store: S,
}

impl TestFixture<MemoryStore> {
    /// Alice over a fresh in-memory store.
    pub fn new() -> Self {
        Self {
            principal: ALICE,
            store: MemoryStore::default(),
        }
    }
}

impl Default for TestFixture<MemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl TestFixture<SqliteStore> {
    /// Alice over a fresh in-memory SQLite database.
    pub fn sqlite() -> Self {
        let store = SqliteStore::open_memory(Arc::new(EntityRegistry::standard()))
            .unwrap_or_else(|e| panic!("opening in-memory sqlite store: {e}"));
        Self {
            principal: ALICE,
            store,
        }
    }
}

impl<S> TestFixture<S> {
    /// Act as another principal.
    pub fn as_principal(mut self, principal: PrincipalId) -> Self {
        self.principal = principal;
        self
    }
}

/// A database file in a temporary directory, removed on drop.
pub struct FileFixture {
    pub dir: TempDir,
    pub config: StoreConfig,
}

impl FileFixture {
    pub fn new(pool_size: usize) -> Self {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("creating temp dir: {e}"));
        let config = StoreConfig::file(dir.path().join("docvault.db")).with_pool_size(pool_size);
        Self { dir, config }
    }

    /// Open (or reopen) the store.
    pub fn open(&self) -> SqliteStore {
        SqliteStore::open(&self.config, Arc::new(EntityRegistry::standard()))
            .unwrap_or_else(|e| panic!("opening {:?}: {e}", self.config.path))
    }
}

/// `n` distinct non-anonymous principals.
pub fn multi_party_fixtures(n: usize) -> Vec<PrincipalId> {
    (1..=n as i64).map(PrincipalId::new).collect()
}

/// A valid body for `kind`.
pub fn sample_body(kind: DocumentKind) -> DocumentBody {
    match kind {
        DocumentKind::Task => Task::new("Write release notes").priority(2).into(),
        DocumentKind::Project => Project::new("Apollo").into(),
        DocumentKind::Vehicle => {
            let mut vehicle = Vehicle::new(Uuid::new_v4());
            vehicle.brand = Some("Skoda".into());
            vehicle.fuel_type = Some("diesel".into());
            vehicle.into()
        }
        DocumentKind::Owner => Owner::new("@driver").into(),
        DocumentKind::Consuming => sample_consuming(Uuid::new_v4(), 1250.0),
    }
}

/// A consumption record for `vehicle` at `total_km`.
pub fn sample_consuming(vehicle: Uuid, total_km: f64) -> DocumentBody {
    let mut consuming = Consuming::new(vehicle, total_km, 42.5, 71.3);
    consuming
        .add_info
        .insert("station".into(), json!("north"));
    consuming.into()
}

/// A small receipt image.
pub fn sample_image(num_of_seq: i32) -> Image {
    let mut image = Image::new(vec![0xffu8, 0xd8, 0xff, 0xe0], "receipt", num_of_seq);
    image.confidence = 0.87;
    image
}
