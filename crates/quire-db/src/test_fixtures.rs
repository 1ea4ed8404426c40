//! Test fixtures for database integration tests.
//!
//! Every [`TestDatabase`] is a freshly migrated SQLite file inside its own
//! temporary directory, so tests are isolated and run in parallel without
//! any external service. The directory is removed when the fixture drops.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use quire_db::test_fixtures::TestDatabase;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let test_db = TestDatabase::new().await;
//!     let owner = TestDatabase::owner();
//!     let note = test_db.db.upsert_note(owner, NoteInput::new("Buy milk")).await.unwrap();
//!     // Run your tests...
//! }
//! ```

use tempfile::TempDir;
use uuid::Uuid;

use crate::{AnalysisFlags, Database, StoreConfig};

/// Migrated database backed by a temporary file.
pub struct TestDatabase {
    pub db: Database,
    _dir: Option<TempDir>,
}

impl TestDatabase {
    /// File-backed database with separate writer and reader pools.
    pub async fn new() -> Self {
        Self::with_flags(AnalysisFlags::default()).await
    }

    /// File-backed database with explicit analysis flags.
    pub async fn with_flags(flags: AnalysisFlags) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir for test database");
        let path = dir.path().join("quire-test.db");
        let config = StoreConfig::new()
            .database_url(format!("sqlite://{}", path.display()))
            .max_readers(4);
        let db = Database::with_flags(config, flags)
            .await
            .expect("Failed to open test database");
        db.migrate().await.expect("Failed to migrate test database");
        Self { db, _dir: Some(dir) }
    }

    /// Single-connection in-memory database.
    pub async fn in_memory() -> Self {
        let config = StoreConfig::new().database_url("sqlite::memory:");
        let db = Database::from_config(config)
            .await
            .expect("Failed to open in-memory database");
        db.migrate().await.expect("Failed to migrate in-memory database");
        Self { db, _dir: None }
    }

    /// A fresh owner id.
    pub fn owner() -> Uuid {
        Uuid::now_v7()
    }
}
