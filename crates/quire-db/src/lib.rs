//! # quire-db
//!
//! SQLite persistence layer for quire.
//!
//! This crate provides:
//! - Writer/reader connection pools over one SQLite database
//! - Note storage with synchronous search-index maintenance
//! - The per-owner tag catalog and note associations with exact usage counts
//! - Search execution, pagination and cancellation
//! - Integrity verification and repair
//!
//! ## Example
//!
//! ```rust,ignore
//! use quire_db::{Database, NoteInput, SearchRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("sqlite://quire.db").await?;
//!     db.migrate().await?;
//!
//!     let owner = uuid::Uuid::now_v7();
//!     db.upsert_note(owner, NoteInput::new("Remember to buy milk")).await?;
//!
//!     let page = db
//!         .search_notes(owner, &SearchRequest::new().with_query("milk"))
//!         .await?;
//!     println!("{} hits", page.len());
//!     Ok(())
//! }
//! ```

pub mod maintenance;
pub mod notes;
pub mod pool;
pub mod search;
pub mod tags;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use them
pub mod test_fixtures;

// Re-export core types
pub use quire_core::*;
pub use quire_search::AnalysisFlags;

pub use maintenance::Maintenance;
pub use notes::SqliteNoteRepository;
pub use pool::{create_pools, log_pool_metrics, StoreConfig, StorePools};
pub use search::SqliteNoteSearch;
pub use tags::SqliteTagRepository;

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use quire_search::AnalyzerRegistry;

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// Writer and reader pools.
    pub pools: StorePools,
    /// Analyzer registry shared by indexing and search.
    pub registry: Arc<AnalyzerRegistry>,
    /// Note repository with index maintenance.
    pub notes: SqliteNoteRepository,
    /// Tag catalog and associations.
    pub tags: SqliteTagRepository,
    /// Search executor.
    pub search: SqliteNoteSearch,
    /// Integrity checks.
    pub maintenance: Maintenance,
}

impl Database {
    /// Create a new Database from existing pools.
    pub fn new(pools: StorePools, flags: AnalysisFlags) -> Self {
        let registry = Arc::new(AnalyzerRegistry::new(flags));
        Self {
            notes: SqliteNoteRepository::new(pools.clone(), registry.clone()),
            tags: SqliteTagRepository::new(pools.clone()),
            search: SqliteNoteSearch::new(pools.reader.clone(), registry.clone()),
            maintenance: Maintenance::new(pools.clone(), registry.clone()),
            registry,
            pools,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::from_config(StoreConfig::new().database_url(url)).await
    }

    /// Connect with a custom store configuration and default analysis.
    pub async fn from_config(config: StoreConfig) -> Result<Self> {
        Self::with_flags(config, AnalysisFlags::default()).await
    }

    /// Connect with explicit analysis flags.
    pub async fn with_flags(config: StoreConfig, flags: AnalysisFlags) -> Result<Self> {
        let pools = create_pools(&config).await?;
        Ok(Self::new(pools, flags))
    }

    /// Connect using `QUIRE_*` environment variables for both the store and
    /// the analysis flags.
    pub async fn from_env() -> Result<Self> {
        Self::with_flags(StoreConfig::from_env()?, AnalysisFlags::from_env()).await
    }

    /// Run pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pools.writer)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        info!(
            subsystem = "db",
            component = "migrations",
            op = "migrate",
            "Migrations applied"
        );
        Ok(())
    }

    /// Get the writer pool.
    pub fn pool(&self) -> &sqlx::SqlitePool {
        &self.pools.writer
    }

    /// Get the reader pool.
    pub fn reader_pool(&self) -> &sqlx::SqlitePool {
        &self.pools.reader
    }

    // ---------------------------------------------------------------------
    // Notes
    // ---------------------------------------------------------------------

    /// Create or update a note and reindex it.
    pub async fn upsert_note(&self, owner_id: Uuid, input: NoteInput) -> Result<Note> {
        self.notes.upsert(owner_id, input).await
    }

    pub async fn get_note(&self, owner_id: Uuid, note_id: Uuid) -> Result<Note> {
        self.notes.fetch(owner_id, note_id).await
    }

    /// Soft-delete a note. Idempotent.
    pub async fn delete_note(&self, owner_id: Uuid, note_id: Uuid) -> Result<()> {
        self.notes.soft_delete(owner_id, note_id).await
    }

    // ---------------------------------------------------------------------
    // Search
    // ---------------------------------------------------------------------

    pub async fn search_notes(&self, owner_id: Uuid, req: &SearchRequest) -> Result<Page<SearchHit>> {
        self.search.search(owner_id, req).await
    }

    /// Search that aborts with `Error::Cancelled` when `cancel` fires.
    pub async fn search_notes_cancellable(
        &self,
        owner_id: Uuid,
        req: &SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<Page<SearchHit>> {
        self.search.search_cancellable(owner_id, req, cancel).await
    }

    // ---------------------------------------------------------------------
    // Tags
    // ---------------------------------------------------------------------

    pub async fn create_tag(&self, owner_id: Uuid, tag: NewTag) -> Result<Tag> {
        self.tags.create(owner_id, tag).await
    }

    pub async fn rename_tag(&self, owner_id: Uuid, tag_id: Uuid, new_name: &str) -> Result<Tag> {
        self.tags.rename(owner_id, tag_id, new_name).await
    }

    pub async fn update_tag(&self, owner_id: Uuid, tag_id: Uuid, patch: TagPatch) -> Result<Tag> {
        self.tags.update(owner_id, tag_id, patch).await
    }

    /// Delete a tag and its associations. Idempotent.
    pub async fn delete_tag(&self, owner_id: Uuid, tag_id: Uuid) -> Result<()> {
        self.tags.delete(owner_id, tag_id).await
    }

    /// Fold `source_ids` into `target_id`; returns the number of notes that
    /// carried a source tag.
    pub async fn merge_tags(&self, owner_id: Uuid, source_ids: &[Uuid], target_id: Uuid) -> Result<u64> {
        self.tags.merge(owner_id, source_ids, target_id).await
    }

    pub async fn add_tag_to_note(
        &self,
        owner_id: Uuid,
        note_id: Uuid,
        tag_id: Uuid,
        auto_tagged: bool,
    ) -> Result<()> {
        self.tags.add_to_note(owner_id, note_id, tag_id, auto_tagged).await
    }

    pub async fn remove_tag_from_note(&self, owner_id: Uuid, note_id: Uuid, tag_id: Uuid) -> Result<()> {
        self.tags.remove_from_note(owner_id, note_id, tag_id).await
    }

    /// Replace a note's tag set.
    pub async fn set_note_tags(&self, owner_id: Uuid, note_id: Uuid, tag_ids: &[Uuid]) -> Result<()> {
        self.tags.set_for_note(owner_id, note_id, tag_ids).await
    }

    /// Catalog ordered by usage desc, then name.
    pub async fn list_tags(&self, owner_id: Uuid) -> Result<Vec<TagCatalogEntry>> {
        Ok(self
            .tags
            .list(owner_id)
            .await?
            .into_iter()
            .map(TagCatalogEntry::from)
            .collect())
    }

    pub async fn get_tag(&self, owner_id: Uuid, tag_id: Uuid) -> Result<Tag> {
        self.tags.get(owner_id, tag_id).await
    }

    pub async fn tags_for_note(&self, owner_id: Uuid, note_id: Uuid) -> Result<Vec<NoteTag>> {
        self.tags.get_for_note(owner_id, note_id).await
    }

    // ---------------------------------------------------------------------
    // Suggestions
    // ---------------------------------------------------------------------

    /// Suggest tags for unsaved note text against the owner's catalog,
    /// using local time for the time-of-day bucket. Never writes.
    pub async fn suggest_tags(&self, owner_id: Uuid, text: &str) -> Result<Vec<SuggestedTag>> {
        self.suggest_tags_at(owner_id, text, chrono::Local::now().fixed_offset())
            .await
    }

    pub async fn suggest_tags_at(
        &self,
        owner_id: Uuid,
        text: &str,
        now: DateTime<FixedOffset>,
    ) -> Result<Vec<SuggestedTag>> {
        let catalog = self.list_tags(owner_id).await?;
        Ok(quire_search::suggest(text, &catalog, now))
    }

    // ---------------------------------------------------------------------
    // Maintenance
    // ---------------------------------------------------------------------

    pub async fn verify_integrity(&self, owner_id: Option<Uuid>) -> Result<IntegrityReport> {
        self.maintenance.verify(owner_id).await
    }

    /// Repair drift found by [`Database::verify_integrity`]; returns the
    /// findings as they were before the repair.
    pub async fn repair_integrity(&self, owner_id: Option<Uuid>) -> Result<IntegrityReport> {
        self.maintenance.repair(owner_id).await
    }
}
