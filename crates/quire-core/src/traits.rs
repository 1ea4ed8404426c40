//! Core traits for quire abstractions.
//!
//! These traits define the interfaces that storage backends must satisfy.
//! Every method takes the authenticated owner id first; implementations
//! scope all reads and writes to that owner.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// NOTE REPOSITORY TRAITS
// =============================================================================

/// Repository for note writes with synchronous index maintenance.
#[async_trait]
pub trait NoteRepository: Send + Sync {
    /// Create or replace a note, recomputing its search representation in
    /// the same transaction.
    async fn upsert(&self, owner_id: Uuid, input: NoteInput) -> Result<Note>;

    /// Fetch a live note.
    async fn fetch(&self, owner_id: Uuid, note_id: Uuid) -> Result<Note>;

    /// Soft-delete a note, purging its representation and associations.
    /// Deleting an absent or already-deleted note succeeds.
    async fn soft_delete(&self, owner_id: Uuid, note_id: Uuid) -> Result<()>;
}

// =============================================================================
// TAG REPOSITORY TRAITS
// =============================================================================

/// Repository for the tag catalog and note associations.
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Create a tag; fails with `Conflict` on a case-insensitive name clash.
    async fn create(&self, owner_id: Uuid, tag: NewTag) -> Result<Tag>;

    /// Rename a tag under the same uniqueness rule.
    async fn rename(&self, owner_id: Uuid, tag_id: Uuid, new_name: &str) -> Result<Tag>;

    /// Update presentation fields.
    async fn update(&self, owner_id: Uuid, tag_id: Uuid, patch: TagPatch) -> Result<Tag>;

    /// Delete a tag and its associations. Deleting an absent tag succeeds.
    async fn delete(&self, owner_id: Uuid, tag_id: Uuid) -> Result<()>;

    /// Fold source tags into the target; returns the number of affected notes.
    async fn merge(&self, owner_id: Uuid, source_ids: &[Uuid], target_id: Uuid) -> Result<u64>;

    /// Fetch one tag.
    async fn get(&self, owner_id: Uuid, tag_id: Uuid) -> Result<Tag>;

    /// List the owner's catalog ordered by usage.
    async fn list(&self, owner_id: Uuid) -> Result<Vec<Tag>>;

    /// Attach a tag to a note (idempotent).
    async fn add_to_note(
        &self,
        owner_id: Uuid,
        note_id: Uuid,
        tag_id: Uuid,
        auto_tagged: bool,
    ) -> Result<()>;

    /// Detach a tag from a note (idempotent).
    async fn remove_from_note(&self, owner_id: Uuid, note_id: Uuid, tag_id: Uuid) -> Result<()>;

    /// Replace the full tag set of a note.
    async fn set_for_note(&self, owner_id: Uuid, note_id: Uuid, tag_ids: &[Uuid]) -> Result<()>;

    /// Associations of a note.
    async fn get_for_note(&self, owner_id: Uuid, note_id: Uuid) -> Result<Vec<NoteTag>>;
}

// =============================================================================
// SEARCH TRAITS
// =============================================================================

/// Read-only ranked search over stored representations.
#[async_trait]
pub trait NoteSearch: Send + Sync {
    async fn search(&self, owner_id: Uuid, request: &SearchRequest) -> Result<Page<SearchHit>>;
}
