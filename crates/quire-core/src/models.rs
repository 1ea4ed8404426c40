//! Core data models for quire.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::defaults;

// =============================================================================
// NOTE TYPES
// =============================================================================

/// A stored note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub owner_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub body: String,
    /// Detected language code, or `und` when undetermined
    pub language_code: String,
    /// Diagnostic detection confidence in [0, 1]
    pub language_confidence: f32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Note {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Note content supplied by the capture/editor collaborator.
///
/// When `id` is `None` a new note is created. When `id` names an existing
/// note of the same owner that note is replaced; an unknown id creates the
/// note under that id (client-generated ids from offline devices).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NoteInput {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub title: Option<String>,
    pub body: String,
}

impl NoteInput {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            id: None,
            title: None,
            body: body.into(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }
}

/// Lightweight note view returned by search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteSummary {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub snippet: String,
    pub language_code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub tag_ids: Vec<Uuid>,
}

// =============================================================================
// TAG TYPES
// =============================================================================

/// A tag in an owner's catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Number of live associations referencing this tag
    pub usage_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Catalog entry consumed by the presentation layer and the suggester.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagCatalogEntry {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub usage_count: i64,
}

impl From<&Tag> for TagCatalogEntry {
    fn from(tag: &Tag) -> Self {
        Self {
            id: tag.id,
            name: tag.name.clone(),
            color: tag.color.clone(),
            icon: tag.icon.clone(),
            usage_count: tag.usage_count,
        }
    }
}

impl From<Tag> for TagCatalogEntry {
    fn from(tag: Tag) -> Self {
        Self {
            id: tag.id,
            name: tag.name,
            color: tag.color,
            icon: tag.icon,
            usage_count: tag.usage_count,
        }
    }
}

/// Request for creating a tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTag {
    pub name: String,
    #[serde(default = "default_tag_color")]
    pub color: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_tag_color() -> String {
    defaults::DEFAULT_TAG_COLOR.to_string()
}

impl NewTag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: default_tag_color(),
            icon: None,
            description: None,
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Partial update of a tag's presentation fields.
///
/// Outer `None` leaves a field unchanged; `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagPatch {
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub icon: Option<Option<String>>,
    #[serde(default)]
    pub description: Option<Option<String>>,
}

impl TagPatch {
    pub fn is_empty(&self) -> bool {
        self.color.is_none() && self.icon.is_none() && self.description.is_none()
    }
}

/// Association between a note and a tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteTag {
    pub note_id: Uuid,
    pub tag_id: Uuid,
    pub tagged_at: DateTime<Utc>,
    /// True when the association came from an accepted suggestion
    pub auto_tagged: bool,
}

// =============================================================================
// SEARCH TYPES
// =============================================================================

/// Result ordering for note search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Descending score; ties broken by newest first. Without query text
    /// this behaves like `Newest`.
    #[default]
    Relevance,
    Newest,
    Oldest,
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Relevance => write!(f, "relevance"),
            Self::Newest => write!(f, "newest"),
            Self::Oldest => write!(f, "oldest"),
        }
    }
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "relevance" | "rank" => Ok(Self::Relevance),
            "newest" | "desc" => Ok(Self::Newest),
            "oldest" | "asc" => Ok(Self::Oldest),
            _ => Err(format!("Invalid sort order: {}", s)),
        }
    }
}

/// How a tag filter with several ids is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagMatch {
    /// Note must carry every listed tag.
    #[default]
    All,
    /// Note must carry at least one listed tag.
    Any,
}

/// How query text is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuerySyntax {
    /// Every word in the query is a required term; no character is special.
    #[default]
    Plain,
    /// `"phrase"`, `-exclude` and `OR` are operators.
    Web,
}

/// Search request from the presentation collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Free-text query; `None` or blank lists notes by `sort` alone
    #[serde(default)]
    pub query: Option<String>,
    /// Analyze the query with this language's analyzer instead of the simple one
    #[serde(default)]
    pub language: Option<String>,
    /// Plain unless operators are explicitly requested
    #[serde(default)]
    pub syntax: QuerySyntax,
    #[serde(default)]
    pub tag_ids: Vec<Uuid>,
    #[serde(default)]
    pub tag_match: TagMatch,
    #[serde(default)]
    pub sort: SortOrder,
    /// Opaque cursor returned as `next_cursor` by the previous page
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
    /// Deadline for the whole search; exceeded searches return no results
    #[serde(skip)]
    pub timeout: Option<Duration>,
}

impl SearchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_syntax(mut self, syntax: QuerySyntax) -> Self {
        self.syntax = syntax;
        self
    }

    pub fn with_tags(mut self, tag_ids: Vec<Uuid>) -> Self {
        self.tag_ids = tag_ids;
        self
    }

    pub fn with_tag_match(mut self, tag_match: TagMatch) -> Self {
        self.tag_match = tag_match;
        self
    }

    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Query text if present and not blank.
    pub fn query_text(&self) -> Option<&str> {
        self.query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
    }

    /// Effective page size (defaults applied, not yet validated).
    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(defaults::PAGE_LIMIT_SEARCH)
    }
}

/// A ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub note: NoteSummary,
    /// Relevance score; 0.0 when the request carried no query text
    pub rank: f32,
}

/// One page of results with a cursor for the next page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// =============================================================================
// AUTO-TAG SUGGESTIONS
// =============================================================================

/// Why a tag was suggested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionReason {
    Action,
    Urgency,
    Ideation,
    TemporalContext,
    TimeOfDay,
    /// The name of an existing catalog tag occurs in the text
    CatalogMatch,
    /// Inline `#hashtag` in the text
    Hashtag,
}

/// A non-binding tag suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedTag {
    pub name: String,
    /// Set when the suggestion corresponds to a tag already in the catalog
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_tag_id: Option<Uuid>,
    pub confidence: f32,
    pub reason: SuggestionReason,
}

// =============================================================================
// INTEGRITY MAINTENANCE
// =============================================================================

/// A tag whose stored usage count differs from its association count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageDrift {
    pub tag_id: Uuid,
    pub stored: i64,
    pub actual: i64,
}

/// Result of an integrity scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub usage_drift: Vec<UsageDrift>,
    /// Associations whose note is soft-deleted or missing, or whose tag is
    /// missing or owned by another owner: `(note_id, tag_id)`
    pub orphaned_associations: Vec<(Uuid, Uuid)>,
    /// Notes that are live but have no stored representation
    pub unindexed_notes: Vec<Uuid>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.usage_drift.is_empty()
            && self.orphaned_associations.is_empty()
            && self.unindexed_notes.is_empty()
    }
}
