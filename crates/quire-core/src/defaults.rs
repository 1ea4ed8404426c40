//! Centralized default constants for quire.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic numbers.

// =============================================================================
// LANGUAGE DETECTION
// =============================================================================

/// Language code used when detection cannot decide (ISO 639-2 "undetermined").
pub const UNDETERMINED: &str = "und";

/// Texts shorter than this many characters are never language-detected.
pub const MIN_DETECTION_CHARS: usize = 20;

// =============================================================================
// RANKING
// =============================================================================

/// Weight applied to term frequency for title (class A) matches.
pub const TITLE_WEIGHT: f32 = 2.0;

/// Weight applied to term frequency for body (class B) matches.
pub const BODY_WEIGHT: f32 = 1.0;

// =============================================================================
// PAGINATION
// =============================================================================

/// Default page size for search.
pub const PAGE_LIMIT_SEARCH: i64 = 20;

/// Largest page size a caller may request.
pub const PAGE_LIMIT_MAX: i64 = 100;

/// Characters of body text returned as a search snippet.
pub const SNIPPET_LENGTH: usize = 200;

// =============================================================================
// VALIDATION LIMITS
// =============================================================================

/// Maximum note title length in characters.
pub const MAX_TITLE_CHARS: usize = 500;

/// Maximum note body length in bytes.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Maximum tag name length in characters.
pub const MAX_TAG_NAME_CHARS: usize = 64;

/// Maximum tag icon length in characters (emoji or short icon identifier).
pub const MAX_TAG_ICON_CHARS: usize = 32;

/// Maximum tag description length in characters.
pub const MAX_TAG_DESCRIPTION_CHARS: usize = 500;

/// Color assigned to tags created without an explicit color.
pub const DEFAULT_TAG_COLOR: &str = "#6b7280";

// =============================================================================
// STORAGE
// =============================================================================

/// Default database location when no URL is configured.
pub const DATABASE_URL: &str = "sqlite://quire.db";

/// Default number of read connections.
pub const MAX_READERS: u32 = 8;

/// Default SQLite busy timeout in milliseconds.
pub const BUSY_TIMEOUT_MS: u64 = 5_000;

/// Default pool acquire timeout in seconds.
pub const ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Waiting this long for a read connection logs pool health.
pub const SLOW_ACQUIRE_MS: u64 = 250;
