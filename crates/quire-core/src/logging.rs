//! Structured logging schema and field name constants for quire.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation can query by the same field names across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Integrity violations, degraded service |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (pool open, migrations), maintenance runs |
//! | DEBUG | Decision points: analyzer choice, language detection, counter deltas |
//! | TRACE | Per-item iteration (tokens, candidate hits) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "search", "db", "analysis"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "notes", "tags", "pool", "ranker", "language"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "upsert_note", "merge_tags", "search_notes"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Owner UUID scoping the operation.
pub const OWNER_ID: &str = "owner_id";

/// Note UUID being operated on.
pub const NOTE_ID: &str = "note_id";

/// Tag UUID being operated on.
pub const TAG_ID: &str = "tag_id";

/// Language code chosen for a note.
pub const LANGUAGE: &str = "language";

/// Analyzer code used for a token stream.
pub const ANALYZER: &str = "analyzer";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned by a search or query.
pub const RESULT_COUNT: &str = "result_count";

/// Number of index rows written for a note.
pub const TOKEN_COUNT: &str = "token_count";

/// Rows changed by an association mutation.
pub const ROWS_CHANGED: &str = "rows_changed";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of open connections in a pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in a pool.
pub const POOL_IDLE: &str = "pool_idle";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
