//! Note repository and index maintenance.
//!
//! Every note write recomputes the note's search representation. Analysis is
//! pure and runs before the write transaction opens; the note row, the old
//! token purge and the new token insert then commit together, so the index
//! never lags the note.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use quire_core::uuid_utils::now_micros;
use quire_core::{
    micros_to_datetime, new_v7, validate_body, validate_title, Error, Note, NoteInput,
    NoteRepository, Result,
};
use quire_search::{build_representation, AnalyzerRegistry, SearchRepresentation};

use crate::pool::StorePools;
use crate::tags::detach_all_tx;

/// Rows per multi-row token insert; 7 binds each stays under SQLite's
/// bound-parameter limit.
const TOKEN_INSERT_CHUNK: usize = 500;

pub(crate) const NOTE_COLUMNS: &str = "id, owner_id, title, body, language_code, \
     language_confidence, created_at, updated_at, deleted_at";

pub(crate) fn note_from_row(row: &SqliteRow) -> Result<Note> {
    let confidence: f64 = row.try_get("language_confidence")?;
    let deleted_at: Option<i64> = row.try_get("deleted_at")?;
    Ok(Note {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        language_code: row.try_get("language_code")?,
        language_confidence: confidence as f32,
        created_at: micros_to_datetime(row.try_get("created_at")?),
        updated_at: micros_to_datetime(row.try_get("updated_at")?),
        deleted_at: deleted_at.map(micros_to_datetime),
    })
}

/// Replace a note's stored representation within an existing transaction.
///
/// Returns the number of token rows written.
pub(crate) async fn write_representation_tx(
    tx: &mut Transaction<'_, Sqlite>,
    owner_id: Uuid,
    note_id: Uuid,
    representation: &SearchRepresentation,
) -> Result<u64> {
    purge_representation_tx(tx, note_id).await?;

    let rows = representation
        .postings
        .iter()
        .map(|p| -> Result<_> { Ok((p, serde_json::to_string(&p.positions)?)) })
        .collect::<Result<Vec<_>>>()?;

    let mut written = 0u64;
    for chunk in rows.chunks(TOKEN_INSERT_CHUNK) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO search_token (owner_id, token, analyzer, note_id, field, tf, positions) ",
        );
        builder.push_values(chunk, |mut b, (posting, positions)| {
            b.push_bind(owner_id)
                .push_bind(posting.term.as_str())
                .push_bind(posting.analyzer.as_str())
                .push_bind(note_id)
                .push_bind(posting.field.as_str())
                .push_bind(posting.tf() as i64)
                .push_bind(positions.as_str());
        });
        written += builder.build().execute(&mut **tx).await?.rows_affected();
    }
    Ok(written)
}

/// Remove a note's representation within an existing transaction.
pub(crate) async fn purge_representation_tx(
    tx: &mut Transaction<'_, Sqlite>,
    note_id: Uuid,
) -> Result<u64> {
    let result = sqlx::query("DELETE FROM search_token WHERE note_id = ?")
        .bind(note_id)
        .execute(&mut **tx)
        .await?;
    Ok(result.rows_affected())
}

/// SQLite implementation of NoteRepository.
#[derive(Clone)]
pub struct SqliteNoteRepository {
    pools: StorePools,
    registry: Arc<AnalyzerRegistry>,
}

impl SqliteNoteRepository {
    pub fn new(pools: StorePools, registry: Arc<AnalyzerRegistry>) -> Self {
        Self { pools, registry }
    }

    fn reader(&self) -> &SqlitePool {
        &self.pools.reader
    }

    /// Load a live note owned by `owner_id` within an existing transaction.
    pub(crate) async fn fetch_live_tx(
        tx: &mut Transaction<'_, Sqlite>,
        owner_id: Uuid,
        note_id: Uuid,
    ) -> Result<Note> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM note WHERE id = ? AND owner_id = ? AND deleted_at IS NULL",
            NOTE_COLUMNS
        ))
        .bind(note_id)
        .bind(owner_id)
        .fetch_optional(&mut **tx)
        .await?;
        match row {
            Some(row) => note_from_row(&row),
            None => Err(Error::NoteNotFound(note_id)),
        }
    }
}

#[async_trait]
impl NoteRepository for SqliteNoteRepository {
    async fn upsert(&self, owner_id: Uuid, input: NoteInput) -> Result<Note> {
        let start = Instant::now();
        validate_body(&input.body)?;
        let title = validate_title(input.title.as_deref())?;
        let body = input.body;

        let representation = build_representation(&self.registry, title.as_deref(), &body);
        debug!(
            subsystem = "db",
            component = "notes",
            op = "analyze",
            language = %representation.language.code,
            confidence = representation.language.confidence,
            analyzers = ?representation.analyzers,
            token_count = representation.token_count(),
            "Note analyzed"
        );

        let (now, now_us) = now_micros();
        let mut tx = self.pools.writer.begin().await?;

        let existing = match input.id {
            Some(id) => sqlx::query(&format!("SELECT {} FROM note WHERE id = ?", NOTE_COLUMNS))
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .map(|row| note_from_row(&row))
                .transpose()?,
            None => None,
        };

        let note = match existing {
            Some(existing) => {
                if existing.owner_id != owner_id || existing.is_deleted() {
                    return Err(Error::NoteNotFound(existing.id));
                }
                sqlx::query(
                    "UPDATE note SET title = ?, body = ?, language_code = ?, \
                     language_confidence = ?, updated_at = ? WHERE id = ?",
                )
                .bind(title.as_deref())
                .bind(body.as_str())
                .bind(representation.language.code.as_str())
                .bind(representation.language.confidence as f64)
                .bind(now_us)
                .bind(existing.id)
                .execute(&mut *tx)
                .await?;
                Note {
                    title,
                    body,
                    language_code: representation.language.code.clone(),
                    language_confidence: representation.language.confidence,
                    updated_at: now,
                    ..existing
                }
            }
            None => {
                let id = input.id.unwrap_or_else(new_v7);
                sqlx::query(
                    "INSERT INTO note (id, owner_id, title, body, language_code, \
                     language_confidence, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(id)
                .bind(owner_id)
                .bind(title.as_deref())
                .bind(body.as_str())
                .bind(representation.language.code.as_str())
                .bind(representation.language.confidence as f64)
                .bind(now_us)
                .bind(now_us)
                .execute(&mut *tx)
                .await?;
                Note {
                    id,
                    owner_id,
                    title,
                    body,
                    language_code: representation.language.code.clone(),
                    language_confidence: representation.language.confidence,
                    created_at: now,
                    updated_at: now,
                    deleted_at: None,
                }
            }
        };

        let written = write_representation_tx(&mut tx, owner_id, note.id, &representation).await?;
        tx.commit().await?;

        info!(
            subsystem = "db",
            component = "notes",
            op = "upsert_note",
            owner_id = %owner_id,
            note_id = %note.id,
            language = %note.language_code,
            token_count = written,
            duration_ms = start.elapsed().as_millis() as u64,
            "Note stored and indexed"
        );
        Ok(note)
    }

    async fn fetch(&self, owner_id: Uuid, note_id: Uuid) -> Result<Note> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM note WHERE id = ? AND owner_id = ? AND deleted_at IS NULL",
            NOTE_COLUMNS
        ))
        .bind(note_id)
        .bind(owner_id)
        .fetch_optional(self.reader())
        .await?;
        match row {
            Some(row) => note_from_row(&row),
            None => Err(Error::NoteNotFound(note_id)),
        }
    }

    async fn soft_delete(&self, owner_id: Uuid, note_id: Uuid) -> Result<()> {
        let mut tx = self.pools.writer.begin().await?;
        let (_, now_us) = now_micros();

        let result = sqlx::query(
            "UPDATE note SET deleted_at = ?, updated_at = ? \
             WHERE id = ? AND owner_id = ? AND deleted_at IS NULL",
        )
        .bind(now_us)
        .bind(now_us)
        .bind(note_id)
        .bind(owner_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            // Absent, foreign or already deleted: nothing to do
            debug!(
                subsystem = "db",
                component = "notes",
                op = "delete_note",
                note_id = %note_id,
                "Delete of missing note ignored"
            );
            return Ok(());
        }

        let purged = purge_representation_tx(&mut tx, note_id).await?;
        let detached = detach_all_tx(&mut tx, note_id).await?;
        tx.commit().await?;

        info!(
            subsystem = "db",
            component = "notes",
            op = "delete_note",
            owner_id = %owner_id,
            note_id = %note_id,
            token_count = purged,
            rows_changed = detached,
            "Note deleted"
        );
        Ok(())
    }
}
