//! Tag repository implementation.
//!
//! `usage_count` is maintained inside the same transaction as the
//! association change that moves it, with the delta taken from the rows the
//! statement actually changed. A duplicate add is a no-op and a missing
//! remove is a no-op, so neither touches the counter.

use std::collections::{BTreeSet, HashSet};

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, Transaction};
use tracing::{debug, error, info};
use uuid::Uuid;

use quire_core::uuid_utils::now_micros;
use quire_core::{
    micros_to_datetime, new_v7, normalize_tag_key, validate_color, validate_description,
    validate_icon, validate_tag_name, Error, NewTag, NoteTag, Result, Tag, TagPatch,
    TagRepository,
};

use crate::notes::SqliteNoteRepository;
use crate::pool::StorePools;

const TAG_COLUMNS: &str =
    "id, owner_id, name, color, icon, description, usage_count, created_at";

fn tag_from_row(row: &SqliteRow) -> Result<Tag> {
    Ok(Tag {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        name: row.try_get("name")?,
        color: row.try_get("color")?,
        icon: row.try_get("icon")?,
        description: row.try_get("description")?,
        usage_count: row.try_get("usage_count")?,
        created_at: micros_to_datetime(row.try_get("created_at")?),
    })
}

/// Map a unique-constraint failure on the catalog to `Conflict`.
fn map_name_conflict(err: sqlx::Error, name: &str) -> Error {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            Error::Conflict(format!("a tag named {:?} already exists", name))
        }
        _ => Error::Database(err),
    }
}

/// Apply a usage delta and return the new count.
///
/// A negative result means the counter and the associations disagree; the
/// caller's transaction must roll back.
pub(crate) async fn adjust_usage_tx(
    tx: &mut Transaction<'_, Sqlite>,
    tag_id: Uuid,
    delta: i64,
) -> Result<i64> {
    let count: Option<i64> = sqlx::query_scalar(
        "UPDATE tag SET usage_count = usage_count + ? WHERE id = ? RETURNING usage_count",
    )
    .bind(delta)
    .bind(tag_id)
    .fetch_optional(&mut **tx)
    .await?;

    match count {
        Some(count) if count < 0 => {
            error!(
                subsystem = "db",
                component = "tags",
                op = "adjust_usage",
                tag_id = %tag_id,
                delta,
                usage_count = count,
                "Tag usage count went negative"
            );
            Err(Error::Integrity(format!(
                "usage count of tag {} would become {}",
                tag_id, count
            )))
        }
        Some(count) => Ok(count),
        None => Err(Error::TagNotFound(tag_id)),
    }
}

/// Remove every association of a note, decrementing each tag once.
pub(crate) async fn detach_all_tx(tx: &mut Transaction<'_, Sqlite>, note_id: Uuid) -> Result<u64> {
    let tag_ids: Vec<Uuid> = sqlx::query_scalar("SELECT tag_id FROM note_tag WHERE note_id = ?")
        .bind(note_id)
        .fetch_all(&mut **tx)
        .await?;
    for tag_id in &tag_ids {
        adjust_usage_tx(tx, *tag_id, -1).await?;
    }
    let result = sqlx::query("DELETE FROM note_tag WHERE note_id = ?")
        .bind(note_id)
        .execute(&mut **tx)
        .await?;
    if result.rows_affected() != tag_ids.len() as u64 {
        return Err(Error::Integrity(format!(
            "note {} lost {} associations but {} were counted",
            note_id,
            result.rows_affected(),
            tag_ids.len()
        )));
    }
    Ok(result.rows_affected())
}

/// SQLite implementation of TagRepository.
#[derive(Clone)]
pub struct SqliteTagRepository {
    pools: StorePools,
}

impl SqliteTagRepository {
    /// Create a new SqliteTagRepository over the given pools.
    pub fn new(pools: StorePools) -> Self {
        Self { pools }
    }

    async fn fetch_tx(tx: &mut Transaction<'_, Sqlite>, owner_id: Uuid, tag_id: Uuid) -> Result<Tag> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM tag WHERE id = ? AND owner_id = ?",
            TAG_COLUMNS
        ))
        .bind(tag_id)
        .bind(owner_id)
        .fetch_optional(&mut **tx)
        .await?;
        match row {
            Some(row) => tag_from_row(&row),
            None => Err(Error::TagNotFound(tag_id)),
        }
    }

    /// Attach within an existing transaction; returns rows inserted (0 or 1).
    async fn attach_tx(
        tx: &mut Transaction<'_, Sqlite>,
        note_id: Uuid,
        tag_id: Uuid,
        auto_tagged: bool,
        tagged_at: i64,
    ) -> Result<u64> {
        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO note_tag (note_id, tag_id, tagged_at, auto_tagged) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(note_id)
        .bind(tag_id)
        .bind(tagged_at)
        .bind(auto_tagged)
        .execute(&mut **tx)
        .await?
        .rows_affected();
        if inserted == 1 {
            adjust_usage_tx(tx, tag_id, 1).await?;
        }
        Ok(inserted)
    }

    /// Detach within an existing transaction; returns rows deleted (0 or 1).
    async fn detach_tx(
        tx: &mut Transaction<'_, Sqlite>,
        note_id: Uuid,
        tag_id: Uuid,
    ) -> Result<u64> {
        let deleted = sqlx::query("DELETE FROM note_tag WHERE note_id = ? AND tag_id = ?")
            .bind(note_id)
            .bind(tag_id)
            .execute(&mut **tx)
            .await?
            .rows_affected();
        if deleted > 0 {
            adjust_usage_tx(tx, tag_id, -(deleted as i64)).await?;
        }
        Ok(deleted)
    }
}

#[async_trait]
impl TagRepository for SqliteTagRepository {
    async fn create(&self, owner_id: Uuid, tag: NewTag) -> Result<Tag> {
        let name = validate_tag_name(&tag.name)?;
        let color = validate_color(&tag.color)?;
        let icon = validate_icon(tag.icon.as_deref())?;
        let description = validate_description(tag.description.as_deref())?;
        let (now, now_us) = now_micros();
        let id = new_v7();

        sqlx::query(
            "INSERT INTO tag (id, owner_id, name, name_key, color, icon, description, \
             usage_count, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?)",
        )
        .bind(id)
        .bind(owner_id)
        .bind(name.as_str())
        .bind(normalize_tag_key(&name))
        .bind(color.as_str())
        .bind(icon.as_deref())
        .bind(description.as_deref())
        .bind(now_us)
        .execute(&self.pools.writer)
        .await
        .map_err(|e| map_name_conflict(e, &name))?;

        info!(
            subsystem = "db",
            component = "tags",
            op = "create_tag",
            owner_id = %owner_id,
            tag_id = %id,
            "Tag created"
        );
        Ok(Tag {
            id,
            owner_id,
            name,
            color,
            icon,
            description,
            usage_count: 0,
            created_at: now,
        })
    }

    async fn rename(&self, owner_id: Uuid, tag_id: Uuid, new_name: &str) -> Result<Tag> {
        let name = validate_tag_name(new_name)?;
        let mut tx = self.pools.writer.begin().await?;
        let tag = Self::fetch_tx(&mut tx, owner_id, tag_id).await?;

        sqlx::query("UPDATE tag SET name = ?, name_key = ? WHERE id = ?")
            .bind(name.as_str())
            .bind(normalize_tag_key(&name))
            .bind(tag_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_name_conflict(e, &name))?;
        tx.commit().await?;

        info!(
            subsystem = "db",
            component = "tags",
            op = "rename_tag",
            owner_id = %owner_id,
            tag_id = %tag_id,
            "Tag renamed"
        );
        Ok(Tag { name, ..tag })
    }

    async fn update(&self, owner_id: Uuid, tag_id: Uuid, patch: TagPatch) -> Result<Tag> {
        let color = patch.color.as_deref().map(validate_color).transpose()?;
        let icon = patch
            .icon
            .as_ref()
            .map(|icon| validate_icon(icon.as_deref()))
            .transpose()?;
        let description = patch
            .description
            .as_ref()
            .map(|d| validate_description(d.as_deref()))
            .transpose()?;

        let mut tx = self.pools.writer.begin().await?;
        let mut tag = Self::fetch_tx(&mut tx, owner_id, tag_id).await?;
        if patch.is_empty() {
            return Ok(tag);
        }
        if let Some(color) = color {
            tag.color = color;
        }
        if let Some(icon) = icon {
            tag.icon = icon;
        }
        if let Some(description) = description {
            tag.description = description;
        }

        sqlx::query("UPDATE tag SET color = ?, icon = ?, description = ? WHERE id = ?")
            .bind(tag.color.as_str())
            .bind(tag.icon.as_deref())
            .bind(tag.description.as_deref())
            .bind(tag_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(tag)
    }

    async fn delete(&self, owner_id: Uuid, tag_id: Uuid) -> Result<()> {
        // Associations cascade with the tag row
        let result = sqlx::query("DELETE FROM tag WHERE id = ? AND owner_id = ?")
            .bind(tag_id)
            .bind(owner_id)
            .execute(&self.pools.writer)
            .await?;
        debug!(
            subsystem = "db",
            component = "tags",
            op = "delete_tag",
            tag_id = %tag_id,
            rows_changed = result.rows_affected(),
            "Tag delete applied"
        );
        Ok(())
    }

    async fn merge(&self, owner_id: Uuid, source_ids: &[Uuid], target_id: Uuid) -> Result<u64> {
        let sources: BTreeSet<Uuid> = source_ids.iter().copied().collect();
        if sources.is_empty() {
            return Err(Error::Validation("merge needs at least one source tag".to_string()));
        }
        if sources.contains(&target_id) {
            return Err(Error::Conflict(format!(
                "tag {} cannot be merged into itself",
                target_id
            )));
        }

        let mut tx = self.pools.writer.begin().await?;
        Self::fetch_tx(&mut tx, owner_id, target_id).await?;
        for source in &sources {
            Self::fetch_tx(&mut tx, owner_id, *source).await?;
        }

        let mut affected: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(DISTINCT note_id) FROM note_tag WHERE tag_id IN (");
        let mut list = affected.separated(", ");
        for source in &sources {
            list.push_bind(*source);
        }
        affected.push(")");
        let affected_notes: i64 = affected
            .build_query_scalar()
            .fetch_one(&mut *tx)
            .await?;

        // Notes already carrying the target keep their association
        let mut copy: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT OR IGNORE INTO note_tag (note_id, tag_id, tagged_at, auto_tagged) \
             SELECT note_id, ",
        );
        copy.push_bind(target_id);
        copy.push(", MIN(tagged_at), MIN(auto_tagged) FROM note_tag WHERE tag_id IN (");
        let mut list = copy.separated(", ");
        for source in &sources {
            list.push_bind(*source);
        }
        copy.push(") GROUP BY note_id");
        let added = copy.build().execute(&mut *tx).await?.rows_affected();
        if added > 0 {
            adjust_usage_tx(&mut tx, target_id, added as i64).await?;
        }

        let mut remove: QueryBuilder<Sqlite> =
            QueryBuilder::new("DELETE FROM tag WHERE owner_id = ");
        remove.push_bind(owner_id);
        remove.push(" AND id IN (");
        let mut list = remove.separated(", ");
        for source in &sources {
            list.push_bind(*source);
        }
        remove.push(")");
        remove.build().execute(&mut *tx).await?;

        tx.commit().await?;

        info!(
            subsystem = "db",
            component = "tags",
            op = "merge_tags",
            owner_id = %owner_id,
            tag_id = %target_id,
            source_count = sources.len(),
            rows_changed = added,
            result_count = affected_notes,
            "Tags merged"
        );
        Ok(affected_notes as u64)
    }

    async fn get(&self, owner_id: Uuid, tag_id: Uuid) -> Result<Tag> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM tag WHERE id = ? AND owner_id = ?",
            TAG_COLUMNS
        ))
        .bind(tag_id)
        .bind(owner_id)
        .fetch_optional(&self.pools.reader)
        .await?;
        match row {
            Some(row) => tag_from_row(&row),
            None => Err(Error::TagNotFound(tag_id)),
        }
    }

    async fn list(&self, owner_id: Uuid) -> Result<Vec<Tag>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM tag WHERE owner_id = ? ORDER BY usage_count DESC, name_key ASC",
            TAG_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pools.reader)
        .await?;
        rows.iter().map(tag_from_row).collect()
    }

    async fn add_to_note(
        &self,
        owner_id: Uuid,
        note_id: Uuid,
        tag_id: Uuid,
        auto_tagged: bool,
    ) -> Result<()> {
        let mut tx = self.pools.writer.begin().await?;
        SqliteNoteRepository::fetch_live_tx(&mut tx, owner_id, note_id).await?;
        Self::fetch_tx(&mut tx, owner_id, tag_id).await?;
        let (_, now_us) = now_micros();
        let inserted = Self::attach_tx(&mut tx, note_id, tag_id, auto_tagged, now_us).await?;
        tx.commit().await?;

        debug!(
            subsystem = "db",
            component = "tags",
            op = "add_tag_to_note",
            note_id = %note_id,
            tag_id = %tag_id,
            rows_changed = inserted,
            "Tag attached"
        );
        Ok(())
    }

    async fn remove_from_note(&self, owner_id: Uuid, note_id: Uuid, tag_id: Uuid) -> Result<()> {
        let mut tx = self.pools.writer.begin().await?;
        let owned: Option<i64> = sqlx::query_scalar("SELECT 1 FROM tag WHERE id = ? AND owner_id = ?")
            .bind(tag_id)
            .bind(owner_id)
            .fetch_optional(&mut *tx)
            .await?;
        if owned.is_none() {
            return Ok(());
        }
        let deleted = Self::detach_tx(&mut tx, note_id, tag_id).await?;
        tx.commit().await?;

        debug!(
            subsystem = "db",
            component = "tags",
            op = "remove_tag_from_note",
            note_id = %note_id,
            tag_id = %tag_id,
            rows_changed = deleted,
            "Tag detached"
        );
        Ok(())
    }

    async fn set_for_note(&self, owner_id: Uuid, note_id: Uuid, tag_ids: &[Uuid]) -> Result<()> {
        let desired: BTreeSet<Uuid> = tag_ids.iter().copied().collect();

        let mut tx = self.pools.writer.begin().await?;
        SqliteNoteRepository::fetch_live_tx(&mut tx, owner_id, note_id).await?;
        for tag_id in &desired {
            Self::fetch_tx(&mut tx, owner_id, *tag_id).await?;
        }

        let current: HashSet<Uuid> =
            sqlx::query_scalar::<_, Uuid>("SELECT tag_id FROM note_tag WHERE note_id = ?")
                .bind(note_id)
                .fetch_all(&mut *tx)
                .await?
                .into_iter()
                .collect();

        let (_, now_us) = now_micros();
        let mut changed = 0u64;
        for tag_id in current.iter().filter(|id| !desired.contains(id)) {
            changed += Self::detach_tx(&mut tx, note_id, *tag_id).await?;
        }
        for tag_id in desired.iter().filter(|id| !current.contains(id)) {
            changed += Self::attach_tx(&mut tx, note_id, *tag_id, false, now_us).await?;
        }
        tx.commit().await?;

        debug!(
            subsystem = "db",
            component = "tags",
            op = "set_note_tags",
            note_id = %note_id,
            rows_changed = changed,
            "Note tag set replaced"
        );
        Ok(())
    }

    async fn get_for_note(&self, owner_id: Uuid, note_id: Uuid) -> Result<Vec<NoteTag>> {
        let mut tx = self.pools.reader.begin().await?;
        SqliteNoteRepository::fetch_live_tx(&mut tx, owner_id, note_id).await?;
        let rows = sqlx::query(
            "SELECT note_id, tag_id, tagged_at, auto_tagged FROM note_tag \
             WHERE note_id = ? ORDER BY tagged_at, tag_id",
        )
        .bind(note_id)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        rows.iter()
            .map(|row| -> Result<NoteTag> {
                Ok(NoteTag {
                    note_id: row.try_get("note_id")?,
                    tag_id: row.try_get("tag_id")?,
                    tagged_at: micros_to_datetime(row.try_get("tagged_at")?),
                    auto_tagged: row.try_get("auto_tagged")?,
                })
            })
            .collect()
    }
}
