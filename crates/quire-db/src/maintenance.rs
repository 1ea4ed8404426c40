//! Integrity verification and repair.
//!
//! The happy path never corrects counters or associations: a mismatch there
//! fails the mutating transaction. Drift that got in some other way (manual
//! edits, restored backups) is found and fixed here, as an explicit
//! operation.

use std::sync::Arc;
use std::time::Instant;

use sqlx::{QueryBuilder, Row, Sqlite, Transaction};
use tracing::{error, info};
use uuid::Uuid;

use quire_core::{IntegrityReport, Result, UsageDrift};
use quire_search::{build_representation, AnalyzerRegistry, SearchRepresentation};

use crate::notes::write_representation_tx;
use crate::pool::StorePools;

/// Integrity checks over one database, optionally scoped to an owner.
#[derive(Clone)]
pub struct Maintenance {
    pools: StorePools,
    registry: Arc<AnalyzerRegistry>,
}

/// Note whose stored representation is missing, with the one it should have.
struct Unindexed {
    note_id: Uuid,
    owner_id: Uuid,
    representation: SearchRepresentation,
}

fn push_owner_scope(builder: &mut QueryBuilder<'_, Sqlite>, column: &str, owner: Option<Uuid>) {
    if let Some(owner) = owner {
        builder.push(format!(" AND {} = ", column));
        builder.push_bind(owner);
    }
}

impl Maintenance {
    pub fn new(pools: StorePools, registry: Arc<AnalyzerRegistry>) -> Self {
        Self { pools, registry }
    }

    /// Report drift without changing anything.
    pub async fn verify(&self, owner: Option<Uuid>) -> Result<IntegrityReport> {
        let mut tx = self.pools.reader.begin().await?;
        let (report, _) = self.inspect_tx(&mut tx, owner).await?;
        tx.commit().await?;
        if !report.is_clean() {
            log_findings("verify_integrity", owner, &report);
        }
        Ok(report)
    }

    /// Delete orphaned associations, recompute usage counts and reindex
    /// notes missing from the index, all in one transaction.
    ///
    /// Returns what was found before the repair.
    pub async fn repair(&self, owner: Option<Uuid>) -> Result<IntegrityReport> {
        let start = Instant::now();
        let mut tx = self.pools.writer.begin().await?;
        let (report, unindexed) = self.inspect_tx(&mut tx, owner).await?;
        if report.is_clean() {
            return Ok(report);
        }
        log_findings("repair_integrity", owner, &report);

        for (note_id, tag_id) in &report.orphaned_associations {
            sqlx::query("DELETE FROM note_tag WHERE note_id = ? AND tag_id = ?")
                .bind(note_id)
                .bind(tag_id)
                .execute(&mut *tx)
                .await?;
        }

        // Recount after the orphan purge; drift reported above may have
        // been caused by the orphans themselves
        let mut recount: QueryBuilder<Sqlite> = QueryBuilder::new(
            "UPDATE tag SET usage_count = \
             (SELECT COUNT(*) FROM note_tag nt WHERE nt.tag_id = tag.id) WHERE 1 = 1",
        );
        push_owner_scope(&mut recount, "owner_id", owner);
        let recounted = recount.build().execute(&mut *tx).await?.rows_affected();

        let mut reindexed = 0u64;
        for note in &unindexed {
            reindexed +=
                write_representation_tx(&mut tx, note.owner_id, note.note_id, &note.representation)
                    .await?;
        }
        tx.commit().await?;

        info!(
            subsystem = "db",
            component = "maintenance",
            op = "repair_integrity",
            orphans_removed = report.orphaned_associations.len(),
            tags_recounted = recounted,
            notes_reindexed = unindexed.len(),
            token_count = reindexed,
            duration_ms = start.elapsed().as_millis() as u64,
            "Integrity repaired"
        );
        Ok(report)
    }

    async fn inspect_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        owner: Option<Uuid>,
    ) -> Result<(IntegrityReport, Vec<Unindexed>)> {
        let mut drift: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT t.id, t.usage_count, \
             (SELECT COUNT(*) FROM note_tag nt WHERE nt.tag_id = t.id) AS actual \
             FROM tag t WHERE 1 = 1",
        );
        push_owner_scope(&mut drift, "t.owner_id", owner);
        drift.push(" ORDER BY t.id");
        let mut usage_drift = Vec::new();
        for row in drift.build().fetch_all(&mut **tx).await? {
            let stored: i64 = row.try_get("usage_count")?;
            let actual: i64 = row.try_get("actual")?;
            if stored != actual {
                usage_drift.push(UsageDrift {
                    tag_id: row.try_get("id")?,
                    stored,
                    actual,
                });
            }
        }

        // Associations to deleted notes or across owners
        let mut orphans: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT nt.note_id, nt.tag_id FROM note_tag nt \
             JOIN note n ON n.id = nt.note_id JOIN tag t ON t.id = nt.tag_id \
             WHERE (n.deleted_at IS NOT NULL OR n.owner_id != t.owner_id)",
        );
        push_owner_scope(&mut orphans, "t.owner_id", owner);
        orphans.push(" ORDER BY nt.note_id, nt.tag_id");
        let orphaned_associations = orphans
            .build()
            .fetch_all(&mut **tx)
            .await?
            .iter()
            .map(|row| -> Result<(Uuid, Uuid)> {
                Ok((row.try_get("note_id")?, row.try_get("tag_id")?))
            })
            .collect::<Result<Vec<_>>>()?;

        // Live notes without tokens; a note whose text yields no tokens at
        // all is correctly empty
        let mut missing: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT n.id, n.owner_id, n.title, n.body FROM note n \
             WHERE n.deleted_at IS NULL \
             AND NOT EXISTS (SELECT 1 FROM search_token st WHERE st.note_id = n.id)",
        );
        push_owner_scope(&mut missing, "n.owner_id", owner);
        missing.push(" ORDER BY n.id");
        let mut unindexed = Vec::new();
        for row in missing.build().fetch_all(&mut **tx).await? {
            let title: Option<String> = row.try_get("title")?;
            let body: String = row.try_get("body")?;
            let representation = build_representation(&self.registry, title.as_deref(), &body);
            if !representation.is_empty() {
                unindexed.push(Unindexed {
                    note_id: row.try_get("id")?,
                    owner_id: row.try_get("owner_id")?,
                    representation,
                });
            }
        }

        let report = IntegrityReport {
            usage_drift,
            orphaned_associations,
            unindexed_notes: unindexed.iter().map(|n| n.note_id).collect(),
        };
        Ok((report, unindexed))
    }
}

fn log_findings(op: &str, owner: Option<Uuid>, report: &IntegrityReport) {
    error!(
        subsystem = "db",
        component = "maintenance",
        op,
        owner_id = ?owner,
        usage_drift = report.usage_drift.len(),
        orphaned_associations = report.orphaned_associations.len(),
        unindexed_notes = report.unindexed_notes.len(),
        "Integrity violations found"
    );
}
