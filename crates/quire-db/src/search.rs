//! Search execution over the stored token index.
//!
//! Query planning and scoring are pure (`quire_search::query`); this module
//! fetches the postings a plan needs, scores them, paginates and loads the
//! page's summaries. Each search runs inside one read transaction so every
//! step sees the same snapshot.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool, Transaction};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use quire_core::{
    defaults, micros_to_datetime, Error, NoteSearch, NoteSummary, Page, PageCursor, Result,
    SearchHit, SearchRequest, SortOrder, TagMatch,
};
use quire_search::{
    check_cursor, paginate, AnalyzerRegistry, FieldWeight, QueryPlan, RankedCandidate,
    StoredPosting,
};

use crate::pool::log_pool_metrics;

/// SQLite implementation of NoteSearch.
#[derive(Clone)]
pub struct SqliteNoteSearch {
    reader: SqlitePool,
    registry: Arc<AnalyzerRegistry>,
}

/// Validated request parameters.
struct SearchParams {
    sort: SortOrder,
    limit: usize,
    cursor: Option<PageCursor>,
    tag_ids: Vec<Uuid>,
    tag_match: TagMatch,
}

impl SearchParams {
    fn from_request(req: &SearchRequest) -> Result<Self> {
        let limit = req.effective_limit();
        if !(1..=defaults::PAGE_LIMIT_MAX).contains(&limit) {
            return Err(Error::Validation(format!(
                "limit must be between 1 and {}, got {}",
                defaults::PAGE_LIMIT_MAX,
                limit
            )));
        }

        // Without query text there is nothing to rank
        let sort = match (req.sort, req.query_text()) {
            (SortOrder::Relevance, None) => SortOrder::Newest,
            (sort, _) => sort,
        };

        let cursor = req.cursor.as_deref().map(PageCursor::decode).transpose()?;
        if let Some(cursor) = &cursor {
            check_cursor(cursor, sort)?;
        }

        let tag_ids: BTreeSet<Uuid> = req.tag_ids.iter().copied().collect();
        Ok(Self {
            sort,
            limit: limit as usize,
            cursor,
            tag_ids: tag_ids.into_iter().collect(),
            tag_match: req.tag_match,
        })
    }
}

/// Append the tag filter for a `note` table aliased `n`.
fn push_tag_filter(builder: &mut QueryBuilder<'_, Sqlite>, tag_ids: &[Uuid], mode: TagMatch) {
    if tag_ids.is_empty() {
        return;
    }
    match mode {
        TagMatch::All => builder.push(
            " AND (SELECT COUNT(DISTINCT nt.tag_id) FROM note_tag nt \
             WHERE nt.note_id = n.id AND nt.tag_id IN (",
        ),
        TagMatch::Any => builder.push(
            " AND EXISTS (SELECT 1 FROM note_tag nt \
             WHERE nt.note_id = n.id AND nt.tag_id IN (",
        ),
    };
    let mut list = builder.separated(", ");
    for tag_id in tag_ids {
        list.push_bind(*tag_id);
    }
    match mode {
        TagMatch::All => {
            builder.push(")) = ");
            builder.push_bind(tag_ids.len() as i64);
        }
        TagMatch::Any => {
            builder.push("))");
        }
    }
}

fn snippet(body: &str) -> String {
    body.chars().take(defaults::SNIPPET_LENGTH).collect()
}

impl SqliteNoteSearch {
    pub fn new(reader: SqlitePool, registry: Arc<AnalyzerRegistry>) -> Self {
        Self { reader, registry }
    }

    /// Run a search that stops early when `cancel` fires or the request's
    /// timeout elapses. Either way the caller gets `Error::Cancelled` and no
    /// partial page.
    pub async fn search_cancellable(
        &self,
        owner_id: Uuid,
        req: &SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<Page<SearchHit>> {
        let work = async {
            match req.timeout {
                Some(timeout) => tokio::time::timeout(timeout, self.execute(owner_id, req))
                    .await
                    .map_err(|_| {
                        Error::Cancelled(format!(
                            "search exceeded timeout of {} ms",
                            timeout.as_millis()
                        ))
                    })?,
                None => self.execute(owner_id, req).await,
            }
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled("search cancelled by caller".to_string())),
            result = work => result,
        };
        if let Err(Error::Cancelled(reason)) = &result {
            warn!(
                subsystem = "search",
                component = "executor",
                op = "search_notes",
                owner_id = %owner_id,
                reason = %reason,
                "Search abandoned"
            );
        }
        result
    }

    async fn execute(&self, owner_id: Uuid, req: &SearchRequest) -> Result<Page<SearchHit>> {
        let start = Instant::now();
        let params = SearchParams::from_request(req)?;

        let acquire = Instant::now();
        let mut tx = self.reader.begin().await?;
        if acquire.elapsed() >= Duration::from_millis(defaults::SLOW_ACQUIRE_MS) {
            log_pool_metrics(&self.reader, "reader");
        }
        let (ranked, next) = match req.query_text() {
            Some(query) => {
                let analyzer = match req.language.as_deref() {
                    Some(code) => self.registry.resolve(code),
                    None => self.registry.simple(),
                };
                let plan = QueryPlan::parse_with(query, analyzer, req.syntax);
                if plan.is_empty() {
                    debug!(
                        subsystem = "search",
                        component = "planner",
                        op = "search_notes",
                        "Query has no searchable terms"
                    );
                    return Ok(Page::empty());
                }
                let candidates = Self::score_candidates_tx(&mut tx, owner_id, &plan, &params).await?;
                debug!(
                    subsystem = "search",
                    component = "ranker",
                    op = "search_notes",
                    analyzer = %plan.analyzer,
                    candidate_count = candidates.len(),
                    "Candidates scored"
                );
                paginate(candidates, params.sort, params.cursor.as_ref(), params.limit)
            }
            None => Self::browse_tx(&mut tx, owner_id, &params).await?,
        };

        let ids: Vec<Uuid> = ranked.iter().map(|c| c.note_id).collect();
        let mut summaries = Self::load_summaries_tx(&mut tx, &ids).await?;
        tx.commit().await?;

        let items: Vec<SearchHit> = ranked
            .iter()
            .filter_map(|c| {
                summaries.remove(&c.note_id).map(|note| SearchHit {
                    note,
                    rank: c.score,
                })
            })
            .collect();

        debug!(
            subsystem = "search",
            component = "executor",
            op = "search_notes",
            owner_id = %owner_id,
            result_count = items.len(),
            has_more = next.is_some(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Search completed"
        );
        Ok(Page {
            items,
            next_cursor: next.map(|c| c.encode()),
        })
    }

    /// Fetch the plan's postings for live, filter-passing notes and score
    /// each note.
    async fn score_candidates_tx(
        tx: &mut Transaction<'_, Sqlite>,
        owner_id: Uuid,
        plan: &QueryPlan,
        params: &SearchParams,
    ) -> Result<Vec<RankedCandidate>> {
        let terms = plan.lookup_terms();
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT st.note_id, n.created_at, st.token, st.field, st.positions \
             FROM search_token st JOIN note n ON n.id = st.note_id \
             WHERE st.owner_id = ",
        );
        builder.push_bind(owner_id);
        builder.push(" AND st.analyzer = ");
        builder.push_bind(plan.analyzer.as_str());
        builder.push(" AND st.token IN (");
        let mut list = builder.separated(", ");
        for term in &terms {
            list.push_bind(term.as_str());
        }
        builder.push(") AND n.owner_id = ");
        builder.push_bind(owner_id);
        builder.push(" AND n.deleted_at IS NULL");
        push_tag_filter(&mut builder, &params.tag_ids, params.tag_match);

        let rows = builder.build().fetch_all(&mut **tx).await?;

        let mut by_note: HashMap<Uuid, (i64, Vec<StoredPosting>)> = HashMap::new();
        for row in rows {
            let note_id: Uuid = row.try_get("note_id")?;
            let created_at: i64 = row.try_get("created_at")?;
            let field: String = row.try_get("field")?;
            let positions: String = row.try_get("positions")?;
            let field = FieldWeight::parse(&field)
                .ok_or_else(|| Error::Integrity(format!("unknown token field {:?}", field)))?;
            by_note
                .entry(note_id)
                .or_insert_with(|| (created_at, Vec::new()))
                .1
                .push(StoredPosting {
                    term: row.try_get("token")?,
                    field,
                    positions: serde_json::from_str(&positions)?,
                });
        }

        Ok(by_note
            .into_iter()
            .filter_map(|(note_id, (created_at_micros, postings))| {
                plan.score(&postings).map(|score| RankedCandidate {
                    note_id,
                    created_at_micros,
                    score,
                })
            })
            .collect())
    }

    /// Keyset pagination by creation time when there is no query text.
    async fn browse_tx(
        tx: &mut Transaction<'_, Sqlite>,
        owner_id: Uuid,
        params: &SearchParams,
    ) -> Result<(Vec<RankedCandidate>, Option<PageCursor>)> {
        let (cmp, dir) = match params.sort {
            SortOrder::Oldest => (">", "ASC"),
            SortOrder::Newest | SortOrder::Relevance => ("<", "DESC"),
        };

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT n.id, n.created_at FROM note n WHERE n.owner_id = ");
        builder.push_bind(owner_id);
        builder.push(" AND n.deleted_at IS NULL");
        push_tag_filter(&mut builder, &params.tag_ids, params.tag_match);
        if let Some(cursor) = &params.cursor {
            builder.push(format!(" AND (n.created_at {} ", cmp));
            builder.push_bind(cursor.created_at_micros);
            builder.push(" OR (n.created_at = ");
            builder.push_bind(cursor.created_at_micros);
            builder.push(format!(" AND n.id {} ", cmp));
            builder.push_bind(cursor.id);
            builder.push("))");
        }
        builder.push(format!(" ORDER BY n.created_at {dir}, n.id {dir} LIMIT "));
        builder.push_bind(params.limit as i64 + 1);

        let rows = builder.build().fetch_all(&mut **tx).await?;
        let mut page = rows
            .iter()
            .map(|row| -> Result<RankedCandidate> {
                Ok(RankedCandidate {
                    note_id: row.try_get("id")?,
                    created_at_micros: row.try_get("created_at")?,
                    score: 0.0,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let has_more = page.len() > params.limit;
        page.truncate(params.limit);
        let next = if has_more {
            page.last().map(|c| c.cursor(params.sort))
        } else {
            None
        };
        Ok((page, next))
    }

    async fn load_summaries_tx(
        tx: &mut Transaction<'_, Sqlite>,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, NoteSummary>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, title, body, language_code, created_at, updated_at FROM note WHERE id IN (",
        );
        let mut list = builder.separated(", ");
        for id in ids {
            list.push_bind(*id);
        }
        builder.push(")");
        let rows = builder.build().fetch_all(&mut **tx).await?;

        let mut summaries = HashMap::with_capacity(rows.len());
        for row in rows {
            let body: String = row.try_get("body")?;
            let summary = NoteSummary {
                id: row.try_get("id")?,
                title: row.try_get("title")?,
                snippet: snippet(&body),
                language_code: row.try_get("language_code")?,
                created_at: micros_to_datetime(row.try_get("created_at")?),
                updated_at: micros_to_datetime(row.try_get("updated_at")?),
                tag_ids: Vec::new(),
            };
            summaries.insert(summary.id, summary);
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT note_id, tag_id FROM note_tag WHERE note_id IN (");
        let mut list = builder.separated(", ");
        for id in ids {
            list.push_bind(*id);
        }
        builder.push(") ORDER BY note_id, tag_id");
        for row in builder.build().fetch_all(&mut **tx).await? {
            let note_id: Uuid = row.try_get("note_id")?;
            if let Some(summary) = summaries.get_mut(&note_id) {
                summary.tag_ids.push(row.try_get("tag_id")?);
            }
        }
        Ok(summaries)
    }
}

#[async_trait]
impl NoteSearch for SqliteNoteSearch {
    async fn search(&self, owner_id: Uuid, req: &SearchRequest) -> Result<Page<SearchHit>> {
        self.search_cancellable(owner_id, req, &CancellationToken::new())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet_truncates_by_chars() {
        let body = "ü".repeat(300);
        assert_eq!(snippet(&body).chars().count(), defaults::SNIPPET_LENGTH);
        assert_eq!(snippet("short"), "short");
    }

    #[test]
    fn test_params_reject_out_of_range_limit() {
        for limit in [0, -1, defaults::PAGE_LIMIT_MAX + 1] {
            let req = SearchRequest::new().with_limit(limit);
            assert!(matches!(
                SearchParams::from_request(&req),
                Err(Error::Validation(_))
            ));
        }
        let req = SearchRequest::new().with_limit(defaults::PAGE_LIMIT_MAX);
        assert_eq!(SearchParams::from_request(&req).unwrap().limit, 100);
    }

    #[test]
    fn test_params_relevance_without_query_is_newest() {
        let params = SearchParams::from_request(&SearchRequest::new()).unwrap();
        assert_eq!(params.sort, SortOrder::Newest);
        assert_eq!(params.limit, defaults::PAGE_LIMIT_SEARCH as usize);

        let req = SearchRequest::new().with_query("milk");
        let params = SearchParams::from_request(&req).unwrap();
        assert_eq!(params.sort, SortOrder::Relevance);
    }

    #[test]
    fn test_params_reject_bad_cursor() {
        let req = SearchRequest::new().with_cursor("not a cursor");
        assert!(matches!(
            SearchParams::from_request(&req),
            Err(Error::Validation(_))
        ));

        // A date-ordered cursor cannot continue a relevance page
        let cursor = PageCursor::new(1, Uuid::nil()).encode();
        let req = SearchRequest::new().with_query("milk").with_cursor(cursor.clone());
        assert!(SearchParams::from_request(&req).is_err());
        let req = SearchRequest::new().with_cursor(cursor);
        assert!(SearchParams::from_request(&req).is_ok());
    }

    #[test]
    fn test_params_dedupe_tags() {
        let a = Uuid::from_u128(1);
        let req = SearchRequest::new().with_tags(vec![a, a]);
        assert_eq!(SearchParams::from_request(&req).unwrap().tag_ids, vec![a]);
    }
}
