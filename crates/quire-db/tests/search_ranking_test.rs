//! Integration tests for search ranking, filtering and pagination.

mod common;

use std::collections::HashSet;
use std::time::Duration;

use quire_db::test_fixtures::TestDatabase;
use quire_db::{
    defaults, Database, Error, NewTag, NoteInput, QuerySyntax, SearchRequest, SortOrder,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

async fn note(db: &Database, owner: Uuid, input: NoteInput) -> Uuid {
    db.upsert_note(owner, input)
        .await
        .expect("Failed to create note")
        .id
}

async fn ids(db: &Database, owner: Uuid, req: SearchRequest) -> Vec<Uuid> {
    db.search_notes(owner, &req)
        .await
        .expect("search failed")
        .items
        .into_iter()
        .map(|hit| hit.note.id)
        .collect()
}

/// Follow cursors until exhausted, collecting every id.
async fn collect_pages(db: &Database, owner: Uuid, req: SearchRequest) -> Vec<Uuid> {
    let mut all = Vec::new();
    let mut req = req;
    loop {
        let page = db.search_notes(owner, &req).await.expect("search failed");
        all.extend(page.items.iter().map(|hit| hit.note.id));
        match page.next_cursor {
            Some(cursor) => req = req.with_cursor(cursor),
            None => return all,
        }
    }
}

// =============================================================================
// RANKING
// =============================================================================

#[tokio::test]
async fn test_title_match_outranks_body_match() {
    let test_db = TestDatabase::new().await;
    let owner = TestDatabase::owner();
    let db = &test_db.db;

    let titled = note(
        db,
        owner,
        NoteInput::new("Shopping list for later").with_title("Milk"),
    )
    .await;
    let body_only = note(db, owner, NoteInput::new("Buy milk and eggs")).await;

    let page = db
        .search_notes(owner, &SearchRequest::new().with_query("milk"))
        .await
        .unwrap();
    let order: Vec<Uuid> = page.items.iter().map(|h| h.note.id).collect();
    assert_eq!(order, vec![titled, body_only]);
    assert_eq!(page.items[0].rank, 2.0);
    assert_eq!(page.items[1].rank, 1.0);
}

#[tokio::test]
async fn test_term_frequency_raises_rank() {
    let test_db = TestDatabase::new().await;
    let owner = TestDatabase::owner();
    let db = &test_db.db;

    let frequent = note(db, owner, NoteInput::new("milk, more milk, all the milk")).await;
    let once = note(db, owner, NoteInput::new("milk once")).await;

    let order = ids(db, owner, SearchRequest::new().with_query("milk")).await;
    assert_eq!(order, vec![frequent, once]);
}

#[tokio::test]
async fn test_equal_scores_order_newest_first() {
    let test_db = TestDatabase::new().await;
    let owner = TestDatabase::owner();
    let db = &test_db.db;

    let older = note(db, owner, NoteInput::new("coffee beans")).await;
    let newer = note(db, owner, NoteInput::new("coffee filters")).await;

    let order = ids(db, owner, SearchRequest::new().with_query("coffee")).await;
    assert_eq!(order, vec![newer, older]);
}

fn web(query: &str) -> SearchRequest {
    SearchRequest::new()
        .with_query(query)
        .with_syntax(QuerySyntax::Web)
}

#[tokio::test]
async fn test_query_operators() {
    let test_db = TestDatabase::new().await;
    let owner = TestDatabase::owner();
    let db = &test_db.db;

    let oat = note(db, owner, NoteInput::new("oat milk latte")).await;
    let cow = note(db, owner, NoteInput::new("whole milk latte")).await;
    let tea = note(db, owner, NoteInput::new("green tea")).await;

    assert_eq!(ids(db, owner, web("milk -oat")).await, vec![cow]);
    assert_eq!(ids(db, owner, web("\"whole milk\"")).await, vec![cow]);
    assert_eq!(ids(db, owner, web("milk tea")).await, Vec::<Uuid>::new());
    let mut any = ids(db, owner, web("oat OR tea")).await;
    any.sort();
    let mut expected = vec![oat, tea];
    expected.sort();
    assert_eq!(any, expected);

    // Nothing searchable in the query
    assert!(ids(db, owner, web("!!! ---")).await.is_empty());

    // Without web syntax the same text is taken literally
    assert_eq!(
        ids(db, owner, SearchRequest::new().with_query("milk -oat")).await,
        vec![oat]
    );
}

#[tokio::test]
async fn test_plain_query_finds_literal_text() {
    let test_db = TestDatabase::new().await;
    let owner = TestDatabase::owner();
    let db = &test_db.db;

    let weather = note(db, owner, NoteInput::new("Outside it is -5 degrees today")).await;
    let setup = note(db, owner, NoteInput::new("Press OR to continue with setup")).await;
    let chores = note(db, owner, NoteInput::new("tasks: -groceries -laundry")).await;

    for (query, expected) in [
        ("-5 degrees", weather),
        ("-5", weather),
        ("OR to continue", setup),
        ("-groceries", chores),
    ] {
        assert_eq!(
            ids(db, owner, SearchRequest::new().with_query(query)).await,
            vec![expected],
            "query {:?}",
            query
        );
    }
}

#[tokio::test]
async fn test_language_query_uses_language_tokens() {
    let test_db = TestDatabase::new().await;
    let owner = TestDatabase::owner();
    let db = &test_db.db;

    let n = note(
        db,
        owner,
        NoteInput::new("The team is running the quarterly meetings next week"),
    )
    .await;

    let english = SearchRequest::new().with_query("meeting").with_language("en");
    assert_eq!(ids(db, owner, english).await, vec![n]);
    assert!(ids(db, owner, SearchRequest::new().with_query("meeting"))
        .await
        .is_empty());

    // Unknown language codes fall back to the simple analyzer
    let unknown = SearchRequest::new().with_query("meetings").with_language("xx");
    assert_eq!(ids(db, owner, unknown).await, vec![n]);
}

// =============================================================================
// ORDERING WITHOUT QUERY
// =============================================================================

#[tokio::test]
async fn test_newest_and_oldest_ordering() {
    let test_db = TestDatabase::new().await;
    let owner = TestDatabase::owner();
    let db = &test_db.db;

    let created = common::seed_notes(db, owner, (0..5).map(|i| format!("Journal entry {}", i)))
        .await
        .unwrap();

    let oldest = ids(db, owner, SearchRequest::new().with_sort(SortOrder::Oldest)).await;
    assert_eq!(oldest, created);

    let mut reversed = created.clone();
    reversed.reverse();
    let newest = ids(db, owner, SearchRequest::new().with_sort(SortOrder::Newest)).await;
    assert_eq!(newest, reversed);

    // Relevance with no query text orders like newest
    assert_eq!(ids(db, owner, SearchRequest::new()).await, reversed);

    // Query with date sort ignores scores
    let by_date = ids(
        db,
        owner,
        SearchRequest::new()
            .with_query("journal")
            .with_sort(SortOrder::Oldest),
    )
    .await;
    assert_eq!(by_date, created);
}

// =============================================================================
// PAGINATION
// =============================================================================

#[tokio::test]
async fn test_relevance_pagination_is_stable_under_inserts() {
    let test_db = TestDatabase::new().await;
    let owner = TestDatabase::owner();
    let db = &test_db.db;

    common::init_tracing();
    let created = common::seed_notes(db, owner, (0..25).map(|i| format!("Standup notes, day {}", i)))
        .await
        .unwrap();

    let req = SearchRequest::new().with_query("standup").with_limit(10);
    let first = db.search_notes(owner, &req).await.unwrap();
    assert_eq!(first.len(), 10);
    let cursor = first.next_cursor.clone().expect("more pages");

    // A note inserted mid-pagination sorts ahead of the cursor
    let late = note(db, owner, NoteInput::new("Standup notes, late addition")).await;

    let mut seen: Vec<Uuid> = first.items.iter().map(|h| h.note.id).collect();
    seen.extend(collect_pages(db, owner, req.with_cursor(cursor)).await);

    let unique: HashSet<Uuid> = seen.iter().copied().collect();
    assert_eq!(unique.len(), seen.len(), "duplicate across pages");
    assert_eq!(seen.len(), 25);
    assert!(!unique.contains(&late));

    let mut expected = created.clone();
    expected.reverse();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn test_browse_pagination_covers_everything() {
    let test_db = TestDatabase::new().await;
    let owner = TestDatabase::owner();
    let db = &test_db.db;

    let created = common::seed_notes(db, owner, (0..12).map(|i| format!("Recipe card {}", i)))
        .await
        .unwrap();

    let oldest = collect_pages(
        db,
        owner,
        SearchRequest::new().with_sort(SortOrder::Oldest).with_limit(5),
    )
    .await;
    assert_eq!(oldest, created);

    let page = db
        .search_notes(owner, &SearchRequest::new().with_limit(12))
        .await
        .unwrap();
    assert_eq!(page.len(), 12);
    assert!(page.next_cursor.is_none());
}

#[tokio::test]
async fn test_invalid_limit_and_cursor() {
    let test_db = TestDatabase::new().await;
    let owner = TestDatabase::owner();
    let db = &test_db.db;
    note(db, owner, NoteInput::new("Anything at all")).await;

    for limit in [0, defaults::PAGE_LIMIT_MAX + 1] {
        let err = db
            .search_notes(owner, &SearchRequest::new().with_limit(limit))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    let err = db
        .search_notes(owner, &SearchRequest::new().with_cursor("garbage!"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    // A browse cursor cannot continue a relevance search
    let browse = db
        .search_notes(owner, &SearchRequest::new().with_limit(1))
        .await
        .unwrap();
    assert!(browse.next_cursor.is_none());
    note(db, owner, NoteInput::new("Anything else")).await;
    let browse = db
        .search_notes(owner, &SearchRequest::new().with_limit(1))
        .await
        .unwrap();
    let cursor = browse.next_cursor.expect("second page");
    let err = db
        .search_notes(
            owner,
            &SearchRequest::new().with_query("anything").with_cursor(cursor),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

// =============================================================================
// HITS
// =============================================================================

#[tokio::test]
async fn test_hit_carries_snippet_and_tags() {
    let test_db = TestDatabase::new().await;
    let owner = TestDatabase::owner();
    let db = &test_db.db;

    let body = format!("Long form {}", "lorem ipsum ".repeat(40));
    let n = note(db, owner, NoteInput::new(body.clone()).with_title("Essay")).await;
    let tag = db.create_tag(owner, NewTag::new("writing")).await.unwrap();
    db.add_tag_to_note(owner, n, tag.id, false).await.unwrap();

    let page = db
        .search_notes(owner, &SearchRequest::new().with_query("essay"))
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
    let hit = &page.items[0].note;
    assert_eq!(hit.title.as_deref(), Some("Essay"));
    assert_eq!(hit.snippet.chars().count(), defaults::SNIPPET_LENGTH);
    assert!(body.starts_with(&hit.snippet));
    assert_eq!(hit.tag_ids, vec![tag.id]);
}

#[tokio::test]
async fn test_owners_are_isolated() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    let alice = TestDatabase::owner();
    let bob = TestDatabase::owner();

    let mine = note(db, alice, NoteInput::new("alice secret plans")).await;
    note(db, bob, NoteInput::new("bob secret plans")).await;

    assert_eq!(
        ids(db, alice, SearchRequest::new().with_query("secret")).await,
        vec![mine]
    );
    assert_eq!(ids(db, alice, SearchRequest::new()).await, vec![mine]);
}

// =============================================================================
// CANCELLATION
// =============================================================================

#[tokio::test]
async fn test_cancelled_search_returns_no_page() {
    common::init_tracing();
    let test_db = TestDatabase::new().await;
    let owner = TestDatabase::owner();
    let db = &test_db.db;
    note(db, owner, NoteInput::new("Remember to buy milk")).await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = db
        .search_notes_cancellable(owner, &SearchRequest::new().with_query("milk"), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled(_)));

    let live = CancellationToken::new();
    let page = db
        .search_notes_cancellable(owner, &SearchRequest::new().with_query("milk"), &live)
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
}

#[tokio::test]
async fn test_search_timeout() {
    let test_db = TestDatabase::new().await;
    let owner = TestDatabase::owner();
    let db = &test_db.db;
    note(db, owner, NoteInput::new("Remember to buy milk")).await;

    let req = SearchRequest::new()
        .with_query("milk")
        .with_timeout(Duration::ZERO);
    let err = db.search_notes(owner, &req).await.unwrap_err();
    assert!(matches!(err, Error::Cancelled(_)));

    let req = SearchRequest::new()
        .with_query("milk")
        .with_timeout(Duration::from_secs(30));
    assert_eq!(db.search_notes(owner, &req).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_search_waits_for_busy_reader() {
    let test_db = TestDatabase::in_memory().await;
    let owner = TestDatabase::owner();
    let db = &test_db.db;

    let milk = note(db, owner, NoteInput::new("Remember to buy milk")).await;

    // The in-memory store has a single connection; hold it past the
    // slow-acquire threshold so the search logs pool health and then proceeds
    let held = db.reader_pool().acquire().await.unwrap();
    let release = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(defaults::SLOW_ACQUIRE_MS + 50)).await;
        drop(held);
    });

    let page = db
        .search_notes(owner, &SearchRequest::new().with_query("milk"))
        .await
        .unwrap();
    release.await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].note.id, milk);
}
