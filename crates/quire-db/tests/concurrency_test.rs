//! Concurrency tests: racing association changes, merges and searches.
//!
//! All mutations funnel through the single writer connection, so these
//! tests check that interleaved callers still leave exact counters behind
//! and that readers keep working while writes are in flight.

use futures::future::join_all;
use quire_db::test_fixtures::TestDatabase;
use quire_db::{NewTag, NoteInput, SearchRequest};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_adds_count_once() {
    let test_db = TestDatabase::new().await;
    let owner = TestDatabase::owner();
    let db = test_db.db.clone();

    let tag = db.create_tag(owner, NewTag::new("shared")).await.unwrap();
    let note = db
        .upsert_note(owner, NoteInput::new("Contended note"))
        .await
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let db = db.clone();
            tokio::spawn(async move { db.add_tag_to_note(owner, note.id, tag.id, false).await })
        })
        .collect();
    for result in join_all(handles).await {
        result.expect("task panicked").expect("add failed");
    }

    assert_eq!(db.get_tag(owner, tag.id).await.unwrap().usage_count, 1);
    assert_eq!(db.tags_for_note(owner, note.id).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_merge_racing_with_adds_keeps_counts_exact() {
    let test_db = TestDatabase::new().await;
    let owner = TestDatabase::owner();
    let db = test_db.db.clone();

    let source = db.create_tag(owner, NewTag::new("source")).await.unwrap();
    let target = db.create_tag(owner, NewTag::new("target")).await.unwrap();
    let mut notes = Vec::new();
    for i in 0..10 {
        notes.push(
            db.upsert_note(owner, NoteInput::new(format!("Racing note {}", i)))
                .await
                .unwrap()
                .id,
        );
    }

    let mut handles = Vec::new();
    for (i, note_id) in notes.iter().copied().enumerate() {
        let db = db.clone();
        let tag_id = if i % 2 == 0 { source.id } else { target.id };
        handles.push(tokio::spawn(async move {
            // Adds to the source may land after the merge deleted it
            let _ = db.add_tag_to_note(owner, note_id, tag_id, false).await;
        }));
    }
    let merger = {
        let db = db.clone();
        tokio::spawn(async move { db.merge_tags(owner, &[source.id], target.id).await })
    };
    for handle in handles {
        handle.await.expect("task panicked");
    }
    merger.await.expect("task panicked").expect("merge failed");

    let report = db.verify_integrity(Some(owner)).await.unwrap();
    assert!(report.is_clean(), "{:?}", report);

    let tagged = db
        .search_notes(owner, &SearchRequest::new().with_tags(vec![target.id]))
        .await
        .unwrap();
    let target_tag = db.get_tag(owner, target.id).await.unwrap();
    assert_eq!(target_tag.usage_count, tagged.len() as i64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_searches_run_alongside_writes() {
    let test_db = TestDatabase::new().await;
    let owner = TestDatabase::owner();
    let db = test_db.db.clone();

    let writers: Vec<_> = (0..20)
        .map(|i| {
            let db = db.clone();
            tokio::spawn(async move {
                db.upsert_note(owner, NoteInput::new(format!("Parallel milk note {}", i)))
                    .await
            })
        })
        .collect();
    let readers: Vec<_> = (0..20)
        .map(|_| {
            let db = db.clone();
            tokio::spawn(async move {
                db.search_notes(owner, &SearchRequest::new().with_query("milk"))
                    .await
            })
        })
        .collect();

    for result in join_all(writers).await {
        result.expect("task panicked").expect("write failed");
    }
    for result in join_all(readers).await {
        let page = result.expect("task panicked").expect("search failed");
        assert!(page.len() <= 20);
    }

    let page = db
        .search_notes(owner, &SearchRequest::new().with_query("milk").with_limit(50))
        .await
        .unwrap();
    assert_eq!(page.len(), 20);
}
