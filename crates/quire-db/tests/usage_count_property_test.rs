//! Property test: `usage_count` always equals the number of associations.
//!
//! Random sequences of adds, removes, replacements, merges and deletes run
//! against a fresh database per case. Only not-found targets and a merge
//! into one of its own sources may fail; any other error fails the case, and
//! the counters must be exact after every step.

use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use quire_db::test_fixtures::TestDatabase;
use quire_db::{Database, Error, NewTag, NoteInput};
use uuid::Uuid;

const NOTES: usize = 4;
const TAGS: usize = 4;

#[derive(Debug, Clone)]
enum Op {
    Add(usize, usize),
    Remove(usize, usize),
    Set(usize, Vec<usize>),
    Merge(Vec<usize>, usize),
    DeleteNote(usize),
    DeleteTag(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..NOTES, 0..TAGS).prop_map(|(n, t)| Op::Add(n, t)),
        2 => (0..NOTES, 0..TAGS).prop_map(|(n, t)| Op::Remove(n, t)),
        2 => (0..NOTES, prop::collection::vec(0..TAGS, 0..4)).prop_map(|(n, ts)| Op::Set(n, ts)),
        1 => (prop::collection::vec(0..TAGS, 1..3), 0..TAGS).prop_map(|(s, t)| Op::Merge(s, t)),
        1 => (0..NOTES).prop_map(Op::DeleteNote),
        1 => (0..TAGS).prop_map(Op::DeleteTag),
    ]
}

async fn apply(
    db: &Database,
    owner: Uuid,
    notes: &[Uuid],
    tags: &[Uuid],
    op: &Op,
) -> Result<(), TestCaseError> {
    let result = match op {
        Op::Add(n, t) => db.add_tag_to_note(owner, notes[*n], tags[*t], false).await,
        Op::Remove(n, t) => db.remove_tag_from_note(owner, notes[*n], tags[*t]).await,
        Op::Set(n, ts) => {
            let ids: Vec<Uuid> = ts.iter().map(|t| tags[*t]).collect();
            db.set_note_tags(owner, notes[*n], &ids).await
        }
        Op::Merge(sources, target) => {
            let ids: Vec<Uuid> = sources.iter().map(|t| tags[*t]).collect();
            db.merge_tags(owner, &ids, tags[*target]).await.map(|_| ())
        }
        Op::DeleteNote(n) => db.delete_note(owner, notes[*n]).await,
        Op::DeleteTag(t) => db.delete_tag(owner, tags[*t]).await,
    };
    match (op, result) {
        (_, Ok(())) => Ok(()),
        (_, Err(Error::NoteNotFound(_) | Error::TagNotFound(_))) => Ok(()),
        (Op::Merge(sources, target), Err(Error::Conflict(_))) if sources.contains(target) => Ok(()),
        (op, Err(e)) => Err(TestCaseError::fail(format!("{:?} failed: {:?}", op, e))),
    }
}

async fn check_counts(db: &Database, owner: Uuid) -> Result<(), TestCaseError> {
    for entry in db.list_tags(owner).await.expect("list failed") {
        let actual: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM note_tag WHERE tag_id = ?")
            .bind(entry.id)
            .fetch_one(db.pool())
            .await
            .expect("count failed");
        prop_assert_eq!(entry.usage_count, actual, "tag {}", entry.name);
    }
    let report = db.verify_integrity(Some(owner)).await.expect("verify failed");
    prop_assert!(report.is_clean(), "{:?}", report);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_usage_count_matches_associations(ops in prop::collection::vec(op_strategy(), 1..30)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("Failed to build runtime");

        rt.block_on(async {
            let test_db = TestDatabase::in_memory().await;
            let db = &test_db.db;
            let owner = TestDatabase::owner();

            let mut notes = Vec::new();
            for i in 0..NOTES {
                let note = db
                    .upsert_note(owner, NoteInput::new(format!("Property note {}", i)))
                    .await
                    .expect("Failed to create note");
                notes.push(note.id);
            }
            let mut tags = Vec::new();
            for i in 0..TAGS {
                let tag = db
                    .create_tag(owner, NewTag::new(format!("tag-{}", i)))
                    .await
                    .expect("Failed to create tag");
                tags.push(tag.id);
            }

            for op in &ops {
                apply(db, owner, &notes, &tags, op).await?;
                check_counts(db, owner).await?;
            }
            Ok::<(), TestCaseError>(())
        })?;
    }
}
