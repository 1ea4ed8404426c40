//! Shared helpers for quire-db integration tests.

#![allow(dead_code)]

use anyhow::Context;
use quire_db::{Database, NoteInput};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

/// Route `tracing` output through the test harness.
///
/// Filter with `RUST_LOG` (default: `quire_db=debug,quire_search=debug`).
/// Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "quire_db=debug,quire_search=debug".into());
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

/// Create one note per body, in order, returning their ids.
pub async fn seed_notes<I, S>(db: &Database, owner: Uuid, bodies: I) -> anyhow::Result<Vec<Uuid>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut ids = Vec::new();
    for body in bodies {
        let body = body.into();
        let note = db
            .upsert_note(owner, NoteInput::new(body.clone()))
            .await
            .with_context(|| format!("seeding note {:?}", body))?;
        ids.push(note.id);
    }
    Ok(ids)
}
