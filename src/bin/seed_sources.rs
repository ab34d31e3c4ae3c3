//! Import a department catalog into the source store.
//!
//! Usage: `seed_sources [catalog.toml|catalog.json]`. Without an argument the
//! catalog is resolved from `DIGEST_CATALOG_PATH` or `config/departments.*`.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;

use dept_digest::ingest::config::{load_catalog_default, load_catalog_from};
use dept_digest::{JsonFileStore, SourceStore};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    dept_digest::init_tracing();

    let departments = match std::env::args().nth(1) {
        Some(p) => load_catalog_from(&PathBuf::from(p))?,
        None => load_catalog_default()?,
    };
    if departments.is_empty() {
        bail!("catalog is empty or missing; nothing to import");
    }

    let state_path = std::env::var("STATE_PATH")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("state/sources.json"));
    let store = JsonFileStore::new(state_path);

    let summary = store
        .import_catalog(&departments)
        .await
        .with_context(|| format!("importing into {}", store.path().display()))?;
    tracing::info!(
        departments = departments.len(),
        added = summary.added,
        updated = summary.updated,
        removed = summary.removed,
        store = %store.path().display(),
        "catalog imported"
    );
    Ok(())
}
