use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use tokio::{fs, sync::Mutex};

use super::{ImportSummary, SourceStore, SourceTable};
use crate::ingest::config::Department;
use crate::ingest::types::{MessageRecord, SourceId, SourceRecord};

/// Catalog + watermarks kept in one JSON document.
///
/// Every mutation is read-modify-write under one lock and lands through a
/// temp file + rename, so a batch is either fully on disk or not at all.
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty catalog.
    async fn load(&self) -> Result<SourceTable> {
        match fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("parsing store {}", self.path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SourceTable::default()),
            Err(e) => Err(e).with_context(|| format!("reading store {}", self.path.display())),
        }
    }

    async fn save(&self, table: &SourceTable) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        let body = serde_json::to_vec_pretty(table).context("serializing store")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl SourceStore for JsonFileStore {
    async fn list_sources(&self) -> Result<Vec<SourceRecord>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.records())
    }

    async fn advance_watermarks(
        &self,
        messages: &[MessageRecord],
    ) -> Result<BTreeMap<SourceId, NaiveDate>> {
        let _guard = self.lock.lock().await;
        let mut table = self.load().await?;
        let moved = table.advance(messages, Utc::now());
        if !moved.is_empty() {
            self.save(&table).await?;
        }
        Ok(moved)
    }

    async fn import_catalog(&self, departments: &[Department]) -> Result<ImportSummary> {
        let _guard = self.lock.lock().await;
        let mut table = self.load().await?;
        let summary = table.import(departments, Utc::now());
        self.save(&table).await?;
        Ok(summary)
    }
}
