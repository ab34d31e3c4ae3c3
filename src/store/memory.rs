use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;

use super::{ImportSummary, SourceStore, SourceTable};
use crate::ingest::config::Department;
use crate::ingest::types::{MessageRecord, SourceId, SourceRecord};

/// Process-local store. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: Mutex<SourceTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sources(records: Vec<SourceRecord>) -> Self {
        Self {
            table: Mutex::new(SourceTable::from_records(records)),
        }
    }

    pub fn snapshot(&self) -> Vec<SourceRecord> {
        self.table.lock().records()
    }

    pub fn watermark(&self, id: SourceId) -> Option<NaiveDate> {
        self.table
            .lock()
            .sources
            .iter()
            .find(|s| s.record.id == id)
            .and_then(|s| s.record.last_seen_date)
    }
}

#[async_trait::async_trait]
impl SourceStore for MemoryStore {
    async fn list_sources(&self) -> Result<Vec<SourceRecord>> {
        Ok(self.snapshot())
    }

    async fn advance_watermarks(
        &self,
        messages: &[MessageRecord],
    ) -> Result<BTreeMap<SourceId, NaiveDate>> {
        Ok(self.table.lock().advance(messages, Utc::now()))
    }

    async fn import_catalog(&self, departments: &[Department]) -> Result<ImportSummary> {
        Ok(self.table.lock().import(departments, Utc::now()))
    }
}
