// src/store/mod.rs
//! Source catalog persistence. Watermarks are only ever written through
//! [`SourceStore::advance_watermarks`] (conditional max) or a catalog import.
pub mod json_file;
pub mod memory;

use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::ingest::config::Department;
use crate::ingest::types::{MessageRecord, Platform, SourceId, SourceRecord};
use crate::watermark;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

#[async_trait::async_trait]
pub trait SourceStore: Send + Sync {
    async fn list_sources(&self) -> Result<Vec<SourceRecord>>;

    /// Apply the conditional-max rule for the batch in one commit.
    /// Returns only the watermarks that moved.
    async fn advance_watermarks(
        &self,
        messages: &[MessageRecord],
    ) -> Result<BTreeMap<SourceId, NaiveDate>>;

    async fn import_catalog(&self, departments: &[Department]) -> Result<ImportSummary>;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredSource {
    #[serde(flatten)]
    pub record: SourceRecord,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// The whole catalog as one document; both stores mutate it the same way.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SourceTable {
    #[serde(default = "first_id")]
    pub next_id: u64,
    #[serde(default)]
    pub sources: Vec<StoredSource>,
}

fn first_id() -> u64 {
    1
}

impl SourceTable {
    pub fn from_records(records: Vec<SourceRecord>) -> Self {
        let next_id = records.iter().map(|r| r.id.0).max().unwrap_or(0) + 1;
        Self {
            next_id,
            sources: records
                .into_iter()
                .map(|record| StoredSource {
                    record,
                    updated_at: None,
                })
                .collect(),
        }
    }

    pub fn records(&self) -> Vec<SourceRecord> {
        self.sources.iter().map(|s| s.record.clone()).collect()
    }

    fn alloc_id(&mut self) -> SourceId {
        let floor = self.sources.iter().map(|s| s.record.id.0).max().unwrap_or(0) + 1;
        let id = SourceId(self.next_id.max(floor));
        self.next_id = id.0 + 1;
        id
    }

    /// Messages for ids not in the table are ignored.
    pub fn advance(
        &mut self,
        messages: &[MessageRecord],
        now: DateTime<Utc>,
    ) -> BTreeMap<SourceId, NaiveDate> {
        let current: HashMap<SourceId, Option<NaiveDate>> = self
            .sources
            .iter()
            .map(|s| (s.record.id, s.record.last_seen_date))
            .collect();
        let moved: BTreeMap<SourceId, NaiveDate> = watermark::changed(messages, &current)
            .into_iter()
            .filter(|(id, _)| current.contains_key(id))
            .collect();
        for s in self.sources.iter_mut() {
            if let Some(next) = moved.get(&s.record.id) {
                s.record.last_seen_date = Some(*next);
                s.updated_at = Some(now);
            }
        }
        moved
    }

    /// Upsert by `(name, platform)`; drops links a listed department no longer has.
    pub fn import(&mut self, departments: &[Department], now: DateTime<Utc>) -> ImportSummary {
        let mut summary = ImportSummary::default();
        for dep in departments {
            let links = dep.links();
            for (platform, link) in &links {
                let existing = self.sources.iter_mut().find(|s| {
                    s.record.name == dep.name
                        && Platform::from_tag(&s.record.platform) == Some(*platform)
                });
                match existing {
                    Some(s) => {
                        s.record.link = link.to_string();
                        s.record.contact = dep.contact.clone();
                        s.record.platform = platform.as_str().to_string();
                        if let Some(d) = dep.last_date {
                            s.record.last_seen_date = Some(d);
                            s.updated_at = Some(now);
                        }
                        summary.updated += 1;
                    }
                    None => {
                        let id = self.alloc_id();
                        self.sources.push(StoredSource {
                            record: SourceRecord {
                                id,
                                name: dep.name.clone(),
                                link: link.to_string(),
                                platform: platform.as_str().to_string(),
                                contact: dep.contact.clone(),
                                last_seen_date: dep.last_date,
                            },
                            updated_at: Some(now),
                        });
                        summary.added += 1;
                    }
                }
            }

            let before = self.sources.len();
            self.sources.retain(|s| {
                s.record.name != dep.name
                    || match Platform::from_tag(&s.record.platform) {
                        Some(p) => links.iter().any(|(lp, _)| *lp == p),
                        None => true,
                    }
            });
            summary.removed += before - self.sources.len();
        }
        summary
    }
}
