// tests/common/mod.rs
// Shared doubles for the integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use parking_lot::Mutex;

use dept_digest::{
    DeliveryChannel, MessageRecord, Platform, PlatformAdapter, SourceId, SourceRecord,
};

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn msk() -> FixedOffset {
    FixedOffset::east_opt(3 * 3600).unwrap()
}

pub fn at_noon(date: NaiveDate) -> DateTime<FixedOffset> {
    msk()
        .from_local_datetime(&date.and_hms_opt(12, 0, 0).unwrap())
        .single()
        .unwrap()
}

pub fn source(id: u64, name: &str, platform: &str, last_seen: Option<NaiveDate>) -> SourceRecord {
    SourceRecord {
        id: SourceId(id),
        name: name.to_string(),
        link: format!("https://example.test/{name}"),
        platform: platform.to_string(),
        contact: String::new(),
        last_seen_date: last_seen,
    }
}

pub fn message(src: &SourceRecord, date: NaiveDate, body: &str) -> MessageRecord {
    MessageRecord::from_source(src, at_noon(date), body.to_string(), None)
}

enum Behaviour {
    /// One message per source dated `date`.
    OnePerSource(NaiveDate),
    Fail(String),
    Hang(Duration),
}

/// Adapter double that counts calls and answers from a fixed script.
pub struct MockAdapter {
    platform: Platform,
    behaviour: Behaviour,
    pub calls: Arc<AtomicUsize>,
    pub closed: Arc<AtomicUsize>,
}

impl MockAdapter {
    fn with(platform: Platform, behaviour: Behaviour) -> Self {
        Self {
            platform,
            behaviour,
            calls: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn returning(platform: Platform, date: NaiveDate) -> Self {
        Self::with(platform, Behaviour::OnePerSource(date))
    }

    pub fn failing(platform: Platform, msg: &str) -> Self {
        Self::with(platform, Behaviour::Fail(msg.to_string()))
    }

    pub fn hanging(platform: Platform, d: Duration) -> Self {
        Self::with(platform, Behaviour::Hang(d))
    }

    pub fn call_count(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl PlatformAdapter for MockAdapter {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn fetch(
        &self,
        sources: &[SourceRecord],
        _upper_bound: Option<NaiveDate>,
    ) -> Result<Vec<MessageRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behaviour {
            Behaviour::OnePerSource(date) => Ok(sources
                .iter()
                .map(|s| message(s, *date, &format!("news from {}", s.name)))
                .collect()),
            Behaviour::Fail(msg) => Err(anyhow!("{msg}")),
            Behaviour::Hang(d) => {
                tokio::time::sleep(*d).await;
                Ok(Vec::new())
            }
        }
    }

    async fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Delivery double that keeps every sent text, optionally failing one chat.
#[derive(Default)]
pub struct RecordingChannel {
    pub sent: Mutex<Vec<(i64, String)>>,
    pub fail_chat: Option<i64>,
}

impl RecordingChannel {
    pub fn failing_for(chat: i64) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_chat: Some(chat),
        }
    }

    pub fn sent_to(&self, chat: i64) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter(|(c, _)| *c == chat)
            .map(|(_, t)| t.clone())
            .collect()
    }
}

#[async_trait]
impl DeliveryChannel for RecordingChannel {
    async fn send(&self, destination: i64, text: &str) -> Result<()> {
        if self.fail_chat == Some(destination) {
            return Err(anyhow!("chat {destination} unreachable"));
        }
        self.sent.lock().push((destination, text.to_string()));
        Ok(())
    }
}
