// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of platforms a source can live on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Platform {
    ChannelMessaging,
    SocialWall,
    Web,
}

impl Platform {
    pub const ALL: [Platform; 3] = [
        Platform::ChannelMessaging,
        Platform::SocialWall,
        Platform::Web,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::ChannelMessaging => "channel-messaging",
            Platform::SocialWall => "social-wall",
            Platform::Web => "web",
        }
    }

    /// Exact tag match. `tg` / `vk` are the short tags older stores wrote.
    pub fn from_tag(tag: &str) -> Option<Platform> {
        match tag.trim() {
            "channel-messaging" | "tg" => Some(Platform::ChannelMessaging),
            "social-wall" | "vk" => Some(Platform::SocialWall),
            "web" => Some(Platform::Web),
            _ => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable key assigned by the store; watermark updates join on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(pub u64);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceRecord {
    pub id: SourceId,
    pub name: String,
    pub link: String,
    /// Raw tag as stored; classify with [`crate::ingest::platform_of`].
    pub platform: String,
    #[serde(default)]
    pub contact: String,
    #[serde(default)]
    pub last_seen_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageRecord {
    pub source_id: SourceId,
    pub source_name: String,
    pub source_link: String,
    pub contact: String,
    pub timestamp: DateTime<FixedOffset>, // digest time zone
    pub body: String,                     // cleaned by the adapter
    pub url: Option<String>,
}

impl MessageRecord {
    /// Copies the denormalized source fields; later source edits are not reflected.
    pub fn from_source(
        source: &SourceRecord,
        timestamp: DateTime<FixedOffset>,
        body: String,
        url: Option<String>,
    ) -> Self {
        Self {
            source_id: source.id,
            source_name: source.name.clone(),
            source_link: source.link.clone(),
            contact: source.contact.clone(),
            timestamp,
            body,
            url,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// The `(last_seen, upper_bound]` window an adapter must keep messages in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub last_seen: Option<NaiveDate>,
    pub upper_bound: Option<NaiveDate>,
}

impl FetchWindow {
    pub fn new(last_seen: Option<NaiveDate>, upper_bound: Option<NaiveDate>) -> Self {
        Self {
            last_seen,
            upper_bound,
        }
    }

    pub fn for_source(source: &SourceRecord, upper_bound: Option<NaiveDate>) -> Self {
        Self::new(source.last_seen_date, upper_bound)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.last_seen.map_or(true, |seen| date > seen)
            && self.upper_bound.map_or(true, |bound| date <= bound)
    }

    /// True once a newest-first stream has walked past the watermark.
    pub fn is_exhausted_at(&self, date: NaiveDate) -> bool {
        self.last_seen.is_some_and(|seen| date <= seen)
    }
}

/// One fetch capability per platform. Implementations own their client/session.
#[async_trait::async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Fetch new messages for every source of the batch, in the adapter's own order.
    async fn fetch(
        &self,
        sources: &[SourceRecord],
        upper_bound: Option<NaiveDate>,
    ) -> Result<Vec<MessageRecord>>;

    /// Release held sessions; called once at shutdown.
    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn tags_parse_exactly() {
        assert_eq!(Platform::from_tag("channel-messaging"), Some(Platform::ChannelMessaging));
        assert_eq!(Platform::from_tag("vk"), Some(Platform::SocialWall));
        assert_eq!(Platform::from_tag(" web "), Some(Platform::Web));
        assert_eq!(Platform::from_tag("Web"), None);
        assert_eq!(Platform::from_tag("unknown-cms"), None);
        assert_eq!(Platform::from_tag("https://t.me/x"), None);
    }

    #[test]
    fn window_is_open_below_closed_above() {
        let w = FetchWindow::new(Some(d("2026-02-01")), Some(d("2026-02-10")));
        assert!(!w.contains(d("2026-02-01")));
        assert!(w.contains(d("2026-02-02")));
        assert!(w.contains(d("2026-02-10")));
        assert!(!w.contains(d("2026-02-11")));
        assert!(w.is_exhausted_at(d("2026-01-31")));
        assert!(!w.is_exhausted_at(d("2026-02-11")));
    }

    #[test]
    fn unbounded_window_takes_everything() {
        let w = FetchWindow::new(None, None);
        assert!(w.contains(d("1999-01-01")));
        assert!(!w.is_exhausted_at(d("1999-01-01")));
    }

    #[test]
    fn platform_serializes_as_kebab_tag() {
        let s = serde_json::to_string(&Platform::SocialWall).unwrap();
        assert_eq!(s, "\"social-wall\"");
    }
}
