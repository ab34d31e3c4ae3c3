// src/ingest/providers/web.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::time::Duration;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use crate::ingest::clean_text;
use crate::ingest::providers::{fetch_each, http_client};
use crate::ingest::types::{FetchWindow, MessageRecord, Platform, PlatformAdapter, SourceRecord};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub published: DateTime<FixedOffset>,
    pub text: String,
    pub link: Option<String>,
}

fn parse_rfc2822_to_unix(ts: &str) -> Option<i64> {
    OffsetDateTime::parse(ts.trim(), &Rfc2822)
        .ok()
        .map(|dt| dt.unix_timestamp())
}

#[derive(Debug, Clone)]
pub struct WebFeedConfig {
    pub tz: FixedOffset,
    pub request_timeout: Duration,
}

/// Department sites publishing an RSS 2.0 feed; the source link is the feed URL.
pub struct WebFeedAdapter {
    client: reqwest::Client,
    cfg: WebFeedConfig,
}

impl WebFeedAdapter {
    pub fn connect(cfg: WebFeedConfig) -> Result<Self> {
        let client = http_client(cfg.request_timeout).context("building feed client")?;
        Ok(Self { client, cfg })
    }

    /// Items in feed order. Items without a usable date are dropped: they
    /// cannot be placed against a watermark.
    pub fn parse_feed(xml: &str, tz: FixedOffset) -> Result<Vec<FeedItem>> {
        let xml_clean = scrub_html_entities_for_xml(xml);
        let rss: Rss = from_str(&xml_clean).context("parsing rss xml")?;

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            let Some(published) = it
                .pub_date
                .as_deref()
                .and_then(parse_rfc2822_to_unix)
                .and_then(|secs| tz.timestamp_opt(secs, 0).single())
            else {
                tracing::debug!(link = ?it.link, "feed item without pubDate skipped");
                continue;
            };
            let title = it.title.as_deref().map(clean_text).unwrap_or_default();
            let description = it.description.as_deref().map(clean_text).unwrap_or_default();
            let text = match (title.is_empty(), description.is_empty()) {
                (false, false) => format!("{title}. {description}"),
                (false, true) => title,
                (true, _) => description,
            };
            out.push(FeedItem {
                published,
                text,
                link: it.link.map(|l| l.trim().to_string()),
            });
        }
        Ok(out)
    }

    async fn fetch_source(
        &self,
        source: &SourceRecord,
        upper_bound: Option<NaiveDate>,
    ) -> Result<Vec<MessageRecord>> {
        let window = FetchWindow::for_source(source, upper_bound);
        let body = self
            .client
            .get(source.link.trim())
            .send()
            .await
            .with_context(|| format!("GET {}", source.link))?
            .error_for_status()
            .with_context(|| format!("GET {}", source.link))?
            .text()
            .await
            .context("feed body")?;

        // feeds are not reliably sorted, so no early stop here
        let items = Self::parse_feed(&body, self.cfg.tz)?;
        Ok(items
            .into_iter()
            .filter(|it| !it.text.is_empty() && window.contains(it.published.date_naive()))
            .map(|it| MessageRecord::from_source(source, it.published, it.text, it.link))
            .collect())
    }
}

#[async_trait]
impl PlatformAdapter for WebFeedAdapter {
    fn platform(&self) -> Platform {
        Platform::Web
    }

    async fn fetch(
        &self,
        sources: &[SourceRecord],
        upper_bound: Option<NaiveDate>,
    ) -> Result<Vec<MessageRecord>> {
        tracing::info!(count = sources.len(), "fetching site feeds");
        fetch_each(Platform::Web, sources, |s| self.fetch_source(s, upper_bound)).await
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&laquo;", "\"")
        .replace("&raquo;", "\"")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
