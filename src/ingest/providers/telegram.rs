// src/ingest/providers/telegram.rs
//! Public channels, read through their web preview (`/s/<channel>`).
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate};
use once_cell::sync::OnceCell;
use regex::Regex;
use std::time::Duration;

use crate::ingest::clean_text;
use crate::ingest::providers::{fetch_each, http_client};
use crate::ingest::types::{FetchWindow, MessageRecord, Platform, PlatformAdapter, SourceRecord};

#[derive(Debug, Clone)]
pub struct TelegramPreviewConfig {
    pub base_url: String,
    pub max_pages: u32,
    pub tz: FixedOffset,
    pub request_timeout: Duration,
}

impl TelegramPreviewConfig {
    pub fn new(tz: FixedOffset) -> Self {
        Self {
            base_url: "https://t.me".to_string(),
            max_pages: 2,
            tz,
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewPost {
    pub id: u64,
    pub posted_at: DateTime<FixedOffset>,
    pub text: String,
}

pub struct TelegramPreviewAdapter {
    client: reqwest::Client,
    cfg: TelegramPreviewConfig,
}

impl TelegramPreviewAdapter {
    pub fn connect(cfg: TelegramPreviewConfig) -> Result<Self> {
        if cfg.max_pages == 0 {
            return Err(anyhow!("channel preview needs at least one page"));
        }
        let client = http_client(cfg.request_timeout).context("building channel preview client")?;
        tracing::info!(
            base = %cfg.base_url,
            pages = cfg.max_pages,
            "channel preview adapter ready"
        );
        Ok(Self { client, cfg })
    }

    /// `https://t.me/name`, `t.me/s/name`, `@name` and bare `name` all give `name`.
    pub fn channel_handle(link: &str) -> Option<String> {
        let trimmed = link.trim().trim_end_matches('/');
        let last = trimmed.rsplit('/').next()?.trim_start_matches('@');
        let last = last.split(['?', '#']).next().unwrap_or_default();
        let valid = !last.is_empty() && last.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        valid.then(|| last.to_string())
    }

    /// Posts of one preview page, in page order (oldest first).
    pub fn parse_page(html: &str, tz: FixedOffset) -> Vec<PreviewPost> {
        static RE_POST: OnceCell<Regex> = OnceCell::new();
        static RE_TEXT: OnceCell<Regex> = OnceCell::new();
        static RE_TIME: OnceCell<Regex> = OnceCell::new();
        let re_post =
            RE_POST.get_or_init(|| Regex::new(r#"data-post="[^"/]+/(\d+)""#).unwrap());
        let re_text = RE_TEXT.get_or_init(|| {
            Regex::new(r#"(?s)<div class="tgme_widget_message_text[^"]*"[^>]*>(.*?)</div>"#)
                .unwrap()
        });
        let re_time =
            RE_TIME.get_or_init(|| Regex::new(r#"<time[^>]*datetime="([^"]+)""#).unwrap());

        let starts: Vec<(usize, u64)> = re_post
            .captures_iter(html)
            .filter_map(|c| {
                let m = c.get(0)?;
                Some((m.start(), c.get(1)?.as_str().parse().ok()?))
            })
            .collect();

        let mut out = Vec::with_capacity(starts.len());
        for (i, (start, id)) in starts.iter().enumerate() {
            let end = starts.get(i + 1).map(|(s, _)| *s).unwrap_or(html.len());
            let block = &html[*start..end];

            let Some(posted_at) = re_time
                .captures(block)
                .and_then(|c| DateTime::parse_from_rfc3339(c.get(1)?.as_str()).ok())
            else {
                tracing::debug!(post = id, "preview post without a timestamp skipped");
                continue;
            };
            let text = re_text
                .captures(block)
                .and_then(|c| c.get(1))
                .map(|m| clean_text(m.as_str()))
                .unwrap_or_default();

            out.push(PreviewPost {
                id: *id,
                posted_at: posted_at.with_timezone(&tz),
                text,
            });
        }
        out
    }

    async fn fetch_source(
        &self,
        source: &SourceRecord,
        upper_bound: Option<NaiveDate>,
    ) -> Result<Vec<MessageRecord>> {
        let channel = Self::channel_handle(&source.link)
            .ok_or_else(|| anyhow!("no channel handle in {:?}", source.link))?;
        let window = FetchWindow::for_source(source, upper_bound);
        let base = self.cfg.base_url.trim_end_matches('/');

        let mut out = Vec::new();
        let mut before: Option<u64> = None;
        'pages: for _ in 0..self.cfg.max_pages {
            let mut url = format!("{base}/s/{channel}");
            if let Some(b) = before {
                url.push_str(&format!("?before={b}"));
            }
            let html = self
                .client
                .get(&url)
                .send()
                .await
                .with_context(|| format!("GET {url}"))?
                .error_for_status()
                .with_context(|| format!("GET {url}"))?
                .text()
                .await
                .context("channel preview body")?;

            let posts = Self::parse_page(&html, self.cfg.tz);
            let Some(oldest) = posts.iter().map(|p| p.id).min() else {
                break;
            };

            // newest first, so the walk can stop at the watermark
            for post in posts.into_iter().rev() {
                let date = post.posted_at.date_naive();
                if window.is_exhausted_at(date) {
                    break 'pages;
                }
                if !window.contains(date) || post.text.is_empty() {
                    continue;
                }
                out.push(MessageRecord::from_source(
                    source,
                    post.posted_at,
                    post.text,
                    Some(format!("{base}/{channel}/{}", post.id)),
                ));
            }

            if oldest <= 1 {
                break;
            }
            before = Some(oldest);
        }
        Ok(out)
    }
}

#[async_trait]
impl PlatformAdapter for TelegramPreviewAdapter {
    fn platform(&self) -> Platform {
        Platform::ChannelMessaging
    }

    async fn fetch(
        &self,
        sources: &[SourceRecord],
        upper_bound: Option<NaiveDate>,
    ) -> Result<Vec<MessageRecord>> {
        tracing::info!(count = sources.len(), "fetching channel previews");
        fetch_each(Platform::ChannelMessaging, sources, |s| self.fetch_source(s, upper_bound)).await
    }

    async fn close(&self) {
        tracing::info!("channel preview adapter closed");
    }
}
