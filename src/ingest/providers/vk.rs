// src/ingest/providers/vk.rs
//! Community walls via the `wall.get` API method.
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{FixedOffset, NaiveDate, TimeZone};
use serde::Deserialize;
use std::time::Duration;

use crate::ingest::clean_text;
use crate::ingest::providers::{fetch_each, http_client};
use crate::ingest::types::{FetchWindow, MessageRecord, Platform, PlatformAdapter, SourceRecord};

#[derive(Debug, Clone)]
pub struct VkWallConfig {
    pub token: String,
    pub api_version: String,
    pub api_base: String,
    pub page_size: u32,
    pub max_pages: u32,
    pub tz: FixedOffset,
    pub request_timeout: Duration,
}

impl VkWallConfig {
    pub fn new(token: String, tz: FixedOffset) -> Self {
        Self {
            token,
            api_version: "5.199".to_string(),
            api_base: "https://api.vk.com/method".to_string(),
            page_size: 50,
            max_pages: 2,
            tz,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// How `wall.get` addresses a community.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WallOwner {
    /// Numeric community id (always positive), sent as the negative `owner_id`.
    Community(i64),
    /// Screen name, sent as `domain`.
    Domain(String),
}

#[derive(Debug, Deserialize)]
struct WallEnvelope {
    response: Option<WallPage>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error_code: i64,
    #[serde(default)]
    error_msg: String,
}

#[derive(Debug, Deserialize)]
struct WallPage {
    #[serde(default)]
    items: Vec<WallPost>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct WallPost {
    pub id: i64,
    pub owner_id: i64,
    pub date: i64, // unix seconds
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub is_pinned: u8,
}

pub struct VkWallAdapter {
    client: reqwest::Client,
    cfg: VkWallConfig,
}

impl VkWallAdapter {
    /// Fails fast on a missing token instead of failing every fetch later.
    pub fn connect(cfg: VkWallConfig) -> Result<Self> {
        if cfg.token.trim().is_empty() {
            bail!("wall API token is empty");
        }
        if cfg.page_size == 0 || cfg.max_pages == 0 {
            bail!("wall API paging must be non-zero");
        }
        let client = http_client(cfg.request_timeout).context("building wall API client")?;
        tracing::info!(version = %cfg.api_version, "wall API adapter ready");
        Ok(Self { client, cfg })
    }

    /// Last path segment; `public123` / `club123` become community 123.
    pub fn wall_owner(link: &str) -> Option<WallOwner> {
        let last = link.trim().trim_end_matches('/').rsplit('/').next()?.trim();
        if last.is_empty() {
            return None;
        }
        for prefix in ["public", "club"] {
            if let Some(n) = last.strip_prefix(prefix).and_then(positive_id) {
                return Some(WallOwner::Community(n));
            }
        }
        // a bare `-123` is the owner_id form of community 123
        match positive_id(last.strip_prefix('-').unwrap_or(last)) {
            Some(n) => Some(WallOwner::Community(n)),
            None => Some(WallOwner::Domain(last.to_string())),
        }
    }

    /// Decode one `wall.get` answer; an API error envelope becomes `Err`.
    pub fn parse_wall(body: &str) -> Result<Vec<WallPost>> {
        let env: WallEnvelope = serde_json::from_str(body).context("parsing wall.get response")?;
        if let Some(e) = env.error {
            return Err(anyhow!("wall.get error {}: {}", e.error_code, e.error_msg));
        }
        let page = env
            .response
            .ok_or_else(|| anyhow!("wall.get response without a body"))?;
        Ok(page.items)
    }

    async fn fetch_source(
        &self,
        source: &SourceRecord,
        upper_bound: Option<NaiveDate>,
    ) -> Result<Vec<MessageRecord>> {
        let owner = Self::wall_owner(&source.link)
            .ok_or_else(|| anyhow!("no community in {:?}", source.link))?;
        let window = FetchWindow::for_source(source, upper_bound);
        let url = format!("{}/wall.get", self.cfg.api_base.trim_end_matches('/'));

        let mut out = Vec::new();
        let mut offset = 0u32;
        'pages: for _ in 0..self.cfg.max_pages {
            let mut query: Vec<(&str, String)> = vec![
                ("access_token", self.cfg.token.clone()),
                ("v", self.cfg.api_version.clone()),
                ("count", self.cfg.page_size.to_string()),
                ("offset", offset.to_string()),
                ("filter", "owner".to_string()),
            ];
            match &owner {
                WallOwner::Community(n) => query.push(("owner_id", (-n).to_string())),
                WallOwner::Domain(d) => query.push(("domain", d.clone())),
            }

            let body = self
                .client
                .get(&url)
                .query(&query)
                .send()
                .await
                .map_err(|e| anyhow!("wall.get request failed: {}", e.without_url()))?
                // the query string carries the access token, keep it out of errors
                .error_for_status()
                .map_err(|e| anyhow!("wall.get status: {}", e.without_url()))?
                .text()
                .await
                .map_err(|e| anyhow!("wall.get body: {}", e.without_url()))?;
            let posts = Self::parse_wall(&body)?;
            let full_page = posts.len() >= self.cfg.page_size as usize;

            for post in posts {
                // a pinned post can be arbitrarily old
                if post.is_pinned != 0 {
                    continue;
                }
                let Some(posted_at) = self.cfg.tz.timestamp_opt(post.date, 0).single() else {
                    continue;
                };
                let date = posted_at.date_naive();
                if window.is_exhausted_at(date) {
                    break 'pages;
                }
                let text = clean_text(&post.text);
                if !window.contains(date) || text.is_empty() {
                    continue;
                }
                out.push(MessageRecord::from_source(
                    source,
                    posted_at,
                    text,
                    Some(format!("https://vk.com/wall{}_{}", post.owner_id, post.id)),
                ));
            }

            if !full_page {
                break;
            }
            offset += self.cfg.page_size;
        }
        Ok(out)
    }
}

/// Digits only, at least 1. Signs, zero and overflow give `None`.
fn positive_id(s: &str) -> Option<i64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<i64>().ok().filter(|n| *n > 0)
}

#[async_trait]
impl PlatformAdapter for VkWallAdapter {
    fn platform(&self) -> Platform {
        Platform::SocialWall
    }

    async fn fetch(
        &self,
        sources: &[SourceRecord],
        upper_bound: Option<NaiveDate>,
    ) -> Result<Vec<MessageRecord>> {
        tracing::info!(count = sources.len(), "fetching community walls");
        fetch_each(Platform::SocialWall, sources, |s| self.fetch_source(s, upper_bound)).await
    }
}
