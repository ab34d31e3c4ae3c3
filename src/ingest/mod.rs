// src/ingest/mod.rs
pub mod config;
pub mod providers;
pub mod scheduler;
pub mod types;

use crate::ingest::types::{MessageRecord, Platform, PlatformAdapter, SourceRecord};
use chrono::NaiveDate;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use std::time::{Duration, Instant};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "digest_messages_fetched_total",
            "Messages returned by platform adapters."
        );
        describe_counter!(
            "digest_adapter_errors_total",
            "Adapter calls that failed or hit the group deadline."
        );
        describe_counter!(
            "digest_sources_skipped_total",
            "Sources dropped for an unknown or disabled platform."
        );
        describe_histogram!("digest_fetch_ms", "Adapter group fetch time in milliseconds.");
    });
}

/// Normalize post text: decode entities, strip tags, collapse whitespace.
pub fn clean_text(s: &str) -> String {
    static RE_BR: OnceCell<regex::Regex> = OnceCell::new();
    let re_br = RE_BR.get_or_init(|| regex::Regex::new(r"(?i)<br\s*/?>").unwrap());
    let mut out = re_br.replace_all(s, " ").to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    // Entities after tags, so an encoded `&lt;b&gt;` survives as text
    out = html_escape::decode_html_entities(&out).to_string();

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > 4000 {
        out = out.chars().take(4000).collect();
    }
    out
}

/// Classify a source by its tag alone. `None` means unknown.
pub fn platform_of(source: &SourceRecord) -> Option<Platform> {
    Platform::from_tag(&source.platform)
}

/// Sources split by platform, each group in input order.
#[derive(Debug, Default, Clone)]
pub struct PlatformGroups {
    pub channel_messaging: Vec<SourceRecord>,
    pub social_wall: Vec<SourceRecord>,
    pub web: Vec<SourceRecord>,
    pub unknown: Vec<SourceRecord>,
}

impl PlatformGroups {
    pub fn get(&self, platform: Platform) -> &[SourceRecord] {
        match platform {
            Platform::ChannelMessaging => &self.channel_messaging,
            Platform::SocialWall => &self.social_wall,
            Platform::Web => &self.web,
        }
    }
}

pub fn partition(sources: &[SourceRecord]) -> PlatformGroups {
    let mut groups = PlatformGroups::default();
    for s in sources {
        match platform_of(s) {
            Some(Platform::ChannelMessaging) => groups.channel_messaging.push(s.clone()),
            Some(Platform::SocialWall) => groups.social_wall.push(s.clone()),
            Some(Platform::Web) => groups.web.push(s.clone()),
            None => groups.unknown.push(s.clone()),
        }
    }
    groups
}

/// Why one platform group produced nothing this pass.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchFailure {
    #[error("{platform} adapter failed for {} source(s): {message}", .sources.len())]
    Failed {
        platform: Platform,
        sources: Vec<String>,
        message: String,
    },
    #[error(
        "{platform} adapter timed out after {}s for {} source(s)",
        .after.as_secs(),
        .sources.len()
    )]
    TimedOut {
        platform: Platform,
        sources: Vec<String>,
        after: Duration,
    },
}

impl FetchFailure {
    pub fn platform(&self) -> Platform {
        match self {
            FetchFailure::Failed { platform, .. } | FetchFailure::TimedOut { platform, .. } => {
                *platform
            }
        }
    }

    /// Names of the sources in the failed group.
    pub fn sources(&self) -> &[String] {
        match self {
            FetchFailure::Failed { sources, .. } | FetchFailure::TimedOut { sources, .. } => {
                sources
            }
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct FetchReport {
    pub messages: Vec<MessageRecord>,
    pub errors: Vec<FetchFailure>,
}

/// Fans a source list out to the registered platform adapters.
///
/// One slot per platform; an empty slot means the platform is disabled.
pub struct FetchOrchestrator {
    channel_messaging: Option<Box<dyn PlatformAdapter>>,
    social_wall: Option<Box<dyn PlatformAdapter>>,
    web: Option<Box<dyn PlatformAdapter>>,
    group_timeout: Duration,
}

impl FetchOrchestrator {
    pub fn new(group_timeout: Duration) -> Self {
        Self {
            channel_messaging: None,
            social_wall: None,
            web: None,
            group_timeout,
        }
    }

    /// Put the adapter in the slot of the platform it serves.
    pub fn with_adapter(mut self, adapter: Box<dyn PlatformAdapter>) -> Self {
        let platform = adapter.platform();
        let slot = match platform {
            Platform::ChannelMessaging => &mut self.channel_messaging,
            Platform::SocialWall => &mut self.social_wall,
            Platform::Web => &mut self.web,
        };
        if slot.is_some() {
            tracing::warn!(platform = %platform, "replacing already registered adapter");
        }
        *slot = Some(adapter);
        self
    }

    fn slot(&self, platform: Platform) -> Option<&dyn PlatformAdapter> {
        match platform {
            Platform::ChannelMessaging => self.channel_messaging.as_deref(),
            Platform::SocialWall => self.social_wall.as_deref(),
            Platform::Web => self.web.as_deref(),
        }
    }

    pub fn enabled_platforms(&self) -> Vec<Platform> {
        Platform::ALL
            .into_iter()
            .filter(|p| self.slot(*p).is_some())
            .collect()
    }

    /// Fetch everything new for `sources`, bounded above by `upper_bound`.
    ///
    /// A failing or slow adapter only costs its own group; the other groups'
    /// messages are still returned.
    pub async fn fetch(
        &self,
        sources: &[SourceRecord],
        upper_bound: Option<NaiveDate>,
    ) -> FetchReport {
        if sources.is_empty() {
            return FetchReport::default();
        }
        ensure_metrics_described();

        let groups = partition(sources);
        for s in &groups.unknown {
            tracing::warn!(
                source = %s.name,
                platform = %s.platform,
                link = %s.link,
                "unrecognized platform tag, source skipped"
            );
            counter!("digest_sources_skipped_total").increment(1);
        }

        let mut dispatch = 0usize;
        for platform in Platform::ALL {
            let group = groups.get(platform);
            if group.is_empty() {
                continue;
            }
            if self.slot(platform).is_none() {
                tracing::warn!(
                    platform = %platform,
                    count = group.len(),
                    "adapter disabled, skipping sources"
                );
                counter!("digest_sources_skipped_total").increment(group.len() as u64);
            } else {
                dispatch += 1;
            }
        }
        if dispatch == 0 {
            return FetchReport::default();
        }

        let (cm_sources, sw_sources, web_sources) = (
            groups.get(Platform::ChannelMessaging),
            groups.get(Platform::SocialWall),
            groups.get(Platform::Web),
        );
        let (cm, sw, web) = tokio::join!(
            self.run_group(Platform::ChannelMessaging, cm_sources, upper_bound),
            self.run_group(Platform::SocialWall, sw_sources, upper_bound),
            self.run_group(Platform::Web, web_sources, upper_bound),
        );

        let mut report = FetchReport::default();
        for outcome in [cm, sw, web].into_iter().flatten() {
            match outcome {
                Ok(mut v) => report.messages.append(&mut v),
                Err(e) => report.errors.push(e),
            }
        }
        report
    }

    async fn run_group(
        &self,
        platform: Platform,
        group: &[SourceRecord],
        upper_bound: Option<NaiveDate>,
    ) -> Option<Result<Vec<MessageRecord>, FetchFailure>> {
        if group.is_empty() {
            return None;
        }
        let adapter = self.slot(platform)?;

        let t0 = Instant::now();
        let res = tokio::time::timeout(self.group_timeout, adapter.fetch(group, upper_bound)).await;
        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("digest_fetch_ms", "platform" => platform.as_str()).record(ms);

        let names = || group.iter().map(|s| s.name.clone()).collect::<Vec<_>>();
        let outcome = match res {
            Ok(Ok(messages)) => {
                tracing::info!(
                    platform = %platform,
                    sources = group.len(),
                    count = messages.len(),
                    "adapter finished"
                );
                counter!("digest_messages_fetched_total", "platform" => platform.as_str())
                    .increment(messages.len() as u64);
                Ok(messages)
            }
            Ok(Err(e)) => {
                tracing::warn!(platform = %platform, error = ?e, "adapter failed");
                counter!("digest_adapter_errors_total", "platform" => platform.as_str())
                    .increment(1);
                Err(FetchFailure::Failed {
                    platform,
                    sources: names(),
                    message: format!("{e:#}"),
                })
            }
            Err(_) => {
                tracing::warn!(
                    platform = %platform,
                    timeout_secs = self.group_timeout.as_secs(),
                    "adapter timed out"
                );
                counter!("digest_adapter_errors_total", "platform" => platform.as_str())
                    .increment(1);
                Err(FetchFailure::TimedOut {
                    platform,
                    sources: names(),
                    after: self.group_timeout,
                })
            }
        };
        Some(outcome)
    }

    /// Tear down every registered adapter once.
    pub async fn close(&self) {
        for platform in Platform::ALL {
            if let Some(a) = self.slot(platform) {
                a.close().await;
            }
        }
    }
}
