// tests/digest_pass.rs
mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{day, source, MockAdapter, RecordingChannel};
use dept_digest::{
    DigestComposer, DigestPipeline, FetchOrchestrator, MemoryStore, Platform, SourceId,
};

const DIGEST_CHAT: i64 = -1001;
const ALERT_CHAT: i64 = 42;

fn scenario_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_sources(vec![
        source(1, "A", "channel-messaging", Some(day(2026, 2, 1))),
        source(2, "B", "social-wall", Some(day(2026, 2, 1))),
    ]))
}

fn scenario_orchestrator() -> FetchOrchestrator {
    FetchOrchestrator::new(Duration::from_secs(300))
        .with_adapter(Box::new(MockAdapter::returning(
            Platform::ChannelMessaging,
            day(2026, 2, 10),
        )))
        .with_adapter(Box::new(MockAdapter::failing(
            Platform::SocialWall,
            "connection refused",
        )))
}

#[tokio::test]
async fn delivered_pass_advances_only_fetched_sources() {
    let store = scenario_store();
    let channel = Arc::new(RecordingChannel::default());
    let pipeline = DigestPipeline::new(
        store.clone(),
        scenario_orchestrator(),
        DigestComposer::default(),
        channel.clone(),
        DIGEST_CHAT,
    )
    .with_alert_chat(Some(ALERT_CHAT));

    let summary = pipeline.run_pass(day(2026, 2, 11)).await.unwrap();

    assert_eq!(summary.sources, 2);
    assert_eq!(summary.messages, 1);
    assert_eq!(summary.fetch_errors, 1);
    assert!(summary.delivered);
    assert_eq!(summary.watermarks_advanced, 1);

    let digests = channel.sent_to(DIGEST_CHAT);
    assert_eq!(digests.len(), 1);
    assert!(digests[0].contains("(11.02.2026)"));
    assert!(digests[0].contains("news from A"));
    assert!(digests[0].contains("Total posts: 1"));

    let alerts = channel.sent_to(ALERT_CHAT);
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].contains("social-wall"));
    assert!(alerts[0].contains("[B]"));

    assert_eq!(store.watermark(SourceId(1)), Some(day(2026, 2, 10)));
    assert_eq!(store.watermark(SourceId(2)), Some(day(2026, 2, 1)));
}

#[tokio::test]
async fn failed_delivery_keeps_watermarks_and_alerts() {
    let store = scenario_store();
    let channel = Arc::new(RecordingChannel::failing_for(DIGEST_CHAT));
    let pipeline = DigestPipeline::new(
        store.clone(),
        scenario_orchestrator(),
        DigestComposer::default(),
        channel.clone(),
        DIGEST_CHAT,
    )
    .with_alert_chat(Some(ALERT_CHAT));

    let summary = pipeline.run_pass(day(2026, 2, 11)).await.unwrap();

    assert!(!summary.delivered);
    assert_eq!(summary.watermarks_advanced, 0);
    assert_eq!(store.watermark(SourceId(1)), Some(day(2026, 2, 1)));

    let alerts = channel.sent_to(ALERT_CHAT);
    assert!(alerts.iter().any(|a| a.starts_with("Digest delivery failed")));
}

#[tokio::test]
async fn quiet_day_still_sends_placeholder() {
    let store = Arc::new(MemoryStore::with_sources(vec![source(
        1,
        "A",
        "web",
        Some(day(2026, 2, 10)),
    )]));
    let channel = Arc::new(RecordingChannel::default());
    // the adapter reports nothing new
    let orch = FetchOrchestrator::new(Duration::from_secs(300))
        .with_adapter(Box::new(MockAdapter::hanging(Platform::Web, Duration::ZERO)));
    let pipeline = DigestPipeline::new(
        store.clone(),
        orch,
        DigestComposer::default(),
        channel.clone(),
        DIGEST_CHAT,
    );

    let summary = pipeline.run_pass(day(2026, 2, 11)).await.unwrap();

    assert!(summary.delivered);
    assert_eq!(summary.messages, 0);
    let digests = channel.sent_to(DIGEST_CHAT);
    assert!(digests[0].contains("No new posts."));
    assert_eq!(store.watermark(SourceId(1)), Some(day(2026, 2, 10)));
}

#[tokio::test]
async fn empty_catalog_sends_header_only_digest() {
    let channel = Arc::new(RecordingChannel::default());
    let pipeline = DigestPipeline::new(
        Arc::new(MemoryStore::new()),
        FetchOrchestrator::new(Duration::from_secs(300)),
        DigestComposer::default(),
        channel.clone(),
        DIGEST_CHAT,
    );

    let summary = pipeline.run_pass(day(2026, 2, 11)).await.unwrap();

    assert_eq!(summary.sources, 0);
    assert!(summary.delivered);
    assert_eq!(channel.sent_to(DIGEST_CHAT).len(), 1);
}
