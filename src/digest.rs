//! One orchestration pass: list, fetch, compose, deliver, advance.
//!
//! Watermarks advance only after the digest was delivered, so a failed send
//! means the next pass sees the same posts again (at-least-once, never loss).

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use metrics::counter;

use crate::compose::DigestComposer;
use crate::ingest::{FetchFailure, FetchOrchestrator};
use crate::notify::DeliveryChannel;
use crate::store::SourceStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub sources: usize,
    pub messages: usize,
    pub fetch_errors: usize,
    pub delivered: bool,
    pub watermarks_advanced: usize,
}

pub struct DigestPipeline {
    store: Arc<dyn SourceStore>,
    orchestrator: FetchOrchestrator,
    composer: DigestComposer,
    delivery: Arc<dyn DeliveryChannel>,
    digest_chat: i64,
    alert_chat: Option<i64>,
    fetch_lag_days: Option<u32>,
}

impl DigestPipeline {
    pub fn new(
        store: Arc<dyn SourceStore>,
        orchestrator: FetchOrchestrator,
        composer: DigestComposer,
        delivery: Arc<dyn DeliveryChannel>,
        digest_chat: i64,
    ) -> Self {
        Self {
            store,
            orchestrator,
            composer,
            delivery,
            digest_chat,
            alert_chat: None,
            fetch_lag_days: Some(1),
        }
    }

    /// Operator chat for failures; without it failures are only logged.
    pub fn with_alert_chat(mut self, chat: Option<i64>) -> Self {
        self.alert_chat = chat;
        self
    }

    pub fn with_fetch_lag_days(mut self, lag: Option<u32>) -> Self {
        self.fetch_lag_days = lag;
        self
    }

    /// Errors only when the store cannot be read; everything else is
    /// reported through the summary and the alert chat.
    pub async fn run_pass(&self, today: NaiveDate) -> Result<PassSummary> {
        let sources = match self.store.list_sources().await {
            Ok(s) => s,
            Err(e) => {
                self.alert(&format!("Digest skipped: source store unavailable: {e:#}"))
                    .await;
                return Err(e).context("listing sources");
            }
        };

        let report = self
            .orchestrator
            .fetch(&sources, upper_bound(today, self.fetch_lag_days))
            .await;
        let mut summary = PassSummary {
            sources: sources.len(),
            messages: report.messages.len(),
            fetch_errors: report.errors.len(),
            ..PassSummary::default()
        };
        if !report.errors.is_empty() {
            self.alert(&fetch_errors_text(&report.errors)).await;
        }

        let text = self.composer.render(&report.messages, today);
        if let Err(e) = self.delivery.send(self.digest_chat, &text).await {
            tracing::error!(
                error = ?e,
                chat = self.digest_chat,
                "digest delivery failed; watermarks kept"
            );
            counter!("digest_delivery_errors_total").increment(1);
            self.alert(&format!("Digest delivery failed: {e:#}")).await;
            return Ok(summary);
        }
        summary.delivered = true;

        match self.store.advance_watermarks(&report.messages).await {
            Ok(moved) => {
                counter!("digest_watermarks_advanced_total").increment(moved.len() as u64);
                for (id, date) in &moved {
                    tracing::debug!(source = %id, watermark = %date, "watermark advanced");
                }
                summary.watermarks_advanced = moved.len();
            }
            Err(e) => {
                tracing::error!(
                    error = ?e,
                    "watermark update failed; next pass will repeat these posts"
                );
                self.alert(&format!("Watermark update failed, posts may repeat: {e:#}"))
                    .await;
            }
        }
        Ok(summary)
    }

    /// Best effort: an alert that cannot be sent is logged and dropped.
    async fn alert(&self, text: &str) {
        tracing::warn!(alert = %text, "operator alert");
        let Some(chat) = self.alert_chat else {
            return;
        };
        if let Err(e) = self.delivery.send(chat, text).await {
            tracing::error!(error = ?e, chat, "alert delivery failed");
        }
    }

    pub async fn close(&self) {
        self.orchestrator.close().await;
    }
}

/// Latest date a message may carry in a pass run on `today`.
fn upper_bound(today: NaiveDate, lag_days: Option<u32>) -> Option<NaiveDate> {
    lag_days.and_then(|lag| today.checked_sub_days(chrono::Days::new(u64::from(lag))))
}

fn fetch_errors_text(errors: &[FetchFailure]) -> String {
    let mut out = format!("Fetch errors this pass ({}):", errors.len());
    for e in errors {
        out.push_str("\n- ");
        out.push_str(&e.to_string());
        if !e.sources().is_empty() {
            out.push_str(&format!(" [{}]", e.sources().join(", ")));
        }
    }
    out
}
