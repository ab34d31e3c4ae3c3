//! Department digest service: builds the adapters, then runs the daily pass
//! until interrupted.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use dept_digest::ingest::providers::{
    telegram::{TelegramPreviewAdapter, TelegramPreviewConfig},
    vk::{VkWallAdapter, VkWallConfig},
    web::{WebFeedAdapter, WebFeedConfig},
};
use dept_digest::ingest::scheduler::{spawn_daily, DailySchedule};
use dept_digest::metrics::Metrics;
use dept_digest::{
    AppConfig, DigestComposer, DigestPipeline, FetchOrchestrator, JsonFileStore, TelegramBotChannel,
};

fn build_orchestrator(cfg: &AppConfig) -> Result<FetchOrchestrator> {
    let mut orch = FetchOrchestrator::new(cfg.fetch_timeout);

    if cfg.tg_enabled {
        let mut tg = TelegramPreviewConfig::new(cfg.utc_offset);
        tg.max_pages = cfg.tg_max_pages;
        orch = orch.with_adapter(Box::new(
            TelegramPreviewAdapter::connect(tg).context("channel-messaging adapter")?,
        ));
    }
    if let Some(token) = &cfg.vk_token {
        let mut vk = VkWallConfig::new(token.clone(), cfg.utc_offset);
        vk.api_version = cfg.vk_api_version.clone();
        orch = orch.with_adapter(Box::new(
            VkWallAdapter::connect(vk).context("social-wall adapter")?,
        ));
    }
    if cfg.web_enabled {
        let web = WebFeedConfig {
            tz: cfg.utc_offset,
            request_timeout: Duration::from_secs(30),
        };
        orch = orch.with_adapter(Box::new(
            WebFeedAdapter::connect(web).context("web adapter")?,
        ));
    }

    let enabled = orch.enabled_platforms();
    if enabled.is_empty() {
        tracing::warn!("no platform adapter enabled; digests will be empty");
    } else {
        let names: Vec<&str> = enabled.iter().map(|p| p.as_str()).collect();
        tracing::info!(platforms = ?names, "adapters connected");
    }
    Ok(orch)
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();
    dept_digest::init_tracing();

    let cfg = AppConfig::from_env().context("loading configuration")?;

    if let Some(addr) = cfg.metrics_addr {
        let metrics = Metrics::init()?;
        tokio::spawn(async move {
            if let Err(e) = metrics.serve(addr).await {
                tracing::error!(error = ?e, "metrics server stopped");
            }
        });
    }

    let orchestrator = build_orchestrator(&cfg)?;
    let store = Arc::new(JsonFileStore::new(cfg.state_path.clone()));
    let delivery = Arc::new(TelegramBotChannel::new(cfg.writer_token.clone()));

    let pipeline = Arc::new(
        DigestPipeline::new(
            store,
            orchestrator,
            DigestComposer::new(cfg.message_len),
            delivery,
            cfg.digest_chat_id,
        )
        .with_alert_chat(cfg.alert_chat_id)
        .with_fetch_lag_days(cfg.fetch_lag_days),
    );

    let schedule = DailySchedule::new(cfg.digest_time, cfg.utc_offset);
    tracing::info!(
        at = %cfg.digest_time,
        offset = %cfg.utc_offset,
        state = %cfg.state_path.display(),
        "digest service started"
    );
    let task = spawn_daily(pipeline.clone(), schedule, cfg.digest_on_start);

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    tracing::info!("shutdown requested");
    task.abort();
    pipeline.close().await;
    Ok(())
}
