// src/lib.rs
// Library surface shared by the binaries and integration tests.

pub mod compose;
pub mod config;
pub mod digest;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod store;
pub mod watermark;

pub use crate::compose::DigestComposer;
pub use crate::config::AppConfig;
pub use crate::digest::{DigestPipeline, PassSummary};
pub use crate::ingest::types::{
    FetchWindow, MessageRecord, Platform, PlatformAdapter, SourceId, SourceRecord,
};
pub use crate::ingest::{FetchFailure, FetchOrchestrator, FetchReport};
pub use crate::notify::{DeliveryChannel, TelegramBotChannel};
pub use crate::store::{ImportSummary, JsonFileStore, MemoryStore, SourceStore};

use tracing_subscriber::{fmt, EnvFilter};

/// Global subscriber: `RUST_LOG` filter (default `info`), JSON lines when `LOG_FORMAT=json`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = fmt().with_env_filter(filter).with_target(true);
    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}
