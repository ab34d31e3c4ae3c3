use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{split_message, DeliveryChannel};

/// Bot API limit for one message.
pub const MESSAGE_LIMIT: usize = 4096;

#[derive(Clone)]
pub struct TelegramBotChannel {
    token: String,
    api_base: String,
    client: Client,
    timeout: Duration,
}

impl TelegramBotChannel {
    pub fn new(token: String) -> Self {
        Self {
            token,
            api_base: "https://api.telegram.org".to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(15),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    /// Point at a different Bot API server (self-hosted or a test double).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    async fn send_chunk(&self, chat_id: i64, text: &str) -> Result<()> {
        let url = format!(
            "{}/bot{}/sendMessage",
            self.api_base.trim_end_matches('/'),
            self.token
        );
        let payload = SendMessage {
            chat_id,
            text,
            disable_web_page_preview: true,
        };

        let rsp = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| anyhow!("sendMessage request failed: {}", e.without_url()))?;
        let status = rsp.status();
        // the request URL carries the token, keep it out of errors
        let body: BotResponse = rsp
            .json()
            .await
            .map_err(|e| anyhow!("sendMessage response body: {}", e.without_url()))?;
        if !status.is_success() || !body.ok {
            return Err(anyhow!(
                "sendMessage rejected ({status}): {}",
                body.description.unwrap_or_default()
            ));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl DeliveryChannel for TelegramBotChannel {
    async fn send(&self, destination: i64, text: &str) -> Result<()> {
        let chunks = split_message(text, MESSAGE_LIMIT);
        let total = chunks.len();
        for (i, chunk) in chunks.iter().enumerate() {
            self.send_chunk(destination, chunk)
                .await
                .with_context(|| format!("chunk {}/{total} to chat {destination}", i + 1))?;
        }
        tracing::info!(chat = destination, chunks = total, "message delivered");
        Ok(())
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Deserialize)]
struct BotResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}
