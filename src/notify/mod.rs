pub mod telegram;

use anyhow::Result;

pub use telegram::TelegramBotChannel;

/// Where digests and operator alerts are sent.
#[async_trait::async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Fails loudly on transport errors; the caller decides where to report.
    async fn send(&self, destination: i64, text: &str) -> Result<()>;
}

/// Split `text` into chunks of at most `limit` characters, preferring line
/// boundaries. A single overlong line is hard-split.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    if text.chars().count() <= limit {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len > limit {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }
        current.push_str(line);
        current_len += line_len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
