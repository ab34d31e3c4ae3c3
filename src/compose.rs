//! compose.rs: turns one pass worth of messages into the digest text.

use std::fmt::Write as _;

use chrono::NaiveDate;

use crate::ingest::types::MessageRecord;

pub const FALLBACK_TEXT: &str = "Digest could not be composed; see service logs.";

#[derive(Debug, Clone)]
pub struct DigestComposer {
    message_len: usize,
}

impl Default for DigestComposer {
    fn default() -> Self {
        Self::new(200)
    }
}

impl DigestComposer {
    pub fn new(message_len: usize) -> Self {
        Self {
            message_len: message_len.max(1),
        }
    }

    /// Never fails: a formatting error yields [`FALLBACK_TEXT`].
    pub fn render(&self, messages: &[MessageRecord], today: NaiveDate) -> String {
        match self.try_render(messages, today) {
            Ok(text) => {
                tracing::info!(
                    count = messages.len(),
                    chars = text.chars().count(),
                    "digest composed"
                );
                text
            }
            Err(e) => {
                tracing::error!(error = ?e, "digest composition failed, using fallback");
                FALLBACK_TEXT.to_string()
            }
        }
    }

    fn try_render(
        &self,
        messages: &[MessageRecord],
        today: NaiveDate,
    ) -> Result<String, std::fmt::Error> {
        let mut out = String::new();
        writeln!(out, "DEPARTMENT NEWS DIGEST ({})", today.format("%d.%m.%Y"))?;
        writeln!(out)?;

        if messages.is_empty() {
            writeln!(out, "No new posts.")?;
            writeln!(out)?;
        } else {
            // newest first; purely cosmetic, the fetch order carries no meaning
            let mut sorted: Vec<&MessageRecord> = messages.iter().collect();
            sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            for m in sorted {
                self.write_message(&mut out, m)?;
                writeln!(out)?;
            }
        }

        writeln!(out, "---------")?;
        write!(out, "Total posts: {}", messages.len())?;
        Ok(out)
    }

    fn write_message(&self, out: &mut String, m: &MessageRecord) -> std::fmt::Result {
        let preview = if m.body.trim().is_empty() {
            "[no text]".to_string()
        } else {
            truncate_chars(m.body.trim(), self.message_len)
        };
        let or_dash = |s: &str| {
            if s.trim().is_empty() {
                "-".to_string()
            } else {
                s.trim().to_string()
            }
        };

        writeln!(out, "---------")?;
        writeln!(out, "{}", or_dash(&m.source_name))?;
        writeln!(out, "Source: {}", m.url.as_deref().unwrap_or(&m.source_link))?;
        writeln!(out, "Contact: {}", or_dash(&m.contact))?;
        writeln!(out, "Date: {}", m.timestamp.format("%d.%m.%Y"))?;
        writeln!(out, "Post: {preview}")
    }
}

/// Cut to `max` characters, marking the cut with an ellipsis.
fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut cut: String = s.chars().take(max).collect();
    cut.push('…');
    cut
}
