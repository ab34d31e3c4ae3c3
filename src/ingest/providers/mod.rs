pub mod telegram;
pub mod vk;
pub mod web;

use anyhow::Result;
use std::future::Future;
use std::time::Duration;

use crate::ingest::types::{MessageRecord, Platform, SourceRecord};

pub(crate) const USER_AGENT: &str = concat!("dept-digest/", env!("CARGO_PKG_VERSION"));

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()?;
    Ok(client)
}

/// Walk a batch sequentially. A failing source is logged and skipped; the
/// batch only fails when every source in it failed.
pub(crate) async fn fetch_each<'a, F, Fut>(
    platform: Platform,
    sources: &'a [SourceRecord],
    mut fetch_one: F,
) -> Result<Vec<MessageRecord>>
where
    F: FnMut(&'a SourceRecord) -> Fut,
    Fut: Future<Output = Result<Vec<MessageRecord>>>,
{
    let mut out = Vec::new();
    let mut failed = 0usize;
    let mut first_err = None;

    for source in sources {
        match fetch_one(source).await {
            Ok(mut v) => {
                tracing::debug!(
                    platform = %platform,
                    source = %source.name,
                    count = v.len(),
                    "source fetched"
                );
                out.append(&mut v);
            }
            Err(e) => {
                tracing::warn!(
                    platform = %platform,
                    source = %source.name,
                    error = ?e,
                    "source fetch failed, skipped"
                );
                failed += 1;
                first_err.get_or_insert(e);
            }
        }
    }

    match first_err {
        Some(e) if failed == sources.len() => {
            Err(e.context(format!("all {failed} {platform} source(s) failed")))
        }
        _ => Ok(out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::SourceId;
    use anyhow::anyhow;

    fn src(id: u64) -> SourceRecord {
        SourceRecord {
            id: SourceId(id),
            name: format!("S{id}"),
            link: String::new(),
            platform: "web".into(),
            contact: String::new(),
            last_seen_date: None,
        }
    }

    #[tokio::test]
    async fn one_bad_source_is_skipped() {
        let sources = vec![src(1), src(2)];
        let out = fetch_each(Platform::Web, &sources, |s| async move {
            if s.id.0 == 1 {
                Err(anyhow!("boom"))
            } else {
                Ok(Vec::new())
            }
        })
        .await;
        assert!(out.is_ok());
    }

    #[tokio::test]
    async fn all_bad_sources_fail_the_batch() {
        let sources = vec![src(1), src(2)];
        let out = fetch_each(Platform::Web, &sources, |_| async { Err(anyhow!("down")) }).await;
        let err = out.unwrap_err();
        assert!(format!("{err:#}").contains("all 2 web source(s) failed"));
    }
}
