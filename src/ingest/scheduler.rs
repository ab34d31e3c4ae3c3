// src/ingest/scheduler.rs
use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use metrics::{counter, gauge};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::digest::DigestPipeline;

/// Once a day at a fixed local time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DailySchedule {
    pub at: NaiveTime,
    pub offset: FixedOffset,
}

impl DailySchedule {
    pub fn new(at: NaiveTime, offset: FixedOffset) -> Self {
        Self { at, offset }
    }

    /// Local calendar date at `now`.
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset).date_naive()
    }

    /// First slot strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = self.local_date(now);
        let slot = |date: NaiveDate| {
            self.offset
                .from_local_datetime(&date.and_time(self.at))
                .single()
                .map(|dt| dt.with_timezone(&Utc))
        };
        match slot(today) {
            Some(t) if t > now => t,
            _ => today
                .checked_add_days(Days::new(1))
                .and_then(slot)
                .unwrap_or(now + chrono::Duration::days(1)),
        }
    }
}

/// Run one pass now, logging instead of propagating.
pub async fn run_tick(pipeline: &DigestPipeline, schedule: &DailySchedule) {
    let now = Utc::now();
    let today = schedule.local_date(now);
    counter!("digest_passes_total").increment(1);
    match pipeline.run_pass(today).await {
        Ok(summary) => {
            gauge!("digest_last_pass_ts").set(now.timestamp() as f64);
            tracing::info!(
                target: "digest",
                sources = summary.sources,
                messages = summary.messages,
                fetch_errors = summary.fetch_errors,
                delivered = summary.delivered,
                watermarks = summary.watermarks_advanced,
                "digest pass finished"
            );
        }
        Err(e) => tracing::error!(target: "digest", error = ?e, "digest pass failed"),
    }
}

/// Spawn the daily loop. A failed pass never stops it.
pub fn spawn_daily(
    pipeline: Arc<DigestPipeline>,
    schedule: DailySchedule,
    run_now: bool,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if run_now {
            run_tick(&pipeline, &schedule).await;
        }
        loop {
            let now = Utc::now();
            let next = schedule.next_after(now);
            let wait = (next - now).to_std().unwrap_or_default();
            tracing::info!(
                target: "digest",
                next = %next.with_timezone(&schedule.offset),
                "next digest scheduled"
            );
            tokio::time::sleep(wait).await;
            run_tick(&pipeline, &schedule).await;
        }
    })
}
