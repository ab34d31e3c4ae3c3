//! watermark.rs: conditional max-update of per-source `last_seen_date`.
//!
//! A watermark only moves forward. Applying the same batch twice, or a batch
//! of stale messages, never changes the outcome of the first application.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use crate::ingest::types::{MessageRecord, SourceId};

/// Latest message date per source in this batch.
pub fn candidates(messages: &[MessageRecord]) -> BTreeMap<SourceId, NaiveDate> {
    let mut out: BTreeMap<SourceId, NaiveDate> = BTreeMap::new();
    for m in messages {
        let date = m.date();
        out.entry(m.source_id)
            .and_modify(|cur| {
                if date > *cur {
                    *cur = date;
                }
            })
            .or_insert(date);
    }
    out
}

/// Resulting watermark for every source that has messages in the batch.
///
/// Sources without messages are absent. A source missing from `current`
/// is treated as having no watermark yet.
pub fn advance(
    messages: &[MessageRecord],
    current: &HashMap<SourceId, Option<NaiveDate>>,
) -> BTreeMap<SourceId, NaiveDate> {
    candidates(messages)
        .into_iter()
        .map(|(id, candidate)| {
            let next = match current.get(&id).copied().flatten() {
                Some(existing) if existing >= candidate => existing,
                _ => candidate,
            };
            (id, next)
        })
        .collect()
}

/// Only the entries of [`advance`] that differ from `current`.
pub fn changed(
    messages: &[MessageRecord],
    current: &HashMap<SourceId, Option<NaiveDate>>,
) -> BTreeMap<SourceId, NaiveDate> {
    advance(messages, current)
        .into_iter()
        .filter(|(id, next)| current.get(id).copied().flatten() != Some(*next))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn msg(id: u64, y: i32, m: u32, d: u32) -> MessageRecord {
        let tz = FixedOffset::east_opt(3 * 3600).unwrap();
        MessageRecord {
            source_id: SourceId(id),
            source_name: format!("S{id}"),
            source_link: String::new(),
            contact: String::new(),
            timestamp: tz.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap(),
            body: "x".into(),
            url: None,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn candidates_take_max_per_source() {
        let batch = vec![
            msg(1, 2026, 2, 3),
            msg(1, 2026, 2, 9),
            msg(2, 2026, 1, 5),
            msg(1, 2026, 2, 4),
        ];
        let c = candidates(&batch);
        assert_eq!(c[&SourceId(1)], date(2026, 2, 9));
        assert_eq!(c[&SourceId(2)], date(2026, 1, 5));
    }

    #[test]
    fn stale_batch_does_not_regress() {
        let current = HashMap::from([(SourceId(1), Some(date(2026, 2, 10)))]);
        let out = advance(&[msg(1, 2026, 2, 5)], &current);
        assert_eq!(out[&SourceId(1)], date(2026, 2, 10));
        assert!(changed(&[msg(1, 2026, 2, 5)], &current).is_empty());
    }

    #[test]
    fn absent_watermark_is_initialized() {
        let current = HashMap::from([(SourceId(1), None)]);
        let out = advance(&[msg(1, 2026, 2, 10)], &current);
        assert_eq!(out[&SourceId(1)], date(2026, 2, 10));
    }

    #[test]
    fn untouched_sources_are_absent() {
        let current = HashMap::from([
            (SourceId(1), Some(date(2026, 2, 1))),
            (SourceId(2), Some(date(2026, 2, 1))),
        ]);
        let out = advance(&[msg(1, 2026, 2, 10)], &current);
        assert_eq!(out.len(), 1);
        assert!(!out.contains_key(&SourceId(2)));
    }

    #[test]
    fn equal_date_is_not_a_change() {
        let current = HashMap::from([(SourceId(1), Some(date(2026, 2, 10)))]);
        assert!(changed(&[msg(1, 2026, 2, 10)], &current).is_empty());
    }
}
