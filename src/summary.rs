//! Post-run projection of the ledger into printable reports
//!
//! Pure formatting: no side effects, deterministic for a given snapshot.
//! Rows are re-sorted by task index so the presentation does not depend on
//! worker scheduling.

use crate::{CaptureRecord, SkipRecord};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Tabular report of captured onions: `#`, task index, address, timestamp.
pub fn captured_report(records: &[CaptureRecord]) -> String {
    let mut rows: Vec<&CaptureRecord> = records.iter().collect();
    rows.sort_by_key(|record| record.index);

    let address_width = column_width("onion", rows.iter().map(|r| r.address.as_str()));

    let mut out = String::new();
    out.push_str(&format!("{} onions captured\n", rows.len()));
    out.push_str(&format!(
        "{:>3}  {:>5}  {:<address_width$}  {}\n",
        "#", "index", "onion", "timestamp"
    ));
    for (position, record) in rows.iter().enumerate() {
        let note = if record.fresh { "" } else { " (existing)" };
        out.push_str(&format!(
            "{:>3}  {:>5}  {:<address_width$}  {}{}\n",
            position + 1,
            record.index,
            record.address,
            record.timestamp.format(TIME_FORMAT),
            note
        ));
    }
    out
}

/// Tabular report of skipped onions: `#`, task index, address, reason,
/// timestamp.
pub fn skipped_report(records: &[SkipRecord]) -> String {
    let mut rows: Vec<&SkipRecord> = records.iter().collect();
    rows.sort_by_key(|record| record.index);

    let address_width = column_width("onion", rows.iter().map(|r| r.address.as_str()));
    let reason_width = column_width("reason", rows.iter().map(|r| r.reason.as_str()));

    let mut out = String::new();
    out.push_str(&format!("{} onions skipped\n", rows.len()));
    out.push_str(&format!(
        "{:>3}  {:>5}  {:<address_width$}  {:<reason_width$}  {}\n",
        "#", "index", "onion", "reason", "timestamp"
    ));
    for (position, record) in rows.iter().enumerate() {
        out.push_str(&format!(
            "{:>3}  {:>5}  {:<address_width$}  {:<reason_width$}  {}\n",
            position + 1,
            record.index,
            record.address,
            record.reason,
            record.timestamp.format(TIME_FORMAT),
        ));
    }
    out
}

fn column_width<'a>(header: &str, values: impl Iterator<Item = &'a str>) -> usize {
    values
        .map(str::len)
        .chain(std::iter::once(header.len()))
        .max()
        .unwrap_or(header.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    fn captured(index: usize, fresh: bool) -> CaptureRecord {
        CaptureRecord {
            index,
            address: format!("http://site-{index}.onion"),
            filename: format!("site-{index}.onion.png"),
            size: 2048,
            dimensions: Some((1280, 3000)),
            fresh,
            timestamp: Local::now(),
        }
    }

    fn skipped(index: usize, reason: &str) -> SkipRecord {
        SkipRecord {
            index,
            address: format!("http://site-{index}.onion"),
            reason: reason.to_string(),
            timestamp: Local::now(),
        }
    }

    #[test]
    fn rows_are_sorted_by_task_index() {
        let records = vec![captured(3, true), captured(1, true), captured(2, true)];
        let report = captured_report(&records);

        let first = report.find("site-1.onion").unwrap();
        let second = report.find("site-2.onion").unwrap();
        let third = report.find("site-3.onion").unwrap();
        assert!(first < second && second < third);
    }

    #[test]
    fn repeated_calls_are_identical() {
        let records = vec![captured(2, false), captured(1, true)];
        assert_eq!(captured_report(&records), captured_report(&records));

        let skips = vec![skipped(1, "invalid onion"), skipped(2, "timed out")];
        assert_eq!(skipped_report(&skips), skipped_report(&skips));
    }

    #[test]
    fn existing_artifacts_are_marked() {
        let report = captured_report(&[captured(1, false)]);
        assert!(report.contains("(existing)"));

        let fresh = captured_report(&[captured(1, true)]);
        assert!(!fresh.contains("(existing)"));
    }

    #[test]
    fn skip_reasons_appear_verbatim() {
        let report = skipped_report(&[skipped(4, "navigation failed: connection refused")]);
        assert!(report.contains("navigation failed: connection refused"));
        assert!(report.contains("1 onions skipped"));
    }

    #[test]
    fn empty_snapshots_render_headers_only() {
        let report = captured_report(&[]);
        assert!(report.starts_with("0 onions captured"));
        assert!(report.contains("timestamp"));
    }
}
