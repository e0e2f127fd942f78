//! Task and outcome types plus the thread-safe result ledger

use chrono::{DateTime, Local};
use serde::Serialize;
use std::sync::Mutex;

/// One unit of work: capture a screenshot of one discovered address.
///
/// Immutable once enqueued; `index` is the 1-based discovery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub index: usize,
    pub address: String,
}

/// A successfully satisfied capture task
///
/// `fresh` is false when the artifact already existed on disk and was left
/// untouched; the task still counts as captured since nothing went wrong.
#[derive(Debug, Clone, Serialize)]
pub struct CaptureRecord {
    pub index: usize,
    pub address: String,
    pub filename: String,
    pub size: u64,
    pub dimensions: Option<(u32, u32)>,
    pub fresh: bool,
    pub timestamp: DateTime<Local>,
}

/// A task that terminated without producing an artifact
#[derive(Debug, Clone, Serialize)]
pub struct SkipRecord {
    pub index: usize,
    pub address: String,
    pub reason: String,
    pub timestamp: DateTime<Local>,
}

/// Terminal classification of one task; every enqueued task ends in exactly
/// one of these, exactly once.
#[derive(Debug, Clone, Serialize)]
pub enum CaptureOutcome {
    Captured(CaptureRecord),
    Skipped(SkipRecord),
}

impl CaptureOutcome {
    pub fn skipped(index: usize, address: String, reason: impl Into<String>) -> Self {
        CaptureOutcome::Skipped(SkipRecord {
            index,
            address,
            reason: reason.into(),
            timestamp: Local::now(),
        })
    }

    pub fn index(&self) -> usize {
        match self {
            CaptureOutcome::Captured(record) => record.index,
            CaptureOutcome::Skipped(record) => record.index,
        }
    }
}

/// Append-only accumulation of outcomes across workers
///
/// Each append takes the matching lock only for the duration of one push;
/// entries are never removed or mutated. Arrival order is whatever the
/// workers produce; the summary builder re-sorts for presentation.
#[derive(Debug, Default)]
pub struct ResultLedger {
    captured: Mutex<Vec<CaptureRecord>>,
    skipped: Mutex<Vec<SkipRecord>>,
}

impl ResultLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, outcome: CaptureOutcome) {
        match outcome {
            CaptureOutcome::Captured(record) => self.captured.lock().unwrap().push(record),
            CaptureOutcome::Skipped(record) => self.skipped.lock().unwrap().push(record),
        }
    }

    /// Snapshot of the captured sequence; intended for use after the worker
    /// join barrier.
    pub fn captured(&self) -> Vec<CaptureRecord> {
        self.captured.lock().unwrap().clone()
    }

    pub fn skipped(&self) -> Vec<SkipRecord> {
        self.skipped.lock().unwrap().clone()
    }

    pub fn counts(&self) -> (usize, usize) {
        (
            self.captured.lock().unwrap().len(),
            self.skipped.lock().unwrap().len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;
    use std::sync::Arc;

    fn captured(index: usize) -> CaptureOutcome {
        CaptureOutcome::Captured(CaptureRecord {
            index,
            address: format!("http://site-{index}.onion"),
            filename: format!("site-{index}.onion.png"),
            size: 1024,
            dimensions: Some((1280, 4096)),
            fresh: true,
            timestamp: Local::now(),
        })
    }

    #[test]
    fn records_land_in_their_sequence() {
        let ledger = ResultLedger::new();
        ledger.record(captured(1));
        ledger.record(CaptureOutcome::skipped(2, "http://x.onion".into(), "boom"));
        ledger.record(captured(3));

        assert_eq!(ledger.counts(), (2, 1));
        assert_eq!(ledger.skipped()[0].reason, "boom");
    }

    #[tokio::test]
    async fn concurrent_appends_lose_nothing() {
        let ledger = Arc::new(ResultLedger::new());

        let mut handles = Vec::new();
        for worker in 0..8 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    let index = worker * 50 + i + 1;
                    if index % 2 == 0 {
                        ledger.record(captured(index));
                    } else {
                        ledger.record(CaptureOutcome::skipped(
                            index,
                            format!("http://site-{index}.onion"),
                            "unreachable",
                        ));
                    }
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let (captured, skipped) = ledger.counts();
        assert_eq!(captured + skipped, 400);
        assert_eq!(captured, 200);
        assert_eq!(skipped, 200);

        // every index appears exactly once across both sequences
        let mut indices: Vec<usize> = ledger
            .captured()
            .iter()
            .map(|r| r.index)
            .chain(ledger.skipped().iter().map(|r| r.index))
            .collect();
        indices.sort_unstable();
        indices.dedup();
        assert_eq!(indices.len(), 400);
    }
}
