//! Task queue and worker pool
//!
//! Tasks are enqueued once onto a closeable channel, capped at the configured
//! limit, and drained by identical workers. The channel closing is the
//! completion signal; joining the workers is the barrier before summaries.

use crate::{CaptureOutcome, OnionValidator, PageCapturer, ResultLedger, Task};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, warn};

/// Turn discovered links into indexed tasks, keeping only the first `limit`.
///
/// Links past the cap are ignored entirely; they never become tasks and are
/// never recorded as skipped. The sender is dropped here, so workers see the
/// queue close as soon as it drains.
pub fn queue_tasks(links: Vec<String>, limit: usize) -> mpsc::Receiver<Task> {
    let tasks: Vec<Task> = links
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, address)| Task {
            index: i + 1,
            address,
        })
        .collect();

    let (sender, receiver) = mpsc::channel(tasks.len().max(1));
    for task in tasks {
        // capacity equals the task count, so this cannot fail
        let _ = sender.try_send(task);
    }
    receiver
}

/// One worker; all workers run the identical loop, there are no roles.
pub struct CaptureWorker {
    id: usize,
    capturer: Arc<dyn PageCapturer>,
    ledger: Arc<ResultLedger>,
    validator: OnionValidator,
    log_skipped: bool,
    shutdown: Arc<AtomicBool>,
}

impl CaptureWorker {
    async fn run(&self, tasks: Arc<Mutex<mpsc::Receiver<Task>>>) {
        debug!("Starting capture worker {}", self.id);

        loop {
            if self.shutdown.load(Ordering::Acquire) {
                warn!("worker {} stopping early, interrupt received", self.id);
                break;
            }

            let task = { tasks.lock().await.recv().await };
            let Some(task) = task else {
                // queue drained and closed
                break;
            };

            // syntactically invalid addresses never cost a session
            if !self.validator.is_valid(&task.address) {
                warn!(
                    "{} {} does not seem to be a valid onion. Skipping...",
                    task.index, task.address
                );
                self.ledger.record(CaptureOutcome::skipped(
                    task.index,
                    task.address.clone(),
                    "invalid onion",
                ));
                continue;
            }

            // a panic inside the routine is converted to a skip so the worker
            // survives to the next task
            let outcome = match AssertUnwindSafe(self.capturer.capture(&task))
                .catch_unwind()
                .await
            {
                Ok(outcome) => outcome,
                Err(_) => {
                    error!("{} capture routine panicked", task.index);
                    CaptureOutcome::skipped(
                        task.index,
                        task.address.clone(),
                        "unexpected worker failure",
                    )
                }
            };

            if self.log_skipped {
                if let CaptureOutcome::Skipped(skip) = &outcome {
                    warn!("{} Skipping... {}", skip.index, skip.reason);
                }
            }
            self.ledger.record(outcome);
        }

        debug!("Capture worker {} stopped", self.id);
    }
}

/// Spawns `worker_count` workers over a shared receiver and joins them.
pub struct WorkerPool {
    handles: Vec<tokio::task::JoinHandle<()>>,
}

impl WorkerPool {
    #[allow(clippy::too_many_arguments)]
    pub fn spawn(
        worker_count: usize,
        capturer: Arc<dyn PageCapturer>,
        ledger: Arc<ResultLedger>,
        validator: OnionValidator,
        log_skipped: bool,
        shutdown: Arc<AtomicBool>,
        tasks: mpsc::Receiver<Task>,
    ) -> Self {
        let shared = Arc::new(Mutex::new(tasks));

        let handles = (0..worker_count)
            .map(|id| {
                let worker = CaptureWorker {
                    id,
                    capturer: capturer.clone(),
                    ledger: ledger.clone(),
                    validator: validator.clone(),
                    log_skipped,
                    shutdown: shutdown.clone(),
                };
                let tasks = shared.clone();
                tokio::spawn(async move { worker.run(tasks).await })
            })
            .collect();

        Self { handles }
    }

    /// Barrier: resolves once every worker has exited.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("worker task failed: {e}");
            }
        }
    }
}
