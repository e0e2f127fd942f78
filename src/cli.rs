//! Command-line surface and batch orchestration

use crate::{
    artifact_stem, ensure_http_scheme, queue_tasks, BrowserSession, CaptureError, CaptureRecord,
    CaptureService, Config, LinkDiscoverer, OnionValidator, PageCapturer, ResultLedger,
    SessionPool, SkipRecord, WorkerPool,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "torsnap")]
#[command(about = "Capture screenshots of onion services linked from an onion service")]
#[command(version)]
pub struct Cli {
    /// Onion url to scrape
    pub onion: String,

    /// Run browser sessions in headless mode
    #[arg(long)]
    pub headless: bool,

    /// Number of onion links to capture
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Size of the browser session pool
    #[arg(short, long)]
    pub pool: Option<usize>,

    /// Number of capture workers to run
    #[arg(short = 't', long)]
    pub workers: Option<usize>,

    /// Log skipped onions on output
    #[arg(long)]
    pub log_skipped: bool,

    /// Run program in debug mode
    #[arg(short, long)]
    pub debug: bool,

    /// Configuration file path
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Root directory for captured screenshots
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn setup_logging(debug: bool) {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
}

/// Final snapshot of one run, handed to the summary builder.
pub struct RunReport {
    pub captured: Vec<CaptureRecord>,
    pub skipped: Vec<SkipRecord>,
}

/// Wires discoverer, session pool, task queue, and workers into one batch.
pub struct BatchRunner {
    config: Config,
    validator: OnionValidator,
}

impl BatchRunner {
    pub fn new(config: Config) -> Self {
        let validator = OnionValidator::new(config.onion_format);
        Self { config, validator }
    }

    /// Run the whole batch: discover, enqueue, capture, aggregate.
    ///
    /// The session pool is closed before this returns on every path that
    /// opened it. A raised `shutdown` flag stops workers from pulling new
    /// tasks; in-flight captures finish.
    pub async fn run(
        &self,
        seed: &str,
        shutdown: Arc<AtomicBool>,
    ) -> Result<RunReport, CaptureError> {
        let seed = ensure_http_scheme(seed);

        let discoverer = LinkDiscoverer::new(&self.config, self.validator.clone())?;
        let links = match discoverer.discover(&seed).await {
            Ok(links) => links,
            Err(CaptureError::EmptyPage) => {
                // zero tasks is a valid batch; the summaries come out empty
                warn!("No onion links found on {seed}");
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        let output_dir = self.config.output_root.join(artifact_stem(&seed)?);
        tokio::fs::create_dir_all(&output_dir).await?;

        info!(
            "Opening session pool with {} instances...",
            self.config.pool_size
        );
        let launch_config = self.config.clone();
        let pool = SessionPool::open(self.config.pool_size, move |index| {
            let config = launch_config.clone();
            async move {
                if index > 0 {
                    // stagger launches; concurrent cold starts trip over the
                    // browser's profile locks
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
                BrowserSession::launch(index, &config).await
            }
        })
        .await?;

        let tasks = queue_tasks(links, self.config.limit);
        let service: Arc<dyn PageCapturer> = Arc::new(CaptureService::new(
            pool.clone(),
            output_dir,
            &self.config,
        ));
        let ledger = Arc::new(ResultLedger::new());

        let workers = WorkerPool::spawn(
            self.config.worker_count,
            service,
            ledger.clone(),
            self.validator.clone(),
            self.config.log_skipped,
            shutdown,
            tasks,
        );
        workers.join().await;

        pool.close().await;

        let (captured_count, skipped_count) = ledger.counts();
        info!("{captured_count} onions captured.");
        info!("{skipped_count} onions skipped.");

        Ok(RunReport {
            captured: ledger.captured(),
            skipped: ledger.skipped(),
        })
    }
}
