use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::signal;
use torsnap::{
    captured_report, setup_logging, skipped_report, BatchRunner, CaptureError, Cli, Config,
    OnionValidator, TorService,
};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    setup_logging(args.debug);

    info!("Starting torsnap v{}...", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args).await?;
    config.validate()?;

    // the seed is validated before any work starts; an invalid seed means
    // the batch never runs
    let validator = OnionValidator::new(config.onion_format);
    if !validator.is_valid(&args.onion) {
        error!("{} does not seem to be a valid onion.", args.onion);
        return Err(CaptureError::InvalidSeed(args.onion).into());
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let _signal_watcher = spawn_signal_watcher(shutdown.clone());

    let started = Instant::now();
    let tor = TorService;
    tor.start().await;

    let runner = BatchRunner::new(config);
    let result = runner.run(&args.onion, shutdown.clone()).await;

    // teardown runs on every path, success or failure
    tor.stop().await;
    info!("Stopped in {:?}.", started.elapsed());

    match result {
        Ok(report) => {
            println!("{}", captured_report(&report.captured));
            println!("{}", skipped_report(&report.skipped));
            if shutdown.load(Ordering::Acquire) {
                warn!("Run was interrupted; remaining queued tasks were abandoned.");
            }
            Ok(())
        }
        Err(e) => {
            error!("An error occurred: {e}");
            Err(e.into())
        }
    }
}

async fn load_config(args: &Cli) -> anyhow::Result<Config> {
    let mut config = if let Some(config_path) = &args.config {
        let raw = tokio::fs::read_to_string(config_path).await?;
        serde_json::from_str(&raw)?
    } else {
        Config::default()
    };

    // CLI flags override file and default values field by field
    if args.headless {
        config.headless = true;
    }
    if let Some(limit) = args.limit {
        config.limit = limit;
    }
    if let Some(pool) = args.pool {
        config.pool_size = pool;
    }
    if let Some(workers) = args.workers {
        config.worker_count = workers;
    }
    if args.log_skipped {
        config.log_skipped = true;
    }
    if let Some(output) = &args.output {
        config.output_root = output.clone();
    }

    info!("Session pool size: {}", config.pool_size);
    info!("Worker count: {}", config.worker_count);
    info!("Capture limit: {}", config.limit);

    Ok(config)
}

fn spawn_signal_watcher(shutdown: Arc<AtomicBool>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
            .expect("Failed to create SIGINT handler");
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to create SIGTERM handler");

        tokio::select! {
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
        }

        shutdown.store(true, Ordering::Release);
        warn!("Interrupt received; finishing in-flight captures before teardown...");
    })
}
