//! # torsnap
//!
//! A one-shot batch tool that discovers outbound onion links from a seed
//! onion service and captures a full-page screenshot of each, routing all
//! traffic through a SOCKS5 proxy into the Tor network.
//!
//! The capture workload runs in parallel: a bounded pool of headless browser
//! sessions, a FIFO queue of discovered links, and a configurable set of
//! workers that drain the queue while borrowing and returning sessions.
//! Outcomes accumulate in a thread-safe ledger and are projected into
//! captured/skipped reports once every worker has joined.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::atomic::AtomicBool;
//! use std::sync::Arc;
//! use torsnap::{BatchRunner, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let runner = BatchRunner::new(config);
//!
//!     let shutdown = Arc::new(AtomicBool::new(false));
//!     let report = runner
//!         .run("http://example.onion", shutdown)
//!         .await?;
//!     println!("{} captured", report.captured.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## CLI usage
//!
//! ```bash
//! torsnap http://example.onion --headless --limit 10 --pool 3 -t 3
//! ```

/// Configuration: proxy endpoint, pool/worker sizing, timeouts, onion format
pub mod config;

/// Error taxonomy for the capture pipeline
pub mod error;

/// Onion-address validation and artifact naming
pub mod onion;

/// Link discovery through the SOCKS proxy
pub mod discover;

/// Bounded pool of browser sessions
pub mod session_pool;

/// Per-task capture routine and its service
pub mod capture;

/// Tasks, outcomes, and the result ledger
pub mod outcome;

/// Worker pool draining the task queue
pub mod worker;

/// Post-run report formatting
pub mod summary;

/// Tor daemon lifecycle control
pub mod tor;

/// Command-line interface and batch orchestration
pub mod cli;


pub use capture::*;
pub use cli::*;
pub use config::*;
pub use discover::*;
pub use error::*;
pub use onion::*;
pub use outcome::*;
pub use session_pool::*;
pub use summary::*;
pub use tor::*;
pub use worker::*;
