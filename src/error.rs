use std::time::Duration;
use thiserror::Error;
use tokio::sync::AcquireError;

#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("invalid seed onion: {0}")]
    InvalidSeed(String),

    #[error("seed fetch failed: {0}")]
    FetchFailed(String),

    #[error("no onion links found on the seed page")]
    EmptyPage,

    #[error("session pool initialization failed: {0}")]
    SessionInit(String),

    #[error("session pool is closed")]
    PoolClosed,

    #[error("unparseable address: {0}")]
    BadAddress(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("screenshot render failed: {0}")]
    Render(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl CaptureError {
    /// Only these abort the whole run; everything else is recovered locally
    /// as a per-task skip.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CaptureError::InvalidSeed(_)
                | CaptureError::SessionInit(_)
                | CaptureError::Configuration(_)
        )
    }
}

impl From<AcquireError> for CaptureError {
    fn from(_: AcquireError) -> Self {
        CaptureError::PoolClosed
    }
}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for CaptureError {
    fn from(err: serde_json::Error) -> Self {
        CaptureError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for CaptureError {
    fn from(err: reqwest::Error) -> Self {
        CaptureError::FetchFailed(err.to_string())
    }
}
