//! The per-task capture routine: navigate, skip-or-render, classify

use crate::{
    artifact_stem, ensure_http_scheme, BrowserSession, CaptureError, CaptureOutcome,
    CaptureRecord, Config, SessionPool, Task,
};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::{Page, ScreenshotParams};
use chrono::Local;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::timeout;
use tracing::info;

/// Capability the workers drive: turn one task into exactly one outcome.
#[async_trait]
pub trait PageCapturer: Send + Sync {
    async fn capture(&self, task: &Task) -> CaptureOutcome;
}

/// Production capturer: borrows a session from the pool, runs the routine,
/// and classifies the result. Failures never escape a single task.
pub struct CaptureService {
    pool: Arc<SessionPool<BrowserSession>>,
    output_dir: PathBuf,
    navigation_timeout: Duration,
    render_timeout: Duration,
    path_locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl CaptureService {
    pub fn new(
        pool: Arc<SessionPool<BrowserSession>>,
        output_dir: PathBuf,
        config: &Config,
    ) -> Self {
        Self {
            pool,
            output_dir,
            navigation_timeout: config.navigation_timeout,
            render_timeout: config.render_timeout,
            path_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn run_routine(&self, task: &Task) -> Result<CaptureRecord, CaptureError> {
        let target = ensure_http_scheme(&task.address);
        let stem = artifact_stem(&target)?;
        let file_path = self.output_dir.join(format!("{stem}.png"));

        // held for this task only; the guard returns the session on every
        // exit path below
        let session = self.pool.acquire().await?;
        info!("{} Capturing... {target}", task.index);

        let page = timeout(self.navigation_timeout, async {
            let page = session.open_page(&target).await?;
            page.wait_for_navigation()
                .await
                .map_err(|e| CaptureError::Navigation(e.to_string()))?;
            Ok::<Page, CaptureError>(page)
        })
        .await
        .map_err(|_| CaptureError::Timeout(self.navigation_timeout))??;

        // tasks normalizing to the same artifact serialize here, so the
        // second one's existence check sees the first one's file
        let path_lock = self.path_lock(&file_path);
        let record = {
            let _claimed = path_lock.lock().await;
            self.render(task, &page, &file_path).await
        };
        let _ = page.close().await;
        record
    }

    fn path_lock(&self, file_path: &Path) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.path_locks.lock().unwrap();
        locks.entry(file_path.to_path_buf()).or_default().clone()
    }

    async fn render(
        &self,
        task: &Task,
        page: &Page,
        file_path: &Path,
    ) -> Result<CaptureRecord, CaptureError> {
        if let Some(existing) = existing_artifact(task, file_path).await? {
            info!(
                "{} {} already exists.",
                task.index, existing.filename
            );
            return Ok(existing);
        }

        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        timeout(self.render_timeout, page.save_screenshot(params, file_path))
            .await
            .map_err(|_| CaptureError::Timeout(self.render_timeout))?
            .map_err(|e| CaptureError::Render(e.to_string()))?;

        let record = fresh_artifact(task, file_path).await?;
        let title = page.get_title().await.ok().flatten().unwrap_or_default();
        info!("{} {title} - {}", task.index, record.filename);
        Ok(record)
    }
}

#[async_trait]
impl PageCapturer for CaptureService {
    async fn capture(&self, task: &Task) -> CaptureOutcome {
        match self.run_routine(task).await {
            Ok(record) => CaptureOutcome::Captured(record),
            Err(e) => CaptureOutcome::skipped(task.index, task.address.clone(), e.to_string()),
        }
    }
}

/// The already-exists terminal state: an artifact at this path from an
/// earlier task or run is described, never rewritten.
async fn existing_artifact(
    task: &Task,
    file_path: &Path,
) -> Result<Option<CaptureRecord>, CaptureError> {
    if !tokio::fs::try_exists(file_path).await? {
        return Ok(None);
    }
    Ok(Some(describe_artifact(task, file_path, false).await?))
}

async fn fresh_artifact(task: &Task, file_path: &Path) -> Result<CaptureRecord, CaptureError> {
    describe_artifact(task, file_path, true).await
}

/// Read size and pixel dimensions back from the artifact on disk.
async fn describe_artifact(
    task: &Task,
    file_path: &Path,
    fresh: bool,
) -> Result<CaptureRecord, CaptureError> {
    let size = tokio::fs::metadata(file_path).await?.len();
    let filename = file_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(CaptureRecord {
        index: task.index,
        address: task.address.clone(),
        filename,
        size,
        dimensions: image::image_dimensions(file_path).ok(),
        fresh,
        timestamp: Local::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("torsnap-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn task(index: usize) -> Task {
        Task {
            index,
            address: format!("http://{}d.onion", "a".repeat(54)),
        }
    }

    #[tokio::test]
    async fn missing_artifact_is_not_existing() {
        let dir = scratch_dir("missing");
        let path = dir.join("nothing-here.png");

        let found = existing_artifact(&task(1), &path).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn existing_artifact_is_described_not_rewritten() {
        let dir = scratch_dir("existing");
        let path = dir.join("site.onion.png");
        std::fs::write(&path, b"prior run bytes").unwrap();

        let record = existing_artifact(&task(7), &path)
            .await
            .unwrap()
            .expect("artifact exists");

        assert!(!record.fresh);
        assert_eq!(record.index, 7);
        assert_eq!(record.filename, "site.onion.png");
        assert_eq!(record.size, b"prior run bytes".len() as u64);
        // not a real png, so no dimensions; the record tolerates that
        assert!(record.dimensions.is_none());

        // the artifact's bytes are untouched
        assert_eq!(std::fs::read(&path).unwrap(), b"prior run bytes");
    }

    #[tokio::test]
    async fn existence_check_is_reproducible() {
        let dir = scratch_dir("repro");
        let path = dir.join("stable.onion.png");
        std::fs::write(&path, b"x").unwrap();

        for _ in 0..3 {
            let found = existing_artifact(&task(2), &path).await.unwrap();
            assert!(found.is_some());
        }
    }
}
