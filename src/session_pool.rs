//! Bounded pool of browser-automation sessions
//!
//! The pool is created once before work begins, hands out exclusive RAII
//! guards to workers, and is drained exactly once at shutdown. It is generic
//! over the session type so the checkout discipline can be exercised without
//! launching real browsers.

use crate::{build_browser_config, CaptureError, Config};
use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::collections::VecDeque;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{info, warn};

/// Something the pool can own and eventually terminate.
#[async_trait]
pub trait PoolItem: Send + 'static {
    async fn terminate(self);
}

/// Bounded collection of reusable sessions
///
/// Invariants: the number of concurrently checked-out sessions never exceeds
/// the capacity fixed at [`SessionPool::open`]; a session is held by at most
/// one guard at a time; [`SessionPool::close`] terminates every session
/// exactly once, and a second close is a no-op.
pub struct SessionPool<S: PoolItem> {
    slots: Mutex<VecDeque<S>>,
    permits: Arc<Semaphore>,
    capacity: usize,
    closed: AtomicBool,
}

impl<S: PoolItem> SessionPool<S> {
    /// Eagerly create `capacity` sessions via `make`.
    ///
    /// If any session fails to start, the ones already created are terminated
    /// and the whole open fails; a partially-filled pool is never returned.
    pub async fn open<F, Fut>(capacity: usize, mut make: F) -> Result<Arc<Self>, CaptureError>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<S, CaptureError>>,
    {
        let mut created: Vec<S> = Vec::with_capacity(capacity);
        for index in 0..capacity {
            match make(index).await {
                Ok(session) => created.push(session),
                Err(e) => {
                    warn!("session {index} failed to start, aborting pool creation");
                    for session in created {
                        session.terminate().await;
                    }
                    return Err(match e {
                        already @ CaptureError::SessionInit(_) => already,
                        other => CaptureError::SessionInit(other.to_string()),
                    });
                }
            }
        }

        info!("Session pool opened with {capacity} instances");
        Ok(Arc::new(Self {
            slots: Mutex::new(created.into()),
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
            closed: AtomicBool::new(false),
        }))
    }

    /// Block until a session is available and take exclusive ownership of it.
    ///
    /// The returned guard gives the session back automatically when dropped,
    /// on success and failure paths alike.
    pub async fn acquire(self: &Arc<Self>) -> Result<PooledSession<S>, CaptureError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CaptureError::PoolClosed);
        }

        let permit = self.permits.clone().acquire_owned().await?;
        let session = self
            .slots
            .lock()
            .unwrap()
            .pop_front()
            // a held permit guarantees a slot; empty means close() raced us
            .ok_or(CaptureError::PoolClosed)?;

        Ok(PooledSession {
            session: Some(session),
            pool: Arc::clone(self),
            _permit: permit,
        })
    }

    /// Drain the pool and terminate every session.
    ///
    /// Waits for outstanding guards to come home first, so it is safe to call
    /// once workers have stopped acquiring. Calling it again is a no-op.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        info!("Closing session pool...");
        if let Ok(all) = self.permits.acquire_many(self.capacity as u32).await {
            all.forget();
        }
        self.permits.close();

        let drained: Vec<S> = {
            let mut slots = self.slots.lock().unwrap();
            slots.drain(..).collect()
        };
        for session in drained {
            session.terminate().await;
        }
        info!("Session pool closed");
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Exclusive checkout of one session; ownership is transient and returns to
/// the pool on drop.
pub struct PooledSession<S: PoolItem> {
    session: Option<S>,
    pool: Arc<SessionPool<S>>,
    _permit: OwnedSemaphorePermit,
}

impl<S: PoolItem> Deref for PooledSession<S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.session.as_ref().expect("session present until drop")
    }
}

impl<S: PoolItem> DerefMut for PooledSession<S> {
    fn deref_mut(&mut self) -> &mut S {
        self.session.as_mut().expect("session present until drop")
    }
}

impl<S: PoolItem> Drop for PooledSession<S> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.pool.slots.lock().unwrap().push_back(session);
        }
        // the permit drops after this body, so the slot is back before the
        // next acquirer wakes
    }
}

/// One Chromium instance pre-configured to route through the anonymizing
/// proxy, plus the task pumping its CDP event stream.
pub struct BrowserSession {
    id: usize,
    browser: Browser,
    handler: tokio::task::JoinHandle<()>,
}

impl BrowserSession {
    pub async fn launch(id: usize, config: &Config) -> Result<Self, CaptureError> {
        if config.headless {
            info!("Running headless on session {id}...");
        }

        let browser_config = build_browser_config(config)?;
        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| CaptureError::SessionInit(e.to_string()))?;

        // The handler is a stream that must be polled for the browser to make
        // progress; it ends when the browser goes away.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("session CDP handler error: {e}");
                    break;
                }
            }
        });

        Ok(Self {
            id,
            browser,
            handler: handler_task,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Open a new page on the given address; navigation starts immediately.
    pub async fn open_page(&self, address: &str) -> Result<Page, CaptureError> {
        self.browser
            .new_page(address)
            .await
            .map_err(|e| CaptureError::Navigation(e.to_string()))
    }
}

#[async_trait]
impl PoolItem for BrowserSession {
    async fn terminate(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("session {} close error: {e}", self.id);
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct MockSession {
        terminated: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PoolItem for MockSession {
        async fn terminate(self) {
            self.terminated.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn mock_pool(
        capacity: usize,
    ) -> (Arc<SessionPool<MockSession>>, Arc<AtomicUsize>) {
        let terminated = Arc::new(AtomicUsize::new(0));
        let counter = terminated.clone();
        let pool = SessionPool::open(capacity, move |_| {
            let terminated = counter.clone();
            async move { Ok(MockSession { terminated }) }
        })
        .await
        .unwrap();
        (pool, terminated)
    }

    #[tokio::test]
    async fn open_failure_aborts_entirely() {
        let terminated = Arc::new(AtomicUsize::new(0));
        let counter = terminated.clone();

        let result = SessionPool::open(3, move |index| {
            let terminated = counter.clone();
            async move {
                if index == 2 {
                    Err(CaptureError::SessionInit("boom".to_string()))
                } else {
                    Ok(MockSession { terminated })
                }
            }
        })
        .await;

        assert!(matches!(result, Err(CaptureError::SessionInit(_))));
        // the two sessions that did start were torn down, not leaked
        assert_eq!(terminated.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn checkout_never_exceeds_capacity() {
        let (pool, _) = mock_pool(2).await;

        let in_use = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let pool = pool.clone();
            let in_use = in_use.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                let _session = pool.acquire().await.unwrap();
                let now = in_use.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                in_use.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(in_use.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn dropped_guard_makes_session_reacquirable() {
        let (pool, _) = mock_pool(1).await;

        let guard = pool.acquire().await.unwrap();
        drop(guard);

        // would hang forever if the release were lost
        let again = tokio::time::timeout(Duration::from_secs(1), pool.acquire()).await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn close_terminates_each_session_once() {
        let (pool, terminated) = mock_pool(3).await;

        pool.close().await;
        assert_eq!(terminated.load(Ordering::SeqCst), 3);

        // double-drain is a no-op
        pool.close().await;
        assert_eq!(terminated.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn close_waits_for_outstanding_guards() {
        let (pool, terminated) = mock_pool(2).await;

        let guard = pool.acquire().await.unwrap();
        let closer = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.close().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        // the session held by the guard cannot have been terminated yet
        assert!(terminated.load(Ordering::SeqCst) < 2);

        drop(guard);
        closer.await.unwrap();
        assert_eq!(terminated.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn acquire_after_close_fails() {
        let (pool, _) = mock_pool(1).await;
        pool.close().await;
        assert!(matches!(
            pool.acquire().await,
            Err(CaptureError::PoolClosed)
        ));
    }
}
