//! Resource-aware page dispatcher.
//!
//! Caps simultaneous browser sessions, rate-limits page loads, and
//! retries transient faults (429/503-class) with bounded exponential
//! backoff before giving up on that URL only. The dispatcher is passed
//! into components explicitly; there are no process-wide limiters.

use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{Quota, RateLimiter};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{NavResult, NavigationError};
use crate::traits::browser::Browser;
use crate::types::config::{DispatchConfig, RetryPolicy};

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Retry an operation under a bounded exponential-backoff policy.
///
/// `is_retryable` decides which errors are worth another attempt;
/// everything else fails immediately.
pub async fn with_retries<T, E, F, Fut>(
    policy: &RetryPolicy,
    is_retryable: impl Fn(&E) -> bool,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if is_retryable(&e) && attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying after transient fault");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Shared dispatcher for page fetches.
#[derive(Clone)]
pub struct PageDispatcher {
    sessions: Arc<Semaphore>,
    limiter: Arc<DefaultRateLimiter>,
    config: DispatchConfig,
}

impl PageDispatcher {
    pub fn new(config: DispatchConfig) -> Self {
        let quota = Quota::per_second(
            NonZeroU32::new(config.requests_per_second.max(1)).unwrap_or(NonZeroU32::MIN),
        );
        Self {
            sessions: Arc::new(Semaphore::new(config.max_sessions.max(1))),
            limiter: Arc::new(RateLimiter::direct(quota)),
            config,
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Fetch the readable content of one URL.
    ///
    /// A session permit is held only while the page is actually open;
    /// it is released across backoff sleeps so a URL waiting out a
    /// transient fault does not starve other fetches.
    pub async fn fetch_content(
        &self,
        browser: &dyn Browser,
        url: &str,
        cancel: &CancellationToken,
    ) -> NavResult<String> {
        with_retries(&self.config.retry, NavigationError::is_retryable, || async {
            if cancel.is_cancelled() {
                return Err(NavigationError::Cancelled);
            }
            let _permit = self
                .sessions
                .acquire()
                .await
                .map_err(|_| NavigationError::Cancelled)?;
            self.limiter.until_ready().await;

            let page = browser.open_page().await?;
            page.goto(url).await?;
            page.content().await
        })
        .await
    }

    /// Fetch many URLs concurrently, bounded by the session cap.
    ///
    /// Per-URL faults do not abort siblings; each URL resolves to its
    /// own result.
    pub async fn fetch_many(
        &self,
        browser: Arc<dyn Browser>,
        urls: &[String],
        cancel: &CancellationToken,
    ) -> Vec<(String, NavResult<String>)> {
        let mut tasks = tokio::task::JoinSet::new();
        for url in urls {
            let dispatcher = self.clone();
            let browser = browser.clone();
            let url = url.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let result = dispatcher.fetch_content(browser.as_ref(), &url, &cancel).await;
                if let Err(e) = &result {
                    warn!(url = %url, "page fetch failed: {e}");
                }
                (url, result)
            });
        }

        let mut results = Vec::with_capacity(urls.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(entry) => results.push(entry),
                Err(e) => warn!("fetch task panicked or was aborted: {e}"),
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::{Duration, Instant};

    use async_trait::async_trait;

    use crate::traits::browser::{BrowserPage, ElementHandle};

    /// Pages whose URL contains "flaky" always fail with a 429.
    struct StubBrowser;

    struct StubPage;

    #[async_trait]
    impl Browser for StubBrowser {
        async fn open_page(&self) -> NavResult<Box<dyn BrowserPage>> {
            Ok(Box::new(StubPage))
        }
    }

    #[async_trait]
    impl BrowserPage for StubPage {
        async fn goto(&self, url: &str) -> NavResult<()> {
            if url.contains("flaky") {
                return Err(NavigationError::Transient { status: 429 });
            }
            Ok(())
        }

        async fn current_url(&self) -> NavResult<String> {
            Ok(String::new())
        }

        async fn wait_for_selector(&self, _selector: &str) -> NavResult<()> {
            Ok(())
        }

        async fn query(&self, _selector: &str) -> NavResult<Option<ElementHandle>> {
            Ok(None)
        }

        async fn query_all(&self, _selector: &str) -> NavResult<Vec<ElementHandle>> {
            Ok(Vec::new())
        }

        async fn query_within(
            &self,
            _parent: ElementHandle,
            _selector: &str,
        ) -> NavResult<Vec<ElementHandle>> {
            Ok(Vec::new())
        }

        async fn inner_text(&self, _element: ElementHandle) -> NavResult<String> {
            Ok(String::new())
        }

        async fn attribute(
            &self,
            _element: ElementHandle,
            _name: &str,
        ) -> NavResult<Option<String>> {
            Ok(None)
        }

        async fn click(&self, _element: ElementHandle) -> NavResult<()> {
            Ok(())
        }

        async fn fill(&self, _element: ElementHandle, _value: &str) -> NavResult<()> {
            Ok(())
        }

        async fn press(&self, _element: ElementHandle, _key: &str) -> NavResult<()> {
            Ok(())
        }

        async fn content(&self) -> NavResult<String> {
            Ok("page text".to_string())
        }
    }

    #[tokio::test]
    async fn test_backoff_releases_session_slot() {
        // One session, long backoff: a URL waiting out a 429 must not
        // block a healthy fetch in the meantime.
        let dispatcher = PageDispatcher::new(DispatchConfig {
            max_sessions: 1,
            requests_per_second: 1000,
            retry: RetryPolicy {
                max_retries: 3,
                base_delay_ms: 200,
                max_delay_ms: 200,
            },
        });
        let cancel = CancellationToken::new();

        let flaky = {
            let dispatcher = dispatcher.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                dispatcher
                    .fetch_content(&StubBrowser, "https://x.bg/flaky", &cancel)
                    .await
            })
        };

        // Let the flaky fetch fail its first attempt and enter backoff
        tokio::time::sleep(Duration::from_millis(50)).await;

        let started = Instant::now();
        let healthy = dispatcher
            .fetch_content(&StubBrowser, "https://x.bg/ok", &cancel)
            .await;
        assert!(healthy.is_ok());
        assert!(started.elapsed() < Duration::from_millis(150));

        assert!(flaky.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
        };
        let attempts = AtomicU32::new(0);

        let result: NavResult<&str> =
            with_retries(&policy, NavigationError::is_retryable, || async {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(NavigationError::Transient { status: 429 })
                } else {
                    Ok("done")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_bounded_retries() {
        let policy = RetryPolicy {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 5,
        };
        let attempts = AtomicU32::new(0);

        let result: NavResult<()> =
            with_retries(&policy, NavigationError::is_retryable, || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(NavigationError::Transient { status: 503 })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3); // initial + 2 retries
    }

    #[tokio::test]
    async fn test_non_retryable_fails_fast() {
        let policy = RetryPolicy::default();
        let attempts = AtomicU32::new(0);

        let result: NavResult<()> =
            with_retries(&policy, NavigationError::is_retryable, || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(NavigationError::SelectorNotFound {
                    selector: ".x".to_string(),
                })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
