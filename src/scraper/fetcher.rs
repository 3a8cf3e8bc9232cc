use crate::browser::ResourceKind;
use crate::model::{DriverError, FetchResult, PageContent};
use crate::scraper::pool::{ResourcePool, SessionHandle};
use crate::scraper::Fetcher;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout, timeout_at, Instant};
use tracing::{debug, warn};

/// Upper bound for reading content out of a loaded page.
const EXTRACT_TIMEOUT: Duration = Duration::from_secs(10);

/// Loads one page per call through a pooled session.
pub struct PageFetcher {
    pool: Arc<ResourcePool>,
    settle: Duration,
}

impl PageFetcher {
    pub fn new(pool: Arc<ResourcePool>, settle: Duration) -> Self {
        Self { pool, settle }
    }

    async fn load(&self, handle: &mut SessionHandle, url: &str, deadline: Instant) -> Result<PageContent, DriverError> {
        let session = handle.session()?;

        if let Err(e) = session.block_resources(&ResourceKind::NON_ESSENTIAL).await {
            warn!(url, "Could not block sub-resources: {}", e);
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(DriverError::Timeout);
        }
        timeout_at(deadline, session.navigate(url, remaining))
            .await
            .map_err(|_| DriverError::Timeout)??;

        // Client-side widgets have no ready signal; give them a fixed moment.
        sleep(self.settle).await;

        let extract = async {
            let markup = session.markup().await?;
            let text = session.visible_text().await?;
            Ok::<_, DriverError>(PageContent { markup, text })
        };
        timeout(EXTRACT_TIMEOUT, extract)
            .await
            .map_err(|_| DriverError::Content("timed out reading page content".into()))?
    }
}

#[async_trait::async_trait]
impl Fetcher for PageFetcher {
    async fn fetch(&self, url: &str, deadline: Duration) -> FetchResult {
        let deadline = Instant::now() + deadline;

        let mut handle = match timeout_at(deadline, self.pool.acquire()).await {
            Ok(Ok(handle)) => handle,
            Ok(Err(e)) => {
                warn!(url, "No browsing session: {}", e);
                return FetchResult::Error(e.to_string());
            }
            Err(_) => {
                warn!(url, "Deadline passed while waiting for a browsing session");
                return FetchResult::Timeout;
            }
        };

        let loaded = self.load(&mut handle, url, deadline).await;
        handle.release().await;

        match loaded {
            Ok(content) => {
                debug!(url, bytes = content.markup.len(), rendered = content.text.is_some(), "page fetched");
                FetchResult::Success(content)
            }
            Err(DriverError::Timeout) => FetchResult::Timeout,
            Err(e) => {
                warn!(url, "Fetch failed: {}", e);
                FetchResult::Error(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::mock::{MockDriver, Script};
    use std::sync::atomic::Ordering;

    const SETTLE: Duration = Duration::from_secs(2);

    fn fetcher_with(driver: MockDriver, capacity: usize) -> (PageFetcher, Arc<ResourcePool>, Arc<MockDriver>) {
        let driver = Arc::new(driver);
        let pool = Arc::new(ResourcePool::new(driver.clone(), capacity));
        (PageFetcher::new(pool.clone(), SETTLE), pool, driver)
    }

    #[tokio::test(start_paused = true)]
    async fn success_carries_text_and_markup_after_settling() {
        let driver = MockDriver::new().page("http://site/a", "Mais de 9.5 1.72", 100);
        let (fetcher, pool, driver) = fetcher_with(driver, 3);

        let started = Instant::now();
        let result = fetcher.fetch("http://site/a", Duration::from_secs(15)).await;
        assert!(started.elapsed() >= Duration::from_millis(2100));

        match result {
            FetchResult::Success(content) => {
                assert_eq!(content.text.as_deref(), Some("Mais de 9.5 1.72"));
                assert!(content.markup.contains("Mais de 9.5"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(pool.available(), 3);
        assert_eq!(driver.stats.closed.load(Ordering::SeqCst), 1);
        assert_eq!(*driver.stats.blocked.lock().unwrap(), ResourceKind::NON_ESSENTIAL.to_vec());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_navigation_is_a_timeout_and_releases() {
        let driver = MockDriver::new().script("http://slow", Script::Hang);
        let (fetcher, pool, driver) = fetcher_with(driver, 1);

        let started = Instant::now();
        let result = fetcher.fetch("http://slow", Duration::from_secs(5)).await;
        assert_eq!(result, FetchResult::Timeout);
        assert!(started.elapsed() < Duration::from_secs(6));
        assert_eq!(pool.available(), 1);
        assert_eq!(driver.stats.open.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn page_slower_than_deadline_times_out() {
        let driver = MockDriver::new().page("http://late", "Over 9.5 1.9", 20_000);
        let (fetcher, _, _) = fetcher_with(driver, 1);
        assert_eq!(fetcher.fetch("http://late", Duration::from_secs(15)).await, FetchResult::Timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn driver_failure_becomes_error() {
        let driver = MockDriver::new().script("http://dns", Script::Fail("dns lookup failed".into()));
        let (fetcher, pool, _) = fetcher_with(driver, 1);

        match fetcher.fetch("http://dns", Duration::from_secs(5)).await {
            FetchResult::Error(msg) => assert!(msg.contains("dns lookup failed")),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_session_becomes_error() {
        let (fetcher, _, driver) = fetcher_with(MockDriver::new(), 1);
        driver.refuse_sessions.store(true, Ordering::SeqCst);

        match fetcher.fetch("http://any", Duration::from_secs(5)).await {
            FetchResult::Error(msg) => assert!(msg.starts_with("browser session unavailable")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn waiting_for_a_slot_counts_against_deadline() {
        let driver = MockDriver::new().page("http://site/a", "x", 0);
        let (fetcher, pool, _) = fetcher_with(driver, 1);
        let held = pool.acquire().await.unwrap();

        let result = fetcher.fetch("http://site/a", Duration::from_secs(3)).await;
        assert_eq!(result, FetchResult::Timeout);

        held.release().await;
        assert!(matches!(
            fetcher.fetch("http://site/a", Duration::from_secs(3)).await,
            FetchResult::Success(_)
        ));
    }
}
