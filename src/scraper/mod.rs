// Scraper module: session pool and page fetching.

pub mod fetcher;
pub mod pool;

use crate::model::FetchResult;
use std::time::Duration;

pub use fetcher::PageFetcher;
pub use pool::ResourcePool;

#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, deadline: Duration) -> FetchResult;
}
