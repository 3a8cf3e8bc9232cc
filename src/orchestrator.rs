// Fan-out/fan-in over the sites of one request.
use crate::model::{FetchResult, ScrapeRequest, ScrapeResponse, SiteResult, TIMEOUT_MESSAGE};
use crate::parser::{OddsExtractor, SiteProfile, SiteRegistry};
use crate::scraper::Fetcher;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub struct ScrapeOrchestrator {
    fetcher: Arc<dyn Fetcher>,
    registry: Arc<SiteRegistry>,
    extractor: Arc<OddsExtractor>,
}

impl ScrapeOrchestrator {
    pub fn new(fetcher: Arc<dyn Fetcher>, registry: Arc<SiteRegistry>, extractor: OddsExtractor) -> Self {
        Self {
            fetcher,
            registry,
            extractor: Arc::new(extractor),
        }
    }

    /// Scrapes every targeted site concurrently and waits for all of them.
    ///
    /// Each site runs on its own task; a timeout, error or panic in one only
    /// shows up in that site's result.
    pub async fn scrape(&self, request: &ScrapeRequest) -> ScrapeResponse {
        info!(
            market = %request.market,
            sites = request.targets.len(),
            "Starting scrape"
        );

        let tasks: Vec<_> = request
            .targets
            .iter()
            .filter(|(_, url)| !url.trim().is_empty())
            .map(|(site, url)| {
                let site = site.clone();
                let url = url.trim().to_string();
                let job = SiteJob {
                    fetcher: self.fetcher.clone(),
                    extractor: self.extractor.clone(),
                    profile: self
                        .registry
                        .get(&site)
                        .cloned()
                        .unwrap_or_else(|| SiteProfile::bare(&site)),
                    market: request.market.clone(),
                    deadline: request.deadline,
                    include_quotes: request.include_quotes,
                };
                let handle = tokio::spawn(job.run(url.clone()));
                async move {
                    let result = match handle.await {
                        Ok(result) => result,
                        Err(e) => {
                            error!(site = %site, "Scrape task failed: {}", e);
                            SiteResult::failed(&url, format!("scrape task failed: {}", e))
                        }
                    };
                    (site, result)
                }
            })
            .collect();

        let sites: BTreeMap<String, SiteResult> = join_all(tasks).await.into_iter().collect();
        let found = sites.values().filter(|r| r.ok).count();
        info!(market = %request.market, found, total = sites.len(), "Scrape finished");

        ScrapeResponse {
            market: request.market.clone(),
            sites,
        }
    }
}

/// Everything one site task owns.
struct SiteJob {
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<OddsExtractor>,
    profile: SiteProfile,
    market: String,
    deadline: Duration,
    include_quotes: bool,
}

impl SiteJob {
    async fn run(self, url: String) -> SiteResult {
        let site = self.profile.name.as_str();
        info!(site, url = %url, "Fetching page");

        match self.fetcher.fetch(&url, self.deadline).await {
            FetchResult::Success(content) => {
                let odds = self.extractor.extract(&content, &self.market, &self.profile);
                let mut result = SiteResult::from_odds(&url, odds);
                if self.include_quotes {
                    result.quotes = Some(self.extractor.scan_quotes(&content));
                }
                if result.ok {
                    info!(site, over = ?result.over, under = ?result.under, "Odds found");
                } else {
                    warn!(site, market = %self.market, "No odds found in page");
                }
                result
            }
            FetchResult::Timeout => {
                warn!(site, "Timed out loading page");
                SiteResult::failed(&url, TIMEOUT_MESSAGE)
            }
            FetchResult::Error(message) => {
                warn!(site, "Fetch error: {}", message);
                SiteResult::failed(&url, message)
            }
        }
    }
}
