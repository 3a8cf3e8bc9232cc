// Core structs: requests, fetch outcomes, per-site results
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

pub const TIMEOUT_MESSAGE: &str = "timeout loading page";
pub const NO_ODDS_MESSAGE: &str = "no odds found in page";

/// One scrape call: a market line and the pages to read it from.
#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    pub market: String,
    /// Site name -> target URL. Only non-empty URLs end up here.
    pub targets: BTreeMap<String, String>,
    pub deadline: Duration,
    pub include_quotes: bool,
}

/// Raw page content handed from the fetcher to the extractor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageContent {
    pub markup: String,
    /// Rendered visible text, when the driver can produce it.
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchResult {
    Success(PageContent),
    Timeout,
    Error(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OddsPair {
    pub over: Option<f64>,
    pub under: Option<f64>,
}

impl OddsPair {
    pub fn is_empty(&self) -> bool {
        self.over.is_none() && self.under.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteKind {
    Over,
    Under,
    Exactly,
}

/// A single "kind line odd" row found on a page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub kind: QuoteKind,
    pub line: f64,
    pub odd: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteResult {
    pub ok: bool,
    pub url: String,
    pub over: Option<f64>,
    pub under: Option<f64>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quotes: Option<Vec<Quote>>,
}

impl SiteResult {
    pub fn from_odds(url: &str, odds: OddsPair) -> Self {
        let ok = !odds.is_empty();
        Self {
            ok,
            url: url.to_string(),
            over: odds.over,
            under: odds.under,
            error: if ok { None } else { Some(NO_ODDS_MESSAGE.to_string()) },
            quotes: None,
        }
    }

    pub fn failed(url: &str, error: impl Into<String>) -> Self {
        Self {
            ok: false,
            url: url.to_string(),
            over: None,
            under: None,
            error: Some(error.into()),
            quotes: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrapeResponse {
    pub market: String,
    #[serde(flatten)]
    pub sites: BTreeMap<String, SiteResult>,
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("could not open browsing context: {0}")]
    Unavailable(String),
    #[error("navigation timed out")]
    Timeout,
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("content extraction failed: {0}")]
    Content(String),
}

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("browser session unavailable: {0}")]
    ResourceUnavailable(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum RequestError {
    #[error("request is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("missing required field 'market'")]
    MissingMarket,
    #[error("invalid market line '{0}'")]
    InvalidMarket(String),
    #[error("url for site '{0}' must be a string")]
    InvalidUrl(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse settings file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid selector '{selector}' in profile '{site}'")]
    Selector { site: String, selector: String },
    #[error("unknown driver '{0}'")]
    UnknownDriver(String),
    #[error("driver startup failed: {0}")]
    Driver(String),
}
