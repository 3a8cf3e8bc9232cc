// Browser capability consumed by the scraping core.

#[cfg(feature = "chromium")]
pub mod chromium;
pub mod http;
#[cfg(test)]
pub mod mock;

use crate::model::DriverError;
use std::time::Duration;

pub use http::HttpDriver;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

/// Sub-resource types a session can refuse to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Image,
    Font,
    Stylesheet,
    Media,
}

impl ResourceKind {
    /// Everything a page needs no more than its markup and scripts for.
    pub const NON_ESSENTIAL: [ResourceKind; 4] = [
        ResourceKind::Image,
        ResourceKind::Font,
        ResourceKind::Stylesheet,
        ResourceKind::Media,
    ];
}

/// Opens isolated browsing contexts.
#[async_trait::async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn open_session(&self) -> Result<Box<dyn BrowserSession>, DriverError>;

    /// Tears down the engine at process exit.
    async fn shutdown(&self) {}
}

/// One isolated browsing context with its own cookies and storage.
#[async_trait::async_trait]
pub trait BrowserSession: Send {
    async fn block_resources(&mut self, kinds: &[ResourceKind]) -> Result<(), DriverError>;

    /// Navigates and returns once the DOM is built, or fails with
    /// `DriverError::Timeout` after `timeout`.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), DriverError>;

    async fn markup(&mut self) -> Result<String, DriverError>;

    /// Rendered visible text; `None` when the driver cannot render.
    async fn visible_text(&mut self) -> Result<Option<String>, DriverError>;

    async fn close(self: Box<Self>) -> Result<(), DriverError>;
}
