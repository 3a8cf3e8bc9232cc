// Headless Chromium driver: one browser process, one browser context per session.
use crate::browser::{BrowserDriver, BrowserSession, ResourceKind};
use crate::model::DriverError;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::CloseParams;
use chromiumoxide::cdp::browser_protocol::network::{EnableParams, SetBlockedUrLsParams};
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::cdp::browser_protocol::target::{
    BrowserContextId, CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::error::CdpError;
use futures::StreamExt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, warn};

const DOM_READY_JS: &str = "new Promise(r => document.readyState !== 'loading' \
     ? r(true) : document.addEventListener('DOMContentLoaded', () => r(true)))";
const VISIBLE_TEXT_JS: &str = "document.body ? document.body.innerText : ''";

pub struct ChromiumDriver {
    browser: Arc<Browser>,
    user_agent: String,
    handler: Mutex<Option<JoinHandle<()>>>,
}

impl ChromiumDriver {
    pub async fn launch(user_agent: &str) -> Result<Self, DriverError> {
        let config = BrowserConfig::builder()
            .no_sandbox()
            .args(vec![
                "--disable-dev-shm-usage",
                "--disable-gpu",
                "--ignore-certificate-errors",
                "--no-first-run",
                "--no-default-browser-check",
            ])
            .build()
            .map_err(DriverError::Unavailable)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| DriverError::Unavailable(e.to_string()))?;

        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    error!("Browser event error: {}", e);
                }
            }
        });
        info!("Headless Chromium launched");

        Ok(Self {
            browser: Arc::new(browser),
            user_agent: user_agent.to_string(),
            handler: Mutex::new(Some(handle)),
        })
    }
}

#[async_trait::async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn open_session(&self) -> Result<Box<dyn BrowserSession>, DriverError> {
        let unavailable = |e: CdpError| DriverError::Unavailable(e.to_string());

        let context = self
            .browser
            .execute(CreateBrowserContextParams::default())
            .await
            .map_err(unavailable)?
            .result
            .browser_context_id;

        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context.clone())
            .build()
            .map_err(DriverError::Unavailable)?;

        let page = match self.browser.new_page(target).await {
            Ok(page) => page,
            Err(e) => {
                dispose_context(&self.browser, context).await;
                return Err(unavailable(e));
            }
        };
        if let Err(e) = page.set_user_agent(self.user_agent.as_str()).await {
            warn!("Failed to set user agent: {}", e);
        }

        Ok(Box::new(ChromiumSession {
            browser: self.browser.clone(),
            page,
            context,
        }))
    }

    async fn shutdown(&self) {
        if let Err(e) = self.browser.execute(CloseParams::default()).await {
            warn!("Browser close failed: {}", e);
        }
        if let Ok(mut handler) = self.handler.lock() {
            if let Some(handle) = handler.take() {
                handle.abort();
            }
        }
        info!("Headless Chromium stopped");
    }
}

struct ChromiumSession {
    browser: Arc<Browser>,
    page: Page,
    context: BrowserContextId,
}

#[async_trait::async_trait]
impl BrowserSession for ChromiumSession {
    async fn block_resources(&mut self, kinds: &[ResourceKind]) -> Result<(), DriverError> {
        let patterns: Vec<String> = kinds
            .iter()
            .flat_map(|kind| url_patterns(*kind))
            .map(|ext| format!("*.{}", ext))
            .collect();

        self.page.execute(EnableParams::default()).await.map_err(navigation)?;
        self.page
            .execute(SetBlockedUrLsParams::new(patterns))
            .await
            .map_err(navigation)?;
        Ok(())
    }

    async fn navigate(&mut self, url: &str, limit: Duration) -> Result<(), DriverError> {
        let load = async {
            let response = self
                .page
                .execute(NavigateParams::new(url))
                .await
                .map_err(navigation)?;
            if let Some(error_text) = &response.result.error_text {
                return Err(DriverError::Navigation(error_text.clone()));
            }

            let ready = EvaluateParams::builder()
                .expression(DOM_READY_JS)
                .await_promise(true)
                .return_by_value(true)
                .build()
                .map_err(DriverError::Navigation)?;
            self.page.evaluate_expression(ready).await.map_err(navigation)?;
            Ok(())
        };

        match timeout(limit, load).await {
            Ok(result) => result,
            Err(_) => Err(DriverError::Timeout),
        }
    }

    async fn markup(&mut self) -> Result<String, DriverError> {
        self.page.content().await.map_err(|e| DriverError::Content(e.to_string()))
    }

    async fn visible_text(&mut self) -> Result<Option<String>, DriverError> {
        let result = self
            .page
            .evaluate(VISIBLE_TEXT_JS)
            .await
            .map_err(|e| DriverError::Content(e.to_string()))?;
        let text: String = result
            .into_value()
            .map_err(|e| DriverError::Content(e.to_string()))?;
        Ok(Some(text))
    }

    async fn close(self: Box<Self>) -> Result<(), DriverError> {
        let ChromiumSession { browser, page, context } = *self;
        let closed = page.close().await.map_err(|e| DriverError::Content(e.to_string()));
        dispose_context(&browser, context).await;
        closed
    }
}

async fn dispose_context(browser: &Browser, context: BrowserContextId) {
    if let Err(e) = browser.execute(DisposeBrowserContextParams::new(context)).await {
        warn!("Failed to dispose browser context: {}", e);
    }
}

fn navigation(e: CdpError) -> DriverError {
    match e {
        CdpError::Timeout => DriverError::Timeout,
        other => DriverError::Navigation(other.to_string()),
    }
}

fn url_patterns(kind: ResourceKind) -> &'static [&'static str] {
    match kind {
        ResourceKind::Image => &["png", "jpg", "jpeg", "gif", "webp", "svg", "ico"],
        ResourceKind::Font => &["woff", "woff2", "ttf", "otf", "eot"],
        ResourceKind::Stylesheet => &["css"],
        ResourceKind::Media => &["mp4", "webm", "mp3", "ogg", "m3u8"],
    }
}
