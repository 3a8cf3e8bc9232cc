// Scripted in-memory driver for tests.
use crate::browser::{BrowserDriver, BrowserSession, ResourceKind};
use crate::model::DriverError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone)]
pub enum Script {
    /// Loads after `delay` and exposes `text` as rendered text.
    Text { text: String, delay: Duration },
    /// Loads after `delay`; markup only, no rendered text.
    Markup { markup: String, delay: Duration },
    /// Fails navigation with a driver error.
    Fail(String),
    /// Never finishes loading.
    Hang,
}

#[derive(Debug, Default)]
pub struct MockStats {
    pub open: AtomicUsize,
    pub peak: AtomicUsize,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub blocked: Mutex<Vec<ResourceKind>>,
}

#[derive(Default)]
pub struct MockDriver {
    scripts: HashMap<String, Script>,
    pub stats: Arc<MockStats>,
    pub refuse_sessions: AtomicBool,
    pub shut_down: AtomicBool,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, text: &str, delay_ms: u64) -> Self {
        self.scripts.insert(
            url.to_string(),
            Script::Text { text: text.to_string(), delay: Duration::from_millis(delay_ms) },
        );
        self
    }

    pub fn markup(mut self, url: &str, markup: &str) -> Self {
        self.scripts.insert(
            url.to_string(),
            Script::Markup { markup: markup.to_string(), delay: Duration::ZERO },
        );
        self
    }

    pub fn script(mut self, url: &str, script: Script) -> Self {
        self.scripts.insert(url.to_string(), script);
        self
    }
}

#[async_trait::async_trait]
impl BrowserDriver for MockDriver {
    async fn open_session(&self) -> Result<Box<dyn BrowserSession>, DriverError> {
        if self.refuse_sessions.load(Ordering::SeqCst) {
            return Err(DriverError::Unavailable("browser crashed".into()));
        }
        let open = self.stats.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.peak.fetch_max(open, Ordering::SeqCst);
        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            scripts: self.scripts.clone(),
            stats: self.stats.clone(),
            loaded: None,
        }))
    }

    async fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }
}

struct MockSession {
    scripts: HashMap<String, Script>,
    stats: Arc<MockStats>,
    loaded: Option<Script>,
}

#[async_trait::async_trait]
impl BrowserSession for MockSession {
    async fn block_resources(&mut self, kinds: &[ResourceKind]) -> Result<(), DriverError> {
        if let Ok(mut blocked) = self.stats.blocked.lock() {
            blocked.extend_from_slice(kinds);
        }
        Ok(())
    }

    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), DriverError> {
        let script = self
            .scripts
            .get(url)
            .cloned()
            .ok_or_else(|| DriverError::Navigation(format!("unknown host for {}", url)))?;

        match &script {
            Script::Text { delay, .. } | Script::Markup { delay, .. } => {
                if *delay > timeout {
                    sleep(timeout).await;
                    return Err(DriverError::Timeout);
                }
                sleep(*delay).await;
            }
            Script::Fail(message) => return Err(DriverError::Navigation(message.clone())),
            Script::Hang => {
                sleep(timeout).await;
                return Err(DriverError::Timeout);
            }
        }

        self.loaded = Some(script);
        Ok(())
    }

    async fn markup(&mut self) -> Result<String, DriverError> {
        match &self.loaded {
            Some(Script::Markup { markup, .. }) => Ok(markup.clone()),
            Some(Script::Text { text, .. }) => Ok(format!("<html><body><pre>{}</pre></body></html>", text)),
            _ => Err(DriverError::Content("nothing loaded".into())),
        }
    }

    async fn visible_text(&mut self) -> Result<Option<String>, DriverError> {
        match &self.loaded {
            Some(Script::Text { text, .. }) => Ok(Some(text.clone())),
            _ => Ok(None),
        }
    }

    async fn close(self: Box<Self>) -> Result<(), DriverError> {
        self.stats.open.fetch_sub(1, Ordering::SeqCst);
        self.stats.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
