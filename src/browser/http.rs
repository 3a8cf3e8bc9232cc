// Plain HTTP driver: fetches markup without rendering scripts.
use crate::browser::{BrowserDriver, BrowserSession, ResourceKind};
use crate::model::DriverError;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

pub struct HttpDriver {
    user_agent: String,
}

impl HttpDriver {
    pub fn new(user_agent: &str) -> Self {
        Self { user_agent: user_agent.to_string() }
    }
}

#[async_trait::async_trait]
impl BrowserDriver for HttpDriver {
    async fn open_session(&self) -> Result<Box<dyn BrowserSession>, DriverError> {
        // A client per session keeps connections and cookies apart.
        let client = Client::builder()
            .user_agent(&self.user_agent)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| DriverError::Unavailable(e.to_string()))?;

        Ok(Box::new(HttpSession { client, body: None }))
    }
}

struct HttpSession {
    client: Client,
    body: Option<String>,
}

#[async_trait::async_trait]
impl BrowserSession for HttpSession {
    async fn block_resources(&mut self, _kinds: &[ResourceKind]) -> Result<(), DriverError> {
        // Sub-resources are never requested.
        Ok(())
    }

    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), DriverError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(map_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(DriverError::Navigation(format!("HTTP {} from {}", status, url)));
        }

        let body = response.text().await.map_err(map_reqwest)?;
        debug!(url, bytes = body.len(), "page body received");
        self.body = Some(body);
        Ok(())
    }

    async fn markup(&mut self) -> Result<String, DriverError> {
        self.body
            .clone()
            .ok_or_else(|| DriverError::Content("no page loaded".into()))
    }

    async fn visible_text(&mut self) -> Result<Option<String>, DriverError> {
        Ok(None)
    }

    async fn close(self: Box<Self>) -> Result<(), DriverError> {
        Ok(())
    }
}

fn map_reqwest(e: reqwest::Error) -> DriverError {
    if e.is_timeout() {
        DriverError::Timeout
    } else {
        DriverError::Navigation(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn markup_before_navigation_is_an_error() {
        let driver = HttpDriver::new("test-agent");
        let mut session = driver.open_session().await.unwrap();
        assert!(matches!(session.markup().await, Err(DriverError::Content(_))));
        assert_eq!(session.visible_text().await.unwrap(), None);
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn malformed_url_is_a_navigation_error() {
        let driver = HttpDriver::new("test-agent");
        let mut session = driver.open_session().await.unwrap();
        let err = session.navigate("not a url", Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, DriverError::Navigation(_)));
    }
}
