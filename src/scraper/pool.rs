// Bounded pool of browsing sessions.
use crate::browser::{BrowserDriver, BrowserSession};
use crate::model::{DriverError, PoolError};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

/// Caps how many browsing sessions exist at once, process-wide.
///
/// Waiters queue on a FIFO semaphore. Every session comes out of the driver
/// fresh and is closed when its handle is released or dropped.
pub struct ResourcePool {
    driver: Arc<dyn BrowserDriver>,
    slots: Arc<Semaphore>,
    capacity: usize,
}

impl ResourcePool {
    pub fn new(driver: Arc<dyn BrowserDriver>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            driver,
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Waits for a free slot, then opens a session in it.
    pub async fn acquire(&self) -> Result<SessionHandle, PoolError> {
        let permit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| PoolError::ResourceUnavailable("pool is closed".into()))?;

        // On failure the permit drops here and the slot is free again.
        let session = self
            .driver
            .open_session()
            .await
            .map_err(|e| PoolError::ResourceUnavailable(e.to_string()))?;

        debug!(available = self.available(), "session slot acquired");
        Ok(SessionHandle {
            session: Some(session),
            permit: Some(permit),
        })
    }

    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Stops handing out sessions and shuts the driver down.
    pub async fn close(&self) {
        self.slots.close();
        self.driver.shutdown().await;
    }
}

/// Exclusive use of one session and one pool slot.
///
/// `release` closes the session and frees the slot. A handle dropped on an
/// error path or by cancellation frees both as well.
pub struct SessionHandle {
    session: Option<Box<dyn BrowserSession>>,
    permit: Option<OwnedSemaphorePermit>,
}

impl SessionHandle {
    pub fn session(&mut self) -> Result<&mut (dyn BrowserSession + 'static), DriverError> {
        self.session
            .as_deref_mut()
            .ok_or_else(|| DriverError::Content("session already released".into()))
    }

    pub async fn release(mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.close().await {
                warn!("Failed to close browsing session: {}", e);
            }
        }
        self.permit.take();
        debug!("session slot released");
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        let permit = self.permit.take();
        // Closing is async; the slot stays taken until the close finishes.
        if let Ok(runtime) = Handle::try_current() {
            runtime.spawn(async move {
                if let Err(e) = session.close().await {
                    warn!("Failed to close abandoned session: {}", e);
                }
                drop(permit);
            });
        }
    }
}
