//! Exclusively owned browser sessions with guaranteed teardown.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::driver::{Connector, Driver};
use crate::errors::{HarnessError, Result};

/// Lifecycle of a [`Session`]: `Created -> Active -> Closed`.
///
/// `Created` covers the browser start inside [`Session::acquire`]. It is
/// never observed through a `Session` value, since `acquire` only returns
/// sessions that are already `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Created,
    Active,
    Closed,
}

/// One browser instance owned by one scenario
pub struct Session<D: Driver> {
    id: Uuid,
    config: SessionConfig,
    pub(crate) driver: D,
    state: SessionState,
}

impl<D: Driver> Session<D> {
    /// Start a browser and return it ready for navigation.
    ///
    /// No session is returned if the driver cannot start.
    pub async fn acquire<C>(connector: &C, config: SessionConfig) -> Result<Self>
    where
        C: Connector<Driver = D>,
    {
        let id = Uuid::new_v4();
        debug!("Session {} {:?}, starting browser", id, SessionState::Created);

        let driver = connector.connect(&config).await.map_err(|e| match e {
            HarnessError::SessionStart(_) => e,
            other => HarnessError::SessionStart(other.to_string()),
        })?;

        info!("Session {} active ({:?})", id, config.browser);
        Ok(Session {
            id,
            config,
            driver,
            state: SessionState::Active,
        })
    }

    /// Wrap an already running driver
    pub fn attach(driver: D, config: SessionConfig) -> Self {
        Session {
            id: Uuid::new_v4(),
            config,
            driver,
            state: SessionState::Active,
        }
    }

    /// Acquire a session, run `body` with it, and release it however `body` ends
    pub async fn scoped<C, T, F>(connector: &C, config: SessionConfig, body: F) -> Result<T>
    where
        C: Connector<Driver = D>,
        F: AsyncFnOnce(&mut Session<D>) -> Result<T>,
    {
        let mut session = Session::acquire(connector, config).await?;
        let result = body(&mut session).await;
        if let Err(e) = session.release().await {
            warn!("Failed to release session {}: {}", session.id, e);
        }
        result
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn ensure_active(&self, operation: &'static str) -> Result<()> {
        match self.state {
            SessionState::Active => Ok(()),
            _ => Err(HarnessError::Lifecycle {
                session_id: self.id.to_string(),
                operation,
            }),
        }
    }

    /// Load `url`; element handles from the previous document cannot survive this
    pub async fn navigate(&mut self, url: &str) -> Result<()> {
        self.ensure_active("navigate")?;
        self.driver.navigate(url).await
    }

    pub async fn current_url(&self) -> Result<String> {
        self.ensure_active("read the current url")?;
        self.driver.current_url().await
    }

    /// Close the browser. Calling this on a closed session does nothing.
    pub async fn release(&mut self) -> Result<()> {
        if self.state == SessionState::Closed {
            debug!("Session {} already closed", self.id);
            return Ok(());
        }

        self.state = SessionState::Closed;
        info!("Releasing session {}", self.id);
        self.driver.close().await
    }
}

impl<D: Driver> Drop for Session<D> {
    fn drop(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closed;
        warn!("Session {} dropped while active, closing in background", self.id);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let driver = self.driver.clone();
                let id = self.id;
                handle.spawn(async move {
                    if let Err(e) = driver.close().await {
                        warn!("Background close of session {} failed: {}", id, e);
                    }
                });
            }
            Err(_) => warn!("No async runtime available; session {} leaked", self.id),
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;
