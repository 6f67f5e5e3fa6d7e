use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder, Locator};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info};

use super::{Connector, Driver};
use crate::config::{BrowserType, SessionConfig, resolve_webdriver_url};
use crate::errors::{HarnessError, Result};
use crate::locator::Selector;
use crate::poller::{Condition, Probe, wait_until};

/// Browser controlled through a WebDriver endpoint
#[derive(Clone)]
pub struct WebDriver {
    client: Client,
    browser_type: BrowserType,
    // Removed once the last clone is dropped
    _profile_dir: Option<Arc<TempDir>>,
}

impl std::fmt::Debug for WebDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebDriver")
            .field("browser_type", &self.browser_type)
            .finish_non_exhaustive()
    }
}

fn driver_error(err: CmdError) -> HarnessError {
    let msg = err.to_string();
    if msg.contains("stale element") {
        HarnessError::StaleElement(msg)
    } else {
        HarnessError::Driver(msg)
    }
}

impl Driver for WebDriver {
    type Element = fantoccini::elements::Element;

    async fn navigate(&self, url: &str) -> Result<()> {
        info!("Navigating to {}", url);
        self.client.goto(url).await.map_err(driver_error)?;

        // Wait for the page to be ready; this helps avoid stale element references
        let ready = Condition::new("document.readyState == complete")
            .with_timeout(Duration::from_secs(2))
            .with_interval(Duration::from_millis(100));
        let client = &self.client;
        let outcome = wait_until(&ready, || async move {
            let value = client
                .execute("return document.readyState;", vec![])
                .await
                .map_err(driver_error)?;
            Ok::<_, HarnessError>(match value.as_str() {
                Some("complete") => Probe::Ready(()),
                other => Probe::NotYet(format!("readyState is {:?}", other)),
            })
        })
        .await;

        if !outcome.is_satisfied() {
            debug!("Page did not report readyState complete, continuing anyway");
        }
        Ok(())
    }

    async fn query(&self, selector: &Selector, scope: Option<&Self::Element>) -> Result<Vec<Self::Element>> {
        let css = selector.to_css();
        let found = match scope {
            Some(element) => element.find_all(Locator::Css(&css)).await,
            None => self.client.find_all(Locator::Css(&css)).await,
        };
        match found {
            Ok(elements) => Ok(elements),
            // Some drivers report an empty match as an error
            Err(e) if e.is_miss() => Ok(Vec::new()),
            Err(e) => Err(driver_error(e)),
        }
    }

    async fn text(&self, element: &Self::Element) -> Result<String> {
        element.text().await.map_err(driver_error)
    }

    async fn attribute(&self, element: &Self::Element, name: &str) -> Result<Option<String>> {
        element.attr(name).await.map_err(driver_error)
    }

    async fn is_displayed(&self, element: &Self::Element) -> Result<bool> {
        element.is_displayed().await.map_err(driver_error)
    }

    async fn tag_name(&self, element: &Self::Element) -> Result<String> {
        element.tag_name().await.map_err(driver_error)
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.client.current_url().await.map_err(driver_error)?.to_string())
    }

    async fn close(&self) -> Result<()> {
        debug!("Closing {:?} WebDriver session", self.browser_type);
        self.client.clone().close().await.map_err(driver_error)
    }
}

/// Opens WebDriver sessions against an externally managed driver
#[derive(Debug, Clone)]
pub struct WebDriverConnector {
    url: String,
}

impl WebDriverConnector {
    pub fn new(url: impl Into<String>) -> Self {
        WebDriverConnector { url: url.into() }
    }

    /// Endpoint from the flag, `RENDERPROBE_WEBDRIVER_URL`, or the browser default
    pub fn for_browser(browser: BrowserType, explicit: Option<String>) -> Self {
        WebDriverConnector::new(resolve_webdriver_url(browser, explicit))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn is_webdriver_running(url: &str) -> bool {
        // Try to connect to the WebDriver status endpoint
        let status_url = format!("{}/status", url.trim_end_matches('/'));

        match reqwest::get(&status_url).await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

impl Connector for WebDriverConnector {
    type Driver = WebDriver;

    async fn connect(&self, config: &SessionConfig) -> Result<WebDriver> {
        info!("Connecting to {:?} WebDriver at {}", config.browser, self.url);

        if !Self::is_webdriver_running(&self.url).await {
            let driver_name = config.browser.driver_name();
            return Err(HarnessError::SessionStart(format!(
                "Cannot connect to {} at {}. Please ensure it is running:\n  \
                 For Chrome: chromedriver --port 9515\n  \
                 For Firefox: geckodriver --port 4444",
                driver_name, self.url
            )));
        }

        // Chrome is strict about profile directory reuse, so every session gets its own
        let profile_dir = match config.browser {
            BrowserType::Chrome => Some(Arc::new(
                tempfile::Builder::new()
                    .prefix("renderprobe-chrome-")
                    .tempdir()
                    .map_err(|e| HarnessError::SessionStart(format!("Failed to create profile directory: {}", e)))?,
            )),
            BrowserType::Firefox => None,
        };

        let caps = config.capabilities(profile_dir.as_ref().map(|dir| dir.path()));
        debug!("Requesting capabilities: {}", serde_json::Value::Object(caps.clone()));

        let client = ClientBuilder::rustls()
            .capabilities(caps)
            .connect(&self.url)
            .await
            .map_err(|e| HarnessError::SessionStart(format!("Failed to connect to WebDriver: {}", e)))?;

        let size = config.window_size;
        if let Err(e) = client.set_window_size(size.width, size.height).await {
            // Window size is also passed as a launch flag; this is best-effort
            debug!("Note: Could not set window size: {}", e);
        }

        Ok(WebDriver {
            client,
            browser_type: config.browser,
            _profile_dir: profile_dir,
        })
    }
}
