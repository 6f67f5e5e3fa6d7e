use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use std::time::Duration;

use crate::types::WindowSize;

/// Environment variable that overrides the WebDriver endpoint
pub const WEBDRIVER_URL_ENV: &str = "RENDERPROBE_WEBDRIVER_URL";

/// Supported browser types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BrowserType {
    /// Google Chrome/Chromium
    #[default]
    Chrome,
    /// Mozilla Firefox
    Firefox,
}

impl std::str::FromStr for BrowserType {
    type Err = anyhow::Error;

    /// Parse browser type from string (case-insensitive)
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "firefox" => Ok(BrowserType::Firefox),
            "chrome" | "chromium" => Ok(BrowserType::Chrome),
            _ => anyhow::bail!("Unsupported browser: {}", s),
        }
    }
}

impl BrowserType {
    /// Conventional WebDriver URL for this browser's driver
    pub fn default_webdriver_url(&self) -> &'static str {
        match self {
            BrowserType::Chrome => "http://localhost:9515",
            BrowserType::Firefox => "http://localhost:4444",
        }
    }

    pub fn driver_name(&self) -> &'static str {
        match self {
            BrowserType::Chrome => "chromedriver",
            BrowserType::Firefox => "geckodriver",
        }
    }
}

/// Pick the WebDriver endpoint: explicit flag, then environment, then the browser default
pub fn resolve_webdriver_url(browser: BrowserType, explicit: Option<String>) -> String {
    explicit
        .or_else(|| std::env::var(WEBDRIVER_URL_ENV).ok())
        .filter(|url| !url.trim().is_empty())
        .unwrap_or_else(|| browser.default_webdriver_url().to_string())
}

/// Immutable browser options resolved before a session is created.
///
/// Defaults mirror a CI-friendly headless Chrome: no GPU, no sandbox,
/// `/dev/shm` workaround and automation banners suppressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub browser: BrowserType,
    pub headless: bool,
    pub window_size: WindowSize,
    pub disable_gpu: bool,
    pub sandbox_disabled: bool,
    pub shm_workaround: bool,
    pub suppress_automation_signals: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            browser: BrowserType::Chrome,
            headless: true,
            window_size: WindowSize::default(),
            disable_gpu: true,
            sandbox_disabled: true,
            shm_workaround: true,
            suppress_automation_signals: true,
        }
    }
}

impl SessionConfig {
    /// Command line switches passed to Chrome
    pub fn chrome_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.headless {
            // Chrome 112+ headless mode
            args.push("--headless=new".to_string());
        }
        if self.disable_gpu {
            args.push("--disable-gpu".to_string());
        }
        if self.sandbox_disabled {
            args.push("--no-sandbox".to_string());
        }
        if self.shm_workaround {
            args.push("--disable-dev-shm-usage".to_string());
        }
        args.push(format!(
            "--window-size={},{}",
            self.window_size.width, self.window_size.height
        ));
        args
    }

    /// Command line switches passed to Firefox
    pub fn firefox_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.headless {
            args.push("--headless".to_string());
        }
        args.push(format!("--width={}", self.window_size.width));
        args.push(format!("--height={}", self.window_size.height));
        args
    }

    /// Build the WebDriver capabilities for a new session
    pub fn capabilities(&self, profile_dir: Option<&Path>) -> serde_json::Map<String, serde_json::Value> {
        let mut caps = serde_json::Map::new();

        match self.browser {
            BrowserType::Chrome => {
                let mut chrome_opts = serde_json::Map::new();
                let mut args = self.chrome_args();
                if let Some(dir) = profile_dir {
                    args.push(format!("--user-data-dir={}", dir.display()));
                }
                chrome_opts.insert("args".to_string(), json!(args));

                if self.suppress_automation_signals {
                    chrome_opts.insert("excludeSwitches".to_string(), json!(["enable-automation"]));
                    chrome_opts.insert("useAutomationExtension".to_string(), json!(false));
                }
                caps.insert("goog:chromeOptions".to_string(), json!(chrome_opts));
            }
            BrowserType::Firefox => {
                let mut firefox_opts = serde_json::Map::new();
                let mut args = self.firefox_args();
                if let Some(dir) = profile_dir {
                    args.push("-profile".to_string());
                    args.push(dir.display().to_string());
                }
                firefox_opts.insert("args".to_string(), json!(args));

                if self.suppress_automation_signals {
                    firefox_opts.insert(
                        "prefs".to_string(),
                        json!({ "dom.webdriver.enabled": false, "useAutomationExtension": false }),
                    );
                }
                caps.insert("moz:firefoxOptions".to_string(), json!(firefox_opts));
            }
        }

        caps
    }
}

/// Default cadence for structural waits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitDefaults {
    pub timeout_ms: u64,
    pub interval_ms: u64,
    /// After the first match appears, also wait for the match count to settle
    pub settle: bool,
}

impl Default for WaitDefaults {
    fn default() -> Self {
        WaitDefaults {
            timeout_ms: 15_000,
            interval_ms: 500,
            settle: true,
        }
    }
}

impl WaitDefaults {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
