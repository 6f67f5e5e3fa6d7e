// Common test utilities and fixtures

use std::path::PathBuf;
use tempfile::TempDir;

use renderprobe::{BrowserType, SessionConfig, WebDriverConnector};

/// Write `content` as `suite.json` in a fresh temp dir; keep the dir alive while the path is used
#[allow(dead_code)]
pub fn write_suite(content: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("suite.json");
    std::fs::write(&path, content).expect("Failed to write suite file");
    (temp_dir, path)
}

/// Browser picked by `TEST_BROWSER` (chrome unless it says firefox)
#[allow(dead_code)]
pub fn test_browser() -> BrowserType {
    match std::env::var("TEST_BROWSER").as_deref() {
        Ok("firefox") => BrowserType::Firefox,
        _ => BrowserType::Chrome,
    }
}

/// Session config and connector for the browser under test
#[allow(dead_code)]
pub fn browser_setup() -> (SessionConfig, WebDriverConnector) {
    let config = SessionConfig {
        browser: test_browser(),
        ..SessionConfig::default()
    };
    let connector = WebDriverConnector::for_browser(config.browser, None);
    (config, connector)
}

/// Suite documents used by the CLI tests
pub mod fixtures {
    /// Waits for cards and checks the first card, pointed at `url`
    #[allow(dead_code)]
    pub fn card_suite(url: &str) -> String {
        serde_json::json!({
            "wait": { "timeout_ms": 5000, "interval_ms": 100, "settle": true },
            "scenarios": [{
                "name": "cards render",
                "steps": [
                    { "step": "navigate", "url": url },
                    { "step": "wait_for", "selector": ".card", "min_count": 3 },
                    {
                        "step": "extract",
                        "within": ".card",
                        "fields": [
                            { "name": "name", "selector": "h3.font-semibold" },
                            { "name": "price", "selector": "p.text-2xl" }
                        ]
                    },
                    { "step": "assert", "field": "name", "check": { "check": "non_empty" } },
                    { "step": "assert", "field": "price", "check": { "check": "numeric" } }
                ]
            }]
        })
        .to_string()
    }

    #[allow(dead_code)]
    pub const BAD_SELECTOR_SUITE: &str = r#"
    {
        "scenarios": [{
            "name": "broken",
            "steps": [
                { "step": "navigate", "url": "http://localhost:5173" },
                { "step": "wait_for", "selector": "div > .card" }
            ]
        }]
    }
    "#;
}
