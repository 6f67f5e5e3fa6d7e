//! # renderprobe
#![allow(clippy::uninlined_format_args)]
//!
//! End-to-end harness for pages whose content arrives asynchronously from a
//! backend API.
//!
//! Instead of sleeping for a fixed time, renderprobe polls the rendered
//! document until the expected structure appears, then extracts values with
//! structural selectors and validates them. Every failure comes with a
//! snapshot of what the page actually showed.
//!
//! ## Installation
//!
//! ```bash
//! cargo install renderprobe
//! ```
//!
//! A WebDriver must be running (`chromedriver --port=9515` or
//! `geckodriver --port 4444`). Point renderprobe at another endpoint with
//! `--webdriver-url` or `RENDERPROBE_WEBDRIVER_URL`.
//!
//! ## CLI Usage
//!
//! ```bash
//! # Wait until at least 5 cards are rendered (15s timeout, 500ms polling)
//! renderprobe wait "http://localhost:5173" ".card" --min-count 5
//!
//! # Run the built-in dashboard checks
//! renderprobe dashboard "http://localhost:5173"
//!
//! # Run the dashboard checks against a scripted page, no browser needed
//! renderprobe dashboard "http://localhost:5173" --offline
//!
//! # Run a suite file, four scenarios at a time, JSON report on stdout
//! renderprobe run suite.json --parallel 4 --format json
//!
//! # Firefox in visible mode
//! renderprobe run suite.json --browser firefox --headless false
//! ```
//!
//! ### Suite files
//!
//! ```json
//! {
//!   "wait": { "timeout_ms": 15000, "interval_ms": 500 },
//!   "scenarios": [{
//!     "name": "prices render",
//!     "steps": [
//!       { "step": "navigate", "url": "http://localhost:5173" },
//!       { "step": "wait_for", "selector": ".card", "min_count": 5 },
//!       { "step": "extract", "within": ".card", "fields": [
//!         { "name": "price", "selector": "p.text-2xl" },
//!         { "name": "icon", "selector": "img", "value": { "kind": "attribute", "name": "src" } }
//!       ]},
//!       { "step": "assert", "field": "price", "check": { "check": "contains", "token": "$" } },
//!       { "step": "assert", "field": "icon", "check": { "check": "url_scheme" } }
//!     ]
//!   }]
//! }
//! ```
//!
//! ## Exit Codes
//!
//! - `0` every scenario passed
//! - `1` a scenario failed, or a usage error
//! - `2` a selector matched nothing
//! - `4` the browser session could not be started
//! - `5` a wait timed out
//!
//! ## Library Usage
//!
//! ```no_run
//! use renderprobe::{
//!     BrowserType, Check, FieldSpec, Runner, Scenario, Selector, SessionConfig, WaitFor,
//!     WebDriverConnector,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let connector = WebDriverConnector::for_browser(BrowserType::Chrome, None);
//! let runner = Runner::new(connector, SessionConfig::default());
//!
//! let scenario = Scenario::new("cards render")
//!     .navigate("http://localhost:5173")
//!     .wait_for(WaitFor::new(Selector::class("card")).min_count(5))
//!     .extract_within(
//!         Selector::class("card"),
//!         vec![FieldSpec::text("change", Selector::parse("span.font-medium")?)],
//!     )
//!     .assert("change", Check::Contains { token: "%".into() });
//!
//! let result = runner.run(&scenario).await;
//! println!("{}", serde_json::to_string_pretty(&result)?);
//! # Ok(())
//! # }
//! ```

/// Validation combinators producing structured outcomes
pub mod assertion;

/// Session options and wait defaults
pub mod config;

/// Built-in cryptocurrency dashboard scenarios
pub mod dashboard;

/// Browser driver boundary and its implementations
pub mod driver;

/// Error types and exit codes
pub mod errors;

/// Structural selectors and element queries
pub mod locator;

/// Bounded polling waits
pub mod poller;

/// Scenario steps, runner and reports
pub mod scenario;

/// Browser session lifecycle
pub mod session;

/// Shared value types
pub mod types;

pub use assertion::{AssertionOutcome, Check, Checks, FieldValue};
pub use config::{BrowserType, SessionConfig, WaitDefaults};
pub use driver::{Connector, Driver, MemoryConnector, MemoryDriver, WebDriver, WebDriverConnector};
pub use errors::{ErrorKind, HarnessError};
pub use locator::{ElementHandle, QueryResult, Scope, Selector};
pub use poller::{Condition, Probe, WaitOutcome, wait_until, wait_until_stable};
pub use scenario::{
    FieldSpec, Runner, Scenario, ScenarioResult, ScenarioState, Step, Suite, ValueKind, Verdict,
    WaitFor,
};
pub use session::{Session, SessionState};
pub use types::{DiagnosticSnapshot, OutputFormat, WindowSize};
