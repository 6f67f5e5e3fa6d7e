//! The remote-control boundary between the harness and a browser.

use std::fmt;
use std::future::Future;

use crate::config::SessionConfig;
use crate::errors::Result;
use crate::locator::Selector;

/// In-memory document driver for offline runs and tests
pub mod memory;

/// WebDriver-backed driver (fantoccini)
pub mod webdriver;

pub use memory::{MemoryConnector, MemoryDriver, Node, Page};
pub use webdriver::{WebDriver, WebDriverConnector};

/// Operations the harness needs from a browser.
///
/// Implementations are cheap to clone; clones talk to the same browser.
pub trait Driver: Clone + Send + Sync + 'static {
    /// Driver-side reference to one rendered node
    type Element: Clone + fmt::Debug + Send + Sync + 'static;

    /// Load `url` and wait until the document reports itself loaded
    fn navigate(&self, url: &str) -> impl Future<Output = Result<()>> + Send;

    /// Elements matching `selector` in document order, under `scope` when given
    fn query(
        &self,
        selector: &Selector,
        scope: Option<&Self::Element>,
    ) -> impl Future<Output = Result<Vec<Self::Element>>> + Send;

    fn text(&self, element: &Self::Element) -> impl Future<Output = Result<String>> + Send;

    fn attribute(
        &self,
        element: &Self::Element,
        name: &str,
    ) -> impl Future<Output = Result<Option<String>>> + Send;

    fn is_displayed(&self, element: &Self::Element) -> impl Future<Output = Result<bool>> + Send;

    fn tag_name(&self, element: &Self::Element) -> impl Future<Output = Result<String>> + Send;

    fn current_url(&self) -> impl Future<Output = Result<String>> + Send;

    /// End the browser session and free its resources
    fn close(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Creates drivers for new sessions
pub trait Connector: Send + Sync {
    type Driver: Driver;

    /// Start a browser configured by `config`; fails with `SessionStart`
    fn connect(&self, config: &SessionConfig) -> impl Future<Output = Result<Self::Driver>> + Send;
}
