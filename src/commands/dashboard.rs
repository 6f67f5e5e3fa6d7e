use anyhow::Result;
use tracing::info;

use renderprobe::dashboard::{self, fixture};
use renderprobe::{MemoryConnector, OutputFormat, Runner, SessionConfig};

use crate::commands::utils::{self, BrowserArgs};

/// Coins rendered by the offline dashboard
const OFFLINE_COINS: usize = 10;

/// Run the built-in dashboard scenarios; true when all of them passed
pub async fn handle_dashboard(
    url: String,
    offline: bool,
    format: OutputFormat,
    parallel: usize,
    browser: BrowserArgs,
) -> Result<bool> {
    let scenarios = dashboard::scenarios(&url);
    let config = browser.session_config(SessionConfig::default())?;

    let results = if offline {
        info!("Running dashboard checks against the scripted page for {}", url);
        let connector = MemoryConnector::new().with_page(
            &url,
            fixture::dashboard_page(OFFLINE_COINS, fixture::RENDER_DELAY),
        );
        Runner::new(connector, config)
            .run_batch(&scenarios, parallel)
            .await
    } else {
        let connector = browser.connector(&config);
        info!("Running dashboard checks against {} via {}", url, connector.url());
        Runner::new(connector, config)
            .run_batch(&scenarios, parallel)
            .await
    };

    utils::print_results(&results, format)?;
    Ok(results.iter().all(|r| r.passed()))
}
