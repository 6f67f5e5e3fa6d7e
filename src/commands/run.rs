use anyhow::Result;
use std::path::PathBuf;
use tracing::info;

use renderprobe::{OutputFormat, Runner, Suite};

use crate::commands::utils::{self, BrowserArgs};

/// Run every scenario of a suite file; true when all of them passed
pub async fn handle_run(
    suite_path: PathBuf,
    format: OutputFormat,
    parallel: usize,
    browser: BrowserArgs,
) -> Result<bool> {
    let suite = Suite::from_file(&suite_path)?;
    info!(
        "Loaded {} scenario(s) from {}",
        suite.scenarios.len(),
        suite_path.display()
    );

    let config = browser.session_config(suite.config.clone().unwrap_or_default())?;
    let connector = browser.connector(&config);
    info!("Using {} at {}", config.browser.driver_name(), connector.url());

    let runner = Runner::new(connector, config).with_wait_defaults(suite.wait.unwrap_or_default());
    let results = runner.run_batch(&suite.scenarios, parallel).await;

    utils::print_results(&results, format)?;
    Ok(results.iter().all(|r| r.passed()))
}
