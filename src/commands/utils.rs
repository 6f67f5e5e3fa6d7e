use anyhow::Result;
use clap::Args;
use std::fmt::Write;

use renderprobe::types::truncate_text;
use renderprobe::{
    BrowserType, OutputFormat, ScenarioResult, SessionConfig, WebDriverConnector, WindowSize,
};

/// Longest page-text excerpt shown in simple output
const EXCERPT_CHARS: usize = 200;

/// Browser options shared by every command that starts a session
#[derive(Args, Debug, Clone, Default)]
pub struct BrowserArgs {
    /// Browser to drive
    #[arg(short, long)]
    pub browser: Option<BrowserType>,

    /// WebDriver endpoint (defaults to RENDERPROBE_WEBDRIVER_URL, then the browser's usual port)
    #[arg(long)]
    pub webdriver_url: Option<String>,

    /// Run the browser headless
    #[arg(long)]
    pub headless: Option<bool>,

    /// Window size (WIDTHxHEIGHT, e.g., 1920x1080)
    #[arg(long)]
    pub window_size: Option<String>,
}

impl BrowserArgs {
    /// Apply the flags that were given on top of `base`
    pub fn session_config(&self, base: SessionConfig) -> Result<SessionConfig> {
        let mut config = base;
        if let Some(browser) = self.browser {
            config.browser = browser;
        }
        if let Some(headless) = self.headless {
            config.headless = headless;
        }
        if let Some(size) = &self.window_size {
            config.window_size = WindowSize::parse(size)?;
        }
        Ok(config)
    }

    pub fn connector(&self, config: &SessionConfig) -> WebDriverConnector {
        WebDriverConnector::for_browser(config.browser, self.webdriver_url.clone())
    }
}

/// Print scenario results to stdout in `format`
pub fn print_results(results: &[ScenarioResult], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(results)?),
        OutputFormat::Simple => print!("{}", format_simple(results)),
    }
    Ok(())
}

/// Human-readable report: one line per scenario, details for failures
pub fn format_simple(results: &[ScenarioResult]) -> String {
    let mut out = String::new();
    for result in results {
        let _ = writeln!(out, "[{}] {} ({}ms)", result.verdict, result.name, result.duration_ms);
        for outcome in &result.outcomes {
            let _ = writeln!(out, "    {}", outcome);
        }
        if let Some(failure) = &result.failure {
            let step = match failure.step_index {
                Some(index) => format!("step {} ({})", index + 1, failure.step),
                None => failure.step.clone(),
            };
            let _ = writeln!(out, "    failed at {}: {}", step, failure.message);
        }
        if let Some(snapshot) = &result.diagnostic {
            if let Some(url) = &snapshot.url {
                let _ = writeln!(out, "    url: {}", url);
            }
            let _ = writeln!(
                out,
                "    page text: {:?}",
                truncate_text(&snapshot.visible_text, EXCERPT_CHARS)
            );
        }
    }

    let passed = results.iter().filter(|r| r.passed()).count();
    let _ = writeln!(
        out,
        "\n{} passed, {} failed",
        passed,
        results.len() - passed
    );
    out
}
