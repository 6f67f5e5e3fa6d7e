#![allow(clippy::uninlined_format_args)]

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use renderprobe::{HarnessError, OutputFormat};

mod commands;

use crate::commands::utils::BrowserArgs;
use crate::commands::wait::WaitArgs;

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_FAILED: i32 = 1;

#[derive(Parser)]
#[command(name = "renderprobe")]
#[command(about = "End-to-end checks for client-rendered pages", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scenarios of a JSON suite file
    Run {
        /// Path to the suite file
        suite: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "simple")]
        format: OutputFormat,

        /// Scenarios run at the same time, each in its own session
        #[arg(short, long, default_value = "1")]
        parallel: usize,

        #[command(flatten)]
        browser: BrowserArgs,
    },

    /// Open a page and wait until a selector matches
    Wait {
        /// URL to open
        url: String,

        /// CSS selector to wait for
        selector: String,

        /// Give up after this many milliseconds
        #[arg(long, default_value = "15000")]
        timeout_ms: u64,

        /// Delay between checks in milliseconds
        #[arg(long, default_value = "500")]
        interval_ms: u64,

        /// Matches required before the wait succeeds
        #[arg(long, default_value = "1")]
        min_count: usize,

        /// Output format
        #[arg(short, long, default_value = "simple")]
        format: OutputFormat,

        #[command(flatten)]
        browser: BrowserArgs,
    },

    /// Run the built-in cryptocurrency dashboard checks
    Dashboard {
        /// Dashboard URL
        #[arg(default_value = "http://localhost:5173")]
        url: String,

        /// Check a scripted copy of the dashboard instead of a real browser
        #[arg(long)]
        offline: bool,

        /// Output format
        #[arg(short, long, default_value = "simple")]
        format: OutputFormat,

        /// Scenarios run at the same time, each in its own session
        #[arg(short, long, default_value = "1")]
        parallel: usize,

        #[command(flatten)]
        browser: BrowserArgs,
    },
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(true) => std::process::exit(EXIT_SUCCESS),
        Ok(false) => std::process::exit(EXIT_FAILED),
        Err(err) => {
            let exit_code = err
                .downcast_ref::<HarnessError>()
                .map(HarnessError::exit_code)
                .unwrap_or(EXIT_FAILED);

            // Output JSON error to stdout for programmatic consumption
            let error_json = json!({
                "error": true,
                "message": format!("{:#}", err),
                "exit_code": exit_code
            });
            println!(
                "{}",
                serde_json::to_string(&error_json).unwrap_or_else(|_| "{}".to_string())
            );

            eprintln!("Error: {:#}", err);
            std::process::exit(exit_code);
        }
    }
}

/// Dispatch the command; `Ok(false)` means it ran but some check failed
async fn run() -> Result<bool> {
    // Logs go to stderr so JSON on stdout stays clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "renderprobe=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            suite,
            format,
            parallel,
            browser,
        } => commands::run::handle_run(suite, format, parallel, browser).await,
        Commands::Wait {
            url,
            selector,
            timeout_ms,
            interval_ms,
            min_count,
            format,
            browser,
        } => {
            let args = WaitArgs {
                url,
                selector,
                timeout_ms,
                interval_ms,
                min_count,
            };
            commands::wait::handle_wait(args, format, browser).await
        }
        Commands::Dashboard {
            url,
            offline,
            format,
            parallel,
            browser,
        } => commands::dashboard::handle_dashboard(url, offline, format, parallel, browser).await,
    }
}
