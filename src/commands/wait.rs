use anyhow::Result;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

use renderprobe::types::truncate_text;
use renderprobe::{
    Condition, HarnessError, OutputFormat, Probe, Scope, Selector, Session, SessionConfig,
    WaitOutcome, wait_until,
};

use crate::commands::utils::BrowserArgs;

/// Body text shown when the wait times out
const BODY_EXCERPT_CHARS: usize = 200;

pub struct WaitArgs {
    pub url: String,
    pub selector: String,
    pub timeout_ms: u64,
    pub interval_ms: u64,
    pub min_count: usize,
}

/// Navigate to a page and wait for `selector` to match enough elements
pub async fn handle_wait(args: WaitArgs, format: OutputFormat, browser: BrowserArgs) -> Result<bool> {
    let selector = Selector::parse(&args.selector)?;
    let config = browser.session_config(SessionConfig::default())?;
    let connector = browser.connector(&config);
    let min_count = args.min_count;

    let condition = Condition::new(format!("{} to match {} element(s)", selector, min_count))
        .with_timeout(Duration::from_millis(args.timeout_ms))
        .with_interval(Duration::from_millis(args.interval_ms));

    info!("Waiting for {} on {}", selector, args.url);
    let (outcome, body) = Session::scoped(&connector, config, async |session| {
        session.navigate(&args.url).await?;
        let session = &*session;
        let selector = &selector;

        let outcome = wait_until(&condition, || async move {
            let count = session.find_all(Scope::Document, selector).await?.len();
            if count >= min_count {
                Ok::<_, HarnessError>(Probe::Ready(count))
            } else {
                Ok(Probe::NotYet(format!("{} element(s) matched, need {}", count, min_count)))
            }
        })
        .await;

        let body = match &outcome {
            WaitOutcome::TimedOut(_) => Some(session.visible_text(Scope::Document).await?),
            _ => None,
        };
        Ok((outcome, body))
    })
    .await?;

    match outcome {
        WaitOutcome::Satisfied {
            value,
            elapsed,
            attempts,
        } => {
            match format {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({
                        "selector": selector.to_css(),
                        "satisfied": true,
                        "count": value,
                        "elapsed_ms": elapsed.as_millis() as u64,
                        "attempts": attempts,
                    }))?
                ),
                OutputFormat::Simple => println!(
                    "{} matched {} element(s) after {}ms",
                    selector,
                    value,
                    elapsed.as_millis()
                ),
            }
            Ok(true)
        }
        WaitOutcome::TimedOut(report) => {
            let excerpt = truncate_text(body.as_deref().unwrap_or_default(), BODY_EXCERPT_CHARS);
            warn!("Page body text: {}", excerpt);
            Err(HarnessError::from(report).into())
        }
        WaitOutcome::Failed { error, .. } => Err(error.into()),
    }
}
