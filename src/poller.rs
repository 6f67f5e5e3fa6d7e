//! Bounded waits that replace fixed sleeps.
//!
//! [`wait_until`] evaluates a read-only predicate on a fixed cadence until it
//! reports [`Probe::Ready`] or the condition's timeout passes. The predicate
//! always runs at least once. Transient errors from the predicate are
//! treated as "not yet" because the page is expected to be mid-render while
//! we poll. A permanent error (see [`HarnessError::is_transient`]) ends the
//! wait at once with [`WaitOutcome::Failed`].

use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::errors::HarnessError;

/// Shortest sleep between evaluations; keeps a zero interval from spinning
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// What to wait for and how long
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub description: String,
    pub timeout: Duration,
    pub interval: Duration,
}

impl Condition {
    /// Condition with the default 15s timeout and 500ms interval
    pub fn new(description: impl Into<String>) -> Self {
        Condition {
            description: description.into(),
            timeout: Duration::from_secs(15),
            interval: Duration::from_millis(500),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Result of one predicate evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum Probe<T> {
    Ready(T),
    /// Not satisfied yet, with a description of what was observed
    NotYet(String),
}

/// Context reported when a wait expires
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutReport {
    pub description: String,
    pub elapsed: Duration,
    pub timeout: Duration,
    pub attempts: u32,
    pub last_observation: Option<String>,
}

impl fmt::Display for TimeoutReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} not satisfied after {}ms (timeout {}ms, {} attempts)",
            self.description,
            self.elapsed.as_millis(),
            self.timeout.as_millis(),
            self.attempts
        )?;
        if let Some(observation) = &self.last_observation {
            write!(f, "; last observed: {}", observation)?;
        }
        Ok(())
    }
}

impl From<TimeoutReport> for HarnessError {
    fn from(report: TimeoutReport) -> Self {
        HarnessError::TimedOut {
            elapsed_ms: report.elapsed.as_millis() as u64,
            timeout_ms: report.timeout.as_millis() as u64,
            attempts: report.attempts,
            last_observation: report
                .last_observation
                .unwrap_or_else(|| "nothing".to_string()),
            description: report.description,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome<T> {
    Satisfied {
        value: T,
        elapsed: Duration,
        attempts: u32,
    },
    TimedOut(TimeoutReport),
    /// The predicate hit an error that retrying cannot fix
    Failed {
        error: HarnessError,
        elapsed: Duration,
        attempts: u32,
    },
}

impl<T> WaitOutcome<T> {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, WaitOutcome::Satisfied { .. })
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            WaitOutcome::Satisfied { elapsed, .. } => *elapsed,
            WaitOutcome::TimedOut(report) => report.elapsed,
            WaitOutcome::Failed { elapsed, .. } => *elapsed,
        }
    }

    pub fn into_result(self) -> Result<T, HarnessError> {
        match self {
            WaitOutcome::Satisfied { value, .. } => Ok(value),
            WaitOutcome::TimedOut(report) => Err(report.into()),
            WaitOutcome::Failed { error, .. } => Err(error),
        }
    }
}

/// Elapsed-time bookkeeping for one wait invocation
struct Deadline<'a> {
    condition: &'a Condition,
    started: Instant,
    attempts: u32,
    last_observation: Option<String>,
}

impl<'a> Deadline<'a> {
    fn start(condition: &'a Condition) -> Self {
        Deadline {
            condition,
            started: Instant::now(),
            attempts: 0,
            last_observation: None,
        }
    }

    fn observe(&mut self, observation: String) {
        self.last_observation = Some(observation);
    }

    fn expired(&self) -> bool {
        self.started.elapsed() >= self.condition.timeout
    }

    /// Sleep one interval, never past the deadline
    async fn pause(&self) {
        let remaining = self.condition.timeout.saturating_sub(self.started.elapsed());
        let interval = self.condition.interval.max(MIN_POLL_INTERVAL);
        sleep(interval.min(remaining)).await;
    }

    fn satisfied<T>(&self, value: T) -> WaitOutcome<T> {
        WaitOutcome::Satisfied {
            value,
            elapsed: self.started.elapsed(),
            attempts: self.attempts,
        }
    }

    /// Record a predicate error; permanent errors end the wait
    fn error<T>(&mut self, error: HarnessError) -> Option<WaitOutcome<T>> {
        if !error.is_transient() {
            debug!("Wait for {} stopped: {}", self.condition.description, error);
            return Some(WaitOutcome::Failed {
                error,
                elapsed: self.started.elapsed(),
                attempts: self.attempts,
            });
        }
        debug!("Predicate failed, treating as not ready: {}", error);
        self.observe(format!("error: {}", error));
        None
    }

    fn timed_out<T>(self) -> WaitOutcome<T> {
        let report = TimeoutReport {
            description: self.condition.description.clone(),
            elapsed: self.started.elapsed(),
            timeout: self.condition.timeout,
            attempts: self.attempts,
            last_observation: self.last_observation,
        };
        debug!("Wait expired: {}", report);
        WaitOutcome::TimedOut(report)
    }
}

/// Poll `predicate` until it is ready or `condition.timeout` elapses
pub async fn wait_until<T, E, F, Fut>(condition: &Condition, mut predicate: F) -> WaitOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Probe<T>, E>>,
    E: Into<HarnessError>,
{
    let mut deadline = Deadline::start(condition);
    debug!(
        "Waiting up to {}ms for {}",
        condition.timeout.as_millis(),
        condition.description
    );

    loop {
        deadline.attempts += 1;
        match predicate().await {
            Ok(Probe::Ready(value)) => return deadline.satisfied(value),
            Ok(Probe::NotYet(observation)) => deadline.observe(observation),
            Err(e) => {
                if let Some(failed) = deadline.error(e.into()) {
                    return failed;
                }
            }
        }

        if deadline.expired() {
            return deadline.timed_out();
        }
        deadline.pause().await;
    }
}

/// Poll `sample` until two consecutive samples are equal and accepted.
///
/// Used after a structure first appears, to let the rest of it render
/// before it is read.
pub async fn wait_until_stable<T, E, F, Fut, A>(
    condition: &Condition,
    mut sample: F,
    accept: A,
) -> WaitOutcome<T>
where
    T: PartialEq + fmt::Debug,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Into<HarnessError>,
    A: Fn(&T) -> bool,
{
    let mut deadline = Deadline::start(condition);
    let mut previous: Option<T> = None;

    loop {
        deadline.attempts += 1;
        match sample().await {
            Ok(current) => {
                let stable = previous.as_ref() == Some(&current);
                if stable && accept(&current) {
                    return deadline.satisfied(current);
                }
                deadline.observe(match &previous {
                    Some(before) if !stable => format!("changed from {:?} to {:?}", before, current),
                    _ => format!("sampled {:?}", current),
                });
                previous = Some(current);
            }
            Err(e) => {
                if let Some(failed) = deadline.error(e.into()) {
                    return failed;
                }
                previous = None;
            }
        }

        if deadline.expired() {
            return deadline.timed_out();
        }
        deadline.pause().await;
    }
}

#[cfg(test)]
#[path = "poller_test.rs"]
mod poller_test;
