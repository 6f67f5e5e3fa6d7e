//! Scenario orchestration.
//!
//! A [`Scenario`] is an ordered list of declarative [`Step`]s. The
//! [`Runner`] acquires one session per scenario, drives the steps in order,
//! records every assertion outcome, captures a [`DiagnosticSnapshot`] when
//! something fails, and releases the session on every path.

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::assertion::{AssertionOutcome, Check, Checks, FieldValue};
use crate::config::{SessionConfig, WaitDefaults};
use crate::driver::{Connector, Driver};
use crate::errors::{ErrorKind, HarnessError, Result};
use crate::locator::{ElementHandle, Scope, Selector};
use crate::poller::{Condition, Probe, wait_until, wait_until_stable};
use crate::session::Session;
use crate::types::DiagnosticSnapshot;

/// Wait for `selector` to match at least `min_count` elements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitFor {
    pub selector: Selector,
    /// Count matches inside the first element matching this selector
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub within: Option<Selector>,
    #[serde(default = "default_min_count")]
    pub min_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u64>,
    /// Also wait for the match count to stop changing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settle: Option<bool>,
}

fn default_min_count() -> usize {
    1
}

impl WaitFor {
    pub fn new(selector: Selector) -> Self {
        WaitFor {
            selector,
            within: None,
            min_count: 1,
            timeout_ms: None,
            interval_ms: None,
            settle: None,
        }
    }

    pub fn within(mut self, root: Selector) -> Self {
        self.within = Some(root);
        self
    }

    pub fn min_count(mut self, min_count: usize) -> Self {
        self.min_count = min_count;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval_ms = Some(interval.as_millis() as u64);
        self
    }

    pub fn settle(mut self, settle: bool) -> Self {
        self.settle = Some(settle);
        self
    }
}

/// What to read from a located element
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueKind {
    /// Visible text of the first match
    #[default]
    Text,
    /// Named attribute of the first match
    Attribute { name: String },
    /// Number of matches (zero is a valid value)
    Count,
    /// Whether the first match is displayed
    Displayed,
}

/// A named value to extract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub selector: Selector,
    #[serde(default)]
    pub value: ValueKind,
}

impl FieldSpec {
    pub fn text(name: &str, selector: Selector) -> Self {
        FieldSpec {
            name: name.to_string(),
            selector,
            value: ValueKind::Text,
        }
    }

    pub fn attribute(name: &str, selector: Selector, attribute: &str) -> Self {
        FieldSpec {
            name: name.to_string(),
            selector,
            value: ValueKind::Attribute {
                name: attribute.to_string(),
            },
        }
    }

    pub fn count(name: &str, selector: Selector) -> Self {
        FieldSpec {
            name: name.to_string(),
            selector,
            value: ValueKind::Count,
        }
    }

    pub fn displayed(name: &str, selector: Selector) -> Self {
        FieldSpec {
            name: name.to_string(),
            selector,
            value: ValueKind::Displayed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    Navigate {
        url: String,
    },
    WaitFor(WaitFor),
    /// Read `fields`, relative to the first element matching `within` if set
    Extract {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        within: Option<Selector>,
        fields: Vec<FieldSpec>,
    },
    Assert {
        field: String,
        check: Check,
    },
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Navigate { url } => write!(f, "navigate to {}", url),
            Step::WaitFor(wait) => write!(f, "wait for {} x{}", wait.selector, wait.min_count),
            Step::Extract { within, fields } => {
                let names: Vec<&str> = fields.iter().map(|field| field.name.as_str()).collect();
                write!(f, "extract {}", names.join(", "))?;
                if let Some(root) = within {
                    write!(f, " within {}", root)?;
                }
                Ok(())
            }
            Step::Assert { field, check } => write!(f, "assert {} {}", field, check),
        }
    }
}

/// Named, ordered list of steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn new(name: impl Into<String>) -> Self {
        Scenario {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn navigate(self, url: impl Into<String>) -> Self {
        self.step(Step::Navigate { url: url.into() })
    }

    pub fn wait_for(self, wait: WaitFor) -> Self {
        self.step(Step::WaitFor(wait))
    }

    pub fn extract(self, fields: Vec<FieldSpec>) -> Self {
        self.step(Step::Extract {
            within: None,
            fields,
        })
    }

    pub fn extract_within(self, root: Selector, fields: Vec<FieldSpec>) -> Self {
        self.step(Step::Extract {
            within: Some(root),
            fields,
        })
    }

    pub fn assert(self, field: impl Into<String>, check: Check) -> Self {
        self.step(Step::Assert {
            field: field.into(),
            check,
        })
    }
}

/// Scenarios loaded from a JSON file, with optional shared settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suite {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<SessionConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait: Option<WaitDefaults>,
    pub scenarios: Vec<Scenario>,
}

impl Suite {
    pub fn from_file(path: &Path) -> anyhow::Result<Suite> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read suite file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse suite file: {}", path.display()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => write!(f, "PASS"),
            Verdict::Fail => write!(f, "FAIL"),
        }
    }
}

/// Where a scenario run is. Runs move forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioState {
    NotStarted,
    SessionAcquired,
    Navigated,
    StructureReady,
    Validated,
    Finished(Verdict),
}

/// The step that stopped a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepFailure {
    /// Index into the scenario's steps; absent when no step ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_index: Option<usize>,
    pub step: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// Report of one scenario run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub verdict: Verdict,
    pub states: Vec<ScenarioState>,
    pub outcomes: Vec<AssertionOutcome>,
    pub extracted: BTreeMap<String, FieldValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<StepFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<DiagnosticSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl ScenarioResult {
    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }

    pub fn failed_outcomes(&self) -> impl Iterator<Item = &AssertionOutcome> {
        self.outcomes.iter().filter(|o| !o.passed())
    }

    /// Result for a scenario whose task died before reporting
    fn aborted(name: &str, message: String) -> Self {
        ScenarioResult {
            name: name.to_string(),
            verdict: Verdict::Fail,
            states: vec![
                ScenarioState::NotStarted,
                ScenarioState::Finished(Verdict::Fail),
            ],
            outcomes: Vec::new(),
            extracted: BTreeMap::new(),
            failure: Some(StepFailure {
                step_index: None,
                step: "run scenario".to_string(),
                kind: ErrorKind::Aborted,
                message,
            }),
            diagnostic: None,
            session_id: None,
            started_at: Utc::now(),
            duration_ms: 0,
        }
    }
}

/// A selector together with the root it was queried under
#[derive(Debug, Clone)]
struct Target {
    selector: Selector,
    /// First match of this selector is the query root; the document when absent
    within: Option<Selector>,
}

impl Target {
    fn new(selector: &Selector, within: Option<&Selector>) -> Self {
        Target {
            selector: selector.clone(),
            within: within.cloned(),
        }
    }
}

/// Error raised by one step, with the query it was working on
struct StepError {
    error: HarnessError,
    target: Option<Target>,
}

impl From<HarnessError> for StepError {
    fn from(error: HarnessError) -> Self {
        StepError {
            error,
            target: None,
        }
    }
}

impl HarnessError {
    fn at(self, selector: &Selector, within: Option<&Selector>) -> StepError {
        StepError {
            error: self,
            target: Some(Target::new(selector, within)),
        }
    }
}

/// Mutable bookkeeping of one run
struct Progress {
    states: Vec<ScenarioState>,
    checks: Checks,
    extracted: BTreeMap<String, FieldValue>,
    field_targets: HashMap<String, Target>,
    failure: Option<StepFailure>,
    diagnostic: Option<DiagnosticSnapshot>,
}

impl Progress {
    fn new() -> Self {
        Progress {
            states: vec![ScenarioState::NotStarted],
            checks: Checks::new(),
            extracted: BTreeMap::new(),
            field_targets: HashMap::new(),
            failure: None,
            diagnostic: None,
        }
    }

    fn current(&self) -> ScenarioState {
        self.states
            .last()
            .copied()
            .unwrap_or(ScenarioState::NotStarted)
    }

    /// Record a transition; repeated states are collapsed
    fn advance(&mut self, next: ScenarioState) {
        if self.current() != next {
            debug!("Scenario state {:?} -> {:?}", self.current(), next);
            self.states.push(next);
        }
    }

    fn fail(&mut self, step_index: Option<usize>, step: String, error: &HarnessError) {
        self.failure = Some(StepFailure {
            step_index,
            step,
            kind: error.kind(),
            message: error.to_string(),
        });
    }

    fn finish(
        mut self,
        name: &str,
        session_id: Option<Uuid>,
        started_at: DateTime<Utc>,
        clock: Instant,
    ) -> ScenarioResult {
        let verdict = if self.failure.is_none() && self.checks.all_passed() {
            Verdict::Pass
        } else {
            Verdict::Fail
        };
        if self.failure.is_none() {
            self.advance(ScenarioState::Validated);
        }
        self.advance(ScenarioState::Finished(verdict));

        let diagnostic = self.diagnostic.or_else(|| {
            self.checks
                .failures()
                .find_map(|outcome| outcome.diagnostic().cloned())
        });

        ScenarioResult {
            name: name.to_string(),
            verdict,
            states: self.states,
            outcomes: self.checks.into_outcomes(),
            extracted: self.extracted,
            failure: self.failure,
            diagnostic,
            session_id,
            started_at,
            duration_ms: clock.elapsed().as_millis() as u64,
        }
    }
}

/// Number of `selector` matches, counted inside the first `within` match if set
async fn count_matches<D: Driver>(
    session: &Session<D>,
    within: Option<&Selector>,
    selector: &Selector,
) -> Result<usize> {
    match within {
        Some(root) => {
            let root = session.find(Scope::Document, root).await?;
            Ok(root.find_all(selector).await?.len())
        }
        None => Ok(session.find_all(Scope::Document, selector).await?.len()),
    }
}

/// Read the page state for a failure report. Never fails; capture problems
/// are recorded in the snapshot's note.
///
/// The target is recounted under the same root it was queried in. A
/// `NotFound` failure always reports zero matches.
async fn capture_snapshot<D: Driver>(
    session: &Session<D>,
    target: Option<&Target>,
    error: Option<&HarnessError>,
    note: String,
) -> DiagnosticSnapshot {
    let url = session.current_url().await.ok();
    let (text, note) = match session.visible_text(Scope::Document).await {
        Ok(text) => (text, note),
        Err(e) => (String::new(), format!("{}; body text unavailable: {}", note, e)),
    };

    let mut snapshot = DiagnosticSnapshot::new(&text).with_url(url).with_note(note);
    if let Some(target) = target {
        let not_found = error.is_some_and(|e| e.kind() == ErrorKind::NotFound);
        let zero_matches = not_found
            || count_matches(session, target.within.as_ref(), &target.selector)
                .await
                .map_or(true, |count| count == 0);
        snapshot = snapshot.with_selector(&target.selector, zero_matches);
    }
    snapshot
}

/// Runs scenarios, one fresh session each
#[derive(Debug, Clone)]
pub struct Runner<C> {
    connector: C,
    config: SessionConfig,
    defaults: WaitDefaults,
}

impl<C: Connector> Runner<C> {
    pub fn new(connector: C, config: SessionConfig) -> Self {
        Runner {
            connector,
            config,
            defaults: WaitDefaults::default(),
        }
    }

    pub fn with_wait_defaults(mut self, defaults: WaitDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Run one scenario to completion. Failures are reported in the result.
    pub async fn run(&self, scenario: &Scenario) -> ScenarioResult {
        let started_at = Utc::now();
        let clock = Instant::now();
        let span = info_span!(
            "scenario",
            name = %scenario.name,
            session_id = tracing::field::Empty
        );

        async {
            info!("Starting scenario '{}'", scenario.name);
            let mut progress = Progress::new();

            let mut session = match Session::acquire(&self.connector, self.config.clone()).await {
                Ok(session) => session,
                Err(e) => {
                    warn!("Could not start a session: {}", e);
                    progress.fail(None, "acquire session".to_string(), &e);
                    return progress.finish(&scenario.name, None, started_at, clock);
                }
            };
            tracing::Span::current().record("session_id", tracing::field::display(session.id()));
            progress.advance(ScenarioState::SessionAcquired);

            self.drive(&mut session, scenario, &mut progress).await;

            if let Err(e) = session.release().await {
                warn!("Failed to release session {}: {}", session.id(), e);
            }

            let result = progress.finish(&scenario.name, Some(session.id()), started_at, clock);
            info!(
                "Scenario '{}' finished: {} in {}ms",
                result.name, result.verdict, result.duration_ms
            );
            result
        }
        .instrument(span)
        .await
    }

    /// Execute steps in order until one fails
    async fn drive(&self, session: &mut Session<C::Driver>, scenario: &Scenario, progress: &mut Progress) {
        for (index, step) in scenario.steps.iter().enumerate() {
            debug!("Step {}: {}", index + 1, step);
            if let Err(StepError { error, target }) = self.execute(session, step, progress).await {
                warn!("Step {} ({}) failed: {}", index + 1, step, error);
                let snapshot =
                    capture_snapshot(session, target.as_ref(), Some(&error), error.to_string()).await;
                progress.diagnostic = Some(snapshot);
                progress.fail(Some(index), step.to_string(), &error);
                return;
            }
        }
    }

    async fn execute(
        &self,
        session: &mut Session<C::Driver>,
        step: &Step,
        progress: &mut Progress,
    ) -> std::result::Result<(), StepError> {
        match step {
            Step::Navigate { url } => {
                session.navigate(url).await?;
                progress.advance(ScenarioState::Navigated);
            }
            Step::WaitFor(wait) => {
                self.wait_for(session, wait)
                    .await
                    .map_err(|e| e.at(&wait.selector, wait.within.as_ref()))?;
                progress.advance(ScenarioState::StructureReady);
            }
            Step::Extract { within, fields } => {
                let session: &Session<C::Driver> = session;
                let root = match within {
                    Some(selector) => Some(
                        session
                            .find(Scope::Document, selector)
                            .await
                            .map_err(|e| e.at(selector, None))?,
                    ),
                    None => None,
                };
                let scope = root
                    .as_ref()
                    .map(ElementHandle::as_scope)
                    .unwrap_or(Scope::Document);

                for field in fields {
                    let value = extract_field(session, scope, field)
                        .await
                        .map_err(|e| e.at(&field.selector, within.as_ref()))?;
                    debug!("Extracted {} = {}", field.name, value);
                    progress.extracted.insert(field.name.clone(), value);
                    progress
                        .field_targets
                        .insert(field.name.clone(), Target::new(&field.selector, within.as_ref()));
                }
            }
            Step::Assert { field, check } => {
                let outcome = match progress.extracted.get(field) {
                    Some(value) => check.evaluate(field, value),
                    None => check.unavailable(field),
                };
                let outcome = if outcome.passed() {
                    outcome
                } else {
                    info!("Assertion failed: {}", outcome);
                    let snapshot = capture_snapshot(
                        session,
                        progress.field_targets.get(field),
                        None,
                        outcome.description().to_string(),
                    )
                    .await;
                    outcome.with_diagnostic(snapshot)
                };
                progress.checks.record(outcome);
            }
        }
        Ok(())
    }

    /// Both phases of the wait share one timeout
    async fn wait_for(&self, session: &Session<C::Driver>, wait: &WaitFor) -> Result<usize> {
        let started = Instant::now();
        let timeout = wait
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.defaults.timeout());
        let interval = wait
            .interval_ms
            .map(Duration::from_millis)
            .unwrap_or(self.defaults.interval());
        let min_count = wait.min_count;
        let within = wait.within.as_ref();
        let selector = &wait.selector;

        let appeared = Condition::new(format!("{} to match {} element(s)", selector, min_count))
            .with_timeout(timeout)
            .with_interval(interval);
        let count = wait_until(&appeared, || async move {
            let count = count_matches(session, within, selector).await?;
            if count >= min_count {
                Ok::<_, HarnessError>(Probe::Ready(count))
            } else {
                Ok(Probe::NotYet(format!(
                    "{} element(s) matched, need {}",
                    count, min_count
                )))
            }
        })
        .await
        .into_result()?;

        if !wait.settle.unwrap_or(self.defaults.settle) {
            return Ok(count);
        }

        let settled = Condition::new(format!("{} match count to settle", selector))
            .with_timeout(timeout.saturating_sub(started.elapsed()))
            .with_interval(interval);
        let count = wait_until_stable(
            &settled,
            || async move { count_matches(session, within, selector).await },
            |count| *count >= min_count,
        )
        .await
        .into_result()?;
        debug!("{} settled at {} element(s)", selector, count);
        Ok(count)
    }
}

impl<C> Runner<C>
where
    C: Connector + Clone + 'static,
{
    /// Run `scenarios` with at most `parallel` sessions alive at once.
    ///
    /// Results come back in input order. A scenario whose task panics is
    /// reported as failed with kind `aborted`.
    pub async fn run_batch(&self, scenarios: &[Scenario], parallel: usize) -> Vec<ScenarioResult> {
        let limit = Arc::new(Semaphore::new(parallel.max(1)));
        let mut tasks = JoinSet::new();
        let mut positions = HashMap::new();

        for (index, scenario) in scenarios.iter().cloned().enumerate() {
            let runner = self.clone();
            let limit = Arc::clone(&limit);
            let handle = tasks.spawn(async move {
                let _permit = limit.acquire_owned().await;
                runner.run(&scenario).await
            });
            positions.insert(handle.id(), index);
        }

        let mut results: Vec<Option<ScenarioResult>> = scenarios.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next_with_id().await {
            let (id, outcome) = match joined {
                Ok((id, result)) => (id, Ok(result)),
                Err(e) => (e.id(), Err(e)),
            };
            let Some(&index) = positions.get(&id) else {
                continue;
            };
            results[index] = Some(outcome.unwrap_or_else(|e| {
                let name = &scenarios[index].name;
                warn!("Scenario '{}' task did not complete: {}", name, e);
                ScenarioResult::aborted(name, e.to_string())
            }));
        }

        results
            .into_iter()
            .zip(scenarios)
            .map(|(result, scenario)| {
                result.unwrap_or_else(|| {
                    ScenarioResult::aborted(&scenario.name, "task did not complete".to_string())
                })
            })
            .collect()
    }
}

async fn extract_field<D: Driver>(
    session: &Session<D>,
    scope: Scope<'_, D>,
    field: &FieldSpec,
) -> Result<FieldValue> {
    let selector = &field.selector;
    Ok(match &field.value {
        ValueKind::Count => FieldValue::Count(session.find_all(scope, selector).await?.len()),
        ValueKind::Text => FieldValue::Text(session.find(scope, selector).await?.text().await?),
        ValueKind::Attribute { name } => {
            FieldValue::Attribute(session.find(scope, selector).await?.attribute(name).await?)
        }
        ValueKind::Displayed => {
            FieldValue::Displayed(session.find(scope, selector).await?.is_displayed().await?)
        }
    })
}

#[cfg(test)]
#[path = "scenario_test.rs"]
mod scenario_test;
