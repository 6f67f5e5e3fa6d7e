//! Validation combinators over extracted values.
//!
//! Every combinator returns an [`AssertionOutcome`] instead of panicking or
//! returning early, so a scenario can record all checks of a page and report
//! them together.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::types::{DiagnosticSnapshot, truncate_text};

/// Longest actual value kept in an outcome
const ACTUAL_VALUE_LIMIT: usize = 200;

/// Result of one check. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionOutcome {
    passed: bool,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    actual_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    diagnostic: Option<DiagnosticSnapshot>,
}

impl AssertionOutcome {
    fn new(passed: bool, description: String, actual_value: Option<String>) -> Self {
        AssertionOutcome {
            passed,
            description,
            actual_value: actual_value.map(|v| truncate_text(&v, ACTUAL_VALUE_LIMIT)),
            diagnostic: None,
        }
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn actual_value(&self) -> Option<&str> {
        self.actual_value.as_deref()
    }

    pub fn diagnostic(&self) -> Option<&DiagnosticSnapshot> {
        self.diagnostic.as_ref()
    }

    /// Copy of this outcome carrying the page state captured for it
    pub fn with_diagnostic(self, snapshot: DiagnosticSnapshot) -> Self {
        AssertionOutcome {
            diagnostic: Some(snapshot),
            ..self
        }
    }
}

impl fmt::Display for AssertionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.passed { "PASS" } else { "FAIL" };
        write!(f, "[{}] {}", mark, self.description)?;
        if let Some(actual) = &self.actual_value {
            write!(f, " (actual: {:?})", actual)?;
        }
        Ok(())
    }
}

/// Passes when `value` has visible characters after trimming
pub fn non_empty_text(label: &str, value: &str) -> AssertionOutcome {
    AssertionOutcome::new(
        !value.trim().is_empty(),
        format!("{} has non-empty text", label),
        Some(value.to_string()),
    )
}

/// Passes when `value` contains `token` literally
pub fn contains_substring(label: &str, value: &str, token: &str) -> AssertionOutcome {
    AssertionOutcome::new(
        value.contains(token),
        format!("{} contains {:?}", label, token),
        Some(value.to_string()),
    )
}

/// Passes when `predicate` accepts `value`; `shape` describes what it accepts
pub fn matches_shape(
    label: &str,
    value: &str,
    shape: &str,
    predicate: impl Fn(&str) -> bool,
) -> AssertionOutcome {
    AssertionOutcome::new(
        predicate(value),
        format!("{} matches {}", label, shape),
        Some(value.to_string()),
    )
}

pub fn count_at_least(label: &str, count: usize, min: usize) -> AssertionOutcome {
    AssertionOutcome::new(
        count >= min,
        format!("{} count is at least {}", label, min),
        Some(count.to_string()),
    )
}

pub fn count_equals(label: &str, count: usize, expected: usize) -> AssertionOutcome {
    AssertionOutcome::new(
        count == expected,
        format!("{} count equals {}", label, expected),
        Some(count.to_string()),
    )
}

/// Passes when `value` parses as an absolute URL with one of `schemes`
pub fn has_url_scheme<S: AsRef<str>>(label: &str, value: &str, schemes: &[S]) -> AssertionOutcome {
    let passed = Url::parse(value.trim())
        .map(|url| schemes.iter().any(|s| s.as_ref().eq_ignore_ascii_case(url.scheme())))
        .unwrap_or(false);
    let names: Vec<&str> = schemes.iter().map(|s| s.as_ref()).collect();
    AssertionOutcome::new(
        passed,
        format!("{} is a {} URL", label, names.join("/")),
        Some(value.to_string()),
    )
}

/// Passes for decorated numbers such as `$1,234.56`, `+2.50%` or `$1.20T`
pub fn numeric_shape(label: &str, value: &str) -> AssertionOutcome {
    AssertionOutcome::new(
        is_decorated_number(value),
        format!("{} is a number", label),
        Some(value.to_string()),
    )
}

pub fn attribute_present(label: &str, value: Option<&str>) -> AssertionOutcome {
    AssertionOutcome::new(
        value.is_some(),
        format!("{} is present", label),
        value.map(str::to_string),
    )
}

pub fn is_displayed(label: &str, displayed: bool) -> AssertionOutcome {
    AssertionOutcome::new(
        displayed,
        format!("{} is displayed", label),
        Some(displayed.to_string()),
    )
}

/// Optional sign, optional `$`, digits with thousands separators, optional
/// fraction, then at most one of `%`, `K`, `M`, `B`, `T`.
fn is_decorated_number(value: &str) -> bool {
    let mut rest = value.trim();
    if let Some(stripped) = rest.strip_prefix(['+', '-']) {
        rest = stripped;
    }
    if let Some(stripped) = rest.strip_prefix('$') {
        rest = stripped;
    }
    if let Some(stripped) = rest.strip_suffix(['%', 'K', 'M', 'B', 'T']) {
        rest = stripped;
    }

    let (integer, fraction) = match rest.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (rest, None),
    };
    if let Some(fraction) = fraction
        && (fraction.is_empty() || !fraction.chars().all(|c| c.is_ascii_digit()))
    {
        return false;
    }

    let mut groups = integer.split(',');
    let Some(first) = groups.next() else {
        return false;
    };
    let grouped = integer.contains(',');
    if first.is_empty()
        || !first.chars().all(|c| c.is_ascii_digit())
        || (grouped && first.len() > 3)
    {
        return false;
    }
    groups.all(|group| group.len() == 3 && group.chars().all(|c| c.is_ascii_digit()))
}

/// Ordered collection of outcomes for one scenario
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checks {
    outcomes: Vec<AssertionOutcome>,
}

impl Checks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `outcome` and return whether it passed
    pub fn record(&mut self, outcome: AssertionOutcome) -> bool {
        let passed = outcome.passed;
        self.outcomes.push(outcome);
        passed
    }

    /// True when every recorded outcome passed (vacuously true when empty)
    pub fn all_passed(&self) -> bool {
        self.outcomes.iter().all(|o| o.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &AssertionOutcome> {
        self.outcomes.iter().filter(|o| !o.passed)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AssertionOutcome> {
        self.outcomes.iter()
    }

    pub fn into_outcomes(self) -> Vec<AssertionOutcome> {
        self.outcomes
    }
}

/// A value pulled out of the page for validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Attribute(Option<String>),
    Count(usize),
    Displayed(bool),
}

impl FieldValue {
    fn kind(&self) -> &'static str {
        match self {
            FieldValue::Text(_) => "text",
            FieldValue::Attribute(_) => "attribute",
            FieldValue::Count(_) => "count",
            FieldValue::Displayed(_) => "visibility flag",
        }
    }

    /// Textual content, if the value has any
    fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            FieldValue::Attribute(value) => value.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(text) => write!(f, "{}", text),
            FieldValue::Attribute(Some(value)) => write!(f, "{}", value),
            FieldValue::Attribute(None) => write!(f, "<absent>"),
            FieldValue::Count(count) => write!(f, "{}", count),
            FieldValue::Displayed(flag) => write!(f, "{}", flag),
        }
    }
}

fn default_schemes() -> Vec<String> {
    vec!["http".to_string(), "https".to_string()]
}

/// Declarative form of the combinators, as written in suite files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum Check {
    NonEmpty,
    Contains {
        token: String,
    },
    CountAtLeast {
        min: usize,
    },
    CountEquals {
        expected: usize,
    },
    UrlScheme {
        #[serde(default = "default_schemes")]
        schemes: Vec<String>,
    },
    Numeric,
    Displayed,
    Present,
}

impl Check {
    /// Failed outcome for a check whose field holds no value
    pub fn unavailable(&self, label: &str) -> AssertionOutcome {
        AssertionOutcome::new(
            false,
            format!("{} {}: no value was extracted", label, self),
            None,
        )
    }

    /// Apply this check to `value`. A value of the wrong kind fails the check.
    pub fn evaluate(&self, label: &str, value: &FieldValue) -> AssertionOutcome {
        if let Some(text) = value.as_text() {
            match self {
                Check::NonEmpty => return non_empty_text(label, text),
                Check::Contains { token } => return contains_substring(label, text, token),
                Check::UrlScheme { schemes } => {
                    return has_url_scheme(label, text, schemes.as_slice());
                }
                Check::Numeric => return numeric_shape(label, text),
                _ => {}
            }
        }

        match (self, value) {
            (Check::CountAtLeast { min }, FieldValue::Count(count)) => {
                count_at_least(label, *count, *min)
            }
            (Check::CountEquals { expected }, FieldValue::Count(count)) => {
                count_equals(label, *count, *expected)
            }
            (Check::Displayed, FieldValue::Displayed(flag)) => is_displayed(label, *flag),
            (Check::Present, FieldValue::Attribute(attr)) => attribute_present(label, attr.as_deref()),
            (Check::Present, FieldValue::Count(count)) => count_at_least(label, *count, 1),
            (_, FieldValue::Attribute(None)) => AssertionOutcome::new(
                false,
                format!("{} {}: attribute is absent", label, self),
                None,
            ),
            _ => AssertionOutcome::new(
                false,
                format!("{} {}: cannot apply to a {}", label, self, value.kind()),
                Some(value.to_string()),
            ),
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Check::NonEmpty => write!(f, "non-empty"),
            Check::Contains { token } => write!(f, "contains {:?}", token),
            Check::CountAtLeast { min } => write!(f, "count >= {}", min),
            Check::CountEquals { expected } => write!(f, "count == {}", expected),
            Check::UrlScheme { schemes } => write!(f, "{} URL", schemes.join("/")),
            Check::Numeric => write!(f, "numeric"),
            Check::Displayed => write!(f, "displayed"),
            Check::Present => write!(f, "present"),
        }
    }
}

#[cfg(test)]
#[path = "assertion_test.rs"]
mod assertion_test;
