// Unit tests for assertion combinators

use super::*;
use pretty_assertions::assert_eq;

#[test]
fn test_non_empty_text() {
    let passed = non_empty_text("name", "Bitcoin");
    assert!(passed.passed());
    assert_eq!(passed.description(), "name has non-empty text");
    assert_eq!(passed.actual_value(), Some("Bitcoin"));

    assert!(!non_empty_text("name", "").passed());
    assert!(!non_empty_text("name", " \n\t ").passed());
}

#[test]
fn test_contains_substring_is_literal() {
    assert!(contains_substring("price", "$43,250.12", "$").passed());
    assert!(contains_substring("change", "+2.50%", "%").passed());
    assert!(!contains_substring("change", "+2.50", "%").passed());
    // No pattern semantics
    assert!(!contains_substring("price", "43250", ".*").passed());
}

#[test]
fn test_counts() {
    assert!(count_at_least("cards", 10, 5).passed());
    assert!(count_at_least("cards", 5, 5).passed());

    let failed = count_at_least("cards", 3, 5);
    assert!(!failed.passed());
    assert_eq!(failed.actual_value(), Some("3"));
    assert_eq!(failed.description(), "cards count is at least 5");

    assert!(count_equals("svg icons", 1, 1).passed());
    assert!(!count_equals("svg icons", 2, 1).passed());
}

#[test]
fn test_matches_shape_uses_predicate() {
    let outcome = matches_shape("symbol", "BTC", "an upper-case ticker", |v| {
        !v.is_empty() && v.chars().all(|c| c.is_ascii_uppercase())
    });
    assert!(outcome.passed());
    assert_eq!(outcome.description(), "symbol matches an upper-case ticker");

    assert!(!matches_shape("symbol", "btc", "an upper-case ticker", |v| v
        .chars()
        .all(|c| c.is_ascii_uppercase()))
    .passed());
}

#[test]
fn test_url_scheme() {
    let schemes = ["http", "https"];
    assert!(has_url_scheme("icon", "https://assets.coincap.io/btc.png", &schemes).passed());
    assert!(has_url_scheme("icon", "HTTP://example.com/a.png", &schemes).passed());
    assert!(!has_url_scheme("icon", "data:image/png;base64,AAAA", &schemes).passed());
    assert!(!has_url_scheme("icon", "/static/btc.png", &schemes).passed());
    assert!(!has_url_scheme("icon", "", &schemes).passed());
}

#[test]
fn test_numeric_shape() {
    for value in ["$43,250.12", "+2.50%", "-1.20%", "$1.20T", "$845.3B", "42", "1,234,567", " $0.99 "] {
        assert!(numeric_shape("value", value).passed(), "rejected {:?}", value);
    }
    for value in ["", "$", "N/A", "1,23", "12,345,67", "1.", "$1.2.3", "abc%", "1234,567"] {
        assert!(!numeric_shape("value", value).passed(), "accepted {:?}", value);
    }
}

#[test]
fn test_presence_and_visibility() {
    assert!(attribute_present("icon src", Some("https://x/y.png")).passed());
    let missing = attribute_present("icon src", None);
    assert!(!missing.passed());
    assert_eq!(missing.actual_value(), None);

    assert!(is_displayed("favorite button", true).passed());
    assert!(!is_displayed("favorite button", false).passed());
}

#[test]
fn test_long_actual_values_are_truncated() {
    let long = "x".repeat(500);
    let outcome = non_empty_text("body", &long);
    assert_eq!(outcome.actual_value().unwrap().chars().count(), 203);
}

#[test]
fn test_checks_records_every_outcome() {
    let mut checks = Checks::new();
    assert!(checks.all_passed());

    assert!(checks.record(non_empty_text("name", "Bitcoin")));
    assert!(!checks.record(contains_substring("change", "2.5", "%")));
    assert!(checks.record(count_at_least("cards", 10, 5)));

    assert_eq!(checks.len(), 3);
    assert!(!checks.all_passed());
    let failures: Vec<_> = checks.failures().map(|o| o.description().to_string()).collect();
    assert_eq!(failures, vec!["change contains \"%\""]);
}

#[test]
fn test_with_diagnostic_keeps_result() {
    let outcome = contains_substring("change", "2.5", "%")
        .with_diagnostic(DiagnosticSnapshot::new("Bitcoin 2.5"));
    assert!(!outcome.passed());
    assert_eq!(outcome.diagnostic().unwrap().visible_text, "Bitcoin 2.5");
}

#[test]
fn test_check_evaluate_dispatches_on_value_kind() {
    let text = FieldValue::Text("+2.50%".into());
    assert!(Check::Contains { token: "%".into() }.evaluate("change", &text).passed());
    assert!(Check::Numeric.evaluate("change", &text).passed());
    assert!(Check::NonEmpty.evaluate("change", &text).passed());

    let src = FieldValue::Attribute(Some("https://a.test/btc.png".into()));
    assert!(Check::UrlScheme { schemes: default_schemes() }.evaluate("icon", &src).passed());
    assert!(Check::Present.evaluate("icon", &src).passed());

    let absent = FieldValue::Attribute(None);
    let outcome = Check::NonEmpty.evaluate("icon", &absent);
    assert!(!outcome.passed());
    assert_eq!(outcome.description(), "icon non-empty: attribute is absent");
    assert!(!Check::Present.evaluate("icon", &absent).passed());

    assert!(Check::CountAtLeast { min: 1 }.evaluate("cap", &FieldValue::Count(2)).passed());
    assert!(Check::Present.evaluate("svg", &FieldValue::Count(1)).passed());
    assert!(Check::Displayed.evaluate("button", &FieldValue::Displayed(true)).passed());
}

#[test]
fn test_check_on_wrong_kind_fails() {
    let outcome = Check::CountAtLeast { min: 1 }.evaluate("name", &FieldValue::Text("Bitcoin".into()));
    assert!(!outcome.passed());
    assert_eq!(outcome.description(), "name count >= 1: cannot apply to a text");
    assert_eq!(outcome.actual_value(), Some("Bitcoin"));

    assert!(!Check::Contains { token: "%".into() }
        .evaluate("button", &FieldValue::Displayed(true))
        .passed());
}

#[test]
fn test_check_deserializes_from_suite_json() {
    let checks: Vec<Check> = serde_json::from_str(
        r#"[
            {"check": "non_empty"},
            {"check": "contains", "token": "$"},
            {"check": "count_at_least", "min": 5},
            {"check": "url_scheme"},
            {"check": "url_scheme", "schemes": ["https"]}
        ]"#,
    )
    .unwrap();

    assert_eq!(
        checks,
        vec![
            Check::NonEmpty,
            Check::Contains { token: "$".into() },
            Check::CountAtLeast { min: 5 },
            Check::UrlScheme { schemes: vec!["http".into(), "https".into()] },
            Check::UrlScheme { schemes: vec!["https".into()] },
        ]
    );
}

#[test]
fn test_outcome_serializes_without_empty_fields() {
    let json = serde_json::to_value(attribute_present("icon", None)).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"passed": false, "description": "icon is present"})
    );
}
