// Unit tests for types module

use super::*;

#[test]
fn test_window_size_parse() {
    // Valid formats
    let size = WindowSize::parse("1920x1080").unwrap();
    assert_eq!(size.width, 1920);
    assert_eq!(size.height, 1080);

    let size = WindowSize::parse("800x600").unwrap();
    assert_eq!(size, WindowSize { width: 800, height: 600 });

    // Invalid formats
    assert!(WindowSize::parse("1920").is_err());
    assert!(WindowSize::parse("1920x").is_err());
    assert!(WindowSize::parse("x1080").is_err());
    assert!(WindowSize::parse("abc x def").is_err());
    assert!(WindowSize::parse("1920X1080").is_err()); // uppercase X
}

#[test]
fn test_window_size_default_matches_fixture() {
    assert_eq!(WindowSize::default(), WindowSize { width: 1920, height: 1080 });
}

#[test]
fn test_output_format() {
    let json = OutputFormat::Json;
    let simple = OutputFormat::Simple;

    assert!(matches!(json, OutputFormat::Json));
    assert!(matches!(simple, OutputFormat::Simple));
    assert!(!matches!(json, OutputFormat::Simple));
}

#[test]
fn test_truncate_text() {
    assert_eq!(truncate_text("short", 10), "short");
    assert_eq!(truncate_text("abcdefgh", 3), "abc...");
    // Multi-byte characters are never split
    assert_eq!(truncate_text("價格價格", 2), "價格...");
}

#[test]
fn test_snapshot_builder() {
    let long = "x".repeat(SNAPSHOT_TEXT_LIMIT + 50);
    let snapshot = DiagnosticSnapshot::new(&long)
        .with_url(Some("http://localhost:3000/".into()))
        .with_selector(".card", true)
        .with_note("0 element(s) matched");

    assert_eq!(snapshot.visible_text.chars().count(), SNAPSHOT_TEXT_LIMIT + 3);
    assert_eq!(snapshot.selector.as_deref(), Some(".card"));
    assert!(snapshot.zero_matches);
    assert_eq!(snapshot.note.as_deref(), Some("0 element(s) matched"));
}

#[test]
fn test_snapshot_serialization_skips_empty_fields() {
    let snapshot = DiagnosticSnapshot::new("Error loading data");
    let json = serde_json::to_value(&snapshot).unwrap();

    assert_eq!(json["visible_text"], "Error loading data");
    assert_eq!(json["zero_matches"], false);
    assert!(json.get("url").is_none());
    assert!(json.get("selector").is_none());
    assert!(json.get("note").is_none());
}
