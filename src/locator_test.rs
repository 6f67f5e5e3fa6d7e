// Unit tests for selectors and scoped queries

use super::*;
use crate::config::SessionConfig;
use crate::driver::{MemoryConnector, MemoryDriver, Node, Page};
use pretty_assertions::assert_eq;

const URL: &str = "http://app.test/";

#[test]
fn test_parse_supported_forms() {
    for input in [
        ".card",
        "h3.font-semibold",
        "p.text-2xl",
        "button svg",
        "img[src]",
        "#root",
        "[data-testid=\"price\"]",
        "div.card span.font-medium",
        "*",
    ] {
        assert!(Selector::parse(input).is_ok(), "failed to parse {}", input);
    }
}

#[test]
fn test_parse_rejects_unsupported_syntax() {
    for input in ["", "   ", "div > p", "a, b", "li:first-child", "div + p", ".", "[src", "#"] {
        let err = Selector::parse(input).unwrap_err();
        assert!(
            matches!(err, HarnessError::InvalidSelector { .. }),
            "expected InvalidSelector for {:?}",
            input
        );
    }
}

#[test]
fn test_structural_equality_ignores_syntax() {
    let parse = |s: &str| Selector::parse(s).unwrap();

    assert_eq!(parse(".card"), parse("*.card"));
    assert_eq!(parse("H3.font-semibold"), parse("h3.font-semibold"));
    assert_eq!(parse("p.a.b"), parse("p.b.a.a"));
    assert_eq!(parse("button   svg"), parse(" button svg "));
    assert_eq!(parse("img[src][alt]"), parse("img[alt][src]"));
    assert_eq!(parse("[data-x='1']"), parse("[data-x=\"1\"]"));
    assert_eq!(parse("h3.font-semibold"), Selector::tag_with_class("h3", "font-semibold"));
    assert_eq!(parse("button svg"), Selector::tag("button").descendant(Selector::tag("svg")));
    assert_eq!(parse("img[src]"), Selector::tag("img").with_attribute("src"));

    assert_ne!(parse(".card"), parse(".Card"));
    assert_ne!(parse("button svg"), parse("svg button"));
    assert_ne!(parse("p.uppercase"), parse("span.uppercase"));
}

#[test]
fn test_canonical_css_round_trips() {
    let selector = Selector::parse("DIV.b.a#main[data-x=\"1\"] SPAN").unwrap();
    assert_eq!(selector.to_css(), "div#main.a.b[data-x=\"1\"] span");
    assert_eq!(Selector::parse(&selector.to_css()).unwrap(), selector);
    assert_eq!(Selector::parse("*").unwrap().to_css(), "*");
}

#[test]
fn test_selector_serde_uses_css_text() {
    let selector: Selector = serde_json::from_str("\"h3.font-semibold\"").unwrap();
    assert_eq!(selector, Selector::tag_with_class("h3", "font-semibold"));
    assert_eq!(serde_json::to_string(&selector).unwrap(), "\"h3.font-semibold\"");
    assert!(serde_json::from_str::<Selector>("\"div > p\"").is_err());
}

fn card(name: &str, change: &str) -> Node {
    Node::new("div")
        .class("card")
        .child(Node::new("h3").class("font-semibold").text(name))
        .child(Node::new("span").class("font-medium").text(change))
}

async fn session_with(body: Node) -> Session<MemoryDriver> {
    let connector = MemoryConnector::new().with_page(URL, Page::new(body));
    let mut session = Session::acquire(&connector, SessionConfig::default()).await.unwrap();
    session.navigate(URL).await.unwrap();
    session
}

#[tokio::test]
async fn test_find_all_empty_when_nothing_matches() {
    let session = session_with(Node::new("p").text("Loading...")).await;
    let result = session
        .find_all(Scope::Document, &Selector::class("card"))
        .await
        .unwrap();
    assert!(result.is_empty());
    assert_eq!(result.len(), 0);
    assert!(result.first().is_none());
}

#[tokio::test]
async fn test_find_not_found_names_selector() {
    let session = session_with(Node::new("p").text("Loading...")).await;
    let err = session
        .find(Scope::Document, &Selector::class("card"))
        .await
        .unwrap_err();
    assert!(matches!(&err, HarnessError::NotFound { selector } if selector == ".card"));
}

#[tokio::test]
async fn test_find_returns_first_in_document_order_deterministically() {
    let session = session_with(Node::new("main").children([
        card("Bitcoin", "+2.50%"),
        card("Ethereum", "-1.20%"),
    ]))
    .await;

    let selector = Selector::parse("h3.font-semibold").unwrap();
    for _ in 0..3 {
        let first = session.find(Scope::Document, &selector).await.unwrap();
        assert_eq!(first.text().await.unwrap(), "Bitcoin");
    }
}

#[tokio::test]
async fn test_nested_queries_stay_inside_scope() {
    let session = session_with(Node::new("main").children([
        card("Bitcoin", "+2.50%"),
        card("Ethereum", "-1.20%"),
    ]))
    .await;

    let cards = session
        .find_all(Scope::Document, &Selector::class("card"))
        .await
        .unwrap();
    assert_eq!(cards.len(), 2);

    let second = cards.get(1).unwrap();
    let change = second
        .find(&Selector::tag_with_class("span", "font-medium"))
        .await
        .unwrap();
    assert_eq!(change.text().await.unwrap(), "-1.20%");

    let names = second.find_all(&Selector::tag("h3")).await.unwrap();
    assert_eq!(names.len(), 1);

    let missing = second.find(&Selector::tag("img")).await;
    assert!(matches!(missing, Err(HarnessError::NotFound { .. })));

    let via_scope = session
        .find_all(second.as_scope(), &Selector::tag("h3"))
        .await
        .unwrap();
    assert_eq!(via_scope.first().unwrap().text().await.unwrap(), "Ethereum");
}

#[tokio::test]
async fn test_handle_reads_attributes_and_visibility() {
    let session = session_with(
        Node::new("div").class("card").child(
            Node::new("button")
                .attr("aria-label", "Add to favorites")
                .child(Node::new("svg")),
        ),
    )
    .await;

    let button = session
        .find(Scope::Document, &Selector::parse(".card button").unwrap())
        .await
        .unwrap();
    assert_eq!(button.tag_name().await.unwrap(), "button");
    assert!(button.is_displayed().await.unwrap());
    assert_eq!(
        button.attribute("aria-label").await.unwrap().as_deref(),
        Some("Add to favorites")
    );
    assert_eq!(button.find_all(&Selector::tag("svg")).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_visible_text_of_document() {
    let session = session_with(
        Node::new("div")
            .child(Node::new("p").class("font-medium").text("Error loading data"))
            .child(Node::new("p").class("text-sm").text("Network Error")),
    )
    .await;

    assert_eq!(
        session.visible_text(Scope::Document).await.unwrap(),
        "Error loading data\nNetwork Error"
    );
}

#[tokio::test]
async fn test_queries_on_closed_session_fail_with_lifecycle_error() {
    let mut session = session_with(card("Bitcoin", "+2.50%")).await;
    session.release().await.unwrap();

    let err = session
        .find_all(Scope::Document, &Selector::class("card"))
        .await
        .unwrap_err();
    assert!(matches!(err, HarnessError::Lifecycle { .. }));
    assert!(matches!(
        session.visible_text(Scope::Document).await,
        Err(HarnessError::Lifecycle { .. })
    ));
}
