//! Structural selectors and scoped element queries.
//!
//! A [`Selector`] describes elements by kind, class, id and attributes,
//! optionally nested with the descendant combinator (`"button svg"`).
//! Selectors compare structurally: `"H3.b.a"` and `"h3.a.b"` are the same
//! selector.
//!
//! Every query runs against a [`Scope`], either the whole document or an
//! existing [`ElementHandle`], and only returns elements inside that root.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::driver::Driver;
use crate::errors::{HarnessError, Result};
use crate::session::Session;

/// Attribute test inside a compound selector: `[name]` or `[name="value"]`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttributeTest {
    pub name: String,
    pub value: Option<String>,
}

/// One element predicate: optional tag plus id, classes and attribute tests
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Compound {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: BTreeSet<String>,
    pub attributes: BTreeSet<AttributeTest>,
}

impl Compound {
    fn is_universal(&self) -> bool {
        self.tag.is_none()
            && self.id.is_none()
            && self.classes.is_empty()
            && self.attributes.is_empty()
    }

    /// Check this compound against an element's identity
    pub fn matches(
        &self,
        tag: &str,
        id: Option<&str>,
        classes: &[String],
        attribute: impl Fn(&str) -> Option<String>,
    ) -> bool {
        if let Some(expected) = &self.tag
            && !expected.eq_ignore_ascii_case(tag)
        {
            return false;
        }
        if let Some(expected) = &self.id
            && id != Some(expected.as_str())
        {
            return false;
        }
        if !self.classes.iter().all(|c| classes.contains(c)) {
            return false;
        }
        self.attributes.iter().all(|test| match (attribute(&test.name), &test.value) {
            (Some(_), None) => true,
            (Some(actual), Some(expected)) => &actual == expected,
            (None, _) => false,
        })
    }
}

impl fmt::Display for Compound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_universal() {
            return write!(f, "*");
        }
        if let Some(tag) = &self.tag {
            write!(f, "{}", tag)?;
        }
        if let Some(id) = &self.id {
            write!(f, "#{}", id)?;
        }
        for class in &self.classes {
            write!(f, ".{}", class)?;
        }
        for test in &self.attributes {
            match &test.value {
                Some(value) => write!(f, "[{}=\"{}\"]", test.name, value.replace('"', "\\\""))?,
                None => write!(f, "[{}]", test.name)?,
            }
        }
        Ok(())
    }
}

/// Structural element descriptor: compounds joined by the descendant combinator
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Selector {
    steps: Vec<Compound>,
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self> {
        Parser::new(input).parse()
    }

    /// Elements carrying `class`
    pub fn class(class: &str) -> Self {
        Selector::from_compound(Compound {
            classes: BTreeSet::from([class.to_string()]),
            ..Compound::default()
        })
    }

    /// Elements of kind `tag`
    pub fn tag(tag: &str) -> Self {
        Selector::from_compound(Compound {
            tag: Some(tag.to_ascii_lowercase()),
            ..Compound::default()
        })
    }

    /// Elements of kind `tag` carrying `class`
    pub fn tag_with_class(tag: &str, class: &str) -> Self {
        Selector::from_compound(Compound {
            tag: Some(tag.to_ascii_lowercase()),
            classes: BTreeSet::from([class.to_string()]),
            ..Compound::default()
        })
    }

    /// Narrow the last step to elements that have attribute `name`
    pub fn with_attribute(mut self, name: &str) -> Self {
        if let Some(last) = self.steps.last_mut() {
            last.attributes.insert(AttributeTest {
                name: name.to_ascii_lowercase(),
                value: None,
            });
        }
        self
    }

    /// Elements matching `inner` nested anywhere under elements matching `self`
    pub fn descendant(mut self, inner: Selector) -> Self {
        self.steps.extend(inner.steps);
        self
    }

    pub fn steps(&self) -> &[Compound] {
        &self.steps
    }

    /// Canonical CSS rendering, understood by every WebDriver
    pub fn to_css(&self) -> String {
        self.to_string()
    }

    fn from_compound(compound: Compound) -> Self {
        Selector {
            steps: vec![compound],
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", step)?;
        }
        Ok(())
    }
}

impl FromStr for Selector {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        Selector::parse(s)
    }
}

impl TryFrom<String> for Selector {
    type Error = HarnessError;

    fn try_from(value: String) -> Result<Self> {
        Selector::parse(&value)
    }
}

impl From<Selector> for String {
    fn from(selector: Selector) -> Self {
        selector.to_css()
    }
}

struct Parser<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Parser {
            input,
            chars: input.chars().peekable(),
        }
    }

    fn error(&self, reason: impl Into<String>) -> HarnessError {
        HarnessError::InvalidSelector {
            input: self.input.to_string(),
            reason: reason.into(),
        }
    }

    fn parse(mut self) -> Result<Selector> {
        let mut steps = Vec::new();
        loop {
            self.skip_whitespace();
            if self.chars.peek().is_none() {
                break;
            }
            steps.push(self.compound()?);
        }
        if steps.is_empty() {
            return Err(self.error("selector is empty"));
        }
        Ok(Selector { steps })
    }

    fn skip_whitespace(&mut self) {
        while self.chars.peek().is_some_and(|c| c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn compound(&mut self) -> Result<Compound> {
        let mut compound = Compound::default();
        let mut consumed = false;

        match self.chars.peek().copied() {
            Some('*') => {
                self.chars.next();
                consumed = true;
            }
            Some(c) if is_ident_char(c) => {
                compound.tag = Some(self.ident("tag")?.to_ascii_lowercase());
                consumed = true;
            }
            _ => {}
        }

        while let Some(&c) = self.chars.peek() {
            match c {
                '.' => {
                    self.chars.next();
                    compound.classes.insert(self.ident("class")?);
                }
                '#' => {
                    self.chars.next();
                    let id = self.ident("id")?;
                    if compound.id.as_ref().is_some_and(|existing| existing != &id) {
                        return Err(self.error("conflicting ids in one compound"));
                    }
                    compound.id = Some(id);
                }
                '[' => {
                    self.chars.next();
                    compound.attributes.insert(self.attribute()?);
                }
                c if c.is_whitespace() => break,
                '>' | '+' | '~' | ',' | ':' => {
                    return Err(self.error(format!("'{}' is not supported", c)));
                }
                _ => return Err(self.error(format!("unexpected character '{}'", c))),
            }
            consumed = true;
        }

        if !consumed {
            return Err(self.error("expected an element predicate"));
        }
        Ok(compound)
    }

    fn ident(&mut self, what: &str) -> Result<String> {
        let mut ident = String::new();
        while let Some(&c) = self.chars.peek() {
            if !is_ident_char(c) {
                break;
            }
            ident.push(c);
            self.chars.next();
        }
        if ident.is_empty() {
            return Err(self.error(format!("expected {} name", what)));
        }
        Ok(ident)
    }

    fn attribute(&mut self) -> Result<AttributeTest> {
        self.skip_whitespace();
        let name = self.ident("attribute")?.to_ascii_lowercase();
        self.skip_whitespace();

        let value = match self.chars.next() {
            Some(']') => return Ok(AttributeTest { name, value: None }),
            Some('=') => {
                self.skip_whitespace();
                match self.chars.peek().copied() {
                    Some(quote @ ('"' | '\'')) => {
                        self.chars.next();
                        self.quoted(quote)?
                    }
                    _ => self.ident("attribute value")?,
                }
            }
            _ => return Err(self.error("malformed attribute test")),
        };

        self.skip_whitespace();
        if self.chars.next() != Some(']') {
            return Err(self.error("expected ']'"));
        }
        Ok(AttributeTest {
            name,
            value: Some(value),
        })
    }

    fn quoted(&mut self, quote: char) -> Result<String> {
        let mut value = String::new();
        loop {
            match self.chars.next() {
                Some('\\') => match self.chars.next() {
                    Some(escaped) => value.push(escaped),
                    None => return Err(self.error("unterminated escape")),
                },
                Some(c) if c == quote => return Ok(value),
                Some(c) => value.push(c),
                None => return Err(self.error("unterminated string")),
            }
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

/// Root of a query: the whole document or the subtree of one element
pub enum Scope<'a, D: Driver> {
    Document,
    Within(&'a D::Element),
}

impl<D: Driver> Clone for Scope<'_, D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D: Driver> Copy for Scope<'_, D> {}

impl<'a, 's, D: Driver> From<&'a ElementHandle<'s, D>> for Scope<'a, D> {
    fn from(handle: &'a ElementHandle<'s, D>) -> Self {
        Scope::Within(&handle.element)
    }
}

impl<D: Driver> Scope<'_, D> {
    fn root(&self) -> Option<&D::Element> {
        match self {
            Scope::Document => None,
            Scope::Within(element) => Some(element),
        }
    }
}

/// Reference to one rendered node of the session's current document.
///
/// Handles borrow the session, so the borrow checker rules out using one
/// after navigation or release.
pub struct ElementHandle<'s, D: Driver> {
    session: &'s Session<D>,
    element: D::Element,
}

impl<'s, D: Driver> ElementHandle<'s, D> {
    pub async fn text(&self) -> Result<String> {
        self.session.ensure_active("read element text")?;
        self.session.driver.text(&self.element).await
    }

    pub async fn attribute(&self, name: &str) -> Result<Option<String>> {
        self.session.ensure_active("read element attribute")?;
        self.session.driver.attribute(&self.element, name).await
    }

    pub async fn is_displayed(&self) -> Result<bool> {
        self.session.ensure_active("check element visibility")?;
        self.session.driver.is_displayed(&self.element).await
    }

    pub async fn tag_name(&self) -> Result<String> {
        self.session.ensure_active("read element tag")?;
        self.session.driver.tag_name(&self.element).await
    }

    /// First descendant matching `selector`
    pub async fn find(&self, selector: &Selector) -> Result<ElementHandle<'s, D>> {
        self.session.find(Scope::Within(&self.element), selector).await
    }

    /// All descendants matching `selector`, in document order
    pub async fn find_all(&self, selector: &Selector) -> Result<QueryResult<'s, D>> {
        self.session.find_all(Scope::Within(&self.element), selector).await
    }

    pub fn as_scope(&self) -> Scope<'_, D> {
        Scope::Within(&self.element)
    }
}

impl<D: Driver> fmt::Debug for ElementHandle<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementHandle")
            .field("element", &self.element)
            .finish()
    }
}

/// Ordered, possibly empty set of matches for one query
pub struct QueryResult<'s, D: Driver> {
    selector: Selector,
    handles: Vec<ElementHandle<'s, D>>,
}

impl<'s, D: Driver> QueryResult<'s, D> {
    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn first(&self) -> Option<&ElementHandle<'s, D>> {
        self.handles.first()
    }

    pub fn get(&self, index: usize) -> Option<&ElementHandle<'s, D>> {
        self.handles.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ElementHandle<'s, D>> {
        self.handles.iter()
    }
}

impl<D: Driver> fmt::Debug for QueryResult<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryResult")
            .field("selector", &self.selector)
            .field("handles", &self.handles)
            .finish()
    }
}

impl<'s, D: Driver> IntoIterator for QueryResult<'s, D> {
    type Item = ElementHandle<'s, D>;
    type IntoIter = std::vec::IntoIter<ElementHandle<'s, D>>;

    fn into_iter(self) -> Self::IntoIter {
        self.handles.into_iter()
    }
}

impl<D: Driver> Session<D> {
    /// First element under `scope` matching `selector`, or `NotFound`
    pub async fn find(&self, scope: Scope<'_, D>, selector: &Selector) -> Result<ElementHandle<'_, D>> {
        self.ensure_active("query elements")?;
        debug!("Finding element with selector: {}", selector);

        let mut elements = self.driver.query(selector, scope.root()).await?;
        if elements.is_empty() {
            return Err(HarnessError::not_found(selector));
        }
        Ok(ElementHandle {
            session: self,
            element: elements.swap_remove(0),
        })
    }

    /// Every element under `scope` matching `selector`; empty when nothing matches
    pub async fn find_all(&self, scope: Scope<'_, D>, selector: &Selector) -> Result<QueryResult<'_, D>> {
        self.ensure_active("query elements")?;
        debug!("Finding elements with selector: {}", selector);

        let elements = self.driver.query(selector, scope.root()).await?;
        Ok(QueryResult {
            selector: selector.clone(),
            handles: elements
                .into_iter()
                .map(|element| ElementHandle { session: self, element })
                .collect(),
        })
    }

    /// Visible text of `scope`; the document scope reads `<body>`
    pub async fn visible_text(&self, scope: Scope<'_, D>) -> Result<String> {
        match scope {
            Scope::Within(element) => {
                self.ensure_active("read element text")?;
                self.driver.text(element).await
            }
            Scope::Document => match self.find_all(Scope::Document, &Selector::tag("body")).await?.first() {
                Some(body) => body.text().await,
                None => Ok(String::new()),
            },
        }
    }
}

#[cfg(test)]
#[path = "locator_test.rs"]
mod locator_test;
