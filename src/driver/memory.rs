//! A scripted document served without a browser.
//!
//! Each [`Page`] is a timeline of body trees: the first one is shown on
//! navigation, later ones replace it once their delay has passed, the way a
//! client-side app swaps its loading spinner for fetched content. Element
//! references from an earlier render become stale when the tree is replaced.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::{Connector, Driver};
use crate::config::SessionConfig;
use crate::errors::{HarnessError, Result};
use crate::locator::{Compound, Selector};

/// One element of a scripted document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Node {
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<(String, String)>,
    text: String,
    hidden: bool,
    children: Vec<Node>,
}

impl Node {
    pub fn new(tag: &str) -> Self {
        Node {
            tag: tag.to_ascii_lowercase(),
            ..Node::default()
        }
    }

    /// Add one or more whitespace separated classes
    pub fn class(mut self, classes: &str) -> Self {
        for class in classes.split_whitespace() {
            if !self.classes.iter().any(|c| c == class) {
                self.classes.push(class.to_string());
            }
        }
        self
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    /// Rendered but not displayed (`display: none`)
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = Node>) -> Self {
        self.children.extend(children);
        self
    }
}

/// Timeline of body trees served for one URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    frames: Vec<(Duration, Node)>,
}

impl Page {
    /// Page showing `body` as soon as it is loaded
    pub fn new(body: Node) -> Self {
        Page {
            frames: vec![(Duration::ZERO, into_body(body))],
        }
    }

    /// Replace the body with `body` once `delay` has passed since navigation
    pub fn then_after(mut self, delay: Duration, body: Node) -> Self {
        self.frames.push((delay, into_body(body)));
        self.frames.sort_by_key(|(at, _)| *at);
        self
    }

    fn frame_at(&self, elapsed: Duration) -> usize {
        self.frames
            .iter()
            .rposition(|(at, _)| *at <= elapsed)
            .unwrap_or(0)
    }
}

fn into_body(node: Node) -> Node {
    if node.tag == "body" {
        node
    } else {
        Node::new("body").child(node)
    }
}

fn not_found_page() -> Page {
    Page::new(Node::new("body").child(Node::new("h1").text("404 Not Found")))
}

/// Reference to a node of one render of a [`MemoryDriver`] document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryElement {
    generation: u64,
    index: usize,
}

#[derive(Debug)]
struct FlatNode {
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<(String, String)>,
    text: String,
    hidden: bool,
    parent: Option<usize>,
    /// One past the last descendant in document order
    subtree_end: usize,
}

impl FlatNode {
    fn attribute(&self, name: &str) -> Option<String> {
        match name {
            "id" => self.id.clone(),
            "class" if !self.classes.is_empty() => Some(self.classes.join(" ")),
            _ => self
                .attributes
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.clone()),
        }
    }

    fn matches(&self, compound: &Compound) -> bool {
        compound.matches(&self.tag, self.id.as_deref(), &self.classes, |name| {
            self.attribute(name)
        })
    }
}

fn flatten(root: &Node) -> Vec<FlatNode> {
    fn visit(node: &Node, parent: Option<usize>, out: &mut Vec<FlatNode>) {
        let index = out.len();
        out.push(FlatNode {
            tag: node.tag.clone(),
            id: node.id.clone(),
            classes: node.classes.clone(),
            attributes: node.attributes.clone(),
            text: node.text.clone(),
            hidden: node.hidden,
            parent,
            subtree_end: index + 1,
        });
        for child in &node.children {
            visit(child, Some(index), out);
        }
        out[index].subtree_end = out.len();
    }

    let mut nodes = Vec::new();
    visit(root, None, &mut nodes);
    nodes
}

struct Loaded {
    url: String,
    page: Page,
    loaded_at: Instant,
    frame: usize,
    nodes: Vec<FlatNode>,
}

#[derive(Default)]
struct MemoryState {
    current: Option<Loaded>,
    generation: u64,
    closed: bool,
}

impl MemoryState {
    /// Swap in the frame due at the current time
    fn refresh(&mut self) {
        let Some(loaded) = self.current.as_mut() else {
            return;
        };
        let frame = loaded.page.frame_at(loaded.loaded_at.elapsed());
        if frame != loaded.frame {
            debug!("Rendering frame {} of {}", frame, loaded.url);
            loaded.frame = frame;
            loaded.nodes = flatten(&loaded.page.frames[frame].1);
            self.generation += 1;
        }
    }

    fn document(&mut self) -> Result<(u64, &Loaded)> {
        if self.closed {
            return Err(HarnessError::Driver("browser session is closed".to_string()));
        }
        self.refresh();
        let generation = self.generation;
        let loaded = self
            .current
            .as_ref()
            .ok_or_else(|| HarnessError::Driver("no document loaded".to_string()))?;
        Ok((generation, loaded))
    }

    fn node(&mut self, element: &MemoryElement) -> Result<(&Loaded, usize)> {
        let (generation, loaded) = self.document()?;
        let index = check_element(generation, loaded, element)?;
        Ok((loaded, index))
    }
}

fn check_element(generation: u64, loaded: &Loaded, element: &MemoryElement) -> Result<usize> {
    if element.generation != generation || element.index >= loaded.nodes.len() {
        return Err(HarnessError::StaleElement(format!(
            "element {} belongs to an earlier render",
            element.index
        )));
    }
    Ok(element.index)
}

impl Loaded {
    fn is_displayed(&self, index: usize) -> bool {
        let mut current = Some(index);
        while let Some(i) = current {
            if self.nodes[i].hidden {
                return false;
            }
            current = self.nodes[i].parent;
        }
        true
    }

    fn visible_text(&self, index: usize) -> String {
        if !self.is_displayed(index) {
            return String::new();
        }
        let mut parts = Vec::new();
        let mut i = index;
        let end = self.nodes[index].subtree_end;
        while i < end {
            let node = &self.nodes[i];
            if node.hidden {
                i = node.subtree_end;
                continue;
            }
            let text = node.text.trim();
            if !text.is_empty() {
                parts.push(text);
            }
            i += 1;
        }
        parts.join("\n")
    }

    fn matches(&self, index: usize, selector: &Selector) -> bool {
        let Some((last, ancestors)) = selector.steps().split_last() else {
            return false;
        };
        if !self.nodes[index].matches(last) {
            return false;
        }

        // Descendant-only chains can be matched greedily, nearest ancestor first
        let mut ancestor = self.nodes[index].parent;
        for step in ancestors.iter().rev() {
            loop {
                let Some(a) = ancestor else {
                    return false;
                };
                ancestor = self.nodes[a].parent;
                if self.nodes[a].matches(step) {
                    break;
                }
            }
        }
        true
    }
}

/// Driver serving scripted pages from memory
#[derive(Clone)]
pub struct MemoryDriver {
    pages: Arc<HashMap<String, Page>>,
    state: Arc<Mutex<MemoryState>>,
    closes: Arc<AtomicUsize>,
}

impl std::fmt::Debug for MemoryDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDriver")
            .field("pages", &self.pages.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl MemoryDriver {
    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Driver for MemoryDriver {
    type Element = MemoryElement;

    async fn navigate(&self, url: &str) -> Result<()> {
        let page = self.pages.get(url).cloned().unwrap_or_else(|| {
            debug!("No scripted page for {}, serving 404", url);
            not_found_page()
        });

        let mut state = self.lock();
        if state.closed {
            return Err(HarnessError::Driver("browser session is closed".to_string()));
        }
        state.generation += 1;
        state.current = Some(Loaded {
            url: url.to_string(),
            nodes: flatten(&page.frames[0].1),
            page,
            loaded_at: Instant::now(),
            frame: 0,
        });
        state.refresh();
        Ok(())
    }

    async fn query(&self, selector: &Selector, scope: Option<&MemoryElement>) -> Result<Vec<MemoryElement>> {
        let mut state = self.lock();
        let (generation, loaded) = state.document()?;
        let range = match scope {
            Some(element) => {
                let index = check_element(generation, loaded, element)?;
                index + 1..loaded.nodes[index].subtree_end
            }
            None => 0..loaded.nodes.len(),
        };

        Ok(range
            .filter(|&index| loaded.matches(index, selector))
            .map(|index| MemoryElement { generation, index })
            .collect())
    }

    async fn text(&self, element: &MemoryElement) -> Result<String> {
        let mut state = self.lock();
        let (loaded, index) = state.node(element)?;
        Ok(loaded.visible_text(index))
    }

    async fn attribute(&self, element: &MemoryElement, name: &str) -> Result<Option<String>> {
        let mut state = self.lock();
        let (loaded, index) = state.node(element)?;
        Ok(loaded.nodes[index].attribute(&name.to_ascii_lowercase()))
    }

    async fn is_displayed(&self, element: &MemoryElement) -> Result<bool> {
        let mut state = self.lock();
        let (loaded, index) = state.node(element)?;
        Ok(loaded.is_displayed(index))
    }

    async fn tag_name(&self, element: &MemoryElement) -> Result<String> {
        let mut state = self.lock();
        let (loaded, index) = state.node(element)?;
        Ok(loaded.nodes[index].tag.clone())
    }

    async fn current_url(&self) -> Result<String> {
        let state = self.lock();
        Ok(state
            .current
            .as_ref()
            .map(|loaded| loaded.url.clone())
            .unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        state.closed = true;
        state.current = None;
        Ok(())
    }
}

/// Hands out [`MemoryDriver`]s that serve the same scripted site
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    pages: Arc<HashMap<String, Page>>,
    start_error: Option<String>,
    started: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, page: Page) -> Self {
        Arc::make_mut(&mut self.pages).insert(url.to_string(), page);
        self
    }

    /// Make every `connect` fail as if the browser could not start
    pub fn failing(mut self, reason: &str) -> Self {
        self.start_error = Some(reason.to_string());
        self
    }

    /// Number of sessions successfully started
    pub fn started_sessions(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Number of driver-level close calls across all sessions
    pub fn close_calls(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl Connector for MemoryConnector {
    type Driver = MemoryDriver;

    async fn connect(&self, _config: &SessionConfig) -> Result<MemoryDriver> {
        if let Some(reason) = &self.start_error {
            return Err(HarnessError::SessionStart(reason.clone()));
        }
        self.started.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryDriver {
            pages: Arc::clone(&self.pages),
            state: Arc::new(Mutex::new(MemoryState::default())),
            closes: Arc::clone(&self.closes),
        })
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod memory_test;
