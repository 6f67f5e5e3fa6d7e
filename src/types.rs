use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest visible-text excerpt kept in a diagnostic snapshot
pub const SNAPSHOT_TEXT_LIMIT: usize = 2000;

/// Output format for CLI results
#[derive(Clone, Copy, Debug, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON format for programmatic consumption
    Json,
    /// Human-readable simple format
    Simple,
}

/// Browser window dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSize {
    /// Window width in pixels
    pub width: u32,
    /// Window height in pixels
    pub height: u32,
}

impl Default for WindowSize {
    fn default() -> Self {
        WindowSize {
            width: 1920,
            height: 1080,
        }
    }
}

impl WindowSize {
    /// Parse window size from "WIDTHxHEIGHT" format (e.g., "1920x1080")
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('x').collect();
        if parts.len() != 2 {
            anyhow::bail!("Invalid window size format. Use WIDTHxHEIGHT (e.g., 1920x1080)");
        }

        let width = parts[0]
            .parse::<u32>()
            .map_err(|_| anyhow::anyhow!("Invalid width in window size"))?;
        let height = parts[1]
            .parse::<u32>()
            .map_err(|_| anyhow::anyhow!("Invalid height in window size"))?;

        Ok(WindowSize { width, height })
    }
}

/// Page state captured at the moment a scenario step failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticSnapshot {
    /// When the snapshot was taken
    pub captured_at: DateTime<Utc>,
    /// URL the session was on, if it could be read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Visible text of the document body, truncated
    pub visible_text: String,
    /// Selector involved in the failing step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    /// True when the failure was a selector matching zero elements
    pub zero_matches: bool,
    /// Extra context (last poll observation, capture problems)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl DiagnosticSnapshot {
    pub fn new(visible_text: &str) -> Self {
        DiagnosticSnapshot {
            captured_at: Utc::now(),
            url: None,
            visible_text: truncate_text(visible_text, SNAPSHOT_TEXT_LIMIT),
            selector: None,
            zero_matches: false,
            note: None,
        }
    }

    pub fn with_url(mut self, url: Option<String>) -> Self {
        self.url = url;
        self
    }

    pub fn with_selector(mut self, selector: impl ToString, zero_matches: bool) -> Self {
        self.selector = Some(selector.to_string());
        self.zero_matches = zero_matches;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Truncate on a char boundary, marking the cut with "..."
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars).collect();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;
