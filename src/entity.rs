//! Core value types shared across the crawler and scanner.

use std::sync::Arc;
use url::Url;

/// A node in the crawl's site map.
///
/// Identity is the parsed [`Url`] alone: two nodes built from the same URL are
/// equal and hash equal regardless of depth, parent, title or status. This
/// keeps dedup on `visited`/`found` cheap and lets a node's mutable metadata
/// (status, title, content length/type) be filled in after construction
/// without disturbing set membership.
#[derive(Debug, Clone)]
pub struct UrlNode {
    pub raw: String,
    pub url: Url,
    pub depth: u32,
    /// Non-owning: a child keeps a handle to its parent for site-map
    /// rendering, never the other way around, so there is no reference cycle.
    pub parent: Option<Arc<UrlNode>>,
    pub response_status: String,
    pub title: String,
    pub content_length: i64,
    pub content_type: String,
}

/// Error returned when a child node's depth does not exceed its parent's.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("UrlNode: depth({depth}) must be greater than that of parent({parent_depth})")]
pub struct DepthInvariantError {
    pub depth: u32,
    pub parent_depth: u32,
}

impl UrlNode {
    /// Build a seed node: depth 0, no parent.
    pub fn seed(raw: impl Into<String>, url: Url) -> Self {
        UrlNode {
            raw: raw.into(),
            url,
            depth: 0,
            parent: None,
            response_status: "Unknown".to_string(),
            title: String::new(),
            content_length: -1,
            content_type: String::new(),
        }
    }

    /// Build a child node. Fails if `depth` does not exceed `parent.depth`.
    pub fn child(
        raw: impl Into<String>,
        url: Url,
        depth: u32,
        parent: Arc<UrlNode>,
    ) -> Result<Self, DepthInvariantError> {
        if depth <= parent.depth {
            return Err(DepthInvariantError {
                depth,
                parent_depth: parent.depth,
            });
        }
        Ok(UrlNode {
            raw: raw.into(),
            url,
            depth,
            parent: Some(parent),
            response_status: "Unknown".to_string(),
            title: String::new(),
            content_length: -1,
            content_type: String::new(),
        })
    }
}

impl PartialEq for UrlNode {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl Eq for UrlNode {}

impl std::hash::Hash for UrlNode {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.url.hash(state);
    }
}

impl std::fmt::Display for UrlNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// A single matched secret: the rule name that matched and the matched text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Secret {
    pub rule_name: String,
    pub data: String,
}

impl Secret {
    pub fn new(rule_name: impl Into<String>, data: impl Into<String>) -> Self {
        Secret {
            rule_name: rule_name.into(),
            data: data.into(),
        }
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.rule_name, self.data)
    }
}

/// A named secret-matching rule as read from configuration.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct Rule {
    pub name: String,
    pub regex: String,
    #[serde(default)]
    pub loaded: bool,
}

/// Half-open `[start, end)` integer interval, used for HTTP status filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: i64,
    pub end: i64,
}

impl Range {
    pub fn new(start: i64, end: i64) -> Self {
        Range { start, end }
    }

    pub fn contains(&self, value: i64) -> bool {
        value >= self.start && value < self.end
    }
}
