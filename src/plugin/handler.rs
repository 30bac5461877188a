//! Handler contract and priority classes.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;

use super::matcher::{Captures, Matchers};
use crate::stream::{ChunkSource, StreamError};

/// Names reserved for the generic fallback handlers, in the order they are
/// inserted at the end of a batch load (`http` is the last resort).
pub const FALLBACK_ORDER: [&str; 3] = ["hls", "dash", "http"];

/// Priority class of a handler, derived from its registry name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    /// Site-specific handler.
    Normal,
    /// One of `hls`, `dash`, `http`: broad patterns, resolved last.
    GenericFallback,
}

impl Priority {
    pub fn of(name: &str) -> Self {
        if FALLBACK_ORDER.contains(&name) {
            Self::GenericFallback
        } else {
            Self::Normal
        }
    }

    pub fn is_fallback(self) -> bool {
        self == Self::GenericFallback
    }
}

/// Everything a handler receives when asked to open a URL.
#[derive(Debug, Clone)]
pub struct OpenContext {
    /// Shared HTTP client.
    pub client: reqwest::Client,
    /// Label of the matcher that accepted the URL.
    pub matcher: Option<String>,
    /// Named groups captured from the URL.
    pub captures: Captures,
    /// Default request headers configured for the session.
    pub headers: BTreeMap<String, String>,
}

impl OpenContext {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            matcher: None,
            captures: Captures::new(),
            headers: BTreeMap::new(),
        }
    }

    pub fn capture(&self, group: &str) -> Option<&str> {
        self.captures.get(group).map(String::as_str)
    }
}

/// A stream handler: recognizes URLs and opens a chunk source for them.
///
/// The handler's name is its registry key. Closing is done by releasing
/// the returned [`ChunkSource`] (or the stream handle wrapping it).
#[async_trait]
pub trait Handler: Send + Sync {
    /// URL patterns, tried in declaration order.
    fn matchers(&self) -> &Matchers;

    /// Establish the underlying source for `url`.
    async fn open(&self, url: &str, ctx: &OpenContext) -> Result<ChunkSource, StreamError>;
}

impl fmt::Debug for dyn Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("matchers", &self.matchers().len())
            .finish_non_exhaustive()
    }
}
