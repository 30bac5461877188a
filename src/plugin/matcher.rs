//! URL matchers owned by a handler.
//!
//! A [`Matchers`] set is an ordered list of compiled patterns. Patterns are
//! tried in declaration order and the first one that matches wins. Matching
//! is anchored at the start of the URL but not at the end, so a pattern
//! like `https://site\.example/` accepts any URL with that prefix.

use std::collections::BTreeMap;

use regex::Regex;

/// Named capture groups extracted from a matched URL.
pub type Captures = BTreeMap<String, String>;

/// A single compiled URL pattern with an optional label.
#[derive(Debug, Clone)]
pub struct Matcher {
    pattern: Regex,
    name: Option<String>,
}

impl Matcher {
    /// Compile a matcher from a regex pattern.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            name: None,
        })
    }

    /// Attach a label, reported back in [`MatchResult::matcher`].
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Match `url` from its first character and collect named groups.
    pub fn captures(&self, url: &str) -> Option<Captures> {
        // Leftmost-first search: a match starting at 0 is found whenever one exists.
        let caps = self.pattern.captures(url)?;
        if caps.get(0)?.start() != 0 {
            return None;
        }

        Some(
            self.pattern
                .capture_names()
                .flatten()
                .filter_map(|group| {
                    caps.name(group)
                        .map(|m| (group.to_string(), m.as_str().to_string()))
                })
                .collect(),
        )
    }

    pub fn is_match(&self, url: &str) -> bool {
        self.captures(url).is_some()
    }
}

/// Outcome of matching a URL against a [`Matchers`] set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchResult {
    /// Position of the matcher that accepted the URL.
    pub index: usize,
    /// Label of that matcher, if it has one.
    pub matcher: Option<String>,
    /// Named groups captured from the URL.
    pub captures: Captures,
}

/// Ordered set of URL matchers.
#[derive(Debug, Clone, Default)]
pub struct Matchers {
    matchers: Vec<Matcher>,
}

impl Matchers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile every pattern, in order. Fails on the first invalid one.
    pub fn from_patterns<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let matchers = patterns
            .into_iter()
            .map(|p| Matcher::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { matchers })
    }

    pub fn push(&mut self, matcher: Matcher) {
        self.matchers.push(matcher);
    }

    #[must_use]
    pub fn with(mut self, matcher: Matcher) -> Self {
        self.push(matcher);
        self
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Matcher> {
        self.matchers.iter()
    }

    /// First matcher (in declaration order) that accepts `url`.
    pub fn find(&self, url: &str) -> Option<MatchResult> {
        self.matchers.iter().enumerate().find_map(|(index, m)| {
            m.captures(url).map(|captures| MatchResult {
                index,
                matcher: m.name.clone(),
                captures,
            })
        })
    }

    pub fn is_match(&self, url: &str) -> bool {
        self.matchers.iter().any(|m| m.is_match(url))
    }
}

impl<'a> IntoIterator for &'a Matchers {
    type Item = &'a Matcher;
    type IntoIter = std::slice::Iter<'a, Matcher>;

    fn into_iter(self) -> Self::IntoIter {
        self.matchers.iter()
    }
}
