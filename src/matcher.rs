//! Case-insensitive term matching with bounded context snippets.

use regex::{Regex, RegexBuilder};

use crate::extractor::clean_text;
use crate::{Result, SearchError};

/// Snippets found for a term in one text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextMatches {
    /// Distinct context windows, at most `max_snippets`, in text order.
    pub contexts: Vec<String>,
    /// Every occurrence of the term, including those past the snippet cap.
    pub occurrences: usize,
}

impl ContextMatches {
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

/// Finds a literal term in text and captures surrounding context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextMatcher {
    radius: usize,
    max_snippets: usize,
}

impl ContextMatcher {
    /// Creates a matcher capturing `radius` characters on each side and
    /// keeping at most `max_snippets` snippets.
    pub fn new(radius: usize, max_snippets: usize) -> Self {
        Self {
            radius,
            max_snippets,
        }
    }

    /// Builds the case-insensitive pattern for `term`. Metacharacters are escaped.
    pub fn compile(term: &str) -> Result<Regex> {
        RegexBuilder::new(&regex::escape(term.trim()))
            .case_insensitive(true)
            .build()
            .map_err(|e| SearchError::Parse(format!("Invalid search pattern: {}", e)))
    }

    /// Returns the context snippets for `term` in `text`.
    ///
    /// An empty result means the term does not occur.
    pub fn find(&self, text: &str, term: &str) -> Vec<String> {
        match Self::compile(term) {
            Ok(pattern) => self.scan(text, &pattern).contexts,
            Err(_) => Vec::new(),
        }
    }

    /// Scans `text` with a pattern built by [`ContextMatcher::compile`].
    pub fn scan(&self, text: &str, pattern: &Regex) -> ContextMatches {
        let mut matches = ContextMatches::default();
        if pattern.as_str().is_empty() {
            return matches;
        }

        for found in pattern.find_iter(text) {
            matches.occurrences += 1;
            if matches.contexts.len() >= self.max_snippets {
                continue;
            }

            let start = back_chars(text, found.start(), self.radius);
            let end = forward_chars(text, found.end(), self.radius);
            let context = clean_text(&text[start..end]);
            if !matches.contexts.contains(&context) {
                matches.contexts.push(context);
            }
        }
        matches
    }
}

impl Default for ContextMatcher {
    fn default() -> Self {
        Self::new(50, 3)
    }
}

/// Byte offset `count` characters before `from`, or 0.
fn back_chars(text: &str, from: usize, count: usize) -> usize {
    if count == 0 {
        return from;
    }
    text[..from]
        .char_indices()
        .rev()
        .nth(count - 1)
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Byte offset `count` characters after `from`, or the end of the text.
fn forward_chars(text: &str, from: usize, count: usize) -> usize {
    text[from..]
        .char_indices()
        .nth(count)
        .map(|(i, _)| from + i)
        .unwrap_or(text.len())
}
