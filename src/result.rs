//! Search result types.

use serde::{Deserialize, Serialize};

/// A page that contains the search term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMatch {
    /// Page URL.
    pub url: String,
    /// Page title, or the URL when the page has none.
    pub title: String,
    /// First context snippet around the term.
    pub first_context: String,
    /// Number of times the term occurs in the page text.
    pub match_count: usize,
}

impl PageMatch {
    /// Creates a new page match.
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        first_context: impl Into<String>,
        match_count: usize,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            first_context: first_context.into(),
            match_count,
        }
    }
}

/// Results payload of one submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchOutcome {
    /// Ranked, deduplicated matches.
    pub results: Vec<PageMatch>,
    /// Whether the results came from the result cache.
    pub from_cache: bool,
    /// Time spent serving the submission, in milliseconds.
    pub duration_ms: u64,
}

impl SearchOutcome {
    /// Creates an outcome.
    pub fn new(results: Vec<PageMatch>, from_cache: bool) -> Self {
        Self {
            results,
            from_cache,
            duration_ms: 0,
        }
    }

    /// Returns the results.
    pub fn items(&self) -> &[PageMatch] {
        &self.results
    }

    /// Sets the duration.
    pub fn set_duration(&mut self, duration_ms: u64) {
        self.duration_ms = duration_ms;
    }
}
