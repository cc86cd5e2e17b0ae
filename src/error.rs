//! Error types for the crawl-and-search engine.

use thiserror::Error;

use crate::progress::RunStatus;

/// Result type alias for search operations.
pub type Result<T> = std::result::Result<T, SearchError>;

/// Message shown to callers for failures that must not leak internal detail.
pub const GENERIC_FAILURE_MESSAGE: &str = "An unexpected error occurred while searching";

/// Message shown to callers that submit again within the cooldown window.
pub const RATE_LIMIT_MESSAGE: &str = "Too many requests. Please wait a moment and try again.";

/// Errors that can occur during search operations.
///
/// Per-page fetch and extraction failures never show up here; they are
/// reported through [`crate::FetchStatus`] and simply drop the page from
/// the results.
#[derive(Error, Debug)]
pub enum SearchError {
    /// HTTP client could not be built or used.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Failed to parse markup, a selector, or a search pattern.
    #[error("Failed to parse: {0}")]
    Parse(String),

    /// Caller input was rejected before any network activity.
    #[error("{0}")]
    Validation(String),

    /// The same caller submitted again within the cooldown window.
    #[error("Too many requests")]
    RateLimited,

    /// No run with the given ID is registered (never created or purged).
    #[error("Search run not found")]
    RunNotFound,

    /// A run status change that would move backward or leave a terminal state.
    #[error("Invalid run status transition from {from:?} to {to:?}")]
    InvalidTransition { from: RunStatus, to: RunStatus },

    /// The run was cancelled before it finished.
    #[error("Search run was cancelled")]
    Cancelled,

    /// URL parsing error.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Configuration could not be loaded.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl SearchError {
    /// Returns whether the error was caused by the caller rather than the engine.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            SearchError::Validation(_) | SearchError::RateLimited | SearchError::RunNotFound
        )
    }

    /// Returns the text that may be shown to an external caller.
    ///
    /// Validation messages pass through verbatim; everything that is not a
    /// caller error collapses into [`GENERIC_FAILURE_MESSAGE`].
    pub fn user_message(&self) -> String {
        match self {
            SearchError::Validation(message) => message.clone(),
            SearchError::RateLimited => RATE_LIMIT_MESSAGE.to_string(),
            SearchError::RunNotFound => "Search run not found".to_string(),
            SearchError::Cancelled => "Search was cancelled".to_string(),
            _ => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }
}
