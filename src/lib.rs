//! # sitescan
//!
//! On-demand site search: crawl a website breadth-first from a seed URL,
//! staying on the seed's site, and find the pages that mention a term.
//!
//! This library provides:
//!
//! - Bounded, concurrent crawling with per-level batches and a page memo
//! - Fetching with timeouts, linear-backoff retries and body size caps
//! - Visible-text extraction and case-insensitive context snippets
//! - Ranked, deduplicated results cached per (seed URL, term)
//! - Per-run progress that can be polled, streamed or cancelled
//!
//! ## Example
//!
//! ```rust,no_run
//! use sitescan::{SearchConfig, SearchForm, SiteSearch};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let search = SiteSearch::new(SearchConfig::default())?;
//!
//!     let form = SearchForm::new("https://www.rust-lang.org/", "async", 2, 20);
//!     let outcome = search.search(&form).await?;
//!
//!     for page in outcome.items() {
//!         println!("{} ({}): {}", page.title, page.match_count, page.url);
//!     }
//!     Ok(())
//! }
//! ```

mod cache;
mod config;
mod crawler;
mod error;
mod fetcher;
mod fetcher_http;
mod fetcher_run;
mod guard;
mod matcher;
mod orchestrator;
mod progress;
mod query;
mod ranking;
mod result;
mod search;

pub mod extractor;

pub use cache::ResultCache;
pub use config::{SearchConfig, DEFAULT_USER_AGENT};
pub use crawler::{Crawler, Frontier};
pub use error::{Result, SearchError, GENERIC_FAILURE_MESSAGE, RATE_LIMIT_MESSAGE};
pub use fetcher::{FetchResult, FetchStatus, PageFetcher, RetryPolicy};
pub use fetcher_http::HttpFetcher;
pub use fetcher_run::{AdmissionGate, RunFetcher};
pub use guard::RateLimiter;
pub use matcher::{ContextMatcher, ContextMatches};
pub use orchestrator::PageSearcher;
pub use progress::{
    ProgressSnapshot, ProgressState, ProgressTracker, RunId, RunRegistry, RunStatus,
};
pub use query::{SearchForm, SearchRequest};
pub use ranking::rank;
pub use result::{PageMatch, SearchOutcome};
pub use search::SiteSearch;
