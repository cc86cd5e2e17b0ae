//! Chunked, concurrent term search over crawled pages.

use futures::future::join_all;
use regex::Regex;
use tracing::{debug, info};
use url::Url;

use crate::extractor::extract;
use crate::fetcher::PageFetcher;
use crate::matcher::ContextMatcher;
use crate::progress::ProgressTracker;
use crate::ranking::rank;
use crate::{PageMatch, Result, SearchError};

/// Searches a list of pages for a term, reporting progress per chunk.
#[derive(Debug, Clone)]
pub struct PageSearcher {
    matcher: ContextMatcher,
    chunk_size: usize,
}

impl PageSearcher {
    /// Creates a searcher processing `chunk_size` pages at a time.
    pub fn new(matcher: ContextMatcher, chunk_size: usize) -> Self {
        Self {
            matcher,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Searches `urls` for `term` and returns ranked, deduplicated matches.
    ///
    /// Pages are processed in chunks; every page of a chunk is fetched and
    /// scanned concurrently, and the tracker is updated once the chunk is
    /// done. Pages that fail to load or do not contain the term are skipped.
    /// Returns [`SearchError::Cancelled`] if the run is cancelled between chunks.
    pub async fn search(
        &self,
        fetcher: &dyn PageFetcher,
        urls: &[String],
        term: &str,
        tracker: &ProgressTracker,
    ) -> Result<Vec<PageMatch>> {
        let pattern = ContextMatcher::compile(term)?;
        let mut matches = Vec::new();

        for (index, chunk) in urls.chunks(self.chunk_size).enumerate() {
            if tracker.is_cancelled() {
                info!("Search for '{}' cancelled after {} chunks", term, index);
                return Err(SearchError::Cancelled);
            }

            let found = join_all(
                chunk
                    .iter()
                    .map(|url| self.search_page(fetcher, url, &pattern)),
            )
            .await;
            matches.extend(found.into_iter().flatten());

            debug!(
                "Chunk {} done: {} URLs, {} matches so far",
                index,
                chunk.len(),
                matches.len()
            );
            tracker.record_chunk(chunk.len(), matches.len());
        }

        let ranked = rank(matches);
        info!("Found '{}' on {} of {} pages", term, ranked.len(), urls.len());
        Ok(ranked)
    }

    async fn search_page(
        &self,
        fetcher: &dyn PageFetcher,
        url: &str,
        pattern: &Regex,
    ) -> Option<PageMatch> {
        let page = fetcher.fetch(url).await;
        if !page.is_success() {
            debug!("Skipping {}: {:?}", url, page.status);
            return None;
        }
        if !same_origin(url, &page.final_url) {
            debug!("Skipping {}: served from {}", url, page.final_url);
            return None;
        }

        let extracted = extract(&page.text(), url);
        let found = self.matcher.scan(&extracted.text(), pattern);
        let first_context = found.contexts.into_iter().next()?;
        Some(PageMatch::new(
            url,
            extracted.title,
            first_context,
            found.occurrences,
        ))
    }
}

fn same_origin(a: &str, b: &str) -> bool {
    match (Url::parse(a), Url::parse(b)) {
        (Ok(a), Ok(b)) => a.origin() == b.origin(),
        _ => false,
    }
}

impl Default for PageSearcher {
    fn default() -> Self {
        Self::new(ContextMatcher::default(), 10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use async_trait::async_trait;

    use crate::fetcher::{FetchResult, FetchStatus};
    use crate::progress::RunStatus;

    struct StaticPages(HashMap<String, String>);

    impl StaticPages {
        fn new(pages: &[(&str, &str)]) -> Self {
            Self(
                pages
                    .iter()
                    .map(|(u, b)| (u.to_string(), b.to_string()))
                    .collect(),
            )
        }
    }

    #[async_trait]
    impl PageFetcher for StaticPages {
        async fn fetch(&self, url: &str) -> FetchResult {
            match self.0.get(url) {
                Some(body) => FetchResult::ok(url, body.as_bytes()),
                None => FetchResult::failed(url, FetchStatus::Timeout),
            }
        }
    }

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|u| u.to_string()).collect()
    }

    fn searching(total: usize) -> ProgressTracker {
        let tracker = ProgressTracker::new();
        tracker.begin_search(total).unwrap();
        tracker
    }

    #[tokio::test]
    async fn test_search_single_page() {
        let pages = StaticPages::new(&[(
            "https://a.test/",
            "<html><head><title>Home</title></head><body><p>Find the needle here.</p></body></html>",
        )]);
        let tracker = searching(1);
        let results = PageSearcher::default()
            .search(&pages, &urls(&["https://a.test/"]), "needle", &tracker)
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Home");
        assert_eq!(results[0].match_count, 1);
        assert!(results[0].first_context.contains("needle"));
    }

    #[tokio::test]
    async fn test_search_ranks_by_count() {
        let pages = StaticPages::new(&[
            ("https://a.test/one", "<p>rust</p>"),
            ("https://a.test/three", "<p>rust rust rust</p>"),
            ("https://a.test/two", "<p>Rust and RUST</p>"),
            ("https://a.test/none", "<p>nothing</p>"),
        ]);
        let list = urls(&[
            "https://a.test/one",
            "https://a.test/three",
            "https://a.test/two",
            "https://a.test/none",
        ]);
        let tracker = searching(list.len());
        let results = PageSearcher::default()
            .search(&pages, &list, "rust", &tracker)
            .await
            .unwrap();

        let counts: Vec<usize> = results.iter().map(|r| r.match_count).collect();
        assert_eq!(counts, vec![3, 2, 1]);
        assert_eq!(results[0].url, "https://a.test/three");
    }

    #[tokio::test]
    async fn test_search_skips_failed_pages() {
        let pages = StaticPages::new(&[("https://a.test/ok", "<p>needle</p>")]);
        let list = urls(&["https://a.test/missing", "https://a.test/ok"]);
        let tracker = searching(2);
        let results = PageSearcher::default()
            .search(&pages, &list, "needle", &tracker)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(tracker.snapshot().processed_urls, 2);
    }

    #[tokio::test]
    async fn test_search_skips_page_served_by_other_site() {
        struct Hijacked;

        #[async_trait]
        impl PageFetcher for Hijacked {
            async fn fetch(&self, url: &str) -> FetchResult {
                FetchResult::ok(url, "<p>offsite needle</p>").served_from("https://other.test/")
            }
        }

        let tracker = searching(1);
        let results = PageSearcher::default()
            .search(&Hijacked, &urls(&["https://a.test/go"]), "needle", &tracker)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_search_ignores_excluded_content() {
        let pages = StaticPages::new(&[(
            "https://a.test/",
            "<nav><p>needle</p></nav><script>needle()</script><p>plain</p>",
        )]);
        let tracker = searching(1);
        let results = PageSearcher::default()
            .search(&pages, &urls(&["https://a.test/"]), "needle", &tracker)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_search_reports_progress_per_chunk() {
        let list: Vec<String> = (0..5).map(|i| format!("https://a.test/{}", i)).collect();
        let pages = StaticPages(
            list.iter()
                .map(|u| (u.clone(), "<p>needle</p>".to_string()))
                .collect(),
        );
        let tracker = searching(list.len());

        let searcher = PageSearcher::new(ContextMatcher::default(), 2);
        let results = searcher
            .search(&pages, &list, "needle", &tracker)
            .await
            .unwrap();

        assert_eq!(results.len(), 5);
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.processed_urls, 5);
        assert_eq!(snapshot.found_results, 5);
        assert_eq!(snapshot.current_status, RunStatus::Searching);
    }

    #[tokio::test]
    async fn test_search_cancelled() {
        let pages = StaticPages::new(&[("https://a.test/", "<p>needle</p>")]);
        let tracker = searching(1);
        tracker.cancel();
        let result = PageSearcher::default()
            .search(&pages, &urls(&["https://a.test/"]), "needle", &tracker)
            .await;
        assert!(matches!(result, Err(SearchError::Cancelled)));
        assert_eq!(tracker.snapshot().processed_urls, 0);
    }

    #[tokio::test]
    async fn test_search_empty_url_list() {
        let pages = StaticPages::new(&[]);
        let tracker = searching(0);
        let results = PageSearcher::default()
            .search(&pages, &[], "needle", &tracker)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_chunk_size_minimum() {
        assert_eq!(PageSearcher::new(ContextMatcher::default(), 0).chunk_size(), 1);
    }
}
