//! Breadth-first, same-site link discovery.

use std::collections::HashSet;
use std::time::Duration;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::{Origin, Url};

use crate::extractor::extract_links;
use crate::fetcher::PageFetcher;

/// URLs known to one crawl.
#[derive(Debug)]
pub struct Frontier {
    origin: Origin,
    visited: Vec<String>,
    seen: HashSet<String>,
    pending: Vec<String>,
}

impl Frontier {
    /// Starts a frontier holding only the seed.
    pub fn new(seed: &Url) -> Self {
        let mut seed = seed.clone();
        seed.set_fragment(None);
        let origin = seed.origin();
        let seed = seed.to_string();
        Self {
            origin,
            visited: Vec::new(),
            seen: HashSet::from([seed.clone()]),
            pending: vec![seed],
        }
    }

    /// Returns whether `url` is on the seed's site (same scheme, host and port).
    pub fn in_domain(&self, url: &Url) -> bool {
        url.origin() == self.origin
    }

    /// Queues a discovered link for the next level if it is new and on-site.
    pub fn offer(&mut self, url: Url) -> bool {
        if !self.in_domain(&url) {
            return false;
        }
        let url = url.to_string();
        if self.seen.contains(&url) {
            return false;
        }
        self.seen.insert(url.clone());
        self.pending.push(url);
        true
    }

    /// Moves up to `limit` pending URLs into the visited set and returns them.
    ///
    /// Pending URLs beyond the limit are dropped along with the rest of the level.
    fn next_level(&mut self, limit: usize) -> Vec<String> {
        let mut level = std::mem::take(&mut self.pending);
        level.truncate(limit);
        self.visited.extend(level.iter().cloned());
        level
    }

    pub fn visited(&self) -> &[String] {
        &self.visited
    }

    pub fn pending(&self) -> &[String] {
        &self.pending
    }

    fn into_visited(self) -> Vec<String> {
        self.visited
    }
}

/// Discovers pages of a site level by level.
#[derive(Debug, Clone)]
pub struct Crawler {
    level_pause: Duration,
}

impl Crawler {
    /// Creates a crawler pausing `level_pause` between levels.
    pub fn new(level_pause: Duration) -> Self {
        Self { level_pause }
    }

    /// Crawls from `seed` and returns the visited URLs in discovery order.
    ///
    /// Each level is fetched as one concurrent batch; links found on level
    /// `L` are only fetched once all of level `L` is done. The crawl stops
    /// when no new links remain, after `max_depth` levels, once `max_pages`
    /// URLs have been visited, or when `cancel` fires. The result never holds
    /// more than `max_pages` URLs.
    pub async fn crawl(
        &self,
        fetcher: &dyn PageFetcher,
        seed: &Url,
        max_depth: usize,
        max_pages: usize,
        cancel: &CancellationToken,
    ) -> Vec<String> {
        let mut frontier = Frontier::new(seed);

        for depth in 0..max_depth {
            if cancel.is_cancelled() {
                info!("Crawl of {} cancelled at depth {}", seed, depth);
                break;
            }

            let remaining = max_pages.saturating_sub(frontier.visited().len());
            let level = frontier.next_level(remaining);
            if level.is_empty() {
                break;
            }
            debug!("Crawling depth {} ({} URLs)", depth, level.len());

            let pages = join_all(level.iter().map(|url| fetcher.fetch(url))).await;

            for page in pages.iter().filter(|page| page.is_success()) {
                let Ok(base) = Url::parse(&page.final_url) else {
                    continue;
                };
                if !frontier.in_domain(&base) {
                    debug!("Ignoring links of {}: served from {}", page.url, base);
                    continue;
                }
                for link in extract_links(&page.text(), &base) {
                    frontier.offer(link);
                }
            }

            if frontier.visited().len() >= max_pages {
                debug!("Reached page limit of {}", max_pages);
                break;
            }

            if depth + 1 < max_depth
                && !frontier.pending().is_empty()
                && !self.level_pause.is_zero()
            {
                tokio::time::sleep(self.level_pause).await;
            }
        }

        info!("Crawl of {} visited {} URLs", seed, frontier.visited().len());
        frontier.into_visited()
    }
}

impl Default for Crawler {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}
