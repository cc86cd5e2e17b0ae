//! Per-run fetch wrapper: admission gate plus page memo.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OnceCell, Semaphore, SemaphorePermit};
use tracing::{debug, error};

use crate::fetcher::{FetchResult, FetchStatus, PageFetcher};

/// Counting gate bounding the number of fetches in flight.
#[derive(Debug)]
pub struct AdmissionGate {
    semaphore: Semaphore,
    limit: usize,
}

impl AdmissionGate {
    /// Creates a gate admitting at most `limit` holders at once (minimum 1).
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Semaphore::new(limit),
            limit,
        }
    }

    /// Waits for a free slot. `None` only if the gate was closed.
    pub async fn acquire(&self) -> Option<SemaphorePermit<'_>> {
        self.semaphore.acquire().await.ok()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of slots currently taken.
    pub fn in_flight(&self) -> usize {
        self.limit - self.semaphore.available_permits()
    }
}

/// Wraps a fetcher for the lifetime of one run.
///
/// Every underlying fetch passes through the run's [`AdmissionGate`], and
/// the crawl phase's pages are held by URL until the search phase reads them
/// back. Fetches of a URL that is already downloading wait for that download
/// instead of starting another. An entry is released as soon as it has been
/// served a second time, so the memo holds at most one body per visited URL
/// (`max_pages * max_body_bytes`) and drains as the search phase progresses.
pub struct RunFetcher {
    inner: Arc<dyn PageFetcher>,
    gate: AdmissionGate,
    pages: Mutex<HashMap<String, Arc<OnceCell<FetchResult>>>>,
    downloads: AtomicUsize,
}

impl RunFetcher {
    pub fn new(inner: Arc<dyn PageFetcher>, max_concurrency: usize) -> Self {
        Self {
            inner,
            gate: AdmissionGate::new(max_concurrency),
            pages: Mutex::new(HashMap::new()),
            downloads: AtomicUsize::new(0),
        }
    }

    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    /// Number of fetches passed to the wrapped fetcher so far.
    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    /// Number of pages currently held for reuse.
    pub async fn held(&self) -> usize {
        self.pages.lock().await.len()
    }

    async fn download(&self, url: &str) -> FetchResult {
        let Some(_permit) = self.gate.acquire().await else {
            error!("Admission gate closed while fetching {}", url);
            return FetchResult::failed(url, FetchStatus::NetworkError);
        };
        self.downloads.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch(url).await
    }
}

#[async_trait]
impl PageFetcher for RunFetcher {
    async fn fetch(&self, url: &str) -> FetchResult {
        let (cell, reused) = {
            let mut pages = self.pages.lock().await;
            match pages.get(url) {
                Some(cell) => (Arc::clone(cell), true),
                None => {
                    let cell = Arc::new(OnceCell::new());
                    pages.insert(url.to_string(), Arc::clone(&cell));
                    (cell, false)
                }
            }
        };

        let result = cell.get_or_init(|| self.download(url)).await.clone();

        if reused {
            debug!("Reused fetched page {}", url);
            let mut pages = self.pages.lock().await;
            if pages.get(url).is_some_and(|held| Arc::ptr_eq(held, &cell)) {
                pages.remove(url);
            }
        }
        result
    }
}
