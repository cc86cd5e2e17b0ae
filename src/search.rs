//! The crawl-and-search service.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use futures::Stream;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::crawler::Crawler;
use crate::fetcher::PageFetcher;
use crate::fetcher_http::HttpFetcher;
use crate::fetcher_run::RunFetcher;
use crate::matcher::ContextMatcher;
use crate::orchestrator::PageSearcher;
use crate::progress::{ProgressSnapshot, ProgressTracker, RunId, RunRegistry, RunStatus};
use crate::{
    RateLimiter, Result, ResultCache, SearchConfig, SearchError, SearchForm, SearchOutcome,
};

/// Crawls a site from a seed URL and searches the visited pages for a term.
///
/// One instance serves any number of concurrent runs. Results are cached per
/// (seed URL, term), progress of each run can be polled or streamed by its
/// [`RunId`], and submissions are rate limited per caller.
pub struct SiteSearch {
    config: SearchConfig,
    fetcher: Arc<dyn PageFetcher>,
    cache: Arc<ResultCache>,
    runs: Arc<RunRegistry>,
    limiter: Arc<RateLimiter>,
    crawler: Crawler,
    searcher: PageSearcher,
}

impl SiteSearch {
    /// Creates a service fetching pages over HTTP.
    pub fn new(config: SearchConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new(&config)?;
        Ok(Self::with_fetcher(config, Arc::new(fetcher)))
    }

    /// Creates a service using a custom page fetcher.
    pub fn with_fetcher(config: SearchConfig, fetcher: Arc<dyn PageFetcher>) -> Self {
        let matcher = ContextMatcher::new(config.context_radius, config.max_snippets);
        Self {
            fetcher,
            cache: Arc::new(ResultCache::new(config.cache_ttl())),
            runs: Arc::new(RunRegistry::new(config.run_ttl())),
            limiter: Arc::new(RateLimiter::new(config.rate_limit_cooldown())),
            crawler: Crawler::new(config.level_pause()),
            searcher: PageSearcher::new(matcher, config.chunk_size),
            config,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Registers a new run in the `waiting` state.
    pub async fn begin_run(&self) -> RunId {
        let (id, _) = self.runs.create().await;
        debug!("Registered run {}", id);
        id
    }

    /// Handles a submission from `caller` for a previously begun run.
    ///
    /// Rejects the submission with [`SearchError::RateLimited`] when the same
    /// caller submitted less than the configured cooldown ago.
    pub async fn submit(&self, caller: &str, form: &SearchForm, run: &RunId) -> Result<SearchOutcome> {
        if let Err(e) = self.limiter.check(caller).await {
            warn!("Rejected submission from {}: {}", caller, e);
            return Err(e);
        }
        self.run(form, run).await
    }

    /// Executes a run without the per-caller rate limit.
    ///
    /// Any error marks the run as failed. Pages that fail to load only drop
    /// out of the results.
    pub async fn run(&self, form: &SearchForm, run: &RunId) -> Result<SearchOutcome> {
        let start = Instant::now();
        let tracker = self.runs.get(run).await.ok_or(SearchError::RunNotFound)?;

        match self.execute(form, &tracker).await {
            Ok(mut outcome) => {
                outcome.set_duration(start.elapsed().as_millis() as u64);
                info!(
                    "Run {} finished with {} results in {}ms (cached: {})",
                    run,
                    outcome.results.len(),
                    outcome.duration_ms,
                    outcome.from_cache
                );
                Ok(outcome)
            }
            Err(e) => {
                tracker.fail();
                if e.is_user_error() {
                    warn!("Run {} rejected: {}", run, e);
                } else {
                    error!("Run {} failed: {}", run, e);
                }
                Err(e)
            }
        }
    }

    /// Begins a run and executes it immediately.
    pub async fn search(&self, form: &SearchForm) -> Result<SearchOutcome> {
        let run = self.begin_run().await;
        self.run(form, &run).await
    }

    async fn execute(&self, form: &SearchForm, tracker: &ProgressTracker) -> Result<SearchOutcome> {
        let request = form.validate(&self.config)?;
        let seed = request.seed.as_str();

        if let Some(cached) = self.cache.get(seed, &request.term).await {
            debug!("Cache hit for {} / '{}'", seed, request.term);
            tracker.finish_cached(cached.len())?;
            return Ok(SearchOutcome::new(cached.to_vec(), true));
        }

        tracker.advance(RunStatus::CollectingUrls)?;
        let fetcher = RunFetcher::new(Arc::clone(&self.fetcher), self.config.max_concurrency);
        let urls = self
            .crawler
            .crawl(
                &fetcher,
                &request.seed,
                request.max_depth,
                request.max_pages,
                tracker.cancellation_token(),
            )
            .await;
        if tracker.is_cancelled() {
            return Err(SearchError::Cancelled);
        }

        tracker.begin_search(urls.len())?;
        let results = self
            .searcher
            .search(&fetcher, &urls, &request.term, tracker)
            .await?;

        self.cache.put(seed, &request.term, results.clone()).await;
        tracker.complete(results.len())?;
        Ok(SearchOutcome::new(results, false))
    }

    /// Returns the current progress of a run.
    pub async fn progress(&self, run: &RunId) -> Result<ProgressSnapshot> {
        self.runs.snapshot(run).await.ok_or(SearchError::RunNotFound)
    }

    /// Streams progress of a run at the configured interval until it finishes.
    pub fn progress_feed(&self, run: RunId) -> impl Stream<Item = ProgressSnapshot> + Send + 'static {
        Arc::clone(&self.runs).feed(run, self.config.progress_interval())
    }

    /// Requests cancellation of a run. The run stops at its next level or chunk.
    pub async fn cancel(&self, run: &RunId) -> Result<()> {
        let tracker = self.runs.get(run).await.ok_or(SearchError::RunNotFound)?;
        info!("Cancelling run {}", run);
        tracker.cancel();
        Ok(())
    }

    /// Spawns a task that periodically drops expired cache entries, runs and
    /// rate-limit records. The task ends once this service is dropped.
    pub fn spawn_maintenance(&self) -> JoinHandle<()> {
        let cache: Weak<ResultCache> = Arc::downgrade(&self.cache);
        let runs: Weak<RunRegistry> = Arc::downgrade(&self.runs);
        let limiter: Weak<RateLimiter> = Arc::downgrade(&self.limiter);
        let every = self.config.sweep_interval().max(Duration::from_secs(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let (Some(cache), Some(runs), Some(limiter)) =
                    (cache.upgrade(), runs.upgrade(), limiter.upgrade())
                else {
                    debug!("Search service dropped, stopping maintenance");
                    break;
                };

                let entries = cache.sweep().await;
                let expired_runs = runs.purge_expired().await;
                let callers = limiter.sweep().await;
                debug!(
                    "Maintenance removed {} cache entries, {} runs, {} callers",
                    entries, expired_runs, callers
                );
            }
        })
    }
}
