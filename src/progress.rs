//! Per-run progress tracking and the run registry.
//!
//! Each run owns a [`ProgressTracker`] whose state lives in a `watch`
//! channel: the engine writes to it, and any number of readers can poll a
//! [`ProgressSnapshot`] or subscribe to changes without coordinating with
//! the writer. Runs are registered in a [`RunRegistry`] under an opaque
//! [`RunId`] and purged once they outlive the registry TTL.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::{Result, SearchError};

/// Lifecycle of a run. Status only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Waiting,
    CollectingUrls,
    Searching,
    Completed,
    Error,
}

impl RunStatus {
    fn stage(&self) -> u8 {
        match self {
            RunStatus::Waiting => 0,
            RunStatus::CollectingUrls => 1,
            RunStatus::Searching => 2,
            RunStatus::Completed | RunStatus::Error => 3,
        }
    }

    /// Returns whether the run has finished.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Error)
    }

    /// Returns whether moving to `next` keeps the lifecycle forward-only.
    pub fn can_advance_to(&self, next: RunStatus) -> bool {
        !self.is_terminal() && next.stage() > self.stage()
    }
}

/// Mutable progress of one run.
#[derive(Debug, Clone)]
pub struct ProgressState {
    pub total_urls: usize,
    pub processed_urls: usize,
    pub found_results: usize,
    pub status: RunStatus,
    pub start_time: Instant,
}

impl ProgressState {
    fn new() -> Self {
        Self {
            total_urls: 0,
            processed_urls: 0,
            found_results: 0,
            status: RunStatus::Waiting,
            start_time: Instant::now(),
        }
    }

    /// Serializable view with derived percentage and elapsed time.
    pub fn snapshot(&self) -> ProgressSnapshot {
        let progress = self.processed_urls as f64 / self.total_urls.max(1) as f64 * 100.0;
        ProgressSnapshot {
            total_urls: self.total_urls,
            processed_urls: self.processed_urls,
            found_results: self.found_results,
            current_status: self.status,
            progress: round2(progress),
            elapsed_time: round2(self.start_time.elapsed().as_secs_f64()),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Point-in-time progress as delivered to external readers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub total_urls: usize,
    pub processed_urls: usize,
    pub found_results: usize,
    pub current_status: RunStatus,
    /// Percentage of processed URLs, rounded to 2 decimals.
    pub progress: f64,
    /// Seconds since the run started, rounded to 2 decimals.
    pub elapsed_time: f64,
}

/// Writer side of a run's progress, plus its cancellation token.
#[derive(Debug)]
pub struct ProgressTracker {
    state: watch::Sender<ProgressState>,
    cancel: CancellationToken,
}

impl ProgressTracker {
    /// Creates a tracker in the `Waiting` state, starting the run clock.
    pub fn new() -> Self {
        let (state, _) = watch::channel(ProgressState::new());
        Self {
            state,
            cancel: CancellationToken::new(),
        }
    }

    /// Moves the run to `next`.
    pub fn advance(&self, next: RunStatus) -> Result<()> {
        self.transition(next, |_| {})
    }

    /// Moves the run to `Searching` with the number of URLs to search.
    pub fn begin_search(&self, total_urls: usize) -> Result<()> {
        self.transition(RunStatus::Searching, |state| {
            state.total_urls = total_urls;
            state.processed_urls = 0;
        })
    }

    /// Records a finished chunk of `processed` URLs and the running match count.
    pub fn record_chunk(&self, processed: usize, found_results: usize) {
        self.state.send_modify(|state| {
            state.processed_urls = (state.processed_urls + processed).min(state.total_urls);
            state.found_results = found_results;
        });
    }

    /// Completes a run served from the cache.
    pub fn finish_cached(&self, results: usize) -> Result<()> {
        self.transition(RunStatus::Completed, |state| {
            state.total_urls = results;
            state.processed_urls = results;
            state.found_results = results;
        })
    }

    /// Completes the run with its final result count.
    pub fn complete(&self, found_results: usize) -> Result<()> {
        self.transition(RunStatus::Completed, |state| {
            state.found_results = found_results;
        })
    }

    /// Marks the run as failed. No-op once the run has finished.
    pub fn fail(&self) {
        if let Err(e) = self.advance(RunStatus::Error) {
            debug!("Not marking run as failed: {}", e);
        }
    }

    fn transition(&self, next: RunStatus, update: impl FnOnce(&mut ProgressState)) -> Result<()> {
        let mut outcome = Ok(());
        self.state.send_if_modified(|state| {
            if state.status.can_advance_to(next) {
                update(state);
                state.status = next;
                true
            } else {
                outcome = Err(SearchError::InvalidTransition {
                    from: state.status,
                    to: next,
                });
                false
            }
        });
        outcome
    }

    pub fn status(&self) -> RunStatus {
        self.state.borrow().status
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.state.borrow().snapshot()
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<ProgressState> {
        self.state.subscribe()
    }

    /// Requests cooperative cancellation of the run.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Opaque, unguessable identifier of a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Generates a fresh ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RunId {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self> {
        let id = Uuid::parse_str(s.trim())
            .map_err(|_| SearchError::Validation("Invalid run ID".to_string()))?;
        Ok(Self(id.simple().to_string()))
    }
}

struct RunEntry {
    tracker: Arc<ProgressTracker>,
    created: Instant,
}

/// Registry of live runs, purged after a TTL.
pub struct RunRegistry {
    runs: Mutex<HashMap<RunId, RunEntry>>,
    ttl: Duration,
}

impl RunRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            runs: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Registers a new run, purging expired runs first.
    pub async fn create(&self) -> (RunId, Arc<ProgressTracker>) {
        let mut runs = self.runs.lock().await;
        let purged = Self::purge_locked(&mut runs, self.ttl);
        if purged > 0 {
            debug!("Purged {} expired runs", purged);
        }

        let id = RunId::new();
        let tracker = Arc::new(ProgressTracker::new());
        runs.insert(
            id.clone(),
            RunEntry {
                tracker: Arc::clone(&tracker),
                created: Instant::now(),
            },
        );
        (id, tracker)
    }

    /// Looks up a run. Expired runs are removed and reported as absent.
    pub async fn get(&self, id: &RunId) -> Option<Arc<ProgressTracker>> {
        let mut runs = self.runs.lock().await;
        let expired = runs.get(id)?.created.elapsed() >= self.ttl;
        if expired {
            runs.remove(id);
            return None;
        }
        runs.get(id).map(|entry| Arc::clone(&entry.tracker))
    }

    pub async fn snapshot(&self, id: &RunId) -> Option<ProgressSnapshot> {
        self.get(id).await.map(|tracker| tracker.snapshot())
    }

    /// Removes every run older than the TTL, finished or not.
    pub async fn purge_expired(&self) -> usize {
        let mut runs = self.runs.lock().await;
        Self::purge_locked(&mut runs, self.ttl)
    }

    fn purge_locked(runs: &mut HashMap<RunId, RunEntry>, ttl: Duration) -> usize {
        let before = runs.len();
        runs.retain(|_, entry| entry.created.elapsed() < ttl);
        before - runs.len()
    }

    pub async fn len(&self) -> usize {
        self.runs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.runs.lock().await.is_empty()
    }

    /// Streams snapshots of a run every `every` until it reaches a terminal
    /// status. The stream ends early if the run is unknown or gets purged.
    pub fn feed(
        self: Arc<Self>,
        id: RunId,
        every: Duration,
    ) -> impl Stream<Item = ProgressSnapshot> + Send + 'static {
        let every = every.max(Duration::from_millis(1));

        // The interval needs a runtime, so it is built on first poll.
        stream::unfold(
            (self, id, None::<Interval>, false),
            move |(registry, id, ticker, done)| async move {
                if done {
                    return None;
                }
                let mut ticker = ticker.unwrap_or_else(|| {
                    let mut ticker = tokio::time::interval(every);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    ticker
                });
                ticker.tick().await;
                let snapshot = registry.snapshot(&id).await?;
                let done = snapshot.current_status.is_terminal();
                Some((snapshot, (registry, id, Some(ticker), done)))
            },
        )
    }
}
