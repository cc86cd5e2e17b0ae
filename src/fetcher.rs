//! Page fetcher abstraction for retrieving HTML content.

use std::borrow::Cow;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

/// Outcome of a single fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    /// The full body was read.
    Ok,
    /// The server answered with a non-2xx status.
    HttpError(u16),
    /// The request did not finish within the request timeout.
    Timeout,
    /// The body exceeded the size cap and was truncated.
    TooLarge,
    /// Connection, DNS or transport failure.
    NetworkError,
    /// The server redirected to another site, or redirected too often.
    Redirected,
}

impl FetchStatus {
    /// Returns whether another attempt might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FetchStatus::HttpError(_) | FetchStatus::Timeout | FetchStatus::NetworkError
        )
    }
}

/// A fetched page. Failures carry an empty body.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// URL that was requested.
    pub url: String,
    /// URL that served the body after same-site redirects. Relative links
    /// on the page resolve against this one.
    pub final_url: String,
    pub body: Vec<u8>,
    pub status: FetchStatus,
}

impl FetchResult {
    /// A complete body.
    pub fn ok(url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        let url = url.into();
        Self {
            final_url: url.clone(),
            url,
            body: body.into(),
            status: FetchStatus::Ok,
        }
    }

    /// A body cut off at the size cap.
    pub fn truncated(url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        let url = url.into();
        Self {
            final_url: url.clone(),
            url,
            body: body.into(),
            status: FetchStatus::TooLarge,
        }
    }

    /// A failed fetch.
    pub fn failed(url: impl Into<String>, status: FetchStatus) -> Self {
        let url = url.into();
        Self {
            final_url: url.clone(),
            url,
            body: Vec::new(),
            status,
        }
    }

    /// Records the URL that actually served the body.
    pub fn served_from(mut self, final_url: impl Into<String>) -> Self {
        self.final_url = final_url.into();
        self
    }

    /// Returns whether the body is usable. Truncated bodies count.
    pub fn is_success(&self) -> bool {
        matches!(self.status, FetchStatus::Ok | FetchStatus::TooLarge)
    }

    /// Returns the body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Trait for fetching the HTML content of a URL.
///
/// Implementations never fail: every problem is reported through
/// [`FetchResult::status`], so a single bad page cannot abort a run.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches the given URL.
    async fn fetch(&self, url: &str) -> FetchResult;
}

/// Bounded retry with linearly increasing backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay unit; attempt `k` is followed by `k * base_delay`.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy. At least one attempt is always made.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay after the given (1-based) failed attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    /// Runs `attempt` until it yields a non-transient result or attempts run out.
    ///
    /// The closure receives the 1-based attempt number. The last result is
    /// returned as-is when every attempt failed.
    pub async fn run<F, Fut>(&self, mut attempt: F) -> FetchResult
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = FetchResult>,
    {
        let mut current = 1;
        loop {
            let result = attempt(current).await;
            if !result.status.is_transient() || current >= self.max_attempts {
                return result;
            }

            let delay = self.delay(current);
            debug!(
                "Fetch of {} failed with {:?} (attempt {}/{}), retrying in {:?}",
                result.url, result.status, current, self.max_attempts, delay
            );
            tokio::time::sleep(delay).await;
            current += 1;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}
