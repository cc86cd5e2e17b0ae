//! HTTP-based page fetcher using reqwest.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::redirect::Policy;
use reqwest::{Client, Response};
use tracing::{debug, warn};
use url::Url;

use crate::fetcher::{FetchResult, FetchStatus, PageFetcher, RetryPolicy};
use crate::{Result, SearchConfig};

/// A page fetcher that uses plain HTTP requests via reqwest.
///
/// Each fetch is retried with linear backoff on timeouts, transport errors
/// and non-2xx answers. Bodies are read chunk by chunk and cut off at the
/// configured size cap. Redirects are only followed within the origin of
/// the URL being redirected; anything else ends as [`FetchStatus::Redirected`].
pub struct HttpFetcher {
    client: Client,
    retry: RetryPolicy,
    max_body_bytes: usize,
}

impl HttpFetcher {
    /// Creates a fetcher from the engine configuration.
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        if config.accept_invalid_certs {
            warn!("TLS certificate validation is disabled");
        }

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .timeout(config.request_timeout())
            .redirect(same_site_redirects())
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        Ok(Self::with_client(
            client,
            RetryPolicy::new(config.max_attempts, config.retry_base_delay()),
            config.max_body_bytes,
        ))
    }

    /// Creates an `HttpFetcher` with a custom reqwest client.
    pub fn with_client(client: Client, retry: RetryPolicy, max_body_bytes: usize) -> Self {
        Self {
            client,
            retry,
            max_body_bytes,
        }
    }

    /// Returns the retry policy in use.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    async fn fetch_once(&self, url: &str) -> FetchResult {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => return FetchResult::failed(url, classify(&e)),
        };

        let status = response.status();
        if status.is_redirection() {
            debug!("Not following redirect of {} to another site", url);
            return FetchResult::failed(url, FetchStatus::Redirected);
        }
        if !status.is_success() {
            return FetchResult::failed(url, FetchStatus::HttpError(status.as_u16()));
        }

        let final_url = response.url().to_string();
        self.read_capped(url, response)
            .await
            .served_from(final_url)
    }

    async fn read_capped(&self, url: &str, mut response: Response) -> FetchResult {
        let mut body = Vec::new();
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    let room = self.max_body_bytes.saturating_sub(body.len());
                    if chunk.len() > room {
                        body.extend_from_slice(&chunk[..room]);
                        debug!("Truncated {} at {} bytes", url, self.max_body_bytes);
                        return FetchResult::truncated(url, body);
                    }
                    body.extend_from_slice(&chunk);
                }
                Ok(None) => return FetchResult::ok(url, body),
                Err(e) => return FetchResult::failed(url, classify(&e)),
            }
        }
    }
}

/// Maximum number of redirect hops followed for one request.
const MAX_REDIRECTS: usize = 10;

fn same_site_redirects() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() > MAX_REDIRECTS {
            return attempt.error("too many redirects");
        }
        let allowed = attempt
            .previous()
            .last()
            .map_or(true, |from| redirect_allowed(from, attempt.url()));
        if allowed {
            attempt.follow()
        } else {
            attempt.stop()
        }
    })
}

/// A redirect hop may not leave the origin it starts from.
fn redirect_allowed(from: &Url, to: &Url) -> bool {
    from.origin() == to.origin()
}

fn classify(error: &reqwest::Error) -> FetchStatus {
    if error.is_redirect() {
        FetchStatus::Redirected
    } else if error.is_timeout() {
        FetchStatus::Timeout
    } else if let Some(status) = error.status() {
        FetchStatus::HttpError(status.as_u16())
    } else {
        FetchStatus::NetworkError
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> FetchResult {
        let result = self.retry.run(|_| self.fetch_once(url)).await;
        if !result.is_success() {
            debug!("Giving up on {}: {:?}", url, result.status);
        }
        result
    }
}
