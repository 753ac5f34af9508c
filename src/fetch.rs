//! HTTP retrieval with exponential backoff.
//!
//! # Architecture
//!
//! - [`Fetch`]: core trait, one attempt at reading a full response body
//! - [`HttpFetcher`]: `reqwest` implementation
//! - [`RetryFetch`]: decorator that retries any [`Fetch`] under a [`RetryPolicy`]
//!
//! [`RetryFetch::fetch_with_retry`] never returns an error. Exhaustion is
//! logged and reported as `None` so a missing image never aborts a post.

use std::fmt;
use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

use crate::error::{Result, ScrapeError};
use crate::retry::RetryPolicy;

/// Desktop user agent shared by the HTTP client and the browser.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// One attempt at downloading a resource body.
pub trait Fetch {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Plain `reqwest` fetcher. Non-success statuses are errors.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await?;
        debug!(bytes = bytes.len(), "Fetched body");
        Ok(bytes.to_vec())
    }
}

/// Wrapper that adds bounded exponential backoff to any [`Fetch`].
pub struct RetryFetch<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T: Fetch> RetryFetch<T> {
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    #[cfg(test)]
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Download `url`, retrying transient failures.
    ///
    /// Attempt `n` that fails transiently is followed by a wait of
    /// `base_wait * 2^(n-1)` plus jitter. No wait follows the last attempt.
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute URL of the resource.
    ///
    /// # Returns
    ///
    /// - `Some(bytes)` - The body of the first successful attempt
    /// - `None` - Every attempt failed, or an error came back that another
    ///   attempt cannot fix; the cause is logged
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let fetcher = RetryFetch::new(HttpFetcher::new(Duration::from_secs(30))?, RetryPolicy::default());
    /// match fetcher.fetch_with_retry("https://pbs.twimg.com/media/abc.jpg").await {
    ///     Some(bytes) => println!("{} bytes", bytes.len()),
    ///     None => println!("image unavailable"),
    /// }
    /// ```
    #[instrument(level = "info", skip(self))]
    pub async fn fetch_with_retry(&self, url: &str) -> Option<Vec<u8>> {
        let total_t0 = Instant::now();
        let mut state = self.policy.start();

        loop {
            let err = match self.inner.fetch(url).await {
                Ok(bytes) => return Some(bytes),
                Err(e) => e,
            };

            if !err.is_transient() {
                error!(error = %err, "fetch failed with a permanent error");
                return None;
            }

            match state.record_failure() {
                Some(delay) => {
                    warn!(
                        attempt = state.attempt(),
                        max = state.max_attempts(),
                        ?delay,
                        error = %err,
                        "fetch attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
                None => {
                    error!(
                        attempt = state.attempt(),
                        max = state.max_attempts(),
                        elapsed_ms_total = total_t0.elapsed().as_millis(),
                        error = %err,
                        "fetch exhausted retries"
                    );
                    return None;
                }
            }
        }
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::FlakyFetcher;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_always_failing_endpoint_makes_five_attempts() {
        let fetcher = RetryFetch::new(FlakyFetcher::always_failing(), RetryPolicy::immediate(5));
        assert_eq!(fetcher.fetch_with_retry("https://pbs.example/media/a.jpg").await, None);
        assert_eq!(fetcher.inner().calls(), 5);
    }

    #[tokio::test]
    async fn test_success_on_attempt_k_stops_there() {
        for k in 1..=5 {
            let fetcher = RetryFetch::new(FlakyFetcher::succeeding_on(k), RetryPolicy::immediate(5));
            let body = fetcher.fetch_with_retry("https://pbs.example/media/a.jpg").await;
            assert_eq!(body.as_deref(), Some(&b"image-bytes"[..]));
            assert_eq!(fetcher.inner().calls(), k, "attempt {k}");
        }
    }

    #[tokio::test]
    async fn test_http_fetcher_reads_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/media/cat.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png".to_vec()))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
        let body = fetcher.fetch(&format!("{}/media/cat.png", server.uri())).await.unwrap();
        assert_eq!(body, b"png");
    }

    #[tokio::test]
    async fn test_http_fetcher_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/media/busy.png"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let fetcher = RetryFetch::new(
            HttpFetcher::new(Duration::from_secs(5)).unwrap(),
            RetryPolicy::immediate(3),
        );
        let body = fetcher
            .fetch_with_retry(&format!("{}/media/busy.png", server.uri()))
            .await;
        assert!(body.is_none());
        server.verify().await;
    }
}
