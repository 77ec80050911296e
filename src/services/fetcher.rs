// src/services/fetcher.rs

//! Rate-limited, retrying page fetcher.
//!
//! Requests go out strictly one at a time. Each request class has its own
//! politeness delay, and transient failures are retried with exponential
//! backoff before a `Network` error is returned.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::CrawlerConfig;

/// Status and body of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Issues a single GET request.
///
/// `Err` means no response was received (timeout, connection failure) and is
/// always treated as transient by the [`Fetcher`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse>;
}

/// Which politeness delay applies to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    Listing,
    Detail,
}

/// Pause inserted before each request, per class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DelayPolicy {
    pub listing: Duration,
    pub detail: Duration,
}

impl DelayPolicy {
    /// No delay at all; for tests and local fixtures.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            listing: Duration::from_millis(config.delay_between_pages_ms),
            detail: Duration::from_millis(config.delay_between_events_ms),
        }
    }

    pub fn delay_for(&self, class: RequestClass) -> Duration {
        match class {
            RequestClass::Listing => self.listing,
            RequestClass::Detail => self.detail,
        }
    }
}

/// Retry budget and backoff base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Wait before the first retry; doubles on each further retry
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
        }
    }

    /// Retry immediately, `max_retries` times.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_backoff: Duration::ZERO,
        }
    }

    /// Wait before retry number `retry` (0-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(retry))
    }
}

/// Request counters kept for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Attempts sent, retries included
    pub requests: usize,
    /// Attempts that were retries
    pub retries: usize,
    /// Fetches that ended in an error
    pub failures: usize,
}

/// Sequential fetcher with politeness delay and retry-with-backoff.
pub struct Fetcher<T> {
    transport: T,
    retry: RetryPolicy,
    delay: DelayPolicy,
    stats: FetchStats,
}

impl<T: Transport> Fetcher<T> {
    pub fn new(transport: T, retry: RetryPolicy, delay: DelayPolicy) -> Self {
        Self {
            transport,
            retry,
            delay,
            stats: FetchStats::default(),
        }
    }

    /// Build a fetcher with the retry and delay policies from configuration.
    pub fn from_config(transport: T, config: &CrawlerConfig) -> Self {
        Self::new(
            transport,
            RetryPolicy::from_config(config),
            DelayPolicy::from_config(config),
        )
    }

    pub fn stats(&self) -> FetchStats {
        self.stats
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetch a document body.
    ///
    /// Timeouts, connection failures, 429 and 5xx are retried; any other
    /// non-2xx status fails at once.
    pub async fn fetch(&mut self, url: &str, class: RequestClass) -> Result<String> {
        let pause = self.delay.delay_for(class);
        if self.stats.requests > 0 && !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }

        let mut retry = 0;
        loop {
            self.stats.requests += 1;
            let failure = match self.transport.get(url).await {
                Ok(response) if (200..300).contains(&response.status) => {
                    return Ok(response.body);
                }
                Ok(response) if is_transient_status(response.status) => {
                    format!("HTTP {}", response.status)
                }
                Ok(response) => {
                    self.stats.failures += 1;
                    return Err(AppError::network(url, format!("HTTP {}", response.status)));
                }
                Err(e) => e.to_string(),
            };

            if retry >= self.retry.max_retries {
                self.stats.failures += 1;
                return Err(AppError::network(
                    url,
                    format!("{failure} (after {} attempts)", retry + 1),
                ));
            }

            let wait = self.retry.backoff(retry);
            log::warn!(
                "{} on attempt {}/{} for {}; retrying in {:?}",
                failure,
                retry + 1,
                self.retry.max_retries + 1,
                url,
                wait
            );
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
            retry += 1;
            self.stats.retries += 1;
        }
    }
}

fn is_transient_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{MockTransport, Reply};

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy {
            max_retries: 3,
            initial_backoff: Duration::from_millis(2000),
        };
        assert_eq!(policy.backoff(0), Duration::from_millis(2000));
        assert_eq!(policy.backoff(1), Duration::from_millis(4000));
        assert_eq!(policy.backoff(2), Duration::from_millis(8000));
    }

    #[test]
    fn test_delay_policy_from_config() {
        let config = CrawlerConfig::default();
        let delay = DelayPolicy::from_config(&config);
        assert_eq!(delay.delay_for(RequestClass::Listing), Duration::from_millis(1000));
        assert_eq!(delay.delay_for(RequestClass::Detail), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let transport = MockTransport::new().page("https://x.test/a", "<p>a</p>");
        let mut fetcher = Fetcher::new(transport, RetryPolicy::immediate(3), DelayPolicy::none());

        let body = fetcher.fetch("https://x.test/a", RequestClass::Listing).await.unwrap();
        assert_eq!(body, "<p>a</p>");
        assert_eq!(fetcher.stats().requests, 1);
        assert_eq!(fetcher.stats().retries, 0);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let transport = MockTransport::new()
            .reply("https://x.test/a", Reply::Fail("timed out".into()))
            .reply("https://x.test/a", Reply::Status(503, String::new()))
            .page("https://x.test/a", "<p>ok</p>");
        let mut fetcher = Fetcher::new(transport, RetryPolicy::immediate(3), DelayPolicy::none());

        let body = fetcher.fetch("https://x.test/a", RequestClass::Detail).await.unwrap();
        assert_eq!(body, "<p>ok</p>");
        assert_eq!(fetcher.stats().requests, 3);
        assert_eq!(fetcher.stats().retries, 2);
        assert_eq!(fetcher.stats().failures, 0);
    }

    #[tokio::test]
    async fn test_retries_exhausted_yields_network_error() {
        let transport =
            MockTransport::new().reply("https://x.test/a", Reply::Status(500, String::new()));
        let mut fetcher = Fetcher::new(transport, RetryPolicy::immediate(2), DelayPolicy::none());

        let err = fetcher
            .fetch("https://x.test/a", RequestClass::Detail)
            .await
            .unwrap_err();
        match err {
            AppError::Network { url, cause } => {
                assert_eq!(url, "https://x.test/a");
                assert!(cause.contains("HTTP 500"));
                assert!(cause.contains("3 attempts"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(fetcher.stats().requests, 3);
        assert_eq!(fetcher.stats().failures, 1);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let transport = MockTransport::new();
        let mut fetcher = Fetcher::new(transport, RetryPolicy::immediate(3), DelayPolicy::none());

        let err = fetcher
            .fetch("https://x.test/missing", RequestClass::Detail)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Network { .. }));
        assert_eq!(fetcher.stats().requests, 1);
        assert_eq!(fetcher.transport().hits(), vec!["https://x.test/missing"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_applies_between_requests_only() {
        let transport = MockTransport::new()
            .page("https://x.test/1", "<p>1</p>")
            .page("https://x.test/2", "<p>2</p>");
        let delay = DelayPolicy {
            listing: Duration::from_secs(1),
            detail: Duration::from_millis(500),
        };
        let mut fetcher = Fetcher::new(transport, RetryPolicy::immediate(0), delay);

        let started = tokio::time::Instant::now();
        fetcher.fetch("https://x.test/1", RequestClass::Listing).await.unwrap();
        assert_eq!(started.elapsed(), Duration::ZERO);

        fetcher.fetch("https://x.test/2", RequestClass::Detail).await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_wait_doubling_backoff() {
        let transport = MockTransport::new()
            .reply("https://x.test/a", Reply::Fail("timed out".into()))
            .reply("https://x.test/a", Reply::Status(502, String::new()))
            .page("https://x.test/a", "<p>ok</p>");
        let retry = RetryPolicy {
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
        };
        let mut fetcher = Fetcher::new(transport, retry, DelayPolicy::none());

        let started = tokio::time::Instant::now();
        let body = fetcher.fetch("https://x.test/a", RequestClass::Detail).await.unwrap();
        assert_eq!(body, "<p>ok</p>");
        assert_eq!(started.elapsed(), Duration::from_secs(3));
        assert_eq!(fetcher.stats().retries, 2);
    }
}
