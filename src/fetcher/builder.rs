//! Builder for configuring [`Fetcher`] instances

use std::sync::Arc;
use std::time::Duration;

use super::Fetcher;
use crate::cache::{CacheConfig, ResponseCache};
use crate::gate::{ConcurrencyGate, DEFAULT_MAX_CONCURRENT};
use crate::upstream::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT, HttpTransport, RetryConfig, Transport};
use crate::{ProxyError, Result};

/// Builder for configuring fetcher instances.
///
/// ```rust
/// # use inatproxy::{CacheConfig, Fetcher, RetryConfig};
/// # use std::time::Duration;
/// let fetcher = Fetcher::builder()
///     .max_concurrent(4)
///     .cache(CacheConfig::new().ttl(Duration::from_secs(60)))
///     .retry(RetryConfig::new().max_attempts(3))
///     .build()
///     .unwrap();
/// assert_eq!(fetcher.gate().limit(), 4);
/// ```
pub struct FetcherBuilder {
    base_url: String,
    bearer_token: Option<String>,
    timeout: Duration,
    max_concurrent: usize,
    cache: CacheConfig,
    retry: RetryConfig,
    transport: Option<Arc<dyn Transport>>,
    coalesce: bool,
}

impl FetcherBuilder {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            bearer_token: None,
            timeout: DEFAULT_TIMEOUT,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            cache: CacheConfig::default(),
            retry: RetryConfig::default(),
            transport: None,
            coalesce: false,
        }
    }

    /// Upstream base URL (default: the public iNaturalist v1 API).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Send `Authorization: Bearer <token>` on every upstream request.
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Per-attempt timeout (default: 20s). Ignored with a custom transport.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Ceiling on concurrent upstream calls (default: 8).
    pub fn max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    /// Response cache capacity and TTL.
    pub fn cache(mut self, config: CacheConfig) -> Self {
        self.cache = config;
        self
    }

    /// Retry policy.
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    /// Replace the HTTP transport (fakes in tests, custom clients).
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Let concurrent identical cache misses share one upstream call.
    ///
    /// Off by default: every miss takes its own gate slot and calls
    /// upstream.
    pub fn coalesce_in_flight(mut self, enabled: bool) -> Self {
        self.coalesce = enabled;
        self
    }

    /// Build the fetcher.
    pub fn build(self) -> Result<Fetcher> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ProxyError::Configuration(format!(
                "base URL must be http(s): {:?}",
                self.base_url
            )));
        }
        if self.cache.max_entries == 0 {
            return Err(ProxyError::Configuration(
                "cache max entries must be at least 1".to_string(),
            ));
        }

        let gate = ConcurrencyGate::new(self.max_concurrent)?;
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(
                self.timeout,
                self.bearer_token.as_deref(),
            )?),
        };

        Ok(Fetcher::from_parts(
            self.base_url,
            transport,
            ResponseCache::new(&self.cache),
            gate,
            self.retry,
            self.coalesce,
        ))
    }
}

impl Default for FetcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let fetcher = FetcherBuilder::new().build().unwrap();
        assert_eq!(fetcher.base_url(), DEFAULT_BASE_URL);
        assert_eq!(fetcher.gate().limit(), 8);
        assert_eq!(fetcher.retry_config().max_attempts, 6);
    }

    #[test]
    fn rejects_non_http_base_url() {
        let result = FetcherBuilder::new().base_url("ftp://example.org").build();
        assert!(matches!(result, Err(ProxyError::Configuration(_))));
    }

    #[test]
    fn rejects_zero_concurrency() {
        let result = FetcherBuilder::new().max_concurrent(0).build();
        assert!(matches!(result, Err(ProxyError::Configuration(_))));
    }

    #[test]
    fn rejects_unrepresentable_concurrency() {
        let result = FetcherBuilder::new().max_concurrent(usize::MAX).build();
        assert!(matches!(result, Err(ProxyError::Configuration(_))));
    }

    #[test]
    fn rejects_empty_cache() {
        let result = FetcherBuilder::new()
            .cache(CacheConfig::new().max_entries(0))
            .build();
        assert!(matches!(result, Err(ProxyError::Configuration(_))));
    }
}
