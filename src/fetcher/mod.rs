//! The bounded upstream fetcher.
//!
//! [`Fetcher`] turns `(path, params)` into the upstream JSON document:
//!
//! 1. build the canonical cache key; a live cache entry is returned
//!    straight away, without touching the gate or the network
//! 2. take a [`ConcurrencyGate`] slot (suspends while the gate is full)
//! 3. run attempts through [`decide()`](crate::upstream::decide), sleeping
//!    between retries
//! 4. cache the body on success; the slot is released on every exit path
//!
//! Constructed once by the composition root via [`Fetcher::builder()`] and
//! shared by handle; clones are cheap and share cache, gate and transport.

mod builder;

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::ResponseCache;
use crate::gate::ConcurrencyGate;
use crate::telemetry;
use crate::types::params::{cache_key, resolve_url};
use crate::types::RequestParams;
use crate::upstream::{RetryConfig, RetryDecision, Transport, decide};
use crate::Result;

pub use builder::FetcherBuilder;

/// Caching, retrying, concurrency-bounded client for one upstream API.
#[derive(Clone)]
pub struct Fetcher {
    inner: Arc<Inner>,
}

struct Inner {
    base_url: String,
    transport: Arc<dyn Transport>,
    cache: ResponseCache,
    gate: ConcurrencyGate,
    retry: RetryConfig,
    coalesce: bool,
}

impl Fetcher {
    /// Create a new builder for configuring the fetcher.
    pub fn builder() -> FetcherBuilder {
        FetcherBuilder::new()
    }

    pub(crate) fn from_parts(
        base_url: String,
        transport: Arc<dyn Transport>,
        cache: ResponseCache,
        gate: ConcurrencyGate,
        retry: RetryConfig,
        coalesce: bool,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                base_url,
                transport,
                cache,
                gate,
                retry,
                coalesce,
            }),
        }
    }

    /// Fetch the JSON document at `path` (relative to the base URL).
    ///
    /// `params` must already be sanitized; see [`crate::forward`].
    ///
    /// # Errors
    ///
    /// - [`ProxyError::UpstreamRejected`](crate::ProxyError::UpstreamRejected)
    ///   for a non-retryable upstream status (e.g. 404)
    /// - [`ProxyError::UpstreamUnavailable`](crate::ProxyError::UpstreamUnavailable)
    ///   once the retry budget is spent on 429 / 5xx / transport failures
    /// - [`ProxyError::InvalidResponse`](crate::ProxyError::InvalidResponse)
    ///   when a 2xx body is not JSON
    pub async fn fetch(&self, path: &str, params: &RequestParams) -> Result<Value> {
        let url = resolve_url(&self.inner.base_url, path);
        let key = cache_key(&url, params);

        if let Some(hit) = self.inner.cache.get(&key).await {
            debug!(%key, "cache hit");
            return Ok(hit);
        }

        if self.inner.coalesce {
            return self
                .inner
                .cache
                .get_or_try_insert_with(key, self.fetch_upstream(&url, params))
                .await
                .map_err(|e| (*e).clone());
        }

        let value = self.fetch_upstream(&url, params).await?;
        self.inner.cache.insert(key, value.clone()).await;
        Ok(value)
    }

    /// Gate-bounded retry loop. The permit lives for the whole loop,
    /// backoff sleeps included.
    async fn fetch_upstream(&self, url: &str, params: &RequestParams) -> Result<Value> {
        let _permit = self.inner.gate.acquire().await;
        let start = Instant::now();

        let result = self.run_attempts(url, params).await;

        metrics::histogram!(telemetry::FETCH_DURATION_SECONDS)
            .record(start.elapsed().as_secs_f64());
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(telemetry::FETCHES_TOTAL, "status" => status).increment(1);
        result
    }

    async fn run_attempts(&self, url: &str, params: &RequestParams) -> Result<Value> {
        let retry = &self.inner.retry;
        let mut attempt = 0;
        loop {
            let outcome = self.inner.transport.get(url, params).await;
            metrics::counter!(telemetry::UPSTREAM_ATTEMPTS_TOTAL, "outcome" => outcome.label())
                .increment(1);
            let reason = outcome.to_string();

            match decide(retry, attempt, outcome) {
                RetryDecision::Done(value) => return Ok(value),
                RetryDecision::Fail(e) => {
                    warn!(url, attempt = attempt + 1, error = %e, "upstream fetch failed");
                    return Err(e);
                }
                RetryDecision::RetryAfter(delay) => {
                    metrics::counter!(telemetry::RETRIES_TOTAL).increment(1);
                    warn!(
                        url,
                        attempt = attempt + 1,
                        max_attempts = retry.attempts(),
                        delay_ms = delay.as_millis() as u64,
                        %reason,
                        "retrying upstream request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Upstream base URL.
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// The response cache (shared with all clones).
    pub fn cache(&self) -> &ResponseCache {
        &self.inner.cache
    }

    /// The concurrency gate (shared with all clones).
    pub fn gate(&self) -> &ConcurrencyGate {
        &self.inner.gate
    }

    /// Active retry policy.
    pub fn retry_config(&self) -> &RetryConfig {
        &self.inner.retry
    }
}
