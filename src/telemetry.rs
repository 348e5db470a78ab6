//! Telemetry metric name constants.
//!
//! Centralised metric names for inatproxy operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `inatproxy_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `outcome` — attempt classification: "ok", "rate_limited",
//!   "server_error", "client_error", "transport", "invalid_body"
//! - `status` — fetch result: "ok" or "error"

/// Total upstream attempts issued (each retry counts).
///
/// Labels: `outcome`.
pub const UPSTREAM_ATTEMPTS_TOTAL: &str = "inatproxy_upstream_attempts_total";

/// Total fetch calls that went past the cache.
///
/// Labels: `status` ("ok" | "error").
pub const FETCHES_TOTAL: &str = "inatproxy_fetches_total";

/// Fetch duration in seconds, measured from gate acquisition to result.
pub const FETCH_DURATION_SECONDS: &str = "inatproxy_fetch_duration_seconds";

/// Total retry attempts (not counting the initial request).
pub const RETRIES_TOTAL: &str = "inatproxy_retries_total";

/// Total cache hits.
pub const CACHE_HITS_TOTAL: &str = "inatproxy_cache_hits_total";

/// Total cache misses.
pub const CACHE_MISSES_TOTAL: &str = "inatproxy_cache_misses_total";

/// Upstream calls currently holding a gate slot.
pub const IN_FLIGHT: &str = "inatproxy_upstream_in_flight";
