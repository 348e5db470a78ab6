//! Retry configuration, delay calculation, and the retry decision.
//!
//! Every upstream attempt is classified into an [`AttemptOutcome`]; the
//! pure [`decide()`] function turns that outcome plus the attempt number
//! into a [`RetryDecision`]. The fetch loop only sleeps and repeats, so the
//! whole policy is testable without a network.

use std::time::Duration;

use serde_json::Value;

use super::AttemptOutcome;
use crate::ProxyError;

/// Configuration for retry behaviour on transient upstream failures.
///
/// Uses exponential backoff: the delay starts at `initial_delay` and
/// doubles with every consumed attempt, capped at `max_delay`. A
/// server-provided `Retry-After` hint (also capped at `max_delay`) replaces
/// the computed delay for that attempt only; the doubling continues
/// underneath it.
///
/// ```rust
/// # use inatproxy::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_attempts(4)
///     .initial_delay(Duration::from_millis(200));
/// assert_eq!(config.delay_for_attempt(2), Duration::from_millis(800));
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial request).
    /// 1 = no retry. Default: 6.
    pub max_attempts: u32,
    /// Delay before the first retry. Default: 1s.
    pub initial_delay: Duration,
    /// Maximum delay between retries. Default: 60s.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    /// Create a new config with the default policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config that disables retries (single attempt).
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set maximum attempts (including the initial request).
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    /// Set the delay before the first retry.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay between retries.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Attempt budget, never less than one.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Backoff for a given attempt number (0-indexed).
    ///
    /// `initial_delay * 2^attempt`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }

    /// Delay honouring an upstream `Retry-After` hint when present.
    ///
    /// The hint is capped by `max_delay` like the computed backoff, since
    /// the gate slot stays held while waiting.
    pub fn effective_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(hint) => hint.min(self.max_delay),
            None => self.delay_for_attempt(attempt),
        }
    }
}

/// What the fetch loop should do after one attempt.
#[derive(Debug)]
pub enum RetryDecision {
    /// Upstream answered with a JSON body.
    Done(Value),
    /// Give up with this error.
    Fail(ProxyError),
    /// Sleep this long, then try again.
    RetryAfter(Duration),
}

/// Decide the next step for attempt number `attempt` (0-indexed).
///
/// - success → [`RetryDecision::Done`]
/// - 429, 5xx, transport failure → [`RetryDecision::RetryAfter`], or
///   [`ProxyError::UpstreamUnavailable`] once the budget is spent
/// - any other non-2xx → [`ProxyError::UpstreamRejected`], never retried
/// - undecodable 2xx body → [`ProxyError::InvalidResponse`], never retried
pub fn decide(config: &RetryConfig, attempt: u32, outcome: AttemptOutcome) -> RetryDecision {
    let retry_after = match outcome {
        AttemptOutcome::Success(value) => return RetryDecision::Done(value),
        AttemptOutcome::ClientError { status, message } => {
            return RetryDecision::Fail(ProxyError::UpstreamRejected { status, message });
        }
        AttemptOutcome::InvalidBody(message) => {
            return RetryDecision::Fail(ProxyError::InvalidResponse(message));
        }
        AttemptOutcome::RateLimited { retry_after } => retry_after,
        AttemptOutcome::ServerError { .. } | AttemptOutcome::Transport(_) => None,
    };

    let attempts = config.attempts();
    if attempt + 1 >= attempts {
        return RetryDecision::Fail(ProxyError::UpstreamUnavailable {
            attempts,
            last_error: outcome.to_string(),
        });
    }
    RetryDecision::RetryAfter(config.effective_delay(attempt, retry_after))
}

/// Parse a `Retry-After` header value.
///
/// Only the delay-seconds form (ASCII digits) is honoured; HTTP dates and
/// anything else yield `None`, and the caller falls back to backoff.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fast() -> RetryConfig {
        RetryConfig::new().initial_delay(Duration::from_millis(100))
    }

    #[test]
    fn defaults_match_upstream_policy() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 6);
        assert_eq!(config.initial_delay, Duration::from_secs(1));
    }

    #[test]
    fn backoff_doubles() {
        let config = fast();
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(800));
    }

    #[test]
    fn backoff_capped() {
        let config = fast().max_delay(Duration::from_millis(250));
        assert_eq!(config.delay_for_attempt(5), Duration::from_millis(250));
        assert_eq!(config.delay_for_attempt(40), Duration::from_millis(250));
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        assert_eq!(RetryConfig::new().max_attempts(0).attempts(), 1);
    }

    #[test]
    fn success_is_done() {
        match decide(&fast(), 0, AttemptOutcome::Success(json!({"ok": true}))) {
            RetryDecision::Done(v) => assert_eq!(v["ok"], true),
            other => panic!("expected Done, got {other:?}"),
        }
    }

    #[test]
    fn rate_limit_hint_overrides_backoff() {
        let outcome = AttemptOutcome::RateLimited {
            retry_after: Some(Duration::from_secs(7)),
        };
        match decide(&fast(), 2, outcome) {
            RetryDecision::RetryAfter(d) => assert_eq!(d, Duration::from_secs(7)),
            other => panic!("expected RetryAfter, got {other:?}"),
        }
    }

    #[test]
    fn oversized_hint_is_capped() {
        let config = fast().max_delay(Duration::from_secs(60));
        assert_eq!(
            config.effective_delay(0, Some(Duration::from_secs(99_999_999))),
            Duration::from_secs(60)
        );
        let outcome = AttemptOutcome::RateLimited {
            retry_after: Some(Duration::from_secs(99_999_999)),
        };
        match decide(&config, 0, outcome) {
            RetryDecision::RetryAfter(d) => assert_eq!(d, Duration::from_secs(60)),
            other => panic!("expected RetryAfter, got {other:?}"),
        }
    }

    #[test]
    fn rate_limit_without_hint_uses_backoff() {
        let outcome = AttemptOutcome::RateLimited { retry_after: None };
        match decide(&fast(), 1, outcome) {
            RetryDecision::RetryAfter(d) => assert_eq!(d, Duration::from_millis(200)),
            other => panic!("expected RetryAfter, got {other:?}"),
        }
    }

    #[test]
    fn server_error_and_transport_retry() {
        for outcome in [
            AttemptOutcome::ServerError { status: 503 },
            AttemptOutcome::Transport("connection reset".into()),
        ] {
            assert!(matches!(
                decide(&fast(), 0, outcome),
                RetryDecision::RetryAfter(d) if d == Duration::from_millis(100)
            ));
        }
    }

    #[test]
    fn client_error_fails_immediately() {
        let outcome = AttemptOutcome::ClientError {
            status: 404,
            message: "not found".into(),
        };
        match decide(&fast(), 0, outcome) {
            RetryDecision::Fail(ProxyError::UpstreamRejected { status, .. }) => {
                assert_eq!(status, 404)
            }
            other => panic!("expected UpstreamRejected, got {other:?}"),
        }
    }

    #[test]
    fn invalid_body_fails_immediately() {
        assert!(matches!(
            decide(&fast(), 0, AttemptOutcome::InvalidBody("eof".into())),
            RetryDecision::Fail(ProxyError::InvalidResponse(_))
        ));
    }

    #[test]
    fn last_attempt_exhausts() {
        let config = fast().max_attempts(3);
        match decide(&config, 2, AttemptOutcome::ServerError { status: 502 }) {
            RetryDecision::Fail(ProxyError::UpstreamUnavailable { attempts, last_error }) => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("502"));
            }
            other => panic!("expected UpstreamUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn retry_after_parsing() {
        assert_eq!(parse_retry_after("5"), Some(Duration::from_secs(5)));
        assert_eq!(parse_retry_after(" 0 "), Some(Duration::ZERO));
        assert_eq!(parse_retry_after("1.5"), None);
        assert_eq!(parse_retry_after("-1"), None);
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
        assert_eq!(parse_retry_after(""), None);
    }
}
