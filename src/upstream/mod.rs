//! Outbound side: the transport seam and the retry policy.
//!
//! [`Transport`] issues exactly one GET and classifies the result into an
//! [`AttemptOutcome`]. It never returns a raw transport error. The
//! production implementation is [`HttpTransport`]; tests substitute fakes.

pub mod http;
pub mod retry;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::types::RequestParams;

pub use http::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT, HttpTransport};
pub use retry::{RetryConfig, RetryDecision, decide, parse_retry_after};

/// Classified result of a single upstream attempt.
#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    /// 2xx with a decoded JSON body.
    Success(Value),
    /// 429, with the server's wait hint if it sent a usable one.
    RateLimited { retry_after: Option<Duration> },
    /// 5xx.
    ServerError { status: u16 },
    /// Any other non-2xx.
    ClientError { status: u16, message: String },
    /// Connect failure, timeout, or a broken response stream.
    Transport(String),
    /// 2xx whose body is not valid JSON.
    InvalidBody(String),
}

impl AttemptOutcome {
    /// Short label for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            AttemptOutcome::Success(_) => "ok",
            AttemptOutcome::RateLimited { .. } => "rate_limited",
            AttemptOutcome::ServerError { .. } => "server_error",
            AttemptOutcome::ClientError { .. } => "client_error",
            AttemptOutcome::Transport(_) => "transport",
            AttemptOutcome::InvalidBody(_) => "invalid_body",
        }
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptOutcome::Success(_) => f.write_str("ok"),
            AttemptOutcome::RateLimited {
                retry_after: Some(d),
            } => write!(f, "rate limited (429), retry after {}s", d.as_secs()),
            AttemptOutcome::RateLimited { retry_after: None } => f.write_str("rate limited (429)"),
            AttemptOutcome::ServerError { status } => write!(f, "server error ({status})"),
            AttemptOutcome::ClientError { status, message } => {
                write!(f, "client error ({status}): {message}")
            }
            AttemptOutcome::Transport(e) => write!(f, "transport error: {e}"),
            AttemptOutcome::InvalidBody(e) => write!(f, "invalid JSON body: {e}"),
        }
    }
}

/// One-shot GET against the upstream API.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a single GET for `url` with `params` as the query string.
    async fn get(&self, url: &str, params: &RequestParams) -> AttemptOutcome;
}
