//! reqwest-backed [`Transport`] for the iNaturalist API.
//!
//! See: <https://api.inaturalist.org/v1/docs/>

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, RETRY_AFTER, USER_AGENT};
use reqwest::{Client, Response};

use super::{AttemptOutcome, Transport, parse_retry_after};
use crate::types::RequestParams;
use crate::{ProxyError, Result};

/// Default upstream base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.inaturalist.org/v1";

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Longest slice of an error body kept for diagnostics.
const MAX_ERROR_BODY: usize = 512;

/// HTTP transport with fixed headers and a per-request timeout.
///
/// Every request carries `Accept: application/json`, the crate's
/// `User-Agent`, and `Authorization: Bearer <token>` when a token is set.
/// A timeout is reported as [`AttemptOutcome::Transport`], same as a
/// connect failure.
#[derive(Clone)]
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    /// Create a transport with the given timeout and optional bearer token.
    pub fn new(timeout: Duration, bearer_token: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let agent = HeaderValue::from_str(&crate::version::user_agent())
            .map_err(|e| ProxyError::Configuration(format!("invalid user agent: {e}")))?;
        headers.insert(USER_AGENT, agent);
        if let Some(token) = bearer_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| ProxyError::Configuration("invalid bearer token".to_string()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ProxyError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http })
    }

    /// Map a received response onto an [`AttemptOutcome`].
    async fn classify(response: Response) -> AttemptOutcome {
        let status = response.status();

        if status.is_success() {
            return match response.bytes().await {
                Ok(body) => match serde_json::from_slice(&body) {
                    Ok(value) => AttemptOutcome::Success(value),
                    Err(e) => AttemptOutcome::InvalidBody(e.to_string()),
                },
                Err(e) => AttemptOutcome::Transport(e.to_string()),
            };
        }

        match status.as_u16() {
            429 => {
                let retry_after = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(parse_retry_after);
                AttemptOutcome::RateLimited { retry_after }
            }
            code @ 500..=599 => AttemptOutcome::ServerError { status: code },
            code => {
                let mut message = response.text().await.unwrap_or_default();
                if message.is_empty() {
                    message = status.canonical_reason().unwrap_or("error").to_string();
                }
                truncate_at_char_boundary(&mut message, MAX_ERROR_BODY);
                AttemptOutcome::ClientError {
                    status: code,
                    message,
                }
            }
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, params: &RequestParams) -> AttemptOutcome {
        match self.http.get(url).query(&params.as_pairs()).send().await {
            Ok(response) => Self::classify(response).await,
            Err(e) => AttemptOutcome::Transport(e.to_string()),
        }
    }
}

fn truncate_at_char_boundary(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}
