//! inatproxy error types

/// inatproxy error types
///
/// Every upstream-facing failure is classified into one of these variants
/// at the fetch boundary. Transport errors from reqwest never escape raw.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProxyError {
    /// Upstream answered with a non-retryable status (4xx other than 429).
    /// Callers should not retry.
    #[error("upstream rejected request ({status}): {message}")]
    UpstreamRejected { status: u16, message: String },

    /// Retry budget exhausted on 429 / 5xx / transport failures.
    #[error("upstream unavailable after {attempts} attempts: {last_error}")]
    UpstreamUnavailable { attempts: u32, last_error: String },

    /// Upstream answered 2xx with a body that is not JSON.
    #[error("invalid upstream response: {0}")]
    InvalidResponse(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ProxyError {
    /// Whether the caller may reasonably retry this request later.
    ///
    /// Only exhaustion counts: "upstream said no" is permanent,
    /// "upstream is struggling" is not.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProxyError::UpstreamUnavailable { .. })
    }

    /// Upstream HTTP status carried by the error, if any.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            ProxyError::UpstreamRejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ProxyError {
    fn from(err: serde_json::Error) -> Self {
        ProxyError::InvalidResponse(err.to_string())
    }
}

/// Result type alias for inatproxy operations
pub type Result<T> = std::result::Result<T, ProxyError>;
