//! Collaborator client error types.

/// Errors from collaborator calls.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP transport error.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The request exceeded its deadline.
    #[error("request to {endpoint} timed out")]
    Timeout { endpoint: String },
    /// Collaborator returned a non-2xx status.
    #[error("{endpoint} returned {status}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// Response deserialization failed.
    #[error("failed to deserialize response from {endpoint}: {reason}")]
    Deserialization { endpoint: String, reason: String },
    /// JSON-RPC call returned an `error` member.
    #[error("JSON-RPC {method} failed: {message}")]
    Rpc { method: String, message: String },
    /// The request was rejected before it was sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// ABI-encoded return data could not be decoded.
    #[error("ABI decode error: {0}")]
    Abi(String),
    /// The collaborator is not configured for this deployment.
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),
}

impl ClientError {
    /// Classify a transport error, splitting out timeouts.
    pub(crate) fn transport(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        let endpoint = endpoint.into();
        if source.is_timeout() {
            Self::Timeout { endpoint }
        } else {
            Self::Http { endpoint, source }
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Worth repeating for an idempotent call: a connection-level failure,
    /// or a gateway or throttling status from the collaborator.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { .. } => true,
            Self::Api { status, .. } => matches!(status, 429 | 502 | 503 | 504),
            _ => false,
        }
    }

    /// True when the collaborator reported the resource as absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
    }
}
