//! Error taxonomy of the runtime client.

use thiserror::Error;

/// Failure of a single transport call.
///
/// Errors are values shared between every caller of a coalesced request, so
/// they are `Clone` and carry owned messages rather than source errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection, DNS, TLS or timeout failure.
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx response.
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        /// Response status code.
        status: u16,
        /// Response body as text.
        body: String,
    },

    /// Success response whose body is not the expected JSON.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The request was aborted through its cancellation token.
    #[error("request cancelled")]
    Cancelled,

    /// The token source could not supply or refresh a credential.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Parameters or body do not match the endpoint; nothing was sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    /// HTTP status of a non-success response.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Transient failures a caller-supplied retry policy may repeat.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Network(_) => true,
            TransportError::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub(crate) fn network(err: &reqwest::Error) -> Self {
        TransportError::Network(err.to_string())
    }
}

/// Result of a transport call.
pub type Result<T> = std::result::Result<T, TransportError>;
