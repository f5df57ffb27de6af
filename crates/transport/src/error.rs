use ethers::providers::{JsonRpcError, ProviderError, RpcError};
use thiserror::Error;

/// Invalid router or endpoint configuration
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Every router needs an endpoint for methods no route claims
    #[error("no fallback endpoint configured")]
    MissingFallback,

    /// Endpoint URL does not parse
    #[error("invalid endpoint url {url}: {inner}")]
    InvalidUrl { url: String, inner: String },

    /// Header name or value is not valid HTTP
    #[error("invalid header {name}")]
    InvalidHeader { name: String },

    /// HTTP client could not be constructed
    #[error("http client error: {inner}")]
    Client { inner: String },
}

/// Errors raised while talking to an upstream endpoint
#[derive(Debug, Error)]
pub enum TransportError {
    /// Upstream answered with a JSON-RPC error object
    #[error(transparent)]
    JsonRpc(#[from] JsonRpcError),

    /// Upstream answered with a non-success HTTP status
    #[error("HTTP status {status}: {body}")]
    Http { status: u16, body: String },

    /// Connection, timeout or body read failure
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Response (or request) could not be (de)serialized
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

impl TransportError {
    /// Transport failures are retried, JSON-RPC error objects never are
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::JsonRpc(_) | Self::Serde(_) => false,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::Request(err) => !err.is_builder(),
        }
    }
}

impl RpcError for TransportError {
    fn as_error_response(&self) -> Option<&JsonRpcError> {
        match self {
            TransportError::JsonRpc(err) => Some(err),
            _ => None,
        }
    }

    fn as_serde_error(&self) -> Option<&serde_json::Error> {
        match self {
            TransportError::Serde(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TransportError> for ProviderError {
    fn from(src: TransportError) -> Self {
        ProviderError::JsonRpcClientError(Box::new(src))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_failures_retry() {
        let json_rpc = TransportError::JsonRpc(JsonRpcError {
            code: -32000,
            message: "AA21 didn't pay prefund".into(),
            data: None,
        });
        assert!(!json_rpc.is_retryable());
        assert!(json_rpc.as_error_response().is_some());

        assert!(TransportError::Http { status: 503, body: String::new() }.is_retryable());
        assert!(TransportError::Http { status: 429, body: String::new() }.is_retryable());
        assert!(!TransportError::Http { status: 400, body: String::new() }.is_retryable());
    }

    #[test]
    fn provider_error_keeps_json_rpc_error() {
        let err: ProviderError = TransportError::JsonRpc(JsonRpcError {
            code: 4001,
            message: "policy rejected".into(),
            data: None,
        })
        .into();
        let response = err.as_error_response().unwrap();
        assert_eq!(response.code, 4001);
        assert_eq!(response.message, "policy rejected");
    }
}
