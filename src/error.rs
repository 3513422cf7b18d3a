use std::time::Duration;

/// Failure reported by an [`HttpTransport`](crate::transport::HttpTransport)
/// before any HTTP status was received.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Error returned by [`MessageSender`](crate::sender::MessageSender).
///
/// Only transient errors are retried by `send`; everything else surfaces
/// to the caller on the first occurrence.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SenderError {
    #[error("collector is temporarily unavailable (HTTP {status})")]
    ServiceUnavailable { status: u16 },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("HTTP sender is not initialized")]
    NotInitialized,
}

impl SenderError {
    /// `true` for failures that are expected to succeed on retry
    /// (503, timeouts, network blips).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SenderError::ServiceUnavailable { .. }
                | SenderError::Timeout(_)
                | SenderError::Network(_)
        )
    }

    pub(crate) fn from_transport(err: TransportError, timeout: Duration) -> Self {
        match err {
            TransportError::Timeout => SenderError::Timeout(timeout),
            TransportError::Network(msg) => SenderError::Network(msg),
            TransportError::InvalidRequest(msg) => SenderError::InvalidRequest(msg),
        }
    }
}

/// Error type returned when validating or loading a
/// [`ShipperConfig`](crate::config::ShipperConfig).
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("destination URL is missing or blank")]
    MissingUrl,

    #[error("invalid destination URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("buffer capacity must be at least 1")]
    ZeroCapacity,

    #[error("{field} must be non-zero")]
    ZeroValue { field: &'static str },

    #[error("invalid value in {key}: {message}")]
    Env { key: &'static str, message: String },

    #[error("failed to build HTTP transport: {0}")]
    Transport(String),

    #[error("no tokio runtime is running; start the shipper from within one")]
    NoRuntime,
}
