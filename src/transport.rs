use crate::error::TransportError;
use async_trait::async_trait;
use url::Url;

/// Media type of every outbound batch.
pub const TEXT_PLAIN_UTF8: &str = "text/plain; charset=utf-8";

/// A fully-built POST request for one aggregated batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    pub url: Url,
    pub body: String,
    /// Extra headers, in insertion order. Content type is implied.
    pub headers: Vec<(&'static str, String)>,
}

impl OutboundRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Pluggable HTTP transport used by [`MessageSender`](crate::sender::MessageSender).
///
/// Implementations perform exactly one POST and report the status code the
/// collector answered with. Interpreting the status (success, retry) is the
/// sender's job. Failures that happen before a status is received are
/// reported as [`TransportError`].
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn post(&self, request: OutboundRequest) -> Result<u16, TransportError>;
}

/// A transport that accepts every request without doing any I/O.
///
/// Useful for measuring the overhead of the pipeline itself.
#[derive(Clone, Default)]
pub struct NoopTransport;

#[async_trait]
impl HttpTransport for NoopTransport {
    async fn post(&self, _request: OutboundRequest) -> Result<u16, TransportError> {
        Ok(200)
    }
}

#[cfg(feature = "reqwest-transport")]
pub use self::reqwest_transport::ReqwestTransport;

#[cfg(feature = "reqwest-transport")]
mod reqwest_transport {
    use super::{HttpTransport, OutboundRequest, TEXT_PLAIN_UTF8};
    use crate::error::{ConfigError, TransportError};
    use async_trait::async_trait;
    use reqwest::header::CONTENT_TYPE;
    use reqwest::Client;
    use std::time::Duration;

    /// [`HttpTransport`] backed by a `reqwest` client.
    #[derive(Clone)]
    pub struct ReqwestTransport {
        client: Client,
    }

    impl ReqwestTransport {
        /// Build a client whose connect and overall request timeouts are both
        /// `timeout`.
        pub fn new(timeout: Duration) -> Result<Self, ConfigError> {
            let client = Client::builder()
                .connect_timeout(timeout)
                .timeout(timeout)
                .build()
                .map_err(|e| ConfigError::Transport(e.to_string()))?;
            Ok(Self { client })
        }

        /// Wrap an already configured client (custom TLS, proxies, ...).
        pub fn from_client(client: Client) -> Self {
            Self { client }
        }
    }

    #[async_trait]
    impl HttpTransport for ReqwestTransport {
        async fn post(&self, request: OutboundRequest) -> Result<u16, TransportError> {
            let mut builder = self
                .client
                .post(request.url)
                .header(CONTENT_TYPE, TEXT_PLAIN_UTF8);
            for (name, value) in request.headers {
                builder = builder.header(name, value);
            }

            let response = builder.body(request.body).send().await.map_err(map_error)?;
            Ok(response.status().as_u16())
        }
    }

    fn map_error(err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_builder() {
            TransportError::InvalidRequest(err.to_string())
        } else {
            TransportError::Network(err.to_string())
        }
    }
}
