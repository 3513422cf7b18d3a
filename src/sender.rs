use crate::error::SenderError;
use crate::log::{self, SharedLog};
use crate::transport::{HttpTransport, OutboundRequest};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::Level;
use url::Url;

pub const SOURCE_NAME_HEADER: &str = "X-Source-Name";
pub const SOURCE_CATEGORY_HEADER: &str = "X-Source-Category";
pub const SOURCE_HOST_HEADER: &str = "X-Source-Host";
pub const CLIENT_HEADER: &str = "X-Source-Client";

const SERVICE_UNAVAILABLE: u16 = 503;

/// Descriptive tags attached to every batch as headers.
///
/// Blank values are treated as absent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceTags {
    pub name: Option<String>,
    pub category: Option<String>,
    pub host: Option<String>,
}

impl SourceTags {
    pub fn new(
        name: impl Into<Option<String>>,
        category: impl Into<Option<String>>,
        host: impl Into<Option<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            host: host.into(),
        }
    }
}

/// Configuration for [`MessageSender`].
#[derive(Clone, Debug)]
pub struct SenderConfig {
    /// Collector endpoint. `None` turns every send into a logged no-op.
    pub url: Option<Url>,
    /// Upper bound for a single attempt.
    pub connection_timeout: Duration,
    /// Delay between attempts in [`MessageSender::send`].
    pub retry_interval: Duration,
    /// Sent as the client-identity header when present.
    pub client_name: Option<String>,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            url: None,
            connection_timeout: Duration::from_secs(60),
            retry_interval: Duration::from_secs(10),
            client_name: None,
        }
    }
}

/// Delivers aggregated batches to the collector with an HTTP POST.
///
/// `try_send` makes a single attempt; `send` keeps retrying transient
/// failures every `retry_interval` until [`stop_retrying`](Self::stop_retrying)
/// is called. After [`dispose`](Self::dispose) the
/// transport is released and every send fails with
/// [`SenderError::NotInitialized`] without touching the network.
pub struct MessageSender {
    config: SenderConfig,
    transport: RwLock<Option<Arc<dyn HttpTransport>>>,
    retries_stopped: watch::Sender<bool>,
    log: SharedLog,
}

impl MessageSender {
    pub fn new(config: SenderConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self::with_log(config, transport, log::noop())
    }

    pub fn with_log(
        config: SenderConfig,
        transport: Arc<dyn HttpTransport>,
        log: SharedLog,
    ) -> Self {
        Self {
            config,
            transport: RwLock::new(Some(transport)),
            retries_stopped: watch::channel(false).0,
            log,
        }
    }

    pub fn config(&self) -> &SenderConfig {
        &self.config
    }

    /// Ready for the retrying [`send`](Self::send).
    pub fn can_send(&self) -> bool {
        self.can_try_send() && !self.config.retry_interval.is_zero()
    }

    /// Ready for the single-attempt [`try_send`](Self::try_send).
    pub fn can_try_send(&self) -> bool {
        self.config.url.is_some()
            && !self.config.connection_timeout.is_zero()
            && !self.is_disposed()
    }

    pub fn is_disposed(&self) -> bool {
        self.transport.read().is_none()
    }

    /// Make every `send` give up after its current attempt.
    ///
    /// A send sleeping between attempts wakes up and returns the last
    /// transient error; later sends make a single attempt. An attempt in
    /// flight is not interrupted, so this takes effect within one connection
    /// timeout. Idempotent.
    pub fn stop_retrying(&self) {
        self.retries_stopped.send_replace(true);
    }

    pub fn is_retrying_stopped(&self) -> bool {
        *self.retries_stopped.borrow()
    }

    /// Release the transport. Idempotent.
    pub fn dispose(&self) {
        if self.transport.write().take().is_some() {
            self.log.debug("HTTP sender disposed");
        }
    }

    /// Send `body`, retrying transient failures until one attempt succeeds.
    ///
    /// Non-transient errors abort the loop and are returned. The loop can run
    /// indefinitely while the collector is unavailable, so this is meant to
    /// run from the flush driver, never from a log call site. With a zero
    /// retry interval, or once retrying is stopped, a single attempt is made.
    pub async fn send(&self, body: &str, source: &SourceTags) -> Result<(), SenderError> {
        let mut stopped = self.retries_stopped.subscribe();
        loop {
            let err = match self.try_send(body, source).await {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };
            if !err.is_transient() || self.config.retry_interval.is_zero() || *stopped.borrow() {
                return Err(err);
            }

            if self.log.is_enabled(Level::ERROR) {
                self.log.error(&format!("Error trying to send messages: {}", err));
            }
            tokio::select! {
                _ = tokio::time::sleep(self.config.retry_interval) => {}
                _ = stopped.wait_for(|stopped| *stopped) => {
                    self.log.warn("Retrying stopped, giving up on the current batch");
                    return Err(err);
                }
            }
        }
    }

    /// Single delivery attempt.
    ///
    /// **Returns**
    /// - `Ok(())` when the collector answered with any status other than 503,
    ///   or when no destination URL is configured (logged, nothing sent).
    /// - `Err(..)` transient for 503, timeouts and network failures;
    ///   non-transient for invalid requests and a disposed sender.
    pub async fn try_send(&self, body: &str, source: &SourceTags) -> Result<(), SenderError> {
        let transport = self.transport.read().clone();
        let Some(transport) = transport else {
            self.log.warn("Could not send log to collector: HTTP sender is not initialized");
            return Err(SenderError::NotInitialized);
        };
        let Some(url) = self.config.url.clone() else {
            self.log.warn("Could not send log to collector (no destination URL)");
            return Ok(());
        };
        let timeout = self.config.connection_timeout;
        if timeout.is_zero() {
            self.log.warn("Could not send log to collector: connection timeout is zero");
            return Err(SenderError::NotInitialized);
        }

        let request = OutboundRequest {
            url,
            body: body.to_string(),
            headers: self.headers(source),
        };

        let outcome = match tokio::time::timeout(timeout, transport.post(request)).await {
            Ok(Ok(status)) => Ok(status),
            Ok(Err(err)) => Err(SenderError::from_transport(err, timeout)),
            Err(_elapsed) => Err(SenderError::Timeout(timeout)),
        };

        let status = match outcome {
            Ok(status) => status,
            Err(err) => {
                self.log.warn("Could not send log to collector");
                if self.log.is_enabled(Level::DEBUG) {
                    self.log.debug(&format!("Reason: {}", err));
                }
                return Err(err);
            }
        };

        if !(200..300).contains(&status) {
            if self.log.is_enabled(Level::WARN) {
                self.log.warn(&format!("Received HTTP error from collector: {}", status));
            }
            if status == SERVICE_UNAVAILABLE {
                return Err(SenderError::ServiceUnavailable { status });
            }
        }

        self.log.debug("Successfully sent log request to collector");
        Ok(())
    }

    fn headers(&self, source: &SourceTags) -> Vec<(&'static str, String)> {
        let mut headers = Vec::with_capacity(4);
        let tagged = [
            (SOURCE_NAME_HEADER, &source.name),
            (SOURCE_CATEGORY_HEADER, &source.category),
            (SOURCE_HOST_HEADER, &source.host),
            (CLIENT_HEADER, &self.config.client_name),
        ];
        for (header, value) in tagged {
            if let Some(value) = non_blank(value) {
                headers.push((header, value.to_string()));
            }
        }
        headers
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::log::testing::CapturingLog;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use tokio::time::Instant;

    /// Answers with scripted results, then 200 once the script runs out.
    #[derive(Default)]
    struct ScriptedTransport {
        script: Mutex<VecDeque<Result<u16, TransportError>>>,
        received: Mutex<Vec<(Instant, OutboundRequest)>>,
    }

    impl ScriptedTransport {
        fn with_script(script: impl IntoIterator<Item = Result<u16, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into_iter().collect()),
                received: Mutex::default(),
            })
        }

        fn requests(&self) -> Vec<OutboundRequest> {
            self.received.lock().iter().map(|(_, r)| r.clone()).collect()
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn post(&self, request: OutboundRequest) -> Result<u16, TransportError> {
            self.received.lock().push((Instant::now(), request));
            self.script.lock().pop_front().unwrap_or(Ok(200))
        }
    }

    /// Answers 200 once `delay` has passed.
    struct SlowTransport {
        delay: Duration,
        delivered: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl HttpTransport for SlowTransport {
        async fn post(&self, request: OutboundRequest) -> Result<u16, TransportError> {
            tokio::time::sleep(self.delay).await;
            self.delivered.lock().push(request.body);
            Ok(200)
        }
    }

    /// Never answers.
    struct HangingTransport;

    #[async_trait]
    impl HttpTransport for HangingTransport {
        async fn post(&self, _request: OutboundRequest) -> Result<u16, TransportError> {
            std::future::pending().await
        }
    }

    fn config() -> SenderConfig {
        SenderConfig {
            url: Some(Url::parse("http://collector.test/receiver").unwrap()),
            connection_timeout: Duration::from_secs(5),
            retry_interval: Duration::from_secs(30),
            client_name: Some("shipper-test".to_string()),
        }
    }

    fn tags() -> SourceTags {
        SourceTags::new(
            Some("name".to_string()),
            Some("category".to_string()),
            Some("host".to_string()),
        )
    }

    #[tokio::test]
    async fn successful_send_posts_once_with_body_and_headers() {
        let transport = ScriptedTransport::with_script([]);
        let sender = MessageSender::new(config(), transport.clone());
        assert!(sender.can_send());
        assert!(sender.can_try_send());

        sender.send("ContentBody", &tags()).await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.body, "ContentBody");
        assert_eq!(request.url.as_str(), "http://collector.test/receiver");
        assert_eq!(request.header(SOURCE_NAME_HEADER), Some("name"));
        assert_eq!(request.header(SOURCE_CATEGORY_HEADER), Some("category"));
        assert_eq!(request.header(SOURCE_HOST_HEADER), Some("host"));
        assert_eq!(request.header(CLIENT_HEADER), Some("shipper-test"));
    }

    #[tokio::test]
    async fn blank_tags_are_not_sent() {
        let transport = ScriptedTransport::with_script([]);
        let mut config = config();
        config.client_name = None;
        let sender = MessageSender::new(config, transport.clone());

        let source = SourceTags::new(Some("  ".to_string()), None, Some("host".to_string()));
        sender.try_send("body", &source).await.unwrap();

        let request = &transport.requests()[0];
        assert_eq!(request.headers, vec![(SOURCE_HOST_HEADER, "host".to_string())]);
    }

    #[tokio::test]
    async fn missing_url_is_a_logged_no_op() {
        let transport = ScriptedTransport::with_script([]);
        let log = Arc::new(CapturingLog::default());
        let mut config = config();
        config.url = None;
        let sender = MessageSender::with_log(config, transport.clone(), log.clone());

        assert!(!sender.can_send());
        assert!(!sender.can_try_send());
        assert_eq!(sender.send("body", &tags()).await, Ok(()));
        assert_eq!(sender.try_send("body", &tags()).await, Ok(()));
        assert!(transport.requests().is_empty());
        assert_eq!(log.messages_at(Level::WARN).len(), 2);
    }

    #[tokio::test]
    async fn disposed_sender_does_not_touch_transport() {
        let transport = ScriptedTransport::with_script([]);
        let sender = MessageSender::new(config(), transport.clone());
        sender.dispose();
        sender.dispose();

        assert!(sender.is_disposed());
        assert!(!sender.can_send());
        assert!(!sender.can_try_send());
        assert_eq!(sender.send("body", &tags()).await, Err(SenderError::NotInitialized));
        assert_eq!(sender.try_send("body", &tags()).await, Err(SenderError::NotInitialized));
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn readiness_depends_on_retry_interval_only_for_send() {
        let transport = Arc::new(crate::transport::NoopTransport);
        let mut no_retry = config();
        no_retry.retry_interval = Duration::ZERO;
        let sender = MessageSender::new(no_retry, transport.clone());
        assert!(!sender.can_send());
        assert!(sender.can_try_send());

        let mut no_timeout = config();
        no_timeout.connection_timeout = Duration::ZERO;
        let sender = MessageSender::new(no_timeout, transport);
        assert!(!sender.can_send());
        assert!(!sender.can_try_send());
    }

    #[tokio::test]
    async fn try_send_reports_503_as_transient() {
        let transport = ScriptedTransport::with_script([Ok(503)]);
        let sender = MessageSender::new(config(), transport.clone());

        let err = sender.try_send("body", &tags()).await.unwrap_err();
        assert_eq!(err, SenderError::ServiceUnavailable { status: 503 });
        assert!(err.is_transient());
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn other_error_statuses_are_not_retried() {
        let transport = ScriptedTransport::with_script([Ok(400), Ok(500)]);
        let log = Arc::new(CapturingLog::default());
        let sender = MessageSender::with_log(config(), transport.clone(), log.clone());

        assert_eq!(sender.send("one", &tags()).await, Ok(()));
        assert_eq!(sender.send("two", &tags()).await, Ok(()));
        assert_eq!(transport.requests().len(), 2);
        assert_eq!(
            log.messages_at(Level::WARN),
            vec![
                "Received HTTP error from collector: 400",
                "Received HTTP error from collector: 500"
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn send_retries_until_success_spaced_by_retry_interval() {
        let transport = ScriptedTransport::with_script([
            Ok(503),
            Err(TransportError::Network("connection reset".into())),
            Ok(503),
        ]);
        let log = Arc::new(CapturingLog::default());
        let sender = MessageSender::with_log(config(), transport.clone(), log.clone());

        sender.send("body", &tags()).await.unwrap();

        let received = transport.received.lock();
        assert_eq!(received.len(), 4);
        for pair in received.windows(2) {
            assert!(pair[1].0 - pair[0].0 >= Duration::from_secs(30));
        }
        assert_eq!(log.messages_at(Level::ERROR).len(), 3);
    }

    #[tokio::test]
    async fn send_stops_on_non_transient_error() {
        let transport = ScriptedTransport::with_script([
            Ok(503),
            Err(TransportError::InvalidRequest("bad header value".into())),
        ]);
        let mut config = config();
        config.retry_interval = Duration::from_millis(1);
        let sender = MessageSender::new(config, transport.clone());

        let err = sender.send("body", &tags()).await.unwrap_err();
        assert_eq!(err, SenderError::InvalidRequest("bad header value".into()));
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn zero_retry_interval_makes_a_single_attempt() {
        let transport = ScriptedTransport::with_script([Ok(503), Ok(503)]);
        let mut config = config();
        config.retry_interval = Duration::ZERO;
        let sender = MessageSender::new(config, transport.clone());

        let err = sender.send("body", &tags()).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_retrying_wakes_a_send_sleeping_between_attempts() {
        let transport = ScriptedTransport::with_script([Ok(503), Ok(503), Ok(503)]);
        let log = Arc::new(CapturingLog::default());
        let sender = Arc::new(MessageSender::with_log(config(), transport.clone(), log.clone()));

        let sending = tokio::spawn({
            let sender = Arc::clone(&sender);
            async move { sender.send("body", &tags()).await }
        });
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(transport.requests().len(), 1);

        let stopped_at = Instant::now();
        sender.stop_retrying();
        let result = sending.await.unwrap();

        assert_eq!(result, Err(SenderError::ServiceUnavailable { status: 503 }));
        assert!(Instant::now() - stopped_at < Duration::from_secs(1));
        assert_eq!(transport.requests().len(), 1);
        assert!(sender.is_retrying_stopped());
        assert!(log
            .messages_at(Level::WARN)
            .contains(&"Retrying stopped, giving up on the current batch".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_retrying_lets_the_attempt_in_flight_finish() {
        let transport = Arc::new(SlowTransport {
            delay: Duration::from_secs(2),
            delivered: Mutex::new(Vec::new()),
        });
        let sender = Arc::new(MessageSender::new(config(), transport.clone()));

        let sending = tokio::spawn({
            let sender = Arc::clone(&sender);
            async move { sender.send("slow body", &tags()).await }
        });
        tokio::time::sleep(Duration::from_millis(500)).await;
        sender.stop_retrying();

        assert_eq!(sending.await.unwrap(), Ok(()));
        assert_eq!(*transport.delivered.lock(), vec!["slow body".to_string()]);
    }

    #[tokio::test]
    async fn send_after_stop_retrying_makes_a_single_attempt() {
        let transport = ScriptedTransport::with_script([Ok(503), Ok(503)]);
        let sender = MessageSender::new(config(), transport.clone());
        sender.stop_retrying();
        sender.stop_retrying();

        let err = sender.send("body", &tags()).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_is_bounded_by_connection_timeout() {
        let sender = MessageSender::new(config(), Arc::new(HangingTransport));
        let err = sender.try_send("body", &tags()).await.unwrap_err();
        assert_eq!(err, SenderError::Timeout(Duration::from_secs(5)));
        assert!(err.is_transient());
    }
}
