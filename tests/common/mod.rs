//! Shared helpers for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use log_shipper::{HttpTransport, OutboundRequest, ShipperConfig, TransportError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// In-memory collector: records every request and answers with scripted
/// status codes, then with `fallback` once the script is exhausted.
///
/// A `delay` holds each request that long before it is recorded and answered.
pub struct RecordingTransport {
    script: Mutex<VecDeque<u16>>,
    fallback: u16,
    delay: Duration,
    requests: Mutex<Vec<OutboundRequest>>,
}

impl RecordingTransport {
    pub fn ok() -> Arc<Self> {
        Self::scripted([], 200)
    }

    pub fn scripted(script: impl IntoIterator<Item = u16>, fallback: u16) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback,
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Answers 200 to every request after `delay`.
    pub fn delayed(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            fallback: 200,
            delay,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().clone()
    }

    pub fn bodies(&self) -> Vec<String> {
        self.requests.lock().iter().map(|r| r.body.clone()).collect()
    }
}

#[async_trait]
impl HttpTransport for RecordingTransport {
    async fn post(&self, request: OutboundRequest) -> Result<u16, TransportError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.requests.lock().push(request);
        Ok(self.script.lock().pop_front().unwrap_or(self.fallback))
    }
}

/// A config pointing at a dummy collector, with a long time threshold so
/// that only the size threshold triggers flushes unless a test lowers it.
pub fn test_config() -> ShipperConfig {
    let mut config = ShipperConfig::with_url("http://collector.test/receiver");
    config.max_flush_interval = Duration::from_secs(3600);
    config.flushing_accuracy = Duration::from_millis(100);
    config.retry_interval = Duration::from_secs(1);
    config.connection_timeout = Duration::from_secs(5);
    config.source_host = Some("test-host".to_string());
    config
}
