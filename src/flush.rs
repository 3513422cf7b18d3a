use crate::buffer::EvictingBuffer;
use crate::error::SenderError;
use crate::log::{self, SharedLog};
use crate::sender::{MessageSender, SourceTags};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::Level;

/// Destination for aggregated batches.
///
/// `send_out` completes only once delivery succeeded or was given up on
/// (including any retry loop of the underlying sender).
#[async_trait]
pub trait BatchSink<M>: Send + Sync {
    async fn send_out(&self, body: M, source: &SourceTags) -> Result<(), SenderError>;
}

/// Combines drained items into one outbound message.
pub type Aggregator<T, M> = Box<dyn Fn(Vec<T>) -> M + Send + Sync>;

/// Concatenates lines in drained order. Lines are expected to carry their
/// own terminators.
pub fn concat_aggregator(messages: Vec<String>) -> String {
    let mut body = String::with_capacity(messages.iter().map(String::len).sum());
    for message in &messages {
        body.push_str(message);
    }
    body
}

/// [`BatchSink`] delivering through the retrying [`MessageSender::send`].
///
/// A batch that reaches a sender which cannot send is logged and discarded,
/// reported as [`SenderError::NotInitialized`].
pub struct MessageSenderSink {
    sender: Arc<MessageSender>,
    log: SharedLog,
}

impl MessageSenderSink {
    pub fn new(sender: Arc<MessageSender>, log: SharedLog) -> Self {
        Self { sender, log }
    }
}

#[async_trait]
impl BatchSink<String> for MessageSenderSink {
    async fn send_out(&self, body: String, source: &SourceTags) -> Result<(), SenderError> {
        if !self.sender.can_send() {
            self.log.error("HTTP sender is not initialized");
            return Err(SenderError::NotInitialized);
        }
        self.sender.send(&body, source).await
    }
}

/// Thresholds deciding when buffered items are flushed.
#[derive(Clone, Debug)]
pub struct FlushPolicy {
    /// Flush as soon as this many items are buffered.
    pub messages_per_request: usize,
    /// Flush at least this often, whatever the count.
    pub max_flush_interval: Duration,
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self {
            messages_per_request: 100,
            max_flush_interval: Duration::from_secs(10),
        }
    }
}

/// Periodic job that drains a buffer, aggregates the drained items into one
/// message and hands it to a [`BatchSink`].
///
/// The task is idle or flushing. [`run`](Self::run) is single-flight: a call
/// that arrives while another run is flushing does not flush concurrently,
/// it requests a forced flush which the in-progress run performs before
/// going idle.
pub struct BufferFlushingTask<T, M> {
    buffer: Arc<dyn EvictingBuffer<T>>,
    aggregate: Aggregator<T, M>,
    sink: Arc<dyn BatchSink<M>>,
    source: SourceTags,
    policy: FlushPolicy,
    last_flushed_on: Mutex<Instant>,
    flushing: AtomicBool,
    force_flush: AtomicBool,
    log: SharedLog,
}

impl<T, M> BufferFlushingTask<T, M>
where
    T: Send + 'static,
    M: Send + 'static,
{
    pub fn new(
        buffer: Arc<dyn EvictingBuffer<T>>,
        aggregate: Aggregator<T, M>,
        sink: Arc<dyn BatchSink<M>>,
        source: SourceTags,
        policy: FlushPolicy,
    ) -> Self {
        Self {
            buffer,
            aggregate,
            sink,
            source,
            policy,
            last_flushed_on: Mutex::new(Instant::now()),
            flushing: AtomicBool::new(false),
            force_flush: AtomicBool::new(false),
            log: log::noop(),
        }
    }

    #[must_use]
    pub fn with_log(mut self, log: SharedLog) -> Self {
        self.log = log;
        self
    }

    pub fn policy(&self) -> &FlushPolicy {
        &self.policy
    }

    pub fn is_flushing(&self) -> bool {
        self.flushing.load(Ordering::Acquire)
    }

    /// Force the next [`run`](Self::run) to flush regardless of thresholds.
    pub fn request_flush(&self) {
        self.force_flush.store(true, Ordering::Release);
    }

    /// Size threshold reached, time threshold elapsed, or a flush was forced.
    pub fn needs_flushing(&self) -> bool {
        self.buffer.len() >= self.policy.messages_per_request
            || self.last_flushed_on.lock().elapsed() >= self.policy.max_flush_interval
            || self.force_flush.load(Ordering::Acquire)
    }

    /// One scheduled flushing check.
    ///
    /// Errors from the send path are logged and swallowed so the periodic
    /// driver keeps its cadence.
    pub async fn run(&self) {
        if self.flushing.swap(true, Ordering::AcqRel) {
            self.request_flush();
            return;
        }
        let _flushing = FlushingGuard(&self.flushing);

        loop {
            let forced = self.force_flush.swap(false, Ordering::AcqRel);
            if !forced && !self.needs_flushing() {
                break;
            }
            if let Err(err) = self.flush_and_send().await {
                if self.log.is_enabled(Level::WARN) {
                    self.log.warn(&format!(
                        "Exception while attempting to flush and send: {}",
                        err
                    ));
                }
            }
            if !self.force_flush.load(Ordering::Acquire) {
                break;
            }
        }
    }

    /// Drain, aggregate and send everything buffered right now, waiting for
    /// the sink to finish. Used directly for flush-on-shutdown.
    ///
    /// The flush timestamp is updated whatever the outcome, so a failing
    /// sink does not turn the time threshold into a tight loop. A failed
    /// batch is not re-buffered.
    pub async fn flush_and_send(&self) -> Result<usize, SenderError> {
        let mut messages = Vec::new();
        let count = self.buffer.drain_to(&mut messages);

        let result = if count > 0 {
            if self.log.is_enabled(Level::DEBUG) {
                self.log.debug(&format!(
                    "Flushing and sending out {} messages ({} messages left)",
                    count,
                    self.buffer.len()
                ));
            }
            let body = (self.aggregate)(messages);
            let sent = self.sink.send_out(body, &self.source).await;
            if sent.is_err() && self.log.is_enabled(Level::WARN) {
                self.log.warn(&format!("Discarded {} messages that could not be sent", count));
            }
            sent.map(|()| count)
        } else {
            Ok(0)
        };

        *self.last_flushed_on.lock() = Instant::now();
        result
    }
}

struct FlushingGuard<'a>(&'a AtomicBool);

impl Drop for FlushingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
