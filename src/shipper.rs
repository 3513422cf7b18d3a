use crate::buffer::{EvictingBuffer, FifoEvictionBuffer};
use crate::config::ShipperConfig;
use crate::cost::StringLengthCostAssigner;
use crate::error::{ConfigError, SenderError};
use crate::flush::{concat_aggregator, BufferFlushingTask, MessageSenderSink};
use crate::log::SharedLog;
use crate::scheduler::FlushScheduler;
use crate::sender::MessageSender;
use crate::transport::HttpTransport;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::Level;

/// Buffered log shipper: accepts text lines from any thread and delivers them
/// to an HTTP collector in batches from a background tokio task.
///
/// `add` never blocks on the network. When the collector cannot keep up the
/// buffer evicts the oldest lines.
///
/// ```no_run
/// use log_shipper::{LogShipper, ShipperConfig, TracingLog};
/// use std::sync::Arc;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ShipperConfig::with_url("https://collector.example.com/receiver");
/// let shipper = LogShipper::start_with_reqwest(config, Arc::new(TracingLog))?;
///
/// shipper.add("service started\n");
///
/// shipper.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct LogShipper {
    sender: Arc<MessageSender>,
    buffer: Arc<FifoEvictionBuffer<String>>,
    task: Arc<BufferFlushingTask<String, String>>,
    scheduler: Mutex<Option<FlushScheduler>>,
    /// `true` until shutdown. `add` holds the read side across its
    /// check-and-enqueue, so no line lands after the final drain.
    accepting: RwLock<bool>,
    log: SharedLog,
}

impl LogShipper {
    /// Validate `config`, wire the pipeline and start the flush scheduler.
    ///
    /// Fails with [`ConfigError::NoRuntime`] outside a tokio runtime.
    pub fn start(
        config: ShipperConfig,
        transport: Arc<dyn HttpTransport>,
        log: SharedLog,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let sender = Arc::new(MessageSender::with_log(
            config.sender_config()?,
            transport,
            log.clone(),
        ));

        let buffer = Arc::new(FifoEvictionBuffer::with_log(
            config.max_queue_size_bytes,
            Arc::new(StringLengthCostAssigner),
            log.clone(),
        )?);

        let task = Arc::new(
            BufferFlushingTask::new(
                buffer.clone(),
                Box::new(concat_aggregator),
                Arc::new(MessageSenderSink::new(sender.clone(), log.clone())),
                config.source_tags(),
                config.flush_policy(),
            )
            .with_log(log.clone()),
        );

        let scheduler = FlushScheduler::start(task.clone(), config.flushing_accuracy)?;

        if log.is_enabled(Level::DEBUG) {
            log.debug(&format!(
                "Log shipper started: capacity {} bytes, {} messages per request, period {:?}",
                config.max_queue_size_bytes, config.messages_per_request, config.flushing_accuracy
            ));
        }

        Ok(Self {
            sender,
            buffer,
            task,
            scheduler: Mutex::new(Some(scheduler)),
            accepting: RwLock::new(true),
            log,
        })
    }

    /// [`start`](Self::start) with a [`ReqwestTransport`](crate::transport::ReqwestTransport)
    /// whose timeouts follow `config.connection_timeout`.
    #[cfg(feature = "reqwest-transport")]
    pub fn start_with_reqwest(config: ShipperConfig, log: SharedLog) -> Result<Self, ConfigError> {
        config.validate()?;
        let transport = crate::transport::ReqwestTransport::new(config.connection_timeout)?;
        Self::start(config, Arc::new(transport), log)
    }

    /// Buffer one line for delivery.
    ///
    /// Returns `false` when the line was dropped: the shipper is shut down,
    /// the sender cannot send, or the line alone exceeds the buffer capacity.
    pub fn add(&self, line: impl Into<String>) -> bool {
        let accepting = self.accepting.read();
        if !*accepting || !self.sender.can_send() {
            self.log.warn("Sender not initialized. Dropping log entry");
            return false;
        }
        self.buffer.add(line.into())
    }

    /// Flush everything buffered now and wait for delivery, retries included.
    ///
    /// Returns the number of lines delivered. A batch that could not be
    /// delivered is discarded and reported as an error, e.g.
    /// [`SenderError::NotInitialized`] once the sender is disposed.
    pub async fn flush(&self) -> Result<usize, SenderError> {
        self.task.flush_and_send().await
    }

    /// Stop accepting lines, let the flush in progress finish, flush what is
    /// left, then release the transport.
    ///
    /// Retrying is stopped first, so every delivery still pending gets at
    /// most its current attempt plus one more, each bounded by the connection
    /// timeout. Batches that fail are discarded with a warning giving their
    /// size. Errors are logged, never returned. Safe to call more than once.
    pub async fn shutdown(&self) {
        {
            let mut accepting = self.accepting.write();
            if !*accepting {
                return;
            }
            *accepting = false;
        }

        self.sender.stop_retrying();
        let scheduler = self.scheduler.lock().take();
        if let Some(mut scheduler) = scheduler {
            scheduler.stop().await;
        }

        match self.task.flush_and_send().await {
            Ok(count) => {
                if count > 0 && self.log.is_enabled(Level::DEBUG) {
                    self.log.debug(&format!("Flushed {} messages on shutdown", count));
                }
            }
            Err(err) => {
                if self.log.is_enabled(Level::WARN) {
                    self.log.warn(&format!("Final flush failed on shutdown: {}", err));
                }
            }
        }

        self.sender.dispose();
    }

    pub fn is_shut_down(&self) -> bool {
        !*self.accepting.read()
    }

    /// Resize the buffer. Lines already buffered are kept.
    pub fn set_capacity(&self, capacity: u64) -> Result<(), ConfigError> {
        self.buffer.set_capacity(capacity)
    }

    pub fn buffered_count(&self) -> usize {
        self.buffer.len()
    }

    pub fn sender(&self) -> &Arc<MessageSender> {
        &self.sender
    }

    pub fn buffer(&self) -> &Arc<FifoEvictionBuffer<String>> {
        &self.buffer
    }
}
