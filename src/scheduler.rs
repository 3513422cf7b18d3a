use crate::error::ConfigError;
use crate::flush::BufferFlushingTask;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, MissedTickBehavior};

/// Shortest period accepted by [`FlushScheduler::start`].
pub const MIN_FLUSH_PERIOD: Duration = Duration::from_millis(10);

/// Periodic driver for a [`BufferFlushingTask`].
///
/// One background tokio task ticks every `period` and awaits
/// [`BufferFlushingTask::run`] on each tick. A tick that comes due while a
/// run is still in progress is delayed rather than queued, so fires never
/// pile up behind a slow collector.
///
/// The scheduler is owned explicitly: [`stop`](Self::stop) ends the driver
/// and waits for it, and dropping the scheduler signals it to exit. Either
/// way a run in progress is allowed to finish.
pub struct FlushScheduler {
    stop_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl FlushScheduler {
    /// Spawn the driver on the current tokio runtime.
    ///
    /// The first tick fires immediately. Periods below [`MIN_FLUSH_PERIOD`]
    /// are clamped up to it. Fails with [`ConfigError::NoRuntime`] when
    /// called outside a runtime.
    pub fn start<T, M>(
        task: Arc<BufferFlushingTask<T, M>>,
        period: Duration,
    ) -> Result<Self, ConfigError>
    where
        T: Send + 'static,
        M: Send + 'static,
    {
        let runtime = Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;
        let period = period.max(MIN_FLUSH_PERIOD);
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let handle = runtime.spawn(async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {}
                }
                task.run().await;
            }
        });

        Ok(Self {
            stop_tx,
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Signal the driver to exit and wait until it has.
    ///
    /// No new run starts after this call; a run in progress completes first,
    /// including its sender's retries unless they were stopped with
    /// [`MessageSender::stop_retrying`](crate::sender::MessageSender::stop_retrying).
    /// Calling `stop` again is a no-op.
    pub async fn stop(&mut self) {
        let _ = self.stop_tx.send(true);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for FlushScheduler {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(true);
    }
}
