use chrono::Utc;
use std::sync::Arc;
use tracing::Level;

/// `tracing` target used by [`TracingLog`].
pub const TRACING_TARGET: &str = "log_shipper";

/// Minimal leveled log used for the shipper's own diagnostics.
///
/// The pipeline never reports delivery problems by panicking or returning
/// errors to log call sites; it reports them here instead. Callers that
/// build expensive messages should check [`is_enabled`](Self::is_enabled)
/// first.
pub trait DiagnosticLog: Send + Sync {
    fn is_enabled(&self, level: Level) -> bool;

    fn log(&self, level: Level, message: &str);

    fn trace(&self, message: &str) {
        self.emit(Level::TRACE, message);
    }

    fn debug(&self, message: &str) {
        self.emit(Level::DEBUG, message);
    }

    fn info(&self, message: &str) {
        self.emit(Level::INFO, message);
    }

    fn warn(&self, message: &str) {
        self.emit(Level::WARN, message);
    }

    fn error(&self, message: &str) {
        self.emit(Level::ERROR, message);
    }

    #[doc(hidden)]
    fn emit(&self, level: Level, message: &str) {
        if self.is_enabled(level) {
            self.log(level, message);
        }
    }
}

/// Shared handle passed through the pipeline.
pub type SharedLog = Arc<dyn DiagnosticLog>;

/// The default log: everything is disabled.
pub fn noop() -> SharedLog {
    Arc::new(NoopLog)
}

/// A log that drops all messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLog;

impl DiagnosticLog for NoopLog {
    fn is_enabled(&self, _level: Level) -> bool {
        false
    }

    fn log(&self, _level: Level, _message: &str) {}
}

/// Writes `<timestamp> <LEVEL>: <message>` lines to stdout.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleLog {
    min_level: Level,
}

impl ConsoleLog {
    pub fn new(min_level: Level) -> Self {
        Self { min_level }
    }
}

impl Default for ConsoleLog {
    fn default() -> Self {
        Self::new(Level::TRACE)
    }
}

impl DiagnosticLog for ConsoleLog {
    fn is_enabled(&self, level: Level) -> bool {
        // `tracing::Level` orders TRACE as the greatest (most verbose).
        level <= self.min_level
    }

    fn log(&self, level: Level, message: &str) {
        println!(
            "{} {:>5}: {}",
            Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            level,
            message
        );
    }
}

/// Forwards diagnostics into the application's `tracing` subscriber under
/// the [`TRACING_TARGET`] target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

impl DiagnosticLog for TracingLog {
    fn is_enabled(&self, level: Level) -> bool {
        match level {
            Level::TRACE => tracing::enabled!(target: TRACING_TARGET, Level::TRACE),
            Level::DEBUG => tracing::enabled!(target: TRACING_TARGET, Level::DEBUG),
            Level::INFO => tracing::enabled!(target: TRACING_TARGET, Level::INFO),
            Level::WARN => tracing::enabled!(target: TRACING_TARGET, Level::WARN),
            _ => tracing::enabled!(target: TRACING_TARGET, Level::ERROR),
        }
    }

    fn log(&self, level: Level, message: &str) {
        match level {
            Level::TRACE => tracing::trace!(target: TRACING_TARGET, "{}", message),
            Level::DEBUG => tracing::debug!(target: TRACING_TARGET, "{}", message),
            Level::INFO => tracing::info!(target: TRACING_TARGET, "{}", message),
            Level::WARN => tracing::warn!(target: TRACING_TARGET, "{}", message),
            _ => tracing::error!(target: TRACING_TARGET, "{}", message),
        }
    }
}
