//! Buffered shipping of text log lines to an HTTP collector.
//!
//! Lines go into a cost-bounded buffer that evicts the oldest entries when
//! full. A periodic task drains the buffer when enough lines are waiting or
//! enough time has passed, concatenates them and POSTs the batch through a
//! retrying sender. [`LogShipper`] wires the pieces together and owns their
//! lifecycle.

pub mod cost;
pub mod queue;
pub mod buffer;
pub mod log;

pub mod transport;
pub mod sender;
pub mod flush;
pub mod scheduler;

pub mod config;
pub mod env;
pub mod error;
pub mod shipper;

pub use buffer::{EvictingBuffer, FifoEvictionBuffer};
pub use config::ShipperConfig;
pub use cost::{CostAssigner, StringLengthCostAssigner};
pub use error::{ConfigError, SenderError, TransportError};
pub use flush::{BatchSink, BufferFlushingTask, FlushPolicy, MessageSenderSink};
pub use log::{ConsoleLog, DiagnosticLog, NoopLog, SharedLog, TracingLog};
pub use scheduler::FlushScheduler;
pub use sender::{MessageSender, SenderConfig, SourceTags};
pub use shipper::LogShipper;
pub use transport::{HttpTransport, NoopTransport, OutboundRequest};

#[cfg(feature = "reqwest-transport")]
pub use transport::ReqwestTransport;
