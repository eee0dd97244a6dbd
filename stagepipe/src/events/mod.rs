//! Event sink system for out-of-band reporting.
//!
//! Executors never return errors through the queues. Transform failures,
//! cancellations and lifecycle transitions are reported to the sink injected
//! into the pipeline instead.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, RecordedEvent};

/// Event type names emitted by the engine.
pub mod event_types {
    /// All workers were started.
    pub const PIPELINE_STARTED: &str = "pipeline.started";
    /// The stop sequence finished and the final output was closed.
    pub const PIPELINE_STOPPED: &str = "pipeline.stopped";
    /// The token shared by a started pipeline was cancelled.
    pub const PIPELINE_CANCELLED: &str = "pipeline.cancelled";
    /// A worker launched its executors.
    pub const WORKER_STARTED: &str = "worker.started";
    /// Every executor of a worker exited.
    pub const WORKER_STOPPED: &str = "worker.stopped";
    /// An executor observed cancellation and stopped pulling items.
    pub const EXECUTOR_CANCELLED: &str = "executor.cancelled";
    /// A transform failed; the executor terminated and the item was dropped.
    pub const EXECUTOR_FAILED: &str = "executor.failed";
    /// Cancellation fired while outputs were waiting on a full queue.
    pub const EXECUTOR_SEND_ABANDONED: &str = "executor.send_abandoned";
    /// An output was pushed to a closed queue.
    pub const EXECUTOR_SEND_FAILED: &str = "executor.send_failed";
}
