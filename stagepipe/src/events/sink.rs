//! Event sink trait and implementations.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn, Level};

use super::event_types;

/// An event as recorded by [`CollectingEventSink`]: its type and payload.
pub type RecordedEvent = (String, Option<Value>);

/// Receiver for everything the engine reports out-of-band.
///
/// Lifecycle transitions, transform failures and cancellations all arrive
/// here. Executors and workers call `try_emit` from synchronous paths and
/// `emit` where they are already awaiting.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event.
    async fn emit(&self, event_type: &str, data: Option<Value>);

    /// Emits an event without awaiting. Must not panic.
    fn try_emit(&self, event_type: &str, data: Option<Value>);
}

/// Discards every event. The pipeline default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event_type: &str, _data: Option<Value>) {}

    fn try_emit(&self, _event_type: &str, _data: Option<Value>) {}
}

/// Forwards pipeline events to `tracing`, at a severity chosen per event type.
///
/// Item losses (`executor.failed`, `executor.send_failed`) log at `WARN`,
/// cancellations at `INFO` and lifecycle transitions at `DEBUG`. The
/// `pipeline_id` and `stage` payload fields become structured fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingEventSink;

impl LoggingEventSink {
    /// Creates a logging sink.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Returns the level an event of this type is logged at.
    #[must_use]
    pub fn level_for(event_type: &str) -> Level {
        match event_type {
            event_types::EXECUTOR_FAILED | event_types::EXECUTOR_SEND_FAILED => Level::WARN,
            event_types::EXECUTOR_CANCELLED
            | event_types::EXECUTOR_SEND_ABANDONED
            | event_types::PIPELINE_CANCELLED => Level::INFO,
            _ => Level::DEBUG,
        }
    }

    fn log(event_type: &str, data: Option<&Value>) {
        let field = |key: &str| {
            data.and_then(|d| d.get(key))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let pipeline_id = field("pipeline_id");
        let stage = field("stage");

        match Self::level_for(event_type) {
            Level::WARN => {
                warn!(event = %event_type, pipeline_id = %pipeline_id, stage = %stage, data = ?data, "Pipeline event");
            }
            Level::INFO => {
                info!(event = %event_type, pipeline_id = %pipeline_id, stage = %stage, data = ?data, "Pipeline event");
            }
            _ => {
                debug!(event = %event_type, pipeline_id = %pipeline_id, stage = %stage, data = ?data, "Pipeline event");
            }
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        Self::log(event_type, data.as_ref());
    }

    fn try_emit(&self, event_type: &str, data: Option<Value>) {
        Self::log(event_type, data.as_ref());
    }
}

/// Keeps every event in arrival order, for assertions in tests.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: Mutex<Vec<RecordedEvent>>,
}

impl CollectingEventSink {
    /// Creates an empty collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all events so far.
    #[must_use]
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().clone()
    }

    /// Returns true if nothing has been emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Returns the events whose type starts with `type_prefix`.
    #[must_use]
    pub fn events_of_type(&self, type_prefix: &str) -> Vec<RecordedEvent> {
        self.events
            .lock()
            .iter()
            .filter(|(event_type, _)| event_type.starts_with(type_prefix))
            .cloned()
            .collect()
    }

    /// Returns the payloads of events with exactly this type.
    #[must_use]
    pub fn payloads(&self, event_type: &str) -> Vec<Value> {
        self.events
            .lock()
            .iter()
            .filter(|(t, _)| t == event_type)
            .filter_map(|(_, data)| data.clone())
            .collect()
    }

    /// Returns how many events of exactly this type were emitted.
    #[must_use]
    pub fn count(&self, event_type: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|(t, _)| t == event_type)
            .count()
    }

    fn record(&self, event_type: &str, data: Option<Value>) {
        self.events.lock().push((event_type.to_owned(), data));
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        self.record(event_type, data);
    }

    fn try_emit(&self, event_type: &str, data: Option<Value>) {
        self.record(event_type, data);
    }
}
