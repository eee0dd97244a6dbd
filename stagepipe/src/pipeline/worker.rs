//! Stage worker: a pool of executors running one stage.

use super::{BoundedQueue, StageOptions};
use crate::cancellation::CancellationToken;
use crate::errors::{PipelineError, QueueSide};
use crate::events::{event_types, EventSink, NoOpEventSink};
use crate::stages::Stage;
use async_channel::{Receiver, Sender};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

/// Runs one stage with a fixed number of parallel executors.
///
/// The worker consumes from an input queue it does not own and produces into
/// an output queue that only the pipeline's stop sequence closes.
pub struct StageWorker<M>
where
    M: Send + 'static,
{
    stage: Arc<dyn Stage<M>>,
    input: Option<BoundedQueue<M>>,
    output: Option<BoundedQueue<M>>,
    parallelism: usize,
    sink: Arc<dyn EventSink>,
    pipeline_id: Option<Uuid>,
    started: AtomicBool,
    running: Arc<AtomicUsize>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl<M> StageWorker<M>
where
    M: Send + 'static,
{
    /// Creates an unwired worker.
    ///
    /// `options` of `None`, or with `parallel` of zero, yields one executor.
    #[must_use]
    pub fn new(stage: Arc<dyn Stage<M>>, options: Option<StageOptions>) -> Self {
        Self {
            stage,
            input: None,
            output: None,
            parallelism: StageOptions::resolve(options),
            sink: Arc::new(NoOpEventSink),
            pipeline_id: None,
            started: AtomicBool::new(false),
            running: Arc::new(AtomicUsize::new(0)),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Sets the queue this worker consumes from.
    #[must_use]
    pub fn with_input(mut self, input: BoundedQueue<M>) -> Self {
        self.input = Some(input);
        self
    }

    /// Sets the queue this worker produces into.
    #[must_use]
    pub fn with_output(mut self, output: BoundedQueue<M>) -> Self {
        self.output = Some(output);
        self
    }

    /// Sets the sink receiving failure, cancellation and lifecycle events.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Tags emitted events with the owning pipeline.
    #[must_use]
    pub fn with_pipeline_id(mut self, id: Uuid) -> Self {
        self.pipeline_id = Some(id);
        self
    }

    /// Returns the stage name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.stage.name()
    }

    /// Returns the number of executors `start` launches.
    #[must_use]
    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Returns the input queue, if wired.
    #[must_use]
    pub fn input_queue(&self) -> Option<&BoundedQueue<M>> {
        self.input.as_ref()
    }

    /// Returns the output queue, if wired.
    #[must_use]
    pub fn output_queue(&self) -> Option<&BoundedQueue<M>> {
        self.output.as_ref()
    }

    /// Returns true once `start` has succeeded.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Returns the number of executors that have not exited yet.
    #[must_use]
    pub fn running_executors(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Launches the executors.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NotWired`] if either queue is missing and
    /// [`PipelineError::WorkerAlreadyStarted`] on a second call.
    pub fn start(&self, token: Arc<CancellationToken>) -> Result<(), PipelineError> {
        let (Some(input), Some(output)) = (&self.input, &self.output) else {
            let side = if self.input.is_none() {
                QueueSide::Input
            } else {
                QueueSide::Output
            };
            return Err(PipelineError::not_wired(self.name(), side));
        };

        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(PipelineError::worker_already_started(self.name()));
        }

        let mut handles = self.handles.lock();
        for index in 0..self.parallelism {
            let executor = Executor {
                index,
                stage: self.stage.clone(),
                input: input.receiver(),
                output: output.sender(),
                token: token.clone(),
                sink: self.sink.clone(),
                pipeline_id: self.pipeline_id,
            };
            self.running.fetch_add(1, Ordering::SeqCst);
            let guard = RunningGuard(self.running.clone());
            handles.push(tokio::spawn(async move {
                let _guard = guard;
                executor.run().await;
            }));
        }
        drop(handles);

        debug!(stage = %self.name(), parallelism = self.parallelism, "Stage worker started");
        self.sink.try_emit(
            event_types::WORKER_STARTED,
            Some(self.event_data(json!({ "parallelism": self.parallelism }))),
        );
        Ok(())
    }

    /// Waits until every executor has exited.
    ///
    /// Executors exit once the input queue is closed and drained, on
    /// cancellation, or when their transform fails.
    pub async fn wait_stop(&self) {
        let handles: Vec<_> = std::mem::take(&mut *self.handles.lock());
        if handles.is_empty() {
            return;
        }

        for (index, result) in futures::future::join_all(handles)
            .await
            .into_iter()
            .enumerate()
        {
            if let Err(join_error) = result {
                warn!(stage = %self.name(), executor = index, error = %join_error, "Executor aborted");
                self.sink
                    .emit(
                        event_types::EXECUTOR_FAILED,
                        Some(self.event_data(json!({
                            "executor": index,
                            "error": join_error.to_string(),
                        }))),
                    )
                    .await;
            }
        }

        debug!(stage = %self.name(), "Stage worker stopped");
        self.sink
            .emit(event_types::WORKER_STOPPED, Some(self.event_data(json!({}))))
            .await;
    }

    fn event_data(&self, extra: serde_json::Value) -> serde_json::Value {
        let mut data = json!({
            "stage": self.name(),
            "pipeline_id": self.pipeline_id.map(|id| id.to_string()),
        });
        if let (Some(map), serde_json::Value::Object(extra)) = (data.as_object_mut(), extra) {
            map.extend(extra);
        }
        data
    }
}

impl<M> std::fmt::Debug for StageWorker<M>
where
    M: Send + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageWorker")
            .field("stage", &self.name())
            .field("parallelism", &self.parallelism)
            .field("started", &self.is_started())
            .field("running_executors", &self.running_executors())
            .finish()
    }
}

/// Decrements the running count when an executor exits, panics included.
struct RunningGuard(Arc<AtomicUsize>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// One executor slot of a worker.
struct Executor<M>
where
    M: Send + 'static,
{
    index: usize,
    stage: Arc<dyn Stage<M>>,
    input: Receiver<M>,
    output: Sender<M>,
    token: Arc<CancellationToken>,
    sink: Arc<dyn EventSink>,
    pipeline_id: Option<Uuid>,
}

impl<M> Executor<M>
where
    M: Send + 'static,
{
    async fn run(self) {
        loop {
            let message = tokio::select! {
                biased;
                () = self.token.cancelled() => {
                    self.report_cancelled(false).await;
                    return;
                }
                received = self.input.recv() => match received {
                    Ok(message) => message,
                    Err(_) => break,
                },
            };

            // The receive may have raced a cancel; nothing starts after it.
            if self.token.is_cancelled() {
                self.report_cancelled(true).await;
                return;
            }

            let outputs = match self.stage.process(message).await {
                Ok(outputs) => outputs,
                Err(err) => {
                    self.report_failed(&err).await;
                    return;
                }
            };

            if !self.forward(outputs).await {
                return;
            }
        }

        debug!(stage = %self.stage.name(), executor = self.index, "Input closed, executor exiting");
    }

    /// Pushes one item's outputs in order. Returns false if the executor must stop.
    async fn forward(&self, outputs: Vec<M>) -> bool {
        let total = outputs.len();
        for (sent, item) in outputs.into_iter().enumerate() {
            tokio::select! {
                biased;
                result = self.output.send(item) => {
                    if result.is_err() {
                        warn!(stage = %self.stage.name(), executor = self.index, "Output queue closed while sending");
                        self.report(event_types::EXECUTOR_SEND_FAILED, json!({ "dropped": total - sent })).await;
                        return false;
                    }
                }
                () = self.token.cancelled() => {
                    debug!(stage = %self.stage.name(), executor = self.index, "Cancelled while waiting on a full output queue");
                    self.report(event_types::EXECUTOR_SEND_ABANDONED, json!({ "dropped": total - sent })).await;
                    return false;
                }
            }
        }
        true
    }

    async fn report_cancelled(&self, discarded: bool) {
        debug!(stage = %self.stage.name(), executor = self.index, "Process cancelled");
        self.report(
            event_types::EXECUTOR_CANCELLED,
            json!({
                "reason": self.token.reason(),
                "discarded_item": discarded,
            }),
        )
        .await;
    }

    async fn report_failed(&self, err: &anyhow::Error) {
        warn!(stage = %self.stage.name(), executor = self.index, error = %err, "Process error");
        self.report(event_types::EXECUTOR_FAILED, json!({ "error": format!("{err:#}") }))
            .await;
    }

    async fn report(&self, event_type: &str, extra: serde_json::Value) {
        let mut data = json!({
            "stage": self.stage.name(),
            "executor": self.index,
            "pipeline_id": self.pipeline_id.map(|id| id.to_string()),
        });
        if let (Some(map), serde_json::Value::Object(extra)) = (data.as_object_mut(), extra) {
            map.extend(extra);
        }
        self.sink.emit(event_type, Some(data)).await;
    }
}
