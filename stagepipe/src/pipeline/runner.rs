//! The pipeline: stage workers chained by shared bounded queues.

use super::{BoundedQueue, PipelineConfig, StageOptions, StageWorker};
use crate::cancellation::CancellationToken;
use crate::errors::PipelineError;
use crate::events::{event_types, EventSink, NoOpEventSink};
use crate::stages::Stage;
use async_channel::{Receiver, Sender};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// A linear chain of stage workers.
///
/// Each worker's output queue is the next worker's input queue. Stages are
/// added before [`Pipeline::start`]; afterwards the topology is fixed.
pub struct Pipeline<M>
where
    M: Send + 'static,
{
    id: Uuid,
    config: PipelineConfig,
    workers: Vec<StageWorker<M>>,
    sink: Arc<dyn EventSink>,
    started: bool,
}

impl<M> Pipeline<M>
where
    M: Send + 'static,
{
    /// Creates an empty pipeline with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            config: PipelineConfig::default(),
            workers: Vec::new(),
            sink: Arc::new(NoOpEventSink),
            started: false,
        }
    }

    /// Sets the configuration. Applies to stages added afterwards.
    #[must_use]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the sink receiving events from the pipeline and all its workers.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Returns the pipeline identifier attached to every event.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.workers.len()
    }

    /// Returns the workers in stage order.
    #[must_use]
    pub fn workers(&self) -> &[StageWorker<M>] {
        &self.workers
    }

    /// Returns true once `start` has been called.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Appends a stage.
    ///
    /// `options` of `None`, or with `parallel` of zero, runs one executor.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::AlreadyStarted`] once the pipeline has been started.
    pub fn add_stage<S>(&mut self, stage: S, options: Option<StageOptions>) -> Result<(), PipelineError>
    where
        S: Stage<M> + 'static,
    {
        self.add_shared_stage(Arc::new(stage), options)
    }

    /// Appends a stage the caller keeps a handle to.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::AlreadyStarted`] once the pipeline has been started.
    pub fn add_shared_stage(
        &mut self,
        stage: Arc<dyn Stage<M>>,
        options: Option<StageOptions>,
    ) -> Result<(), PipelineError> {
        if self.started {
            return Err(PipelineError::already_started(stage.name()));
        }

        let capacity = self.config.effective_buffer_size();
        let input = match self.workers.last().and_then(StageWorker::output_queue) {
            Some(previous_output) => previous_output.clone(),
            None => BoundedQueue::new(capacity),
        };
        let output = BoundedQueue::new(capacity);

        let worker = StageWorker::new(stage, options)
            .with_input(input)
            .with_output(output)
            .with_event_sink(self.sink.clone())
            .with_pipeline_id(self.id);

        debug!(
            pipeline_id = %self.id,
            stage = %worker.name(),
            position = self.workers.len(),
            parallelism = worker.parallelism(),
            "Stage added"
        );
        self.workers.push(worker);
        Ok(())
    }

    /// Starts every worker in stage order.
    ///
    /// The token is shared by all executors; each observes it at its next
    /// iteration. Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns the first worker error. Workers started before the failing one
    /// keep running and later ones are not started.
    pub fn start(&mut self, token: Arc<CancellationToken>) -> Result<(), PipelineError> {
        self.started = true;

        for worker in &self.workers {
            worker.start(token.clone())?;
        }

        info!(pipeline_id = %self.id, stages = self.workers.len(), "Pipeline started");
        self.sink.try_emit(
            event_types::PIPELINE_STARTED,
            Some(json!({
                "pipeline_id": self.id.to_string(),
                "stages": self.workers.iter().map(StageWorker::name).collect::<Vec<_>>(),
            })),
        );
        self.report_cancellation(&token);
        Ok(())
    }

    /// Emits `pipeline.cancelled` once the token fires.
    ///
    /// The callback holds the token weakly; the token owns its callbacks.
    fn report_cancellation(&self, token: &Arc<CancellationToken>) {
        let id = self.id;
        let sink = self.sink.clone();
        let observed = Arc::downgrade(token);
        token.on_cancel(move || {
            let reason = observed.upgrade().and_then(|token| token.reason());
            info!(pipeline_id = %id, reason = ?reason, "Pipeline cancelled");
            sink.try_emit(
                event_types::PIPELINE_CANCELLED,
                Some(json!({ "pipeline_id": id.to_string(), "reason": reason })),
            );
        });
    }

    /// Drains and shuts down the pipeline.
    ///
    /// For each stage in order: close its input, then wait for all its
    /// executors to exit. A stage's output, the next stage's input, is
    /// therefore closed only after its sole producers have stopped. The final
    /// output is closed last so a consumer looping on `recv` terminates.
    ///
    /// This does not wait for that consumer to finish reading. Nor does it
    /// return while an executor is blocked on a full output queue nobody
    /// drains, as happens when every executor of the next stage has failed;
    /// cancelling the token releases such a send.
    pub async fn stop(&self) {
        for worker in &self.workers {
            if let Some(input) = worker.input_queue() {
                input.close();
            }
            worker.wait_stop().await;
        }

        if let Some(output) = self.workers.last().and_then(StageWorker::output_queue) {
            output.close();
        }

        info!(pipeline_id = %self.id, "Pipeline stopped");
        self.sink
            .emit(
                event_types::PIPELINE_STOPPED,
                Some(json!({ "pipeline_id": self.id.to_string() })),
            )
            .await;
    }

    /// Returns the sending end of the first queue, or `None` without stages.
    #[must_use]
    pub fn input(&self) -> Option<Sender<M>> {
        self.workers
            .first()
            .and_then(StageWorker::input_queue)
            .map(BoundedQueue::sender)
    }

    /// Returns the receiving end of the last queue, or `None` without stages.
    #[must_use]
    pub fn output(&self) -> Option<Receiver<M>> {
        self.workers
            .last()
            .and_then(StageWorker::output_queue)
            .map(BoundedQueue::receiver)
    }
}

impl<M> Default for Pipeline<M>
where
    M: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<M> std::fmt::Debug for Pipeline<M>
where
    M: Send + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("workers", &self.workers)
            .field("started", &self.started)
            .finish()
    }
}
