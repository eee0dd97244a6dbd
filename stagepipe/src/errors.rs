//! Error types for the stagepipe engine.
//!
//! Only configuration problems surface to the caller. Failures inside a
//! stage's transform are reported through the event sink and never reach
//! these types.

use thiserror::Error;

/// The main error type for pipeline operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// A stage worker was started without one of its queues.
    #[error("Stage '{stage}' is not initialized: missing {side} queue")]
    NotWired {
        /// The stage name.
        stage: String,
        /// Which side is missing ("input" or "output").
        side: QueueSide,
    },

    /// A stage worker was started more than once.
    #[error("Stage '{stage}' has already been started")]
    WorkerAlreadyStarted {
        /// The stage name.
        stage: String,
    },

    /// The topology was modified after the pipeline started.
    #[error("Pipeline has already been started; stage '{stage}' cannot be added")]
    AlreadyStarted {
        /// The stage that was rejected.
        stage: String,
    },
}

impl PipelineError {
    /// Creates a not-wired error.
    #[must_use]
    pub fn not_wired(stage: impl Into<String>, side: QueueSide) -> Self {
        Self::NotWired {
            stage: stage.into(),
            side,
        }
    }

    /// Creates a worker-already-started error.
    #[must_use]
    pub fn worker_already_started(stage: impl Into<String>) -> Self {
        Self::WorkerAlreadyStarted {
            stage: stage.into(),
        }
    }

    /// Creates an already-started error.
    #[must_use]
    pub fn already_started(stage: impl Into<String>) -> Self {
        Self::AlreadyStarted {
            stage: stage.into(),
        }
    }

    /// Returns the name of the stage the error refers to.
    #[must_use]
    pub fn stage(&self) -> &str {
        match self {
            Self::NotWired { stage, .. }
            | Self::WorkerAlreadyStarted { stage }
            | Self::AlreadyStarted { stage } => stage,
        }
    }
}

/// One end of a stage worker's wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueSide {
    /// The queue the worker consumes from.
    Input,
    /// The queue the worker produces into.
    Output,
}

impl std::fmt::Display for QueueSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
        }
    }
}
