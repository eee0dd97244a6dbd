//! Pipeline and per-stage configuration.

use serde::{Deserialize, Serialize};

/// Capacity of every queue when no configuration is given.
pub const DEFAULT_BUFFER_SIZE: usize = 10;

/// Configuration shared by all queues of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Capacity of each bounded queue.
    pub buffer_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl PipelineConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the queue capacity.
    #[must_use]
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Returns the capacity actually used for queues.
    ///
    /// A zero capacity would turn every queue into a rendezvous point; it is
    /// raised to one.
    #[must_use]
    pub fn effective_buffer_size(&self) -> usize {
        self.buffer_size.max(1)
    }
}

/// Options for a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageOptions {
    /// Number of concurrent executors. Zero means one.
    pub parallel: usize,
}

impl Default for StageOptions {
    fn default() -> Self {
        Self { parallel: 1 }
    }
}

impl StageOptions {
    /// Creates options with a single executor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options with `parallel` executors.
    #[must_use]
    pub fn parallel(parallel: usize) -> Self {
        Self { parallel }
    }

    /// Sets the executor count.
    #[must_use]
    pub fn with_parallel(mut self, parallel: usize) -> Self {
        self.parallel = parallel;
        self
    }

    /// Returns the executor count, with zero mapped to one.
    #[must_use]
    pub fn effective_parallelism(&self) -> usize {
        self.parallel.max(1)
    }

    /// Resolves optional options the way `add_stage` does.
    #[must_use]
    pub fn resolve(options: Option<Self>) -> usize {
        options.unwrap_or_default().effective_parallelism()
    }
}
