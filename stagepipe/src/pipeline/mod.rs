//! Pipeline building and execution.
//!
//! This module provides:
//! - Bounded queues linking consecutive stages
//! - Stage workers running a stage with parallel executors
//! - The pipeline that wires workers together and drives start/stop

mod config;
mod queue;
mod runner;
mod worker;


pub use config::{PipelineConfig, StageOptions, DEFAULT_BUFFER_SIZE};
pub use queue::BoundedQueue;
pub use runner::Pipeline;
pub use worker::StageWorker;
