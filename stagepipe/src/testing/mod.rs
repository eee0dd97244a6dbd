//! Testing utilities for stagepipe pipelines.
//!
//! Pass-through stages whose failure, latency and blocking behaviour can be
//! controlled from a test.

mod mocks;

pub use mocks::{BlockingStage, FailingStage, RecordingStage, SlowStage};
