//! # Stagepipe
//!
//! A multi-stage concurrent processing pipeline.
//!
//! Stagepipe runs a sequence of caller-supplied stages, each on its own pool
//! of parallel executors, connected by bounded queues:
//!
//! - **Backpressure**: a slow stage stalls its producers once the queue between them fills
//! - **Fan-out**: a stage turns one message into zero or more messages
//! - **Cooperative cancellation**: a shared token, optionally with a deadline, stops new work
//! - **Ordered shutdown**: `stop` drains stage by stage so no queue is written after it closes
//! - **Fail-open stages**: a failing transform drops its item and is reported out-of-band
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stagepipe::prelude::*;
//! use std::sync::Arc;
//!
//! let mut pipeline = Pipeline::new();
//! pipeline.add_stage(FnStage::new("double", |x: i64| Ok(vec![x * 2])), Some(StageOptions::parallel(4)))?;
//! pipeline.add_stage(FnStage::new("add_one", |x: i64| Ok(vec![x + 1])), None)?;
//! pipeline.start(Arc::new(CancellationToken::with_timeout(Duration::from_secs(10))))?;
//!
//! let output = pipeline.output().unwrap();
//! let consumer = tokio::spawn(async move {
//!     while let Ok(value) = output.recv().await {
//!         println!("{value}");
//!     }
//! });
//!
//! let input = pipeline.input().unwrap();
//! for i in 1..=3 {
//!     input.send(i).await?;
//! }
//!
//! pipeline.stop().await;
//! consumer.await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod errors;
pub mod events;
pub mod pipeline;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::{CancellationToken, DEADLINE_EXCEEDED};
    pub use crate::errors::{PipelineError, QueueSide};
    pub use crate::events::{
        event_types, CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink,
    };
    pub use crate::pipeline::{
        BoundedQueue, Pipeline, PipelineConfig, StageOptions, StageWorker, DEFAULT_BUFFER_SIZE,
    };
    pub use crate::stages::{AsyncFnStage, FnStage, IdentityStage, Stage};
}
