//! Cooperative cancellation shared across every executor of a pipeline.
//!
//! A single [`CancellationToken`] is handed to [`Pipeline::start`](crate::pipeline::Pipeline::start)
//! and observed by each executor at the top of its loop. Deadlines are
//! expressed on the token itself.

mod token;

pub use token::{CancelCallback, CancellationToken, DEADLINE_EXCEEDED};
