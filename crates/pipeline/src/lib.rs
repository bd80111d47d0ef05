//! Batch video generation pipeline.
//!
//! A batch is gated on the user's credit balance, split into a fast and
//! a slow tier, and drained tier by tier in fixed-size chunks. Each task
//! is submitted to the generation provider, polled to completion,
//! stored, billed, and recorded.
//!
//! All collaborators are injected through [`services::Services`].

pub mod adapters;
pub mod error;
pub mod executor;
pub mod poller;
pub mod processor;
pub mod scheduler;
pub mod services;

pub use error::{PipelineError, ServiceError, TaskError};
pub use processor::{BatchOutcome, BatchParameters, BatchProcessor, BatchRequest};
pub use services::Services;
