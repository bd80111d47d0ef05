//! Domain types and pure policy logic for batch video generation.
//!
//! This crate has zero internal dependencies and performs no I/O, so it
//! can be shared by the repository layer, the pipeline, and the worker.

pub mod billing;
pub mod concurrency;
pub mod cost;
pub mod error;
pub mod plan;
pub mod priority;
pub mod retry;
pub mod stats;
pub mod task;
pub mod types;
