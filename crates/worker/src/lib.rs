//! Batch generation worker: configuration and the job claim loop.

pub mod config;
pub mod runner;

pub use config::{ConfigError, LogFormat, WorkerConfig};
pub use runner::{JobOutcome, JobRunner};
