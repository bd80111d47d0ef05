//! REST client for the external video generation provider.
//!
//! Provides typed request/response models and an HTTP wrapper for
//! submitting renders, checking their status, and downloading results.

pub mod api;
pub mod models;

pub use api::{GenerationApi, GenerationApiError};
pub use models::{GenerationRequest, SubmitResponse, TaskState, TaskStatus};
