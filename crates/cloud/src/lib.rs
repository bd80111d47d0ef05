//! Durable object storage for generated videos.
//!
//! Objects are written to an S3-compatible bucket and served from a
//! public base URL (usually a CDN in front of the bucket).

pub mod s3;

pub use s3::{S3Storage, StorageConfig, StorageError, StoredObject};
