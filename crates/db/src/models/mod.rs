//! Row models and DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` entity struct
//! matching the database row, plus the DTOs used for inserts.

pub mod batch_job;
pub mod credit;
pub mod generated_asset;
pub mod status;
