//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods
//! that accept `&PgPool` as the first argument.

pub mod batch_job_repo;
pub mod credit_repo;
pub mod generated_asset_repo;

pub use batch_job_repo::BatchJobRepo;
pub use credit_repo::CreditRepo;
pub use generated_asset_repo::GeneratedAssetRepo;
