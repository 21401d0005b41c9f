//! AWS collaborators
//!
//! - `context`: shared SDK configuration and client construction
//! - `account`: credential check through STS
//! - `s3`: remote-state bucket setup behind the [`BucketStore`] trait

pub mod account;
pub mod context;
pub mod s3;

pub use account::{AccountId, verify_credentials};
pub use context::AwsContext;
pub use s3::{BucketStore, S3BucketStore, ensure_state_bucket, location_constraint_for};
