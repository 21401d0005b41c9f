//! Remote-state bucket setup
//!
//! The infra config keeps its state in a bucket named after the run. That
//! bucket has to exist before `init` configures the backend, so it is
//! created here (idempotently) rather than by the provisioning tool.

use crate::aws::context::AwsContext;
use crate::error::{DeployError, Result};
use aws_sdk_s3::Client;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use chos_common::RunConfig;
use chos_common::defaults::US_EAST_1;
use std::future::Future;
use tracing::{debug, info};

/// Error codes meaning the bucket does not exist
const NOT_FOUND_CODES: &[&str] = &["NotFound", "NoSuchBucket"];

/// Error codes meaning a create raced with ourselves
const ALREADY_OWNED_CODES: &[&str] = &["BucketAlreadyOwnedByYou"];

/// Minimal bucket operations the deploy pipeline needs
pub trait BucketStore: Send + Sync {
    /// Whether `name` exists and is ours
    fn bucket_exists(&self, name: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Create `name`, with an explicit location constraint outside us-east-1
    fn create_bucket(
        &self,
        name: &str,
        location_constraint: Option<&str>,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Location constraint for a bucket in `region`.
///
/// S3 rejects an explicit `us-east-1` constraint, so that region gets none.
pub fn location_constraint_for(region: &str) -> Option<&str> {
    (region != US_EAST_1).then_some(region)
}

/// Create the state bucket for `config` unless it already exists.
///
/// Returns `true` if a bucket was created.
pub async fn ensure_state_bucket<S: BucketStore>(store: &S, config: &RunConfig) -> Result<bool> {
    let name = config.name.as_str();
    if store.bucket_exists(name).await? {
        debug!(bucket = %name, "State bucket already exists");
        return Ok(false);
    }

    let constraint = location_constraint_for(&config.region);
    info!(bucket = %name, region = %config.region, "Creating state bucket");
    store.create_bucket(name, constraint).await?;
    Ok(true)
}

/// What a `HeadBucket` failure tells us
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeadBucketFailure {
    Absent,
    /// Exists but belongs to another account
    Forbidden,
    Other,
}

fn classify_head_bucket(status: Option<u16>, code: Option<&str>) -> HeadBucketFailure {
    match (status, code) {
        (Some(404), _) => HeadBucketFailure::Absent,
        (_, Some(c)) if NOT_FOUND_CODES.contains(&c) => HeadBucketFailure::Absent,
        (Some(403), _) => HeadBucketFailure::Forbidden,
        _ => HeadBucketFailure::Other,
    }
}

/// [`BucketStore`] backed by the S3 API
pub struct S3BucketStore {
    client: Client,
}

impl S3BucketStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_context(ctx: &AwsContext) -> Self {
        Self::new(ctx.s3_client())
    }
}

impl BucketStore for S3BucketStore {
    async fn bucket_exists(&self, name: &str) -> Result<bool> {
        let err = match self.client.head_bucket().bucket(name).send().await {
            Ok(_) => return Ok(true),
            Err(err) => err,
        };

        let status = err.raw_response().map(|r| r.status().as_u16());
        match classify_head_bucket(status, err.code()) {
            HeadBucketFailure::Absent => Ok(false),
            HeadBucketFailure::Forbidden => Err(DeployError::Aws {
                operation: "HeadBucket",
                message: format!(
                    "bucket '{name}' exists but is owned by another account; \
                     bucket names are global, choose a different --name"
                ),
            }),
            HeadBucketFailure::Other => Err(DeployError::Aws {
                operation: "HeadBucket",
                message: DisplayErrorContext(&err).to_string(),
            }),
        }
    }

    async fn create_bucket(&self, name: &str, location_constraint: Option<&str>) -> Result<()> {
        let mut request = self.client.create_bucket().bucket(name);
        if let Some(region) = location_constraint {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => Ok(()),
            Err(err) if err.code().is_some_and(|c| ALREADY_OWNED_CODES.contains(&c)) => {
                debug!(bucket = %name, "Bucket already owned by this account");
                Ok(())
            }
            Err(err) => Err(DeployError::Aws {
                operation: "CreateBucket",
                message: DisplayErrorContext(&err).to_string(),
            }),
        }
    }
}
