//! S3 integration tests - actually call AWS APIs
//!
//! These tests are marked `#[ignore]` and only run with:
//! ```
//! AWS_PROFILE=your_profile cargo test --test aws_s3_integration -- --ignored
//! ```

use chos_common::{Device, RunConfig};
use chos_deploy::aws::{
    AwsContext, BucketStore, S3BucketStore, ensure_state_bucket, verify_credentials,
};
use chos_test_utils::{get_test_region, test_run_name};

/// State bucket is created once and left alone on the second call
#[tokio::test]
#[ignore]
async fn test_state_bucket_is_idempotent() {
    let region = get_test_region();
    let ctx = AwsContext::new(&region).await;
    verify_credentials(&ctx)
        .await
        .expect("AWS credentials required - set AWS_PROFILE or AWS_ACCESS_KEY_ID");

    let store = S3BucketStore::from_context(&ctx);
    let config = RunConfig::new(test_run_name(), &region, Device::Marlin);

    assert!(!store.bucket_exists(&config.name).await.unwrap());
    assert!(ensure_state_bucket(&store, &config).await.unwrap());
    assert!(store.bucket_exists(&config.name).await.unwrap());
    assert!(!ensure_state_bucket(&store, &config).await.unwrap());

    ctx.s3_client()
        .delete_bucket()
        .bucket(&config.name)
        .send()
        .await
        .expect("Should delete bucket");
}

/// Credentials resolve to a 12-digit account
#[tokio::test]
#[ignore]
async fn test_verify_credentials() {
    let ctx = AwsContext::new(&get_test_region()).await;
    let account = verify_credentials(&ctx).await.expect("AWS credentials required");
    assert_eq!(account.len(), 12);
}
