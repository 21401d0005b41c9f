//! AWS test utilities
//!
//! Region detection and unique run names for tests that talk to real AWS.

use chrono::Utc;

/// Get the AWS region for tests.
///
/// Checks `AWS_REGION`, then `AWS_DEFAULT_REGION`, then falls back to
/// `us-east-2`.
pub fn get_test_region() -> String {
    std::env::var("AWS_REGION")
        .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
        .unwrap_or_else(|_| "us-east-2".to_string())
}

/// Generate a unique run name usable as a bucket-name prefix.
///
/// Format: `chos-test-{timestamp_ms}-{counter}`, always lowercase and well
/// under the 40 character limit.
///
/// # Example
///
/// ```
/// use chos_test_utils::aws::test_run_name;
///
/// let name = test_run_name();
/// assert!(name.starts_with("chos-test-"));
/// ```
pub fn test_run_name() -> String {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let ts = Utc::now().timestamp_millis();
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("chos-test-{ts}-{counter}")
}
