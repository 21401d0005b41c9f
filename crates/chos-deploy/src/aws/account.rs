//! AWS credential check

use crate::aws::context::AwsContext;
use anyhow::{Context, Result};
use tracing::info;

/// AWS account ID (12-digit string)
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display, derive_more::Deref)]
pub struct AccountId(String);

/// Confirm the configured credentials work, returning the account they belong to.
///
/// `GetCallerIdentity` needs no permissions, so a failure here means the
/// credential chain itself is broken, not that a policy is missing.
pub async fn verify_credentials(ctx: &AwsContext) -> Result<AccountId> {
    let identity = ctx
        .sts_client()
        .get_caller_identity()
        .send()
        .await
        .context("Failed to get AWS caller identity - check credentials")?;

    let account = identity
        .account()
        .context("No account ID returned from STS GetCallerIdentity")?;

    info!(account_id = %account, region = %ctx.region(), "AWS credentials verified");

    Ok(AccountId(account.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_id_display_and_deref() {
        let id = AccountId("123456789012".to_string());
        assert_eq!(id.to_string(), "123456789012");
        assert_eq!(id.len(), 12);
    }
}
