//! Per-invocation run configuration
//!
//! Built once from the command line and passed by reference to every stage of
//! a provisioning run. Validation is done via `garde::Validate`.

use crate::Device;
use crate::defaults::{default_ami, default_spot_price};
use serde::{Deserialize, Serialize};

/// Longest accepted name; derived bucket names append up to 8 characters
/// and IAM role names up to 16.
const MAX_NAME_LEN: usize = 40;

/// Configuration for a single provisioning run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, garde::Validate)]
pub struct RunConfig {
    /// Namespace for every remote resource; also the state bucket name.
    /// Must be globally unique across S3.
    #[garde(custom(validate_name))]
    pub name: String,

    /// AWS region
    #[garde(length(min = 1))]
    pub region: String,

    /// Build target device
    #[garde(skip)]
    pub device: Device,

    /// Keep the build instance running after the build finishes
    #[serde(default)]
    #[garde(skip)]
    pub prevent_shutdown: bool,

    /// AMI for the build instance
    #[serde(default = "default_ami")]
    #[garde(length(min = 1))]
    pub ami: String,

    /// EC2 key pair name for SSH access to the build instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(skip)]
    pub ssh_key: Option<String>,

    /// Maximum spot price (USD/hour)
    #[serde(default = "default_spot_price")]
    #[garde(custom(validate_spot_price))]
    pub spot_price: String,
}

impl RunConfig {
    /// Create a config with default AMI and spot price
    pub fn new(name: impl Into<String>, region: impl Into<String>, device: Device) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
            device,
            prevent_shutdown: false,
            ami: default_ami(),
            ssh_key: None,
            spot_price: default_spot_price(),
        }
    }

    pub fn with_ami(mut self, ami: impl Into<String>) -> Self {
        self.ami = ami.into();
        self
    }

    pub fn with_ssh_key(mut self, ssh_key: impl Into<String>) -> Self {
        self.ssh_key = Some(ssh_key.into());
        self
    }

    pub fn with_spot_price(mut self, spot_price: impl Into<String>) -> Self {
        self.spot_price = spot_price.into();
        self
    }

    pub fn with_prevent_shutdown(mut self, prevent_shutdown: bool) -> Self {
        self.prevent_shutdown = prevent_shutdown;
        self
    }
}

/// Names become S3 bucket prefixes, so only lowercase letters, digits and
/// hyphens are allowed, starting and ending with a letter or digit.
fn validate_name(value: &str, _ctx: &()) -> garde::Result {
    if value.len() < 3 || value.len() > MAX_NAME_LEN {
        return Err(garde::Error::new(format!(
            "length must be between 3 and {MAX_NAME_LEN} characters"
        )));
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
    {
        return Err(garde::Error::new(format!(
            "contains forbidden character {bad:?} (use lowercase letters, digits and hyphens)"
        )));
    }
    if value.starts_with('-') || value.ends_with('-') {
        return Err(garde::Error::new(
            "must start and end with a letter or digit",
        ));
    }
    Ok(())
}

fn validate_spot_price(value: &str, _ctx: &()) -> garde::Result {
    match value.parse::<f64>() {
        Ok(price) if price > 0.0 && price.is_finite() => Ok(()),
        _ => Err(garde::Error::new(format!(
            "must be a positive decimal, got {value:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use garde::Validate;

    fn valid_config() -> RunConfig {
        RunConfig::new("testenv", "us-east-1", Device::Marlin)
    }

    #[test]
    fn test_defaults() {
        let config = valid_config();
        assert_eq!(config.ami, "ami-0def3275");
        assert_eq!(config.spot_price, ".80");
        assert!(config.ssh_key.is_none());
        assert!(!config.prevent_shutdown);
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
        assert!(
            valid_config()
                .with_ssh_key("builder")
                .with_spot_price("1.25")
                .with_ami("ami-12345678")
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn test_name_rejects_uppercase_and_symbols() {
        for name in ["TestEnv", "test_env", "test.env", "test env", "test$env"] {
            let config = RunConfig::new(name, "us-east-1", Device::Marlin);
            assert!(config.validate().is_err(), "Expected rejection for {name:?}");
        }
    }

    #[test]
    fn test_name_length_bounds() {
        assert!(validate_name("ab", &()).is_err());
        assert!(validate_name("abc", &()).is_ok());
        assert!(validate_name(&"a".repeat(MAX_NAME_LEN), &()).is_ok());
        assert!(validate_name(&"a".repeat(MAX_NAME_LEN + 1), &()).is_err());
    }

    #[test]
    fn test_name_rejects_leading_or_trailing_hyphen() {
        assert!(validate_name("-abc", &()).is_err());
        assert!(validate_name("abc-", &()).is_err());
        assert!(validate_name("a-b-c", &()).is_ok());
    }

    #[test]
    fn test_empty_region_rejected() {
        let config = RunConfig::new("testenv", "", Device::Sailfish);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_spot_price_must_be_positive_decimal() {
        assert!(validate_spot_price(".80", &()).is_ok());
        assert!(validate_spot_price("2", &()).is_ok());
        assert!(validate_spot_price("0", &()).is_err());
        assert!(validate_spot_price("-1", &()).is_err());
        assert!(validate_spot_price("cheap", &()).is_err());
        assert!(validate_spot_price("inf", &()).is_err());
    }

    #[test]
    fn test_deserialize_applies_defaults() {
        let config: RunConfig = serde_json::from_str(
            r#"{"name": "testenv", "region": "eu-west-1", "device": "sailfish"}"#,
        )
        .unwrap();
        assert_eq!(config, RunConfig::new("testenv", "eu-west-1", Device::Sailfish));
    }
}
