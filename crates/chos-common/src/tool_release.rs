//! Pinned provisioning tool release
//!
//! The version is pinned rather than resolved to "latest" so repeated runs
//! drive the same tool. Both the version and the release root can be
//! overridden; the defaults reproduce the historical pin.

use crate::Platform;
use crate::defaults::{DEFAULT_TERRAFORM_BASE_URL, DEFAULT_TERRAFORM_VERSION};
use serde::{Deserialize, Serialize};

/// A versioned provisioning tool release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRelease {
    /// Release version (e.g., "0.11.1")
    pub version: String,
    /// Release root without a trailing slash
    pub base_url: String,
}

impl Default for ToolRelease {
    fn default() -> Self {
        Self {
            version: DEFAULT_TERRAFORM_VERSION.to_string(),
            base_url: DEFAULT_TERRAFORM_BASE_URL.to_string(),
        }
    }
}

impl ToolRelease {
    pub fn new(version: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Archive file name for a platform (amd64 builds only)
    pub fn archive_name(&self, platform: Platform) -> String {
        format!(
            "terraform_{}_{}_amd64.zip",
            self.version,
            platform.release_name()
        )
    }

    /// Download URL of the archive for a platform
    pub fn archive_url(&self, platform: Platform) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.version,
            self.archive_name(platform)
        )
    }
}
