//! Configuration types for a deploy invocation

use crate::error::Result;
use chos_common::RunConfig;
use garde::Validate;

pub use crate::tool::ToolSource;

/// AWS access settings
#[derive(Debug, Clone, Default)]
pub struct AwsConfig {
    /// Named profile (overrides default credential resolution)
    pub aws_profile: Option<String>,
}

/// Runtime behavior flags
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeFlags {
    /// Tear the infrastructure down instead of creating it
    pub remove: bool,
    /// Keep the workspace after a successful apply
    pub keep_workspace: bool,
}

/// Everything one invocation needs
#[derive(Debug, Clone)]
pub struct DeployConfig {
    pub run: RunConfig,
    pub tool: ToolSource,
    pub aws: AwsConfig,
    pub flags: RuntimeFlags,
}

impl DeployConfig {
    /// Config with the pinned tool release and no flags set
    pub fn new(run: RunConfig) -> Self {
        Self {
            run,
            tool: ToolSource::default(),
            aws: AwsConfig::default(),
            flags: RuntimeFlags::default(),
        }
    }

    pub fn with_tool(mut self, tool: ToolSource) -> Self {
        self.tool = tool;
        self
    }

    pub fn with_flags(mut self, flags: RuntimeFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Validate the run configuration
    pub fn validate(&self) -> Result<()> {
        self.run.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeployError;
    use chos_common::Device;

    #[test]
    fn test_defaults() {
        let config = DeployConfig::new(RunConfig::new("demo", "us-east-1", Device::Marlin));
        assert!(matches!(config.tool, ToolSource::Download(ref r) if r.version == "0.11.1"));
        assert!(!config.flags.remove);
        assert!(!config.flags.keep_workspace);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_name_is_rejected() {
        let config = DeployConfig::new(RunConfig::new("Bad_Name", "us-east-1", Device::Marlin));
        assert!(matches!(config.validate(), Err(DeployError::InvalidConfig(_))));
    }
}
