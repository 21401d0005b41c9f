//! Default configuration values and well-known file names
//!
//! These constants keep the CLI, the renderer and the stager agreeing on the
//! same names without passing them around.

/// Default AMI for the build instance
pub const DEFAULT_AMI: &str = "ami-0def3275";

/// Default maximum spot price (USD/hour)
pub const DEFAULT_SPOT_PRICE: &str = ".80";

/// Region where S3 rejects an explicit location constraint
pub const US_EAST_1: &str = "us-east-1";

/// Pinned provisioning tool version
pub const DEFAULT_TERRAFORM_VERSION: &str = "0.11.1";

/// Release root the pinned archives are fetched from
pub const DEFAULT_TERRAFORM_BASE_URL: &str = "https://releases.hashicorp.com/terraform";

/// Directory (relative to the workspace) holding the infra config
pub const CONFIG_DIR: &str = "config";

/// Rendered infra config, relative to the workspace
pub const INFRA_CONFIG_PATH: &str = "config/main.tf";

/// Rendered unattended build script
pub const SHELL_SCRIPT_FILENAME: &str = "chos.sh";

/// Rendered spot-fleet trigger function source
pub const LAMBDA_SPOT_FUNCTION_FILENAME: &str = "lambda_spot_function.py";

/// Archive the trigger function is packaged into
pub const LAMBDA_SPOT_ZIP_FILENAME: &str = "lambda_spot.zip";

/// Downloaded tool archive, removed once extracted
pub const TERRAFORM_ARCHIVE_FILENAME: &str = "terraform.zip";

/// Plan artifact written by `plan` and consumed by `apply`
pub const PLAN_FILENAME: &str = "tfplan";

/// Prefix for per-run workspace directories
pub const WORKSPACE_PREFIX: &str = "chosdeploy";

/// Returns the default AMI
pub fn default_ami() -> String {
    DEFAULT_AMI.to_string()
}

/// Returns the default spot price
pub fn default_spot_price() -> String {
    DEFAULT_SPOT_PRICE.to_string()
}
