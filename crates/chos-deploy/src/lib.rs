//! chos-deploy - Provisioning lifecycle for unattended CopperheadOS builds
//!
//! Renders the infrastructure config and its payloads, stages them into a
//! disposable workspace, installs a pinned `terraform`, and drives it through
//! `init`, `plan`, `apply` or `destroy`.
//!
//! ## Modules
//!
//! - [`workspace`]: Per-run working directory with remove-on-drop
//! - [`render`]: Tera templates embedded in the binary
//! - [`stage`]: Writing artifacts and packaging the spot function
//! - [`tool`]: Downloading and extracting the provisioning tool
//! - [`process`]: Subprocess execution with streamed output
//! - [`terraform`]: Provisioning session state machine
//! - [`orchestrator`]: Apply and destroy flows
//! - [`aws`]: Credential check and state bucket setup

pub mod aws;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod process;
pub mod render;
pub mod stage;
pub mod terraform;
pub mod tool;
pub mod workspace;

pub use config::{AwsConfig, DeployConfig, RuntimeFlags};
pub use error::{DeployError, Result};
pub use orchestrator::Deployer;
pub use process::{BufferSink, OutputSink, StdoutSink};
pub use terraform::{SessionState, Subcommand, TerraformClient};
pub use tool::{ToolProvisioner, ToolSource};
pub use workspace::Workspace;
