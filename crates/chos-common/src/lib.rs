//! chos-common - Shared types and defaults
//!
//! Plain value types used by the deploy pipeline and its tests, without any
//! AWS SDK or network dependencies.
//!
//! ## Modules
//!
//! - [`defaults`]: Default values, staged file names and pinned tool release
//! - [`device`]: Supported build target devices
//! - [`platform`]: Host operating systems the provisioning tool ships for
//! - [`run_config`]: Per-invocation run configuration
//! - [`tool_release`]: Pinned provisioning tool release and download URLs

pub mod defaults;
pub mod device;
pub mod platform;
pub mod run_config;
pub mod tool_release;

pub use device::Device;
pub use platform::{Platform, UnsupportedOs};
pub use run_config::RunConfig;
pub use tool_release::ToolRelease;
