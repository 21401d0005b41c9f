//! Shared test utilities for chosdeploy
//!
//! Helpers used by unit and integration tests across the workspace, kept in
//! their own crate so they never end up in the shipped binary.
//!
//! ## Modules
//!
//! - [`archive`]: In-memory zip fixtures
//! - [`aws`]: AWS region detection and unique run names
//! - [`fake_terraform`]: Scripted stand-in for the provisioning tool

pub mod archive;
pub mod aws;
pub mod fake_terraform;

pub use archive::zip_with_entries;
pub use aws::{get_test_region, test_run_name};
pub use fake_terraform::{FakeTerraform, InstalledFake};
