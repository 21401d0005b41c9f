//! Host platforms the provisioning tool is published for

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating systems with a pinned provisioning tool archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Platform {
    Darwin,
    Linux,
    Windows,
}

/// The host OS has no published archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedOs(pub String);

impl fmt::Display for UnsupportedOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported operating system: `{}`", self.0)
    }
}

impl std::error::Error for UnsupportedOs {}

impl Platform {
    /// Map an OS name as reported by `std::env::consts::OS`.
    ///
    /// `macos` is accepted as an alias for `darwin`.
    pub fn from_os(os: &str) -> Result<Self, UnsupportedOs> {
        match os {
            "darwin" | "macos" => Ok(Platform::Darwin),
            "linux" => Ok(Platform::Linux),
            "windows" => Ok(Platform::Windows),
            other => Err(UnsupportedOs(other.to_string())),
        }
    }

    /// Name used in release archive file names
    pub fn release_name(self) -> &'static str {
        match self {
            Platform::Darwin => "darwin",
            Platform::Linux => "linux",
            Platform::Windows => "windows",
        }
    }

    /// File name of the extracted executable
    pub fn binary_name(self) -> &'static str {
        match self {
            Platform::Windows => "terraform.exe",
            Platform::Darwin | Platform::Linux => "terraform",
        }
    }
}
