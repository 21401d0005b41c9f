//! Build target devices

use serde::{Deserialize, Serialize};

/// Devices an unattended build can target
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::VariantNames,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Device {
    /// Pixel XL
    Marlin,
    /// Pixel
    Sailfish,
}

impl Device {
    /// Every supported device, in the order templates list them
    pub const ALL: [Device; 2] = [Device::Marlin, Device::Sailfish];

    /// Codenames of every supported device
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|d| d.as_str()).collect()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Marlin => "marlin",
            Device::Sailfish => "sailfish",
        }
    }
}
