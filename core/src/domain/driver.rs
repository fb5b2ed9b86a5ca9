//! Driver identifiers and the driver registry.

use serde::{Deserialize, Serialize};

/// A backend protocol for talking to scanning hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverId {
    /// Windows Image Acquisition.
    Wia,
    /// TWAIN data source manager.
    Twain,
    /// macOS ImageCaptureCore.
    Apple,
    /// SANE (Scanner Access Now Easy).
    Sane,
    /// eSCL / AirScan network scanners.
    Escl,
}

impl DriverId {
    /// All known driver identifiers.
    pub const ALL: [DriverId; 5] = [
        DriverId::Wia,
        DriverId::Twain,
        DriverId::Apple,
        DriverId::Sane,
        DriverId::Escl,
    ];

    /// The stable lowercase identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverId::Wia => "wia",
            DriverId::Twain => "twain",
            DriverId::Apple => "apple",
            DriverId::Sane => "sane",
            DriverId::Escl => "escl",
        }
    }
}

impl std::fmt::Display for DriverId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for DriverId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_ascii_lowercase();
        DriverId::ALL
            .into_iter()
            .find(|d| d.as_str() == lowered)
            .ok_or_else(|| format!("unknown driver '{}'", s))
    }
}

/// The fixed, ordered set of drivers queried on this platform.
pub fn driver_registry() -> &'static [DriverId] {
    #[cfg(target_os = "windows")]
    {
        &[DriverId::Wia, DriverId::Twain, DriverId::Escl]
    }

    #[cfg(target_os = "macos")]
    {
        &[DriverId::Apple, DriverId::Sane, DriverId::Escl]
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        &[DriverId::Sane, DriverId::Escl]
    }
}
