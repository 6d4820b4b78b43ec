//! CUDA driver API version

use crate::diagnostics::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Driver API version as `major.minor`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApiVersion {
    pub major: u32,
    pub minor: u32,
}

impl ApiVersion {
    /// Largest minor the driver integer encoding can hold
    pub const MAX_MINOR: u32 = 99;
    /// Largest major whose encoding still fits an `i32`
    pub const MAX_MAJOR: u32 = (i32::MAX as u32 - Self::MAX_MINOR * 10) / 1000;

    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Decode the integer reported by `cuDriverGetVersion`
    /// (`1000 * major + 10 * minor`).
    pub fn from_driver_int(raw: i32) -> Self {
        let raw = raw.max(0) as u32;
        Self {
            major: raw / 1000,
            minor: (raw % 1000) / 10,
        }
    }

    /// Inverse of [`ApiVersion::from_driver_int`]
    ///
    /// Versions outside the encodable range saturate at `i32::MAX`.
    pub fn to_driver_int(self) -> i32 {
        let raw = self
            .major
            .saturating_mul(1000)
            .saturating_add(self.minor.saturating_mul(10));
        i32::try_from(raw).unwrap_or(i32::MAX)
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for ApiVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidVersion {
            input: s.to_string(),
        };
        let trimmed = s.trim().trim_start_matches('v');
        let (major, minor) = match trimmed.split_once('.') {
            Some((major, minor)) => (major, minor),
            None => (trimmed, "0"),
        };
        let major: u32 = major.parse().map_err(|_| invalid())?;
        let minor: u32 = minor.parse().map_err(|_| invalid())?;
        if major > Self::MAX_MAJOR || minor > Self::MAX_MINOR {
            return Err(invalid());
        }
        Ok(Self { major, minor })
    }
}

impl Serialize for ApiVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ApiVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
