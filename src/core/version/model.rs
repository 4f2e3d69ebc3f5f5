use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::error::LauncherError;

/// `major.minor.patch[.build]` as published in the version catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SemVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub build: Option<u32>,
}

impl SemVersion {
    pub fn new(major: u32, minor: u32, patch: u32, build: Option<u32>) -> Self {
        Self {
            major,
            minor,
            patch,
            build,
        }
    }
}

impl FromStr for SemVersion {
    type Err = LauncherError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || LauncherError::InvalidVersion(raw.to_string());

        let parts: Vec<&str> = raw.split('.').collect();
        if !(3..=4).contains(&parts.len()) {
            return Err(invalid());
        }

        let mut numbers = Vec::with_capacity(parts.len());
        for part in parts {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            numbers.push(part.parse::<u32>().map_err(|_| invalid())?);
        }

        Ok(Self {
            major: numbers[0],
            minor: numbers[1],
            patch: numbers[2],
            build: numbers.get(3).copied(),
        })
    }
}

impl fmt::Display for SemVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.build {
            Some(build) => write!(f, "{}.{}.{}.{}", self.major, self.minor, self.patch, build),
            None => write!(f, "{}.{}.{}", self.major, self.minor, self.patch),
        }
    }
}

impl TryFrom<String> for SemVersion {
    type Error = LauncherError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SemVersion> for String {
    fn from(value: SemVersion) -> Self {
        value.to_string()
    }
}

/// Release track a build is published on. Encoded as `0 | 1 | 2` in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Channel {
    Release,
    Beta,
    Preview,
}

impl Channel {
    /// Suffix appended to the semantic version when displaying a version.
    pub fn suffix(&self) -> &'static str {
        match self {
            Channel::Release => "",
            Channel::Beta => "-beta",
            Channel::Preview => "-preview",
        }
    }
}

impl TryFrom<u8> for Channel {
    type Error = LauncherError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Channel::Release),
            1 => Ok(Channel::Beta),
            2 => Ok(Channel::Preview),
            other => Err(LauncherError::InvalidVersion(format!(
                "unknown release channel {other}"
            ))),
        }
    }
}

impl From<Channel> for u8 {
    fn from(value: Channel) -> Self {
        match value {
            Channel::Release => 0,
            Channel::Beta => 1,
            Channel::Preview => 2,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Release => write!(f, "release"),
            Channel::Beta => write!(f, "beta"),
            Channel::Preview => write!(f, "preview"),
        }
    }
}

/// Identity of an installable build. Immutable once read from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version {
    pub sem_version: SemVersion,
    pub uuid: Uuid,
    pub channel: Channel,
}

impl Version {
    pub fn new(sem_version: SemVersion, uuid: Uuid, channel: Channel) -> Self {
        Self {
            sem_version,
            uuid,
            channel,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.sem_version, self.channel.suffix())
    }
}
