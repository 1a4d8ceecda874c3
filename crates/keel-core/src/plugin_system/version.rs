use std::fmt;
use std::str::FromStr;

use semver::{Version, VersionReq};
use thiserror::Error;

use crate::kernel::constants;

/// Error that can occur when parsing versions
#[derive(Debug, Error)]
pub enum VersionError {
    #[error("Invalid version '{version}': {source}")]
    InvalidVersion {
        version: String,
        #[source]
        source: semver::Error,
    },
}

/// Plugin API version
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ApiVersion {
    version: Version,
}

impl ApiVersion {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            version: Version::new(major, minor, patch),
        }
    }

    /// The API version this build of the host provides
    pub fn host() -> Result<Self, VersionError> {
        Self::from_str(constants::API_VERSION)
    }

    pub fn major(&self) -> u64 {
        self.version.major
    }

    pub fn minor(&self) -> u64 {
        self.version.minor
    }

    pub fn patch(&self) -> u64 {
        self.version.patch
    }

    /// Whether a plugin built against `plugin_api` can be loaded by this host:
    /// caret compatibility, so `0.1.x` hosts accept `0.1.y` plugins and `1.x`
    /// hosts accept any `1.y`.
    pub fn accepts(&self, plugin_api: &ApiVersion) -> bool {
        let requirement = caret_requirement(&plugin_api.version);
        requirement.matches(&self.version)
    }
}

fn caret_requirement(version: &Version) -> VersionReq {
    let comparator = semver::Comparator {
        op: semver::Op::Caret,
        major: version.major,
        minor: Some(version.minor),
        patch: Some(version.patch),
        pre: version.pre.clone(),
    };
    VersionReq {
        comparators: vec![comparator],
    }
}

impl FromStr for ApiVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
            .map(|version| Self { version })
            .map_err(|source| VersionError::InvalidVersion {
                version: s.to_string(),
                source,
            })
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.version)
    }
}
