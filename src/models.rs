use crate::error::RungoError;
use crate::platform::PlatformId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

const VERSION_PREFIX: &str = "go";

/// Go release label as published upstream, e.g. `go1.22.0` or `go1.22rc1`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionId(String);

impl VersionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Semantic version of the label with the `go` prefix stripped. A missing
    /// patch component counts as zero. Pre-release labels like `go1.22rc1`
    /// have no semantic form.
    pub fn semver(&self) -> Option<semver::Version> {
        let bare = self.0.strip_prefix(VERSION_PREFIX)?;
        let mut parts = bare.split('.');
        let major = parts.next()?.parse::<u64>().ok()?;
        let minor = parts.next()?.parse::<u64>().ok()?;
        let patch = match parts.next() {
            Some(patch) => patch.parse::<u64>().ok()?,
            None => 0,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(semver::Version::new(major, minor, patch))
    }

    /// Canonical install directory name for this version on `platform`
    pub fn install_dir_name(&self, platform: &PlatformId) -> String {
        format!("{}.{}", self.0, platform)
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for VersionId {
    type Err = RungoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let label = if trimmed.starts_with(VERSION_PREFIX) {
            trimmed.to_string()
        } else {
            format!("{}{}", VERSION_PREFIX, trimmed.trim_start_matches('v'))
        };

        let valid = label[VERSION_PREFIX.len()..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit())
            && label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.');

        if !valid {
            return Err(RungoError::InvalidVersion(s.to_string()));
        }

        Ok(VersionId(label))
    }
}

impl TryFrom<String> for VersionId {
    type Error = RungoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<VersionId> for String {
    fn from(version: VersionId) -> Self {
        version.0
    }
}

impl Ord for VersionId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.semver()
            .cmp(&other.semver())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for VersionId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A toolchain unpacked under the installs root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledToolchain {
    pub version: VersionId,
    pub platform: PlatformId,
    pub path: PathBuf,
    pub binary_path: PathBuf,
    pub installed_at: chrono::DateTime<chrono::Utc>,
}
