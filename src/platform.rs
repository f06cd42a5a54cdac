use crate::error::{Result, RungoError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating systems Go publishes toolchains for that RunGo supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Darwin,
    Linux,
    Windows,
}

impl Os {
    fn parse(os: &str) -> Option<Self> {
        match os {
            "macos" | "darwin" => Some(Os::Darwin),
            "linux" => Some(Os::Linux),
            "windows" => Some(Os::Windows),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Os::Darwin => "darwin",
            Os::Linux => "linux",
            Os::Windows => "windows",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    Amd64,
    Arm64,
}

impl Arch {
    fn parse(arch: &str) -> Option<Self> {
        match arch {
            "x86_64" | "amd64" => Some(Arch::Amd64),
            "aarch64" | "arm64" => Some(Arch::Arm64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::Amd64 => "amd64",
            Arch::Arm64 => "arm64",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A supported (os, arch) pair. Only whitelisted combinations can be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlatformId {
    os: Os,
    arch: Arch,
}

impl PlatformId {
    /// Resolve the platform this binary is running on
    pub fn current() -> Result<Self> {
        Self::resolve(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Resolve an (os, arch) pair given either Rust or Go naming.
    pub fn resolve(os: &str, arch: &str) -> Result<Self> {
        let parsed_os = Os::parse(os).ok_or_else(|| RungoError::UnsupportedOs(os.to_string()))?;
        let unsupported_arch = || RungoError::UnsupportedArch {
            os: parsed_os.to_string(),
            arch: arch.to_string(),
        };
        let parsed_arch = Arch::parse(arch).ok_or_else(unsupported_arch)?;

        match (parsed_os, parsed_arch) {
            (Os::Darwin, Arch::Amd64)
            | (Os::Darwin, Arch::Arm64)
            | (Os::Linux, Arch::Amd64)
            | (Os::Windows, Arch::Amd64) => Ok(Self {
                os: parsed_os,
                arch: parsed_arch,
            }),
            _ => Err(unsupported_arch()),
        }
    }

    /// Extension of the release archive published for this platform
    pub fn archive_extension(&self) -> &'static str {
        match self.os {
            Os::Windows => "zip",
            Os::Darwin | Os::Linux => "tar.gz",
        }
    }

    pub fn binary_name(&self) -> &'static str {
        match self.os {
            Os::Windows => "go.exe",
            Os::Darwin | Os::Linux => "go",
        }
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}
