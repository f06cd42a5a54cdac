use crate::config::Config;
use crate::error::{Result, RungoError};
use crate::install::Installer;
use crate::models::{InstalledToolchain, VersionId};
use crate::platform::PlatformId;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveToolchain {
    pub version: VersionId,
    pub binary_path: PathBuf,
}

/// Owner of the active toolchain. Only the switch can change it; everything
/// else reads through a [`ToolchainReader`].
pub struct ToolchainSwitch {
    state: Arc<RwLock<Option<ActiveToolchain>>>,
    current_file: PathBuf,
}

/// Read-only view of the active toolchain
#[derive(Clone)]
pub struct ToolchainReader {
    state: Arc<RwLock<Option<ActiveToolchain>>>,
}

impl ToolchainSwitch {
    pub fn new(current_file: PathBuf) -> Self {
        Self {
            state: Arc::new(RwLock::new(None)),
            current_file,
        }
    }

    pub fn reader(&self) -> ToolchainReader {
        ToolchainReader {
            state: Arc::clone(&self.state),
        }
    }

    /// Make `toolchain` the one every later run uses. The choice is persisted
    /// first; if that fails the previous toolchain stays active.
    pub fn activate(&self, toolchain: &InstalledToolchain) -> Result<()> {
        self.persist(&toolchain.version)?;

        let active = ActiveToolchain {
            version: toolchain.version.clone(),
            binary_path: toolchain.binary_path.clone(),
        };

        let mut state = self.state.write().map_err(|e| RungoError::ActivationFailed {
            version: toolchain.version.to_string(),
            message: format!("failed to acquire write lock: {}", e),
        })?;
        *state = Some(active);

        info!(
            "activated {} ({})",
            toolchain.version,
            toolchain.binary_path.display()
        );
        Ok(())
    }

    /// Version recorded by the last successful activation, if any
    pub fn persisted_version(&self) -> Result<Option<VersionId>> {
        if !self.current_file.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&self.current_file)?;
        let label = contents.trim();
        if label.is_empty() {
            return Ok(None);
        }

        match label.parse() {
            Ok(version) => Ok(Some(version)),
            Err(e) => {
                warn!("ignoring unreadable {}: {}", self.current_file.display(), e);
                Ok(None)
            }
        }
    }

    /// Re-activate the persisted toolchain if it is still installed
    pub fn restore(
        &self,
        installer: &Installer,
        platform: &PlatformId,
    ) -> Result<Option<InstalledToolchain>> {
        let Some(version) = self.persisted_version()? else {
            return Ok(None);
        };

        match installer.installed(&version, platform)? {
            Some(toolchain) => {
                self.activate(&toolchain)?;
                Ok(Some(toolchain))
            }
            None => {
                debug!("persisted toolchain {} is no longer installed", version);
                Ok(None)
            }
        }
    }

    fn persist(&self, version: &VersionId) -> Result<()> {
        let activation_failed = |e: std::io::Error| RungoError::ActivationFailed {
            version: version.to_string(),
            message: e.to_string(),
        };

        let parent = self.current_file.parent().unwrap_or(Path::new("."));
        std::fs::create_dir_all(parent).map_err(activation_failed)?;

        let tmp = self.current_file.with_extension("tmp");
        std::fs::write(&tmp, format!("{}\n", version)).map_err(activation_failed)?;
        std::fs::rename(&tmp, &self.current_file).map_err(activation_failed)
    }
}

impl ToolchainReader {
    pub fn active(&self) -> Option<ActiveToolchain> {
        self.state
            .read()
            .map(|state| state.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn binary_path(&self) -> Option<PathBuf> {
        self.active().map(|active| active.binary_path)
    }

    pub fn version(&self) -> Option<VersionId> {
        self.active().map(|active| active.version)
    }

    /// Binary path of the active toolchain, or an error when none is active
    pub fn require_binary(&self) -> Result<PathBuf> {
        self.binary_path().ok_or(RungoError::NoActiveToolchain)
    }
}

/// Process-wide state shared by the front end and the collaborators: the
/// configuration, the detected platform and the toolchain switch.
pub struct RuntimeContext {
    pub config: Config,
    pub platform: PlatformId,
    pub switch: ToolchainSwitch,
}

impl RuntimeContext {
    /// Fails only when the host platform is unsupported
    pub fn new(config: Config) -> Result<Self> {
        let platform = PlatformId::current()?;
        Ok(Self::with_platform(config, platform))
    }

    pub fn with_platform(config: Config, platform: PlatformId) -> Self {
        let switch = ToolchainSwitch::new(config.current_version_file());
        Self {
            config,
            platform,
            switch,
        }
    }

    pub fn reader(&self) -> ToolchainReader {
        self.switch.reader()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::{http_client, Downloader};
    use std::time::Duration;
    use tempfile::TempDir;

    fn toolchain(root: &Path, label: &str, platform: PlatformId) -> InstalledToolchain {
        let version: VersionId = label.parse().unwrap();
        let path = root.join(version.install_dir_name(&platform));
        InstalledToolchain {
            binary_path: path.join("bin").join(platform.binary_name()),
            version,
            platform,
            path,
            installed_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_activate_exposes_binary_path() {
        let temp = TempDir::new().unwrap();
        let switch = ToolchainSwitch::new(temp.path().join("current"));
        let reader = switch.reader();
        assert_eq!(reader.binary_path(), None);
        assert!(matches!(
            reader.require_binary(),
            Err(RungoError::NoActiveToolchain)
        ));

        let linux = PlatformId::resolve("linux", "amd64").unwrap();
        let installed = toolchain(temp.path(), "go1.22.0", linux);
        switch.activate(&installed).unwrap();
        assert_eq!(
            reader.binary_path(),
            Some(temp.path().join("go1.22.0.linux-amd64").join("bin").join("go"))
        );
        assert_eq!(reader.version().unwrap().as_str(), "go1.22.0");

        let windows = PlatformId::resolve("windows", "amd64").unwrap();
        let installed = toolchain(temp.path(), "go1.21.4", windows);
        switch.activate(&installed).unwrap();
        assert_eq!(
            reader.binary_path(),
            Some(temp.path().join("go1.21.4.windows-amd64").join("bin").join("go.exe"))
        );
    }

    #[test]
    fn test_captured_path_survives_later_activation() {
        let temp = TempDir::new().unwrap();
        let switch = ToolchainSwitch::new(temp.path().join("current"));
        let linux = PlatformId::resolve("linux", "amd64").unwrap();

        switch.activate(&toolchain(temp.path(), "go1.21.4", linux)).unwrap();
        let captured = switch.reader().binary_path().unwrap();

        switch.activate(&toolchain(temp.path(), "go1.22.0", linux)).unwrap();
        assert!(captured.to_string_lossy().contains("go1.21.4"));
        assert!(switch
            .reader()
            .binary_path()
            .unwrap()
            .to_string_lossy()
            .contains("go1.22.0"));
    }

    #[test]
    fn test_failed_persist_keeps_previous_toolchain() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("blocker");
        std::fs::write(&blocker, "file, not a directory").unwrap();

        let switch = ToolchainSwitch::new(blocker.join("current"));
        let linux = PlatformId::resolve("linux", "amd64").unwrap();

        let err = switch
            .activate(&toolchain(temp.path(), "go1.22.0", linux))
            .unwrap_err();
        assert!(matches!(err, RungoError::ActivationFailed { .. }));
        assert_eq!(switch.reader().active(), None);
    }

    #[test]
    fn test_restore_reactivates_installed_version() {
        let temp = TempDir::new().unwrap();
        let config = Config::load_from(temp.path()).unwrap();
        let linux = PlatformId::resolve("linux", "amd64").unwrap();
        std::fs::create_dir_all(config.gos_dir.join("go1.21.4.linux-amd64/bin")).unwrap();

        let installer = Installer::new(
            config.clone(),
            Downloader::new(http_client(Duration::from_secs(5)).unwrap()),
        );

        let first = RuntimeContext::with_platform(config.clone(), linux);
        let installed = installer
            .installed(&"go1.21.4".parse().unwrap(), &linux)
            .unwrap()
            .unwrap();
        first.switch.activate(&installed).unwrap();

        let second = RuntimeContext::with_platform(config.clone(), linux);
        let restored = second.switch.restore(&installer, &linux).unwrap().unwrap();
        assert_eq!(restored.version.as_str(), "go1.21.4");
        assert_eq!(second.reader().binary_path(), Some(installed.binary_path));

        std::fs::remove_dir_all(config.gos_dir.join("go1.21.4.linux-amd64")).unwrap();
        let third = RuntimeContext::with_platform(config, linux);
        assert!(third.switch.restore(&installer, &linux).unwrap().is_none());
        assert_eq!(third.reader().active(), None);
    }
}
