use crate::archive;
use crate::config::Config;
use crate::download::Downloader;
use crate::error::{Result, RungoError};
use crate::models::{InstalledToolchain, VersionId};
use crate::platform::PlatformId;
use colored::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Prefix of the scratch directories archives are unpacked into
const STAGING_PREFIX: &str = ".staging-";

/// Top-level directory every upstream Go archive unpacks to
const ARCHIVE_ROOT: &str = "go";

pub struct Installer {
    config: Config,
    downloader: Downloader,
    in_flight: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl Installer {
    pub fn new(config: Config, downloader: Downloader) -> Self {
        Self {
            config,
            downloader,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The installed toolchain for `version`, if its canonical directory exists
    pub fn installed(
        &self,
        version: &VersionId,
        platform: &PlatformId,
    ) -> Result<Option<InstalledToolchain>> {
        let install_dir = self.config.gos_dir.join(version.install_dir_name(platform));
        if !install_dir.is_dir() {
            return Ok(None);
        }
        toolchain_at(version.clone(), *platform, install_dir).map(Some)
    }

    /// Install `version` unless it is already present.
    ///
    /// The archive is unpacked into a staging directory and moved under its
    /// canonical name with a single rename, so the canonical directory only
    /// ever exists fully populated. Concurrent calls for the same version
    /// serialize and the later ones take the fast path.
    pub async fn ensure_installed(
        &self,
        version: &VersionId,
        platform: &PlatformId,
    ) -> Result<InstalledToolchain> {
        if let Some(installed) = self.installed(version, platform)? {
            debug!("{} already installed at {}", version, installed.path.display());
            return Ok(installed);
        }

        let dir_name = version.install_dir_name(platform);
        let lock = self.install_lock(&dir_name);
        let result = {
            let _guard = lock.lock().await;
            self.install_locked(version, platform, &dir_name).await
        };
        self.release_lock(&dir_name, lock);
        result
    }

    async fn install_locked(
        &self,
        version: &VersionId,
        platform: &PlatformId,
        dir_name: &str,
    ) -> Result<InstalledToolchain> {
        if let Some(installed) = self.installed(version, platform)? {
            return Ok(installed);
        }

        println!(
            "{} Go {} for {}",
            "Installing".green().bold(),
            version.to_string().cyan(),
            platform.to_string().yellow()
        );

        let file_name = format!("{}.{}", dir_name, platform.archive_extension());
        let archive_path = self.config.downloads_dir.join(&file_name);
        std::fs::create_dir_all(&self.config.downloads_dir)?;

        if self.config.keep_downloads && archive_path.is_file() {
            println!("{}", "Using cached download".yellow());
        } else {
            let url = self.config.archive_url(&file_name);
            info!("downloading {}", url);
            self.downloader
                .download_with_progress(&url, &archive_path)
                .await?;
        }

        let target = self.config.gos_dir.join(dir_name);
        if let Err(e) = self.unpack_into_place(&archive_path, &target).await {
            remove_archive(&archive_path);
            return Err(e);
        }

        if !self.config.keep_downloads {
            remove_archive(&archive_path);
        }

        println!(
            "{} Go {} installed to {}",
            "✓".green().bold(),
            version.to_string().cyan(),
            target.display().to_string().dimmed()
        );

        toolchain_at(version.clone(), *platform, target)
    }

    async fn unpack_into_place(&self, archive_path: &Path, target: &Path) -> Result<()> {
        std::fs::create_dir_all(&self.config.gos_dir)?;
        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&self.config.gos_dir)?;

        println!("{}", "Extracting archive...".yellow());
        let source = archive_path.to_path_buf();
        let dest = staging.path().to_path_buf();
        tokio::task::spawn_blocking(move || archive::extract(&source, &dest))
            .await
            .map_err(|e| RungoError::ExtractFailed {
                archive: archive_path.display().to_string(),
                message: e.to_string(),
            })??;

        let extracted = staging.path().join(ARCHIVE_ROOT);
        if !extracted.is_dir() {
            return Err(RungoError::RenameFailed {
                target: target.display().to_string(),
                message: format!("archive has no top-level `{}` directory", ARCHIVE_ROOT),
            });
        }

        std::fs::rename(&extracted, target).map_err(|e| RungoError::RenameFailed {
            target: target.display().to_string(),
            message: e.to_string(),
        })?;

        staging.close()?;
        Ok(())
    }

    fn install_lock(&self, dir_name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(in_flight.entry(dir_name.to_string()).or_default())
    }

    /// Drop the map entry for `dir_name` once no other caller holds its lock
    fn release_lock(&self, dir_name: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // one reference in the map, one in `lock`
        if Arc::strong_count(&lock) == 2 {
            in_flight.remove(dir_name);
        }
    }

    /// Remove staging directories left behind by interrupted installs
    pub fn sweep_staging(&self) -> Result<usize> {
        if !self.config.gos_dir.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        for entry in std::fs::read_dir(&self.config.gos_dir)? {
            let entry = entry?;
            let is_staging = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(STAGING_PREFIX));

            if is_staging && entry.file_type()?.is_dir() {
                warn!("removing orphaned staging directory {}", entry.path().display());
                std::fs::remove_dir_all(entry.path())?;
                removed += 1;
            }
        }

        Ok(removed)
    }

    /// Delete every archive in the downloads directory, returning the number
    /// of files and bytes removed
    pub fn clear_downloads(&self) -> Result<(usize, u64)> {
        if !self.config.downloads_dir.exists() {
            return Ok((0, 0));
        }

        let mut count = 0;
        let mut bytes = 0;
        for entry in std::fs::read_dir(&self.config.downloads_dir)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if metadata.is_file() {
                bytes += metadata.len();
                std::fs::remove_file(entry.path())?;
                count += 1;
            }
        }

        Ok((count, bytes))
    }

    /// List toolchains installed for `platform`, newest first
    pub fn list_installed(&self, platform: &PlatformId) -> Result<Vec<InstalledToolchain>> {
        let mut installed = Vec::new();

        if !self.config.gos_dir.exists() {
            return Ok(installed);
        }

        let suffix = format!(".{}", platform);
        for entry in std::fs::read_dir(&self.config.gos_dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            let Some(dir_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if dir_name.starts_with(STAGING_PREFIX) {
                continue;
            }

            if let Some(version) = dir_name
                .strip_suffix(&suffix)
                .and_then(|label| label.parse::<VersionId>().ok())
            {
                installed.push(toolchain_at(version, *platform, path.clone())?);
            }
        }

        installed.sort_by(|a, b| b.version.cmp(&a.version));

        Ok(installed)
    }
}

fn toolchain_at(
    version: VersionId,
    platform: PlatformId,
    path: PathBuf,
) -> Result<InstalledToolchain> {
    let metadata = std::fs::metadata(&path)?;
    let installed_at = metadata
        .created()
        .or_else(|_| metadata.modified())
        .map(chrono::DateTime::<chrono::Utc>::from)
        .unwrap_or_else(|_| chrono::Utc::now());

    Ok(InstalledToolchain {
        binary_path: path.join("bin").join(platform.binary_name()),
        version,
        platform,
        path,
        installed_at,
    })
}

fn remove_archive(path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("failed to remove {}: {}", path.display(), e);
        }
    }
}
