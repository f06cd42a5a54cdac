use crate::error::{Result, RungoError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "run-go";
const GOS_DIR: &str = "gos";
const SNIPPETS_DIR: &str = "snippets";
const DOWNLOADS_DIR: &str = "downloads";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(skip)]
    pub app_dir: PathBuf,

    #[serde(skip)]
    pub gos_dir: PathBuf,

    #[serde(skip)]
    pub snippets_dir: PathBuf,

    #[serde(skip)]
    pub downloads_dir: PathBuf,

    #[serde(skip)]
    pub config_file: PathBuf,

    /// Base URL of the release listing and archive downloads
    pub download_base_url: String,

    /// Plain-text endpoint naming the latest stable release
    pub latest_version_url: String,

    /// Timeout applied to every HTTP request
    pub request_timeout_secs: u64,

    /// Keep downloaded archives after a successful install
    pub keep_downloads: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::with_root(Self::default_app_dir())
    }
}

impl Config {
    /// Configuration rooted at `app_dir` with default settings
    pub fn with_root<P: AsRef<Path>>(app_dir: P) -> Self {
        let app_dir = app_dir.as_ref().to_path_buf();

        Self {
            gos_dir: app_dir.join(GOS_DIR),
            snippets_dir: app_dir.join(SNIPPETS_DIR),
            downloads_dir: app_dir.join(DOWNLOADS_DIR),
            config_file: app_dir.join("config.toml"),
            app_dir,
            download_base_url: "https://go.dev/dl".to_string(),
            latest_version_url: "https://go.dev/VERSION?m=text".to_string(),
            request_timeout_secs: 30,
            keep_downloads: false,
        }
    }

    fn default_app_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("RUNGO_DIR") {
            return PathBuf::from(shellexpand::tilde(&dir).to_string());
        }

        if let Some(home) = dirs::home_dir() {
            return home.join(APP_DIR);
        }

        PathBuf::from(shellexpand::tilde("~/run-go").to_string())
    }

    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_app_dir())
    }

    /// Load (or create) the configuration stored under `app_dir`
    pub fn load_from<P: AsRef<Path>>(app_dir: P) -> Result<Self> {
        let mut config = Self::with_root(app_dir);

        std::fs::create_dir_all(&config.app_dir)?;
        std::fs::create_dir_all(&config.gos_dir)?;
        std::fs::create_dir_all(&config.snippets_dir)?;
        std::fs::create_dir_all(&config.downloads_dir)?;

        if config.config_file.exists() {
            let contents = std::fs::read_to_string(&config.config_file)?;
            let file_config: Config = toml::from_str(&contents)?;

            config.download_base_url = file_config.download_base_url;
            config.latest_version_url = file_config.latest_version_url;
            config.request_timeout_secs = file_config.request_timeout_secs;
            config.keep_downloads = file_config.keep_downloads;
        } else {
            config.save()?;
        }

        if config.request_timeout_secs == 0 {
            return Err(RungoError::ConfigError(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| RungoError::ConfigError(e.to_string()))?;

        std::fs::write(&self.config_file, contents)?;
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// URL of the release listing page
    pub fn listing_url(&self) -> String {
        format!("{}/", self.download_base_url.trim_end_matches('/'))
    }

    /// URL of a release archive, e.g. `<base>/go1.22.0.linux-amd64.tar.gz`
    pub fn archive_url(&self, file_name: &str) -> String {
        format!("{}/{}", self.download_base_url.trim_end_matches('/'), file_name)
    }

    /// File recording the active toolchain between runs
    pub fn current_version_file(&self) -> PathBuf {
        self.app_dir.join("current")
    }
}
