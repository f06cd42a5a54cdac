use thiserror::Error;

#[derive(Error, Debug)]
pub enum RungoError {
    #[error("Unsupported operating system: {0}")]
    UnsupportedOs(String),

    #[error("Unsupported architecture {arch} for {os}")]
    UnsupportedArch { os: String, arch: String },

    #[error("Request to {url} failed: {source}")]
    RequestFailed {
        url: String,
        source: reqwest::Error,
    },

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Unexpected HTTP status {status} from {url}")]
    UnexpectedStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Failed to parse release listing: {0}")]
    ParseFailed(String),

    #[error("Unsupported archive format: {0}")]
    UnsupportedArchive(String),

    #[error("Failed to extract {archive}: {message}")]
    ExtractFailed { archive: String, message: String },

    #[error("Failed to move extracted toolchain into {target}: {message}")]
    RenameFailed { target: String, message: String },

    #[error("Failed to activate {version}: {message}")]
    ActivationFailed { version: String, message: String },

    #[error("Invalid version format: {0}")]
    InvalidVersion(String),

    #[error("No Go toolchain is active")]
    NoActiveToolchain,

    #[error("Snippet {0} already exists")]
    SnippetExists(String),

    #[error("Snippet {0} not found")]
    SnippetNotFound(String),

    #[error("Invalid snippet name: {0}")]
    InvalidSnippetName(String),

    #[error("`{command}` failed: {output}")]
    CommandFailed { command: String, output: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl RungoError {
    /// Map a reqwest failure for `url`, keeping timeouts distinct from other
    /// transport errors.
    pub fn request(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            RungoError::Timeout {
                url: url.to_string(),
            }
        } else {
            RungoError::RequestFailed {
                url: url.to_string(),
                source,
            }
        }
    }

    /// Errors that make the application unusable on this machine.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RungoError::UnsupportedOs(_) | RungoError::UnsupportedArch { .. }
        )
    }

    /// Errors the user can reasonably retry by re-running the command.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RungoError::RequestFailed { .. }
                | RungoError::Timeout { .. }
                | RungoError::UnexpectedStatus { .. }
                | RungoError::ExtractFailed { .. }
                | RungoError::RenameFailed { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, RungoError>;
