use crate::error::{Result, RungoError};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;
use walkdir::WalkDir;

const ENTRY_FILE: &str = "main.go";

/// Named snippets, each stored as its own Go module directory
pub struct SnippetStore {
    dir: PathBuf,
}

impl SnippetStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn snippet_dir(&self, name: &str) -> Result<PathBuf> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\']);
        if !valid {
            return Err(RungoError::InvalidSnippetName(name.to_string()));
        }
        Ok(self.dir.join(name))
    }

    /// Create a new module `name` with `go mod init` and write its `main.go`
    pub fn create(&self, name: &str, source: &str, go_binary: &Path) -> Result<PathBuf> {
        let dir = self.snippet_dir(name)?;
        if dir.exists() {
            return Err(RungoError::SnippetExists(name.to_string()));
        }

        std::fs::create_dir_all(&dir)?;

        let output = Command::new(go_binary)
            .args(["mod", "init", name])
            .current_dir(&dir)
            .output()?;
        if !output.status.success() {
            std::fs::remove_dir_all(&dir)?;
            return Err(RungoError::CommandFailed {
                command: format!("go mod init {}", name),
                output: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        std::fs::write(dir.join(ENTRY_FILE), source)?;
        debug!("created snippet {} at {}", name, dir.display());
        Ok(dir)
    }

    pub fn list(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| std::io::Error::other(e.to_string()))?;
            if entry.file_type().is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();

        Ok(names)
    }

    pub fn open(&self, name: &str) -> Result<String> {
        let dir = self.snippet_dir(name)?;
        if !dir.is_dir() {
            return Err(RungoError::SnippetNotFound(name.to_string()));
        }
        Ok(std::fs::read_to_string(dir.join(ENTRY_FILE))?)
    }

    pub fn save(&self, name: &str, source: &str) -> Result<PathBuf> {
        let dir = self.snippet_dir(name)?;
        if !dir.is_dir() {
            return Err(RungoError::SnippetNotFound(name.to_string()));
        }
        let path = dir.join(ENTRY_FILE);
        std::fs::write(&path, source)?;
        Ok(path)
    }
}
