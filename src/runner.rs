use crate::error::{Result, RungoError};
use crate::snippets::SnippetStore;
use crate::toolchain::ToolchainReader;
use std::path::Path;
use std::process::{Command, Output};
use tracing::debug;

fn combined(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    text
}

/// Run a standalone source file with the active toolchain and return its
/// combined stdout and stderr. Compile errors are part of the output, not an
/// error.
pub fn run_source(toolchain: &ToolchainReader, work_dir: &Path, source: &str) -> Result<String> {
    let go = toolchain.require_binary()?;

    let file = tempfile::Builder::new()
        .prefix("rungo-")
        .suffix(".go")
        .tempfile_in(work_dir)?;
    std::fs::write(file.path(), source)?;

    debug!("running {} with {}", file.path().display(), go.display());
    let output = Command::new(&go).arg("run").arg(file.path()).output()?;

    file.close()?;
    Ok(combined(&output))
}

/// Save `source` into the snippet's module, tidy its dependencies and run it
pub fn run_snippet(
    toolchain: &ToolchainReader,
    store: &SnippetStore,
    name: &str,
    source: &str,
) -> Result<String> {
    let go = toolchain.require_binary()?;
    store.save(name, source)?;
    let dir = store.snippet_dir(name)?;

    let tidy = Command::new(&go)
        .args(["mod", "tidy"])
        .current_dir(&dir)
        .output()?;
    if !tidy.status.success() {
        return Err(RungoError::CommandFailed {
            command: "go mod tidy".to_string(),
            output: combined(&tidy).trim().to_string(),
        });
    }

    let output = Command::new(&go)
        .args(["run", "main.go"])
        .current_dir(&dir)
        .output()?;

    Ok(combined(&output))
}
