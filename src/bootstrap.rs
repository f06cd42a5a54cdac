use crate::catalog::ReleaseCatalog;
use crate::error::{Result, RungoError};
use crate::install::Installer;
use crate::models::InstalledToolchain;
use crate::toolchain::RuntimeContext;
use tracing::{info, warn};

#[derive(Debug)]
pub enum BootstrapOutcome {
    /// The latest release is installed and active
    Fresh(InstalledToolchain),
    /// The latest release could not be activated; an older local toolchain
    /// is active instead
    Degraded {
        toolchain: InstalledToolchain,
        reason: RungoError,
    },
}

impl BootstrapOutcome {
    pub fn toolchain(&self) -> &InstalledToolchain {
        match self {
            BootstrapOutcome::Fresh(toolchain) => toolchain,
            BootstrapOutcome::Degraded { toolchain, .. } => toolchain,
        }
    }
}

/// Startup sequence: sweep interrupted installs, install the latest release
/// if needed and activate it.
///
/// Recoverable failures fall back to the previously active toolchain, then to
/// the newest one on disk. An error is returned only when nothing usable is
/// installed.
pub async fn bootstrap(
    ctx: &RuntimeContext,
    catalog: &ReleaseCatalog,
    installer: &Installer,
) -> Result<BootstrapOutcome> {
    let swept = installer.sweep_staging()?;
    if swept > 0 {
        info!("removed {} interrupted install(s)", swept);
    }

    let reason = match install_latest(ctx, catalog, installer).await {
        Ok(toolchain) => return Ok(BootstrapOutcome::Fresh(toolchain)),
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => e,
    };
    warn!("could not activate the latest Go release: {}", reason);

    if let Some(toolchain) = ctx.switch.restore(installer, &ctx.platform)? {
        return Ok(BootstrapOutcome::Degraded { toolchain, reason });
    }

    if let Some(toolchain) = installer.list_installed(&ctx.platform)?.into_iter().next() {
        ctx.switch.activate(&toolchain)?;
        return Ok(BootstrapOutcome::Degraded { toolchain, reason });
    }

    Err(reason)
}

async fn install_latest(
    ctx: &RuntimeContext,
    catalog: &ReleaseCatalog,
    installer: &Installer,
) -> Result<InstalledToolchain> {
    let latest = catalog.latest_version().await?;
    let toolchain = installer.ensure_installed(&latest, &ctx.platform).await?;
    ctx.switch.activate(&toolchain)?;
    Ok(toolchain)
}
