use crate::catalog::ReleaseCatalog;
use crate::error::Result;
use crate::install::Installer;
use crate::models::{InstalledToolchain, VersionId};
use crate::toolchain::RuntimeContext;

/// Toolchain operations a front end can request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolchainCommand {
    Install(VersionId),
    /// Install if needed, then make the version active
    Activate(VersionId),
    ListVersions,
}

#[derive(Debug)]
pub enum CommandOutcome {
    Installed(InstalledToolchain),
    Activated(InstalledToolchain),
    Versions(Vec<VersionId>),
}

pub async fn dispatch(
    command: ToolchainCommand,
    ctx: &RuntimeContext,
    catalog: &ReleaseCatalog,
    installer: &Installer,
) -> Result<CommandOutcome> {
    match command {
        ToolchainCommand::Install(version) => {
            let toolchain = installer.ensure_installed(&version, &ctx.platform).await?;
            Ok(CommandOutcome::Installed(toolchain))
        }
        ToolchainCommand::Activate(version) => {
            let toolchain = installer.ensure_installed(&version, &ctx.platform).await?;
            ctx.switch.activate(&toolchain)?;
            Ok(CommandOutcome::Activated(toolchain))
        }
        ToolchainCommand::ListVersions => {
            let versions = catalog.list_available_versions().await?;
            Ok(CommandOutcome::Versions(versions))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::download::{http_client, Downloader};
    use crate::error::RungoError;
    use crate::platform::PlatformId;
    use std::time::Duration;
    use tempfile::TempDir;

    fn setup(server: &mockito::Server, temp: &TempDir) -> (RuntimeContext, ReleaseCatalog, Installer) {
        let mut config = Config::load_from(temp.path()).unwrap();
        config.download_base_url = format!("{}/dl", server.url());
        let client = http_client(Duration::from_secs(5)).unwrap();
        let linux = PlatformId::resolve("linux", "amd64").unwrap();
        (
            RuntimeContext::with_platform(config.clone(), linux),
            ReleaseCatalog::new(client.clone(), &config),
            Installer::new(config, Downloader::new(client)),
        )
    }

    #[tokio::test]
    async fn test_activate_uses_existing_install_without_network() {
        let server = mockito::Server::new_async().await;
        let temp = TempDir::new().unwrap();
        let (ctx, catalog, installer) = setup(&server, &temp);
        std::fs::create_dir_all(temp.path().join("gos/go1.21.4.linux-amd64/bin")).unwrap();

        let outcome = dispatch(
            ToolchainCommand::Activate("go1.21.4".parse().unwrap()),
            &ctx,
            &catalog,
            &installer,
        )
        .await
        .unwrap();

        assert!(matches!(outcome, CommandOutcome::Activated(_)));
        assert_eq!(ctx.reader().version().unwrap().as_str(), "go1.21.4");
    }

    #[tokio::test]
    async fn test_failed_activate_leaves_switch_untouched() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/dl/go1.99.0.linux-amd64.tar.gz")
            .with_status(404)
            .create_async()
            .await;
        let temp = TempDir::new().unwrap();
        let (ctx, catalog, installer) = setup(&server, &temp);

        let err = dispatch(
            ToolchainCommand::Activate("go1.99.0".parse().unwrap()),
            &ctx,
            &catalog,
            &installer,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, RungoError::UnexpectedStatus { .. }));
        assert_eq!(ctx.reader().active(), None);
    }

    #[tokio::test]
    async fn test_list_versions() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/dl/")
            .with_status(200)
            .with_body(r#"<h3 class="toggleButton"><span>go1.21.4</span></h3><h3 class="toggleButton"><span>go1.22.0</span></h3>"#)
            .create_async()
            .await;
        let temp = TempDir::new().unwrap();
        let (ctx, catalog, installer) = setup(&server, &temp);

        match dispatch(ToolchainCommand::ListVersions, &ctx, &catalog, &installer)
            .await
            .unwrap()
        {
            CommandOutcome::Versions(versions) => {
                let labels: Vec<&str> = versions.iter().map(|v| v.as_str()).collect();
                assert_eq!(labels, vec!["go1.22.0", "go1.21.4"]);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }
}
