use crate::bootstrap::{bootstrap, BootstrapOutcome};
use crate::catalog::ReleaseCatalog;
use crate::commands::{dispatch, CommandOutcome, ToolchainCommand};
use crate::config::Config;
use crate::download::{http_client, Downloader};
use crate::error::{Result, RungoError};
use crate::install::Installer;
use crate::models::VersionId;
use crate::runner::{run_snippet, run_source};
use crate::snippets::SnippetStore;
use crate::toolchain::RuntimeContext;
use crate::utils::{confirm, format_size, print_info, print_success, print_versions, print_warning};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;

const SNIPPET_TEMPLATE: &str = "package main\n\nimport \"fmt\"\n\nfunc main() {\n\tfmt.Println(\"Hello, RunGo!\")\n}\n";

#[derive(Parser)]
#[command(name = "rungo")]
#[command(about = "Run Go snippets against any installed Go toolchain", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(skip)]
    config: Config,
}

#[derive(Subcommand)]
enum Commands {
    /// Install and activate the latest Go release
    Init,

    /// List Go releases available for download
    #[command(alias = "ls-remote")]
    ListRemote,

    /// Install a Go release (defaults to the latest)
    Install {
        /// Version to install (e.g. go1.22.0 or 1.22.0)
        version: Option<String>,
    },

    /// Install if needed and switch to a Go release
    Use {
        /// Version to use
        version: String,
    },

    /// List installed Go releases
    #[command(alias = "ls")]
    List,

    /// Show the active Go release
    Current,

    /// Run Go source from a file or stdin
    Run {
        /// Source file; stdin is read when omitted
        file: Option<PathBuf>,

        /// Run inside a saved snippet module
        #[arg(short, long)]
        snippet: Option<String>,
    },

    /// Manage saved snippets
    Snippet {
        #[command(subcommand)]
        action: SnippetAction,
    },

    /// Remove interrupted installs and cached downloads
    Clean {
        /// Skip the confirmation prompt
        #[arg(long)]
        all: bool,
    },

    /// Show RunGo configuration
    Config {
        /// Show specific config key
        key: Option<String>,
    },
}

#[derive(Subcommand)]
enum SnippetAction {
    /// Create a snippet as a new Go module
    New {
        name: String,

        /// Initial source file (a hello-world template otherwise)
        #[arg(long)]
        from: Option<PathBuf>,
    },

    /// List saved snippets
    List,

    /// Print a snippet's source
    Open { name: String },

    /// Overwrite a snippet's source
    Save {
        name: String,

        /// Source file; stdin is read when omitted
        #[arg(long)]
        from: Option<PathBuf>,
    },
}

struct Services {
    ctx: RuntimeContext,
    catalog: ReleaseCatalog,
    installer: Installer,
    store: SnippetStore,
}

impl Services {
    fn new(config: Config) -> Result<Self> {
        let ctx = RuntimeContext::new(config.clone())?;
        let client = http_client(config.request_timeout())?;

        Ok(Self {
            catalog: ReleaseCatalog::new(client.clone(), &config),
            installer: Installer::new(config.clone(), Downloader::new(client)),
            store: SnippetStore::new(config.snippets_dir.clone()),
            ctx,
        })
    }

    /// Restore the last active toolchain, bootstrapping when there is none
    async fn ensure_active(&self) -> Result<()> {
        if self
            .ctx
            .switch
            .restore(&self.installer, &self.ctx.platform)?
            .is_some()
        {
            return Ok(());
        }

        let outcome = bootstrap(&self.ctx, &self.catalog, &self.installer).await?;
        report_bootstrap(&outcome);
        Ok(())
    }
}

fn report_bootstrap(outcome: &BootstrapOutcome) {
    let toolchain = outcome.toolchain();
    match outcome {
        BootstrapOutcome::Fresh(_) => {
            print_success(&format!("Using Go {}", toolchain.version));
        }
        BootstrapOutcome::Degraded { reason, .. } => {
            print_warning(&format!("Could not set up the latest Go release: {}", reason));
            print_info(&format!("Falling back to Go {}", toolchain.version));
        }
    }
    println!("  {}", toolchain.binary_path.display().to_string().dimmed());
}

fn read_source(file: Option<&PathBuf>) -> Result<String> {
    match file {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => Ok(std::io::read_to_string(std::io::stdin())?),
    }
}

impl Cli {
    pub fn new(config: Config) -> Self {
        let mut cli = Self::parse();
        cli.config = config;
        cli
    }

    pub async fn run(self) -> Result<()> {
        if let Commands::Config { ref key } = self.command {
            return self.show_config(key.clone());
        }

        let services = Services::new(self.config.clone())?;

        match self.command {
            Commands::Init => self.init(&services).await,
            Commands::ListRemote => self.list_remote(&services).await,
            Commands::Install { ref version } => self.install(&services, version.as_deref()).await,
            Commands::Use { ref version } => self.use_version(&services, version).await,
            Commands::List => self.list(&services),
            Commands::Current => self.current(&services),
            Commands::Run {
                ref file,
                ref snippet,
            } => self.run_code(&services, file.as_ref(), snippet.as_deref()).await,
            Commands::Snippet { ref action } => self.snippet(&services, action).await,
            Commands::Clean { all } => self.clean(&services, all),
            Commands::Config { .. } => Ok(()),
        }
    }

    async fn init(&self, services: &Services) -> Result<()> {
        let outcome = bootstrap(&services.ctx, &services.catalog, &services.installer).await?;
        report_bootstrap(&outcome);
        Ok(())
    }

    async fn list_remote(&self, services: &Services) -> Result<()> {
        print_info("Fetching available Go versions...");

        let versions = match dispatch(
            ToolchainCommand::ListVersions,
            &services.ctx,
            &services.catalog,
            &services.installer,
        )
        .await?
        {
            CommandOutcome::Versions(versions) => versions,
            CommandOutcome::Installed(_) | CommandOutcome::Activated(_) => {
                unreachable!("ListVersions always yields Versions")
            }
        };

        services
            .ctx
            .switch
            .restore(&services.installer, &services.ctx.platform)?;
        let active = services.ctx.reader().version();

        println!("\n{}", "Available Go Versions:".green().bold());
        print_versions(&versions, active.as_ref());

        println!("\n{}", "Usage:".yellow());
        println!("  rungo install <version>");
        println!("  rungo use go1.22.0");

        Ok(())
    }

    async fn install(&self, services: &Services, version: Option<&str>) -> Result<()> {
        let version: VersionId = match version {
            Some(label) => label.parse()?,
            None => services.catalog.latest_version().await?,
        };

        if let Some(existing) = services.installer.installed(&version, &services.ctx.platform)? {
            print_warning(&format!("Go {} is already installed", version));
            println!("  Path: {}", existing.path.display().to_string().dimmed());
            return Ok(());
        }

        if let CommandOutcome::Installed(toolchain) = dispatch(
            ToolchainCommand::Install(version.clone()),
            &services.ctx,
            &services.catalog,
            &services.installer,
        )
        .await?
        {
            println!("\n{}", "Next steps:".yellow());
            println!("  rungo use {}    # Activate this version", toolchain.version);
        }

        Ok(())
    }

    async fn use_version(&self, services: &Services, version: &str) -> Result<()> {
        let version: VersionId = version.parse()?;

        if let CommandOutcome::Activated(toolchain) = dispatch(
            ToolchainCommand::Activate(version),
            &services.ctx,
            &services.catalog,
            &services.installer,
        )
        .await?
        {
            print_success(&format!("Now using Go {}", toolchain.version));
            println!("  {}", toolchain.binary_path.display().to_string().dimmed());
        }

        Ok(())
    }

    fn list(&self, services: &Services) -> Result<()> {
        let installed = services.installer.list_installed(&services.ctx.platform)?;

        if installed.is_empty() {
            print_warning("No Go versions installed");
            println!("\n{}", "Install a version:".yellow());
            println!("  rungo install");
            return Ok(());
        }

        services
            .ctx
            .switch
            .restore(&services.installer, &services.ctx.platform)?;
        let active = services.ctx.reader().version();

        println!("{}", "Installed Go Versions:".green().bold());
        let versions: Vec<VersionId> = installed.into_iter().map(|t| t.version).collect();
        print_versions(&versions, active.as_ref());

        Ok(())
    }

    fn current(&self, services: &Services) -> Result<()> {
        match services
            .ctx
            .switch
            .restore(&services.installer, &services.ctx.platform)?
        {
            Some(toolchain) => {
                println!(
                    "{} {}",
                    "Current Go:".green().bold(),
                    toolchain.version.to_string().cyan()
                );
                println!("  {}", toolchain.binary_path.display().to_string().dimmed());
                println!(
                    "  {}",
                    format!("installed {}", toolchain.installed_at.format("%Y-%m-%d")).dimmed()
                );
            }
            None => {
                print_warning("No Go version currently active");
                println!("\n{}", "Activate a version:".yellow());
                println!("  rungo use <version>");
            }
        }

        Ok(())
    }

    async fn run_code(
        &self,
        services: &Services,
        file: Option<&PathBuf>,
        snippet: Option<&str>,
    ) -> Result<()> {
        services.ensure_active().await?;
        let reader = services.ctx.reader();

        let output = match snippet {
            Some(name) => {
                let source = match file {
                    Some(path) => std::fs::read_to_string(path)?,
                    None => services.store.open(name)?,
                };
                run_snippet(&reader, &services.store, name, &source)?
            }
            None => {
                let source = read_source(file)?;
                run_source(&reader, &services.ctx.config.app_dir, &source)?
            }
        };

        print!("{}", output);
        Ok(())
    }

    async fn snippet(&self, services: &Services, action: &SnippetAction) -> Result<()> {
        match action {
            SnippetAction::New { name, from } => {
                services.ensure_active().await?;
                let source = match from {
                    Some(path) => std::fs::read_to_string(path)?,
                    None => SNIPPET_TEMPLATE.to_string(),
                };
                let go = services.ctx.reader().require_binary()?;
                let dir = services.store.create(name, &source, &go)?;
                print_success(&format!("Created snippet {}", name.cyan()));
                println!("  {}", dir.display().to_string().dimmed());
            }
            SnippetAction::List => {
                let names = services.store.list()?;
                if names.is_empty() {
                    print_warning("No snippets saved");
                    println!("  rungo snippet new <name>");
                } else {
                    println!("{}", "Snippets:".green().bold());
                    for name in names {
                        println!("  {}", name.cyan());
                    }
                }
            }
            SnippetAction::Open { name } => {
                print!("{}", services.store.open(name)?);
            }
            SnippetAction::Save { name, from } => {
                let source = read_source(from.as_ref())?;
                let path = services.store.save(name, &source)?;
                print_success(&format!("Saved {}", path.display()));
            }
        }

        Ok(())
    }

    fn clean(&self, services: &Services, all: bool) -> Result<()> {
        let swept = services.installer.sweep_staging()?;
        if swept > 0 {
            print_success(&format!("Removed {} interrupted install(s)", swept));
        }

        let cached: u64 = std::fs::read_dir(&services.ctx.config.downloads_dir)?
            .filter_map(|e| e.ok())
            .filter_map(|e| e.metadata().ok())
            .filter(|m| m.is_file())
            .map(|m| m.len())
            .sum();

        if cached == 0 {
            print_info("Download cache is already empty");
            return Ok(());
        }

        println!("{} {} in download cache", "Found:".yellow(), format_size(cached));

        if all || confirm("Remove all cached downloads?") {
            let (count, bytes) = services.installer.clear_downloads()?;
            print_success(&format!("Removed {} file(s), {}", count, format_size(bytes)));
        } else {
            print_info("Clean cancelled");
        }

        Ok(())
    }

    fn show_config(&self, key: Option<String>) -> Result<()> {
        if let Some(key_name) = key {
            match key_name.as_str() {
                "dir" | "app_dir" => println!("{}", self.config.app_dir.display()),
                "gos_dir" => println!("{}", self.config.gos_dir.display()),
                "snippets_dir" => println!("{}", self.config.snippets_dir.display()),
                "downloads_dir" => println!("{}", self.config.downloads_dir.display()),
                "download_base_url" => println!("{}", self.config.download_base_url),
                "latest_version_url" => println!("{}", self.config.latest_version_url),
                "request_timeout_secs" => println!("{}", self.config.request_timeout_secs),
                "keep_downloads" => println!("{}", self.config.keep_downloads),
                _ => {
                    return Err(RungoError::ConfigError(format!(
                        "unknown config key: {}",
                        key_name
                    )))
                }
            }
        } else {
            println!("{}", "RunGo Configuration:".green().bold());
            println!("  {} {}", "App Directory:".cyan(), self.config.app_dir.display());
            println!("  {} {}", "Toolchains:".cyan(), self.config.gos_dir.display());
            println!("  {} {}", "Snippets:".cyan(), self.config.snippets_dir.display());
            println!("  {} {}", "Downloads:".cyan(), self.config.downloads_dir.display());
            println!("  {} {}", "Download URL:".cyan(), self.config.download_base_url);
            println!("  {} {}", "Latest URL:".cyan(), self.config.latest_version_url);
            println!("  {} {}s", "Request Timeout:".cyan(), self.config.request_timeout_secs);
            println!("  {} {}", "Keep Downloads:".cyan(), self.config.keep_downloads);
        }

        Ok(())
    }
}
