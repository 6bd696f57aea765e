use anyhow::Result;
use clap::Parser;
use emp::application::InstallOptions;
use emp::commands::{self, GlobalOptions, ReleaseFlags, UpgradeFlags};
use emp::manifest::DependencyCategory;
use emp::package::VersionBump;
use std::path::PathBuf;

/// emp - a local package registry
///
/// Release versioned package archives into a shared directory and install
/// them into projects as file dependencies.
///
/// Examples:
///   emp setup ~/shared              # Use ~/shared as the registry
///   emp release --bump minor        # Release the package in the current directory
///   emp install my-ui --dev         # Install the latest my-ui as a dev dependency
///   emp upgrade                     # Upgrade every installed registry package
#[derive(Parser, Debug)]
#[command(author, version = env!("EMP_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding the registry (overrides the config file; also via EMP_REGISTRY)
    #[arg(
        long = "registry",
        short = 'r',
        env = "EMP_REGISTRY",
        value_name = "PATH",
        global = true
    )]
    pub registry: Option<PathBuf>,

    /// Project or package directory (defaults to the current directory)
    #[arg(long = "project", short = 'C', value_name = "DIR", global = true)]
    pub project: Option<PathBuf>,

    /// Print debug logs
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Choose the registry directory and create its store
    Setup(SetupArgs),

    /// Install the latest version of a package into the project
    Install(InstallArgs),

    /// Upgrade installed registry packages to their latest versions
    Upgrade(UpgradeArgs),

    /// Bump the package version and release it to the registry
    Release(ReleaseArgs),

    /// List released packages with their latest version
    List,

    /// Show all released versions of a package
    Show(ShowArgs),

    /// Check every stored artifact against its recorded hash
    Verify,
}

#[derive(clap::Args, Debug)]
pub struct SetupArgs {
    /// Registry directory; asked for when omitted
    #[arg(value_name = "PATH")]
    pub path: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct InstallArgs {
    /// Package name; selected interactively when omitted
    #[arg(value_name = "PACKAGE")]
    pub package: Option<String>,

    /// Install as a development dependency
    #[arg(long, conflicts_with = "runtime")]
    pub dev: bool,

    /// Install as a runtime dependency
    #[arg(long)]
    pub runtime: bool,

    /// Do not ask for confirmation
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Do not run the project's install command afterwards
    #[arg(long)]
    pub skip_install: bool,
}

#[derive(clap::Args, Debug)]
pub struct UpgradeArgs {
    /// Only upgrade this package
    #[arg(value_name = "PACKAGE")]
    pub package: Option<String>,

    /// Accept major upgrades without asking
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Read breaking changes from this package source directory's changelog
    #[arg(long, value_name = "DIR", requires = "package")]
    pub changelog: Option<PathBuf>,

    /// Do not run the project's install command afterwards
    #[arg(long)]
    pub skip_install: bool,

    /// Do not commit the upgraded manifest and dependencies
    #[arg(long)]
    pub no_commit: bool,
}

#[derive(clap::Args, Debug)]
pub struct ReleaseArgs {
    /// Version component to bump (major, minor or patch); asked for when omitted
    #[arg(long, value_name = "TYPE", conflicts_with = "current")]
    pub bump: Option<VersionBump>,

    /// Release the version already in package.json
    #[arg(long)]
    pub current: bool,

    /// Breaking changes of a major release
    #[arg(long, value_name = "TEXT")]
    pub breaking: Option<String>,

    /// Prebuilt artifact to release instead of running the pack command
    #[arg(long, value_name = "FILE")]
    pub artifact: Option<PathBuf>,

    /// Changelog entries of this release
    #[arg(long = "entry", value_name = "TEXT")]
    pub entries: Vec<String>,

    /// Do not commit and tag the bumped version
    #[arg(long)]
    pub no_commit: bool,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Package name
    #[arg(value_name = "PACKAGE")]
    pub name: String,
}

fn install_category(args: &InstallArgs) -> Option<DependencyCategory> {
    if args.dev {
        Some(DependencyCategory::Development)
    } else if args.runtime {
        Some(DependencyCategory::Runtime)
    } else {
        None
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let runtime = emp::runtime::RealRuntime;
    let global = GlobalOptions {
        registry: cli.registry,
        project: cli.project,
    };

    match cli.command {
        Commands::Setup(args) => commands::setup(runtime, args.path).await?,
        Commands::Install(args) => {
            let options = InstallOptions {
                category: install_category(&args),
                yes: args.yes,
                changelog_dir: None,
            };
            commands::install(runtime, &global, args.package, options, args.skip_install).await?
        }
        Commands::Upgrade(args) => {
            let flags = UpgradeFlags {
                package: args.package,
                yes: args.yes,
                changelog: args.changelog,
                skip_install: args.skip_install,
                no_commit: args.no_commit,
            };
            commands::upgrade(runtime, &global, flags).await?
        }
        Commands::Release(args) => {
            let flags = ReleaseFlags {
                bump: args.bump,
                current: args.current,
                breaking: args.breaking,
                entries: args.entries,
                artifact: args.artifact,
                no_commit: args.no_commit,
            };
            commands::release(runtime, &global, flags).await?
        }
        Commands::List => commands::list(runtime, &global).await?,
        Commands::Show(args) => commands::show(runtime, &global, &args.name).await?,
        Commands::Verify => commands::verify(runtime, &global).await?,
    }
    Ok(())
}
