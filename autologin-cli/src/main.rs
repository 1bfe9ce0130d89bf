//! autologin CLI
//!
//! Launches or attaches to the target game, decides whether a login prompt
//! is showing, and completes it with saved or directly supplied
//! credentials. Exit code 0 on success (including "nothing to do"); 1 on
//! any unrecoverable error.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn};

use autologin::{
    ConfigStore, CredentialStore, LoginRunner, RunOutcome, RunnerConfig, TemplateSet,
};

mod admin;
mod logging;

/// The target application this build drives.
mod target {
    pub const EXECUTABLE_NAME: &str = "YuanShen.exe";
    pub const DEFAULT_WINDOW_TITLES: &[&str] = &["原神", "Genshin Impact", "YuanShen"];
}

#[derive(Parser)]
#[command(name = "autologin")]
#[command(about = "Automated login for full-screen games", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch or attach to the game and complete the login prompt
    Run(RunArgs),
    /// Manage saved accounts
    Account {
        #[command(subcommand)]
        command: AccountCommands,
    },
    /// Inspect or change configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Username typed into the login prompt
    #[arg(short, long, requires = "password")]
    username: Option<String>,

    /// Password typed into the login prompt (never logged)
    #[arg(short, long, requires = "username")]
    password: Option<String>,

    /// Use a saved account instead of --username/--password
    #[arg(long, conflicts_with_all = ["username", "password"])]
    saved: Option<String>,

    /// Non-interactive mode; never wait for input
    #[arg(long)]
    headless: bool,

    /// Configure the executable path before running (persisted)
    #[arg(long, value_name = "PATH")]
    exe: Option<PathBuf>,
}

#[derive(Subcommand)]
enum AccountCommands {
    /// Save an account under a name
    Save {
        name: String,
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        password: String,
    },
    /// List saved account names
    List {
        #[arg(long)]
        json: bool,
    },
    /// Delete a saved account
    Delete { name: String },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the current configuration
    Show,
    /// Validate and persist the game executable path
    SetPath { path: PathBuf },
}

struct AppPaths {
    config_file: PathBuf,
    accounts_dir: PathBuf,
    assets_dir: PathBuf,
    log_dir: PathBuf,
}

impl AppPaths {
    fn resolve() -> Self {
        let data_dir = dirs::data_local_dir()
            .map(|dir| dir.join("autologin"))
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            config_file: data_dir.join("config.yaml"),
            accounts_dir: data_dir.join("saved_accounts"),
            assets_dir: assets_dir(),
            log_dir: data_dir.join("logs"),
        }
    }
}

/// Template assets ship next to the executable; fall back to the working
/// directory during development.
fn assets_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("assets")))
        .filter(|dir| dir.exists())
        .unwrap_or_else(|| PathBuf::from("assets"))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let paths = AppPaths::resolve();

    let _guard = match logging::init(&paths.log_dir) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("file logging unavailable: {e:#}");
            tracing_subscriber::fmt().with_target(false).init();
            None
        }
    };

    info!("🚀 autologin v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = dispatch(cli.command, &paths).await {
        error!("{e:#}");
        std::process::exit(1);
    }
}

async fn dispatch(command: Commands, paths: &AppPaths) -> Result<()> {
    match command {
        Commands::Run(args) => run(args, paths).await,
        Commands::Account { command } => account(command, paths),
        Commands::Config { command } => configure(command, paths),
    }
}

async fn run(args: RunArgs, paths: &AppPaths) -> Result<()> {
    admin::ensure_elevated()?;

    let mut config = ConfigStore::open(&paths.config_file, target::EXECUTABLE_NAME)
        .context("opening the configuration store")?;
    if let Some(exe) = &args.exe {
        config.set_executable_path(exe)?;
    }

    let credentials = resolve_credentials(&args, paths)?;
    if credentials.is_none() {
        if args.headless {
            info!("no credentials supplied, reporting login state only");
        } else {
            warn!("no credentials supplied (use --username/--password or --saved)");
        }
    }

    let templates =
        Arc::new(TemplateSet::load(&paths.assets_dir).context("loading template assets")?);

    let mut runner_config =
        RunnerConfig::for_target(target::EXECUTABLE_NAME, window_titles(&config));
    runner_config.flow.submit_fallback = config.submit_point();

    let runner = LoginRunner::new(templates, runner_config)?;
    let executable = config.executable_path().map(Path::to_path_buf);

    match runner.run(credentials, executable.as_deref()).await? {
        RunOutcome::LoggedIn => info!("✅ login completed"),
        RunOutcome::LoginNotRequired => info!("✅ no login was required"),
    }
    Ok(())
}

fn window_titles(config: &ConfigStore) -> Vec<String> {
    let mut titles: Vec<String> = target::DEFAULT_WINDOW_TITLES
        .iter()
        .map(|title| title.to_string())
        .collect();
    titles.extend(config.window_titles().iter().cloned());
    titles
}

fn resolve_credentials(args: &RunArgs, paths: &AppPaths) -> Result<Option<(String, String)>> {
    if let Some(name) = &args.saved {
        let store = CredentialStore::open(&paths.accounts_dir)?;
        let pair = store
            .get(name)?
            .ok_or_else(|| anyhow!("no saved account named '{name}'"))?;
        return Ok(Some(pair));
    }

    match (&args.username, &args.password) {
        (Some(username), Some(password)) => Ok(Some((username.clone(), password.clone()))),
        (None, None) => Ok(None),
        _ => bail!("--username and --password must be supplied together"),
    }
}

fn account(command: AccountCommands, paths: &AppPaths) -> Result<()> {
    let store = CredentialStore::open(&paths.accounts_dir)?;
    match command {
        AccountCommands::Save {
            name,
            username,
            password,
        } => {
            store.put(&name, &username, &password)?;
            println!("account '{name}' saved");
        }
        AccountCommands::List { json } => {
            let names = store.list()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&names)?);
            } else if names.is_empty() {
                println!("no saved accounts");
            } else {
                for name in names {
                    println!("{name}");
                }
            }
        }
        AccountCommands::Delete { name } => {
            store.delete(&name)?;
            println!("account '{name}' deleted");
        }
    }
    Ok(())
}

fn configure(command: ConfigCommands, paths: &AppPaths) -> Result<()> {
    let mut store = ConfigStore::open(&paths.config_file, target::EXECUTABLE_NAME)?;
    match command {
        ConfigCommands::Show => {
            println!("config file:  {}", store.path().display());
            match store.executable_path() {
                Some(path) => println!("executable:   {}", path.display()),
                None => println!("executable:   (not configured)"),
            }
            let submit = store.submit_point();
            println!("submit point: ({}, {})", submit.x, submit.y);
            if !store.window_titles().is_empty() {
                println!("extra titles: {}", store.window_titles().join(", "));
            }
        }
        ConfigCommands::SetPath { path } => {
            store.set_executable_path(&path)?;
            println!("executable path set to {}", path.display());
        }
    }
    Ok(())
}
