//! Curfew command-line interface: run a session, inspect or release the restriction.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use curfew_core::config::{CurfewConfig, CONFIG_ENV, DRY_RUN_ENV};
use curfew_core::restriction::release;
use curfew_core::{
    logging, EnforcementSession, InputMatcher, RestrictionController, RESTRICTED_VALUE,
    TASK_MANAGER_KEY,
};
use curfew_provider::{MemoryStore, RegistryStore};
use curfew_registry::SystemRegistryStore;
use log::{info, warn};
use schemars::schema_for;
use serde_json::to_string_pretty;
use std::path::{Path, PathBuf};
use std::process::Command;

mod console;
mod headless;

use console::ConsoleProjection;

/// Top-level command-line options shared by every subcommand.
#[derive(Parser, Debug)]
#[command(
    name = "curfew",
    version,
    about = "Disable the task manager until the nightly commitment is typed."
)]
struct Cli {
    /// Path to the Curfew configuration file (overrides CURFEW_CONFIG).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one enforcement session.
    Run {
        /// Read input from stdin instead of opening the blocking window.
        #[arg(long)]
        headless: bool,

        /// Use an in-memory registry; the host is never modified.
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the current task manager restriction value.
    Status,

    /// Remove the restriction left behind by a crashed session (break-glass).
    Release,

    /// Validate the configuration file and list any problems.
    Validate,

    /// Print the configuration JSON schema.
    Schema,

    /// Write the default configuration unless one already exists.
    InitConfig,
}

/// Entry point: parse arguments and surface errors with an exit code.
fn main() {
    match run() {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let explicit = cli.config.as_deref();

    match cli.command {
        Commands::Run { headless, dry_run } => {
            let config = load_cli_config(explicit)?;
            logging::init(&config.logging.level);
            if headless {
                run_headless(&config, dry_run)
            } else {
                launch_window(explicit, dry_run)
            }
        }
        Commands::Status => {
            logging::init("warn");
            let controller = RestrictionController::new(open_store(false)?);
            let value = controller
                .current_value()
                .context("failed to read the restriction value")?;
            println!("{}", describe_value(value));
            Ok(0)
        }
        Commands::Release => {
            logging::init("info");
            let store = open_store(false)?;
            if release(&store, TASK_MANAGER_KEY, RESTRICTED_VALUE)
                .context("break-glass release failed")?
            {
                println!("Restriction removed; the task manager is available again.");
            } else {
                println!("No restriction was set; nothing to release.");
            }
            Ok(0)
        }
        Commands::Validate => {
            logging::init("warn");
            let path = resolve_config_path(explicit)?;
            let config = CurfewConfig::read(&path)
                .with_context(|| format!("failed to read configuration from {}", path.display()))?;

            let issues = config.validate();
            if issues.is_empty() {
                println!(
                    "Configuration valid ({} characters to type, log level {}).",
                    config.commitment.sentence.chars().count(),
                    config.logging.level
                );
                Ok(0)
            } else {
                eprintln!("Configuration validation failed:");
                for issue in issues {
                    eprintln!("  - {issue}");
                }
                Ok(1)
            }
        }
        Commands::Schema => {
            let schema = schema_for!(CurfewConfig);
            println!("{}", to_string_pretty(&schema)?);
            Ok(0)
        }
        Commands::InitConfig => {
            logging::init("info");
            let path = resolve_config_path(explicit)?;
            if CurfewConfig::write_default(&path)
                .with_context(|| format!("failed to write {}", path.display()))?
            {
                println!("Wrote default configuration to {}.", path.display());
            } else {
                println!("{} already exists; left untouched.", path.display());
            }
            Ok(0)
        }
    }
}

fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match CurfewConfig::resolve_path(explicit) {
        Some(path) => Ok(path),
        None => bail!("no configuration path available; pass --config or set {CONFIG_ENV}"),
    }
}

fn load_cli_config(explicit: Option<&Path>) -> Result<CurfewConfig> {
    match CurfewConfig::resolve_path(explicit) {
        Some(path) => CurfewConfig::load_or_default(&path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => Ok(CurfewConfig::default()),
    }
}

fn open_store(dry_run: bool) -> Result<Box<dyn RegistryStore>> {
    if dry_run {
        info!("dry run: using an in-memory registry");
        return Ok(Box::new(MemoryStore::new()));
    }
    if !SystemRegistryStore::supported() {
        bail!("the system registry is not available on this platform; use --dry-run");
    }
    Ok(Box::new(SystemRegistryStore::new()))
}

fn run_headless(config: &CurfewConfig, dry_run: bool) -> Result<i32> {
    let matcher = InputMatcher::new(config.commitment.sentence.clone())
        .context("configured sentence cannot be used")?;
    let controller = RestrictionController::new(open_store(dry_run)?);
    let mut session =
        EnforcementSession::new(controller, matcher, ConsoleProjection::new(std::io::stdout()));

    // Signals must already be handled when the restriction goes in.
    let armed = headless::Armed::install()?;

    println!("Type the sentence below, then press Enter:\n\n  {}\n", session.target());
    session
        .start()
        .context("enforcement session could not start")?;

    headless::run_stdin(armed, &mut session);
    Ok(session.exit_code())
}

/// Hand the session over to the `curfew-ui` binary installed next to this one.
fn launch_window(explicit: Option<&Path>, dry_run: bool) -> Result<i32> {
    let exe = std::env::current_exe()
        .context("failed to locate the curfew executable")?
        .with_file_name(format!("curfew-ui{}", std::env::consts::EXE_SUFFIX));

    let mut command = Command::new(&exe);
    if let Some(path) = explicit {
        command.env(CONFIG_ENV, path);
    }
    if dry_run {
        command.env(DRY_RUN_ENV, "1");
    }

    let status = command
        .status()
        .with_context(|| format!("failed to launch {}", exe.display()))?;
    match status.code() {
        Some(code) => Ok(code),
        None => {
            warn!("{} ended without an exit code", exe.display());
            Ok(1)
        }
    }
}

fn describe_value(value: Option<u32>) -> String {
    let key = TASK_MANAGER_KEY;
    match value {
        Some(RESTRICTED_VALUE) => format!("{key} = {RESTRICTED_VALUE} (task manager disabled)"),
        Some(other) => format!("{key} = {other} (task manager enabled)"),
        None => format!("{key} is not set (task manager enabled)"),
    }
}
