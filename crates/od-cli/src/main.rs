//! osctrld
//!
//! Daemon companion for osquery nodes managed by osctrl: enroll and remove
//! nodes, retrieve flags and certificate, and verify local state.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use od_agent::{Orchestrator, ScriptAction};
use od_core::config::ResolvedConfig;
use od_core::PlatformProfile;
use od_protocol::ScriptKind;
use osctrld::commands;
use osctrld::output::print_error;
use osctrld::settings::GlobalArgs;

/// Exit code for configuration and validation failures
const EXIT_CONFIG: u8 = 2;
/// Exit code for failed operations
const EXIT_FAILURE: u8 = 1;

#[derive(Parser)]
#[command(name = "osctrld")]
#[command(
    author,
    version,
    about = "Daemon for osctrl, to manage secret, flags and osquery deployment"
)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll a new node in osctrl, using new secret and flag files
    Enroll {
        #[command(flatten)]
        action: ActionArgs,
    },

    /// Remove enrolled node from osctrl, clearing secret and flag files
    Remove {
        #[command(flatten)]
        action: ActionArgs,
    },

    /// Verify flags, cert and secret for an enrolled node in osctrl
    Verify {
        /// Exit with failure if any check fails
        #[arg(long)]
        strict: bool,
    },

    /// Retrieve flags for osquery from osctrl and write them locally
    Flags,

    /// Retrieve server certificate for osquery from osctrl and write it locally
    Cert,
}

/// What to do with the fetched script; prints it by default
#[derive(clap::Args)]
struct ActionArgs {
    /// Save the script to its configured path instead of printing it
    #[arg(long, conflicts_with = "execute")]
    save: bool,

    /// Run the script in the osquery directory instead of printing it
    #[arg(long)]
    execute: bool,
}

impl ActionArgs {
    fn action(&self) -> ScriptAction {
        if self.execute {
            ScriptAction::Execute
        } else if self.save {
            ScriptAction::Save
        } else {
            ScriptAction::Print
        }
    }
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Enroll { .. } => "enroll",
            Commands::Remove { .. } => "remove",
            Commands::Verify { .. } => "verify",
            Commands::Flags => "flags",
            Commands::Cert => "cert",
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.global.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let config = match resolve_config(&cli.global) {
        Ok(config) => config,
        Err(e) => {
            print_error(&format!("{:#}", e));
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    log_config(&config, cli.command.name());

    match run(cli.command, config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_FAILURE),
        Err(e) => {
            print_error(&format!("{:#}", e));
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn resolve_config(global: &GlobalArgs) -> Result<ResolvedConfig> {
    let file = global
        .load_file()
        .context("Error reading configuration file")?;
    let resolved = global.apply(file).resolve(PlatformProfile::current())?;
    Ok(resolved)
}

fn log_config(config: &ResolvedConfig, command: &str) {
    tracing::debug!("Platform: {}", config.platform.id);
    tracing::debug!("Osquery path: {}", config.osquery_path.display());
    tracing::debug!("Flag file: {}", config.flag_file.display());
    tracing::debug!("Secret file: {}", config.secret_file.display());
    tracing::debug!("Certificate: {}", config.cert_file.display());
    tracing::debug!("Enroll script: {}", config.enroll_script.display());
    tracing::debug!("Remove script: {}", config.remove_script.display());
    tracing::debug!("Base URL: {}", config.base_url);
    tracing::debug!("Environment: {}", config.environment);
    tracing::debug!("Insecure: {}", config.insecure);
    tracing::debug!("Verbose: {}", config.verbose);
    tracing::debug!("Force: {}", config.force);
    tracing::debug!("Command: {}", command);
}

/// Run `command`; `Ok(false)` means it completed but should exit non-zero
async fn run(command: Commands, config: ResolvedConfig) -> Result<bool> {
    let orchestrator = Orchestrator::new(config).context("Failed to initialize osctrld")?;

    match command {
        Commands::Enroll { action } => {
            commands::script_command(&orchestrator, ScriptKind::Enroll, action.action()).await?;
        }
        Commands::Remove { action } => {
            commands::script_command(&orchestrator, ScriptKind::Remove, action.action()).await?;
        }
        Commands::Verify { strict } => {
            let passed = commands::verify_command(&orchestrator).await?;
            return Ok(passed || !strict);
        }
        Commands::Flags => commands::flags_command(&orchestrator).await?,
        Commands::Cert => commands::cert_command(&orchestrator).await?,
    }

    Ok(true)
}
