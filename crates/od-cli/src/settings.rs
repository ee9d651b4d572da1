//! Global options and configuration precedence
//!
//! Flag > environment variable > configuration file > platform default.
//! clap folds the first two together; this module layers the result over
//! the file.

use std::path::{Path, PathBuf};

use clap::Args;

use od_core::config::{self, AgentConfig, ConfigFile};
use od_core::ConfigError;

/// Options accepted by every command
#[derive(Debug, Clone, Default, Args)]
pub struct GlobalArgs {
    /// Configuration file for osctrld to load all necessary values
    #[arg(
        short = 'c',
        long,
        visible_aliases = ["conf", "config"],
        env = "OSCTRL_CONFIG",
        global = true,
        value_name = "FILE"
    )]
    pub configuration: Option<PathBuf>,

    /// Enroll secret to authenticate against osctrl server
    #[arg(short = 's', long, env = "OSCTRL_SECRET", global = true, hide_env_values = true)]
    pub secret: Option<String>,

    /// Environment in osctrl to enroll nodes to
    #[arg(short = 'e', long, visible_alias = "env", env = "OSCTRL_ENV", global = true)]
    pub environment: Option<String>,

    /// Secret file for osquery [default depends on OS]
    #[arg(short = 'S', long, env = "OSQUERY_SECRET", global = true, value_name = "FILE")]
    pub secret_file: Option<PathBuf>,

    /// Flag file for osquery [default depends on OS]
    #[arg(short = 'F', long, env = "OSQUERY_FLAGFILE", global = true, value_name = "FILE")]
    pub flagfile: Option<PathBuf>,

    /// Certificate for osquery, if needed [default depends on OS]
    #[arg(short = 'C', long, env = "OSQUERY_CERTIFICATE", global = true, value_name = "FILE")]
    pub certificate: Option<PathBuf>,

    /// Base URL for the osctrl server
    #[arg(short = 'U', long, env = "OSCTRL_URL", global = true, value_name = "URL")]
    pub osctrl_url: Option<String>,

    /// Path of the osquery installation [default depends on OS]
    #[arg(
        short = 'o',
        long,
        visible_alias = "osquery",
        env = "OSQUERY_PATH",
        global = true,
        value_name = "DIR"
    )]
    pub osquery_path: Option<PathBuf>,

    /// Ignore TLS warnings, often used with self-signed certificates
    #[arg(short = 'i', long, env = "OSCTRL_INSECURE", global = true)]
    pub insecure: bool,

    /// Enable verbose informational messages
    #[arg(short = 'v', long, env = "OSCTRL_VERBOSE", global = true)]
    pub verbose: bool,

    /// Overwrite existing files for flags, certificate and scripts
    #[arg(short = 'f', long, env = "OSCTRL_FORCE", global = true)]
    pub force: bool,
}

impl GlobalArgs {
    /// Read the configuration file, if any.
    ///
    /// An explicit `--configuration` must exist. The default location is
    /// only read when present.
    pub fn load_file(&self) -> Result<AgentConfig, ConfigError> {
        match &self.configuration {
            Some(path) => read(path),
            None => {
                let path = config::default_config_path();
                if path.exists() {
                    read(&path)
                } else {
                    tracing::debug!("No configuration file at {}", path.display());
                    Ok(AgentConfig::default())
                }
            }
        }
    }

    /// Layer flags and environment values over `config`
    pub fn apply(&self, mut config: AgentConfig) -> AgentConfig {
        if let Some(secret) = &self.secret {
            config.secret = secret.clone();
        }
        if let Some(environment) = &self.environment {
            config.environment = environment.clone();
        }
        if let Some(url) = &self.osctrl_url {
            config.base_url = url.clone();
        }
        override_path(&mut config.secret_file, &self.secret_file);
        override_path(&mut config.flag_file, &self.flagfile);
        override_path(&mut config.cert_file, &self.certificate);
        override_path(&mut config.osquery_path, &self.osquery_path);
        config.insecure |= self.insecure;
        config.verbose |= self.verbose;
        config.force |= self.force;
        config
    }
}

fn read(path: &Path) -> Result<AgentConfig, ConfigError> {
    let file: ConfigFile = config::load_config(path)?;
    tracing::debug!("Loaded configuration from {}", path.display());
    Ok(file.osctrld)
}

fn override_path(target: &mut Option<PathBuf>, value: &Option<PathBuf>) {
    if value.is_some() {
        target.clone_from(value);
    }
}
