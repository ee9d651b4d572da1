//! Agent configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use od_protocol::{Endpoints, ScriptKind};

use super::serde_utils::duration_secs;
use crate::error::ConfigError;
use crate::platform::PlatformProfile;

/// Default secret file name inside the osquery directory
pub const DEFAULT_SECRET_FILE: &str = "osquery.secret";
/// Default flag file name inside the osquery directory
pub const DEFAULT_FLAG_FILE: &str = "osquery.flags";
/// Default certificate file name inside the osquery directory
pub const DEFAULT_CERT_FILE: &str = "osctrl.crt";
/// Default enroll script stem
pub const DEFAULT_ENROLL_SCRIPT: &str = "osctrld-enroll";
/// Default remove script stem
pub const DEFAULT_REMOVE_SCRIPT: &str = "osctrld-remove";

/// Raw agent configuration as read from file, environment and flags.
///
/// Every path is optional; missing ones are filled from the platform
/// profile by [`AgentConfig::resolve`]. Keys written by older JSON
/// configurations (`secretFile`, `baseurl`, ...) are accepted as aliases.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Enroll secret for the environment
    pub secret: String,

    /// osquery secret file
    #[serde(alias = "secretFile")]
    pub secret_file: Option<PathBuf>,

    /// osquery flag file
    #[serde(alias = "flags")]
    pub flag_file: Option<PathBuf>,

    /// Server certificate used by osquery
    #[serde(alias = "cert")]
    pub cert_file: Option<PathBuf>,

    /// Where `enroll --save` writes the enroll script
    #[serde(alias = "enrollScript")]
    pub enroll_script: Option<PathBuf>,

    /// Where `remove --save` writes the remove script
    #[serde(alias = "removeScript")]
    pub remove_script: Option<PathBuf>,

    /// osquery installation directory
    #[serde(alias = "osquery")]
    pub osquery_path: Option<PathBuf>,

    /// osctrl environment the node belongs to
    pub environment: String,

    /// Base URL of the osctrl server
    #[serde(alias = "baseurl")]
    pub base_url: String,

    /// Skip TLS certificate validation
    pub insecure: bool,

    /// Verbose diagnostics
    pub verbose: bool,

    /// Overwrite local files that differ from the server's
    pub force: bool,

    /// Budget for each request to the server
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,

    /// Budget for running an enroll/remove script
    #[serde(with = "duration_secs")]
    pub script_timeout: Duration,

    /// Budget for local probes (version command, process scan)
    #[serde(with = "duration_secs")]
    pub probe_timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            secret_file: None,
            flag_file: None,
            cert_file: None,
            enroll_script: None,
            remove_script: None,
            osquery_path: None,
            environment: String::new(),
            base_url: String::new(),
            insecure: false,
            verbose: false,
            force: false,
            request_timeout: Duration::from_secs(30),
            script_timeout: Duration::from_secs(600),
            probe_timeout: Duration::from_secs(10),
        }
    }
}

impl AgentConfig {
    /// Fill platform defaults and validate required values
    pub fn resolve(self, platform: PlatformProfile) -> Result<ResolvedConfig, ConfigError> {
        if self.environment.trim().is_empty() {
            return Err(ConfigError::MissingField("Environment".to_string()));
        }
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::MissingField("Base URL".to_string()));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "Base URL must start with http:// or https:// (got {})",
                self.base_url
            )));
        }

        let osquery_path = self
            .osquery_path
            .unwrap_or_else(|| platform.default_osquery_dir.clone());
        let in_osquery_dir =
            |value: Option<PathBuf>, name: &str| value.unwrap_or_else(|| full_path(&osquery_path, name));

        let ext = platform.script_extension.clone();
        let secret_file = in_osquery_dir(self.secret_file, DEFAULT_SECRET_FILE);
        let flag_file = in_osquery_dir(self.flag_file, DEFAULT_FLAG_FILE);
        let cert_file = in_osquery_dir(self.cert_file, DEFAULT_CERT_FILE);
        let enroll_script =
            in_osquery_dir(self.enroll_script, &format!("{}{}", DEFAULT_ENROLL_SCRIPT, ext));
        let remove_script =
            in_osquery_dir(self.remove_script, &format!("{}{}", DEFAULT_REMOVE_SCRIPT, ext));

        let endpoints = Endpoints::new(&self.base_url, &self.environment, &platform.id);
        tracing::debug!("Environment URL: {}", endpoints.environment);

        Ok(ResolvedConfig {
            secret: self.secret,
            osquery_path,
            secret_file,
            flag_file,
            cert_file,
            enroll_script,
            remove_script,
            environment: self.environment,
            base_url: self.base_url,
            insecure: self.insecure,
            verbose: self.verbose,
            force: self.force,
            request_timeout: self.request_timeout,
            script_timeout: self.script_timeout,
            probe_timeout: self.probe_timeout,
            endpoints,
            platform,
        })
    }
}

/// Validated configuration handed to the agent components
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub secret: String,
    pub osquery_path: PathBuf,
    pub secret_file: PathBuf,
    pub flag_file: PathBuf,
    pub cert_file: PathBuf,
    pub enroll_script: PathBuf,
    pub remove_script: PathBuf,
    pub environment: String,
    pub base_url: String,
    pub insecure: bool,
    pub verbose: bool,
    pub force: bool,
    pub request_timeout: Duration,
    pub script_timeout: Duration,
    pub probe_timeout: Duration,
    pub endpoints: Endpoints,
    pub platform: PlatformProfile,
}

impl ResolvedConfig {
    /// Local path where a script of `kind` is saved
    pub fn script_path(&self, kind: ScriptKind) -> &Path {
        match kind {
            ScriptKind::Enroll => &self.enroll_script,
            ScriptKind::Remove => &self.remove_script,
        }
    }
}

/// Join a directory and a file name, tolerating stray separators on either side
pub fn full_path(dir: &Path, file: &str) -> PathBuf {
    dir.join(file.trim_start_matches(&['/', '\\'][..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> AgentConfig {
        AgentConfig {
            environment: "dev".to_string(),
            base_url: "http://localhost:8080".to_string(),
            ..AgentConfig::default()
        }
    }

    #[test]
    fn test_full_path() {
        let expected = PathBuf::from("/tmp/foobar");
        assert_eq!(full_path(Path::new("/tmp"), "foobar"), expected);
        assert_eq!(full_path(Path::new("/tmp/"), "foobar"), expected);
        assert_eq!(full_path(Path::new("/tmp"), "/foobar"), expected);
        assert_eq!(full_path(Path::new("/tmp/"), "/foobar"), expected);
    }

    #[test]
    fn test_resolve_fills_platform_defaults() {
        let resolved = base().resolve(PlatformProfile::lookup("linux")).unwrap();
        assert_eq!(resolved.osquery_path, PathBuf::from("/etc/osquery/"));
        assert_eq!(resolved.flag_file, PathBuf::from("/etc/osquery/osquery.flags"));
        assert_eq!(resolved.secret_file, PathBuf::from("/etc/osquery/osquery.secret"));
        assert_eq!(resolved.cert_file, PathBuf::from("/etc/osquery/osctrl.crt"));
        assert_eq!(
            resolved.script_path(ScriptKind::Enroll),
            Path::new("/etc/osquery/osctrld-enroll.sh")
        );
        assert_eq!(
            resolved.endpoints.enroll,
            "http://localhost:8080/dev/enroll/linux/osctrld-script"
        );
    }

    #[test]
    fn test_resolve_keeps_explicit_paths() {
        let config = AgentConfig {
            osquery_path: Some(PathBuf::from("/srv/osquery")),
            flag_file: Some(PathBuf::from("/tmp/custom.flags")),
            ..base()
        };
        let resolved = config.resolve(PlatformProfile::lookup("linux")).unwrap();
        assert_eq!(resolved.flag_file, PathBuf::from("/tmp/custom.flags"));
        assert_eq!(resolved.secret_file, PathBuf::from("/srv/osquery/osquery.secret"));
    }

    #[test]
    fn test_resolve_requires_environment() {
        let config = AgentConfig {
            environment: String::new(),
            ..base()
        };
        let err = config.resolve(PlatformProfile::lookup("linux")).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(ref f) if f == "Environment"));
    }

    #[test]
    fn test_resolve_requires_base_url() {
        let config = AgentConfig {
            base_url: String::new(),
            ..base()
        };
        let err = config.resolve(PlatformProfile::lookup("linux")).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(ref f) if f == "Base URL"));
    }

    #[test]
    fn test_resolve_rejects_schemeless_url() {
        let config = AgentConfig {
            base_url: "osctrl.example.com".to_string(),
            ..base()
        };
        assert!(matches!(
            config.resolve(PlatformProfile::lookup("linux")),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_windows_scripts_use_ps1() {
        let resolved = base().resolve(PlatformProfile::lookup("windows")).unwrap();
        assert!(resolved
            .remove_script
            .to_string_lossy()
            .ends_with("osctrld-remove.ps1"));
    }
}
