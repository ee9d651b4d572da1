//! Endpoint layout of the osctrl server
//!
//! All endpoints hang off the environment URL `{base}/{environment}`.

use std::fmt;

/// Path suffix for flags retrieval
pub const FLAGS_PATH: &str = "osctrld-flags";
/// Path suffix for certificate retrieval
pub const CERT_PATH: &str = "osctrld-cert";
/// Path suffix for the verification bundle
pub const VERIFY_PATH: &str = "osctrld-verify";
/// Path suffix for enroll/remove scripts
pub const SCRIPT_PATH: &str = "osctrld-script";

/// Which server-issued script to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptKind {
    /// Script that installs osquery and enrolls the node
    Enroll,
    /// Script that removes the node and its osquery installation
    Remove,
}

impl ScriptKind {
    /// Path segment used by the server for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptKind::Enroll => "enroll",
            ScriptKind::Remove => "remove",
        }
    }
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully expanded endpoint URLs for one environment and platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Environment URL every other endpoint derives from
    pub environment: String,
    /// Flags endpoint
    pub flags: String,
    /// Certificate endpoint
    pub cert: String,
    /// Verification endpoint
    pub verify: String,
    /// Enroll script endpoint
    pub enroll: String,
    /// Remove script endpoint
    pub remove: String,
}

impl Endpoints {
    /// Build every endpoint for `environment` on the server at `base_url`.
    ///
    /// `platform` selects the script flavor (`linux`, `darwin`, `windows`).
    pub fn new(base_url: &str, environment: &str, platform: &str) -> Self {
        let environment = environment_url(base_url, environment);
        Self {
            flags: format!("{}/{}", environment, FLAGS_PATH),
            cert: format!("{}/{}", environment, CERT_PATH),
            verify: format!("{}/{}", environment, VERIFY_PATH),
            enroll: script_url(&environment, ScriptKind::Enroll, platform),
            remove: script_url(&environment, ScriptKind::Remove, platform),
            environment,
        }
    }

    /// Script endpoint for the given kind
    pub fn script(&self, kind: ScriptKind) -> &str {
        match kind {
            ScriptKind::Enroll => &self.enroll,
            ScriptKind::Remove => &self.remove,
        }
    }
}

/// Join the base URL and environment name
pub fn environment_url(base_url: &str, environment: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), environment)
}

/// Script endpoint for `kind` under an environment URL
pub fn script_url(environment_url: &str, kind: ScriptKind, platform: &str) -> String {
    format!(
        "{}/{}/{}/{}",
        environment_url,
        kind.as_str(),
        platform,
        SCRIPT_PATH
    )
}
