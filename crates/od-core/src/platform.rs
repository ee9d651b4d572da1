//! Platform capability table
//!
//! Everything that differs between operating systems lives in one table,
//! looked up once at startup and then passed around as data.

use std::path::PathBuf;

/// Version flag understood by `osqueryd`
pub const OSQUERY_VERSION_FLAG: &str = "-version";

/// Static row of the capability table
struct ProfileRow {
    id: &'static str,
    /// Values of `std::env::consts::OS` that map to this row
    os_names: &'static [&'static str],
    well_known_paths: &'static [&'static str],
    daemon_binary: Option<&'static str>,
    process_pattern: &'static str,
    default_osquery_dir: &'static str,
    script_extension: &'static str,
    script_interpreter: &'static [&'static str],
}

const DARWIN: ProfileRow = ProfileRow {
    id: "darwin",
    os_names: &["macos", "darwin"],
    well_known_paths: &[
        "/private/var/osquery/io.osquery.agent.plist",
        "/opt/osquery/lib/osquery.app/Contents/MacOS/osqueryd",
    ],
    daemon_binary: Some("/opt/osquery/lib/osquery.app/Contents/MacOS/osqueryd"),
    process_pattern: "/osqueryd ",
    default_osquery_dir: "/private/var/osquery/",
    script_extension: ".sh",
    script_interpreter: &[],
};

const LINUX: ProfileRow = ProfileRow {
    id: "linux",
    os_names: &["linux"],
    well_known_paths: &[
        "/usr/lib/systemd/system/osqueryd.service",
        "/opt/osquery/bin/osqueryd",
    ],
    daemon_binary: Some("/opt/osquery/bin/osqueryd"),
    process_pattern: "/osqueryd ",
    default_osquery_dir: "/etc/osquery/",
    script_extension: ".sh",
    script_interpreter: &[],
};

const WINDOWS: ProfileRow = ProfileRow {
    id: "windows",
    os_names: &["windows"],
    well_known_paths: &[
        "C:\\Program Files\\osquery\\manage-osqueryd.ps1",
        "C:\\Program Files\\osquery\\osqueryd\\osqueryd.exe",
    ],
    daemon_binary: Some("C:\\Program Files\\osquery\\osqueryd\\osqueryd.exe"),
    process_pattern: "osqueryd.exe",
    default_osquery_dir: "C:\\Program Files\\osquery\\",
    script_extension: ".ps1",
    script_interpreter: &[
        "powershell.exe",
        "-NoProfile",
        "-ExecutionPolicy",
        "Bypass",
        "-File",
    ],
};

const TABLE: &[ProfileRow] = &[DARWIN, LINUX, WINDOWS];

/// Resolved capabilities of the host platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformProfile {
    /// Platform identifier used in server script URLs
    pub id: String,
    /// Files whose presence means osquery is installed
    pub well_known_paths: Vec<PathBuf>,
    /// osqueryd binary used for the version probe
    pub daemon_binary: Option<PathBuf>,
    /// Flag that makes the daemon print its version
    pub version_flag: String,
    /// Command-line substring identifying a running daemon
    pub process_pattern: String,
    /// Default directory for secret, flags and certificate
    pub default_osquery_dir: PathBuf,
    /// Extension for materialized scripts
    pub script_extension: String,
    /// Program and arguments that run a script file; empty runs it directly
    pub script_interpreter: Vec<String>,
}

impl PlatformProfile {
    /// Profile for the platform this binary was built for
    pub fn current() -> Self {
        Self::lookup(std::env::consts::OS)
    }

    /// Profile for an OS name or platform id.
    ///
    /// Unknown names yield a profile with no well-known paths and no daemon
    /// binary, so verification reports the platform as unsupported.
    pub fn lookup(os: &str) -> Self {
        TABLE
            .iter()
            .find(|row| row.id == os || row.os_names.contains(&os))
            .map(Self::from_row)
            .unwrap_or_else(|| Self::unknown(os))
    }

    fn from_row(row: &ProfileRow) -> Self {
        Self {
            id: row.id.to_string(),
            well_known_paths: row.well_known_paths.iter().map(PathBuf::from).collect(),
            daemon_binary: row.daemon_binary.map(PathBuf::from),
            version_flag: OSQUERY_VERSION_FLAG.to_string(),
            process_pattern: row.process_pattern.to_string(),
            default_osquery_dir: PathBuf::from(row.default_osquery_dir),
            script_extension: row.script_extension.to_string(),
            script_interpreter: row
                .script_interpreter
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    fn unknown(os: &str) -> Self {
        Self {
            id: os.to_string(),
            well_known_paths: Vec::new(),
            daemon_binary: None,
            version_flag: OSQUERY_VERSION_FLAG.to_string(),
            process_pattern: "/osqueryd ".to_string(),
            default_osquery_dir: PathBuf::from("."),
            script_extension: ".sh".to_string(),
            script_interpreter: Vec::new(),
        }
    }

    /// Whether the table knows this platform
    pub fn is_known(&self) -> bool {
        !self.well_known_paths.is_empty()
    }
}
