//! Local state inspection
//!
//! Reads files, the process table and the installed osquery binary. Reads
//! never fail: anything unreadable is reported as absent or mismatched.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use sysinfo::{ProcessRefreshKind, RefreshKind, System};

use od_core::{Deadline, LocalIoError, PlatformProfile};

/// Result of comparing a file against expected content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentCheck {
    Match,
    Mismatch,
    /// File could not be read; the reason is kept for diagnostics
    Unreadable(String),
}

/// What `write_if_different` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// File did not exist and was created
    Created,
    /// File already had the same content and was left alone
    Unchanged,
    /// File had different content and was replaced
    Overwritten,
}

impl fmt::Display for WriteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WriteOutcome::Created => "created",
            WriteOutcome::Unchanged => "unchanged",
            WriteOutcome::Overwritten => "overwritten",
        };
        f.write_str(label)
    }
}

/// A point-in-time process table lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProcessMatch {
    pub running: bool,
    pub pid: Option<u32>,
}

/// Outcome of asking the daemon binary for its version
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionProbe {
    Found(String),
    Unavailable(String),
}

impl VersionProbe {
    /// Version string, empty when unavailable
    pub fn as_str(&self) -> &str {
        match self {
            VersionProbe::Found(version) => version,
            VersionProbe::Unavailable(_) => "",
        }
    }
}

impl fmt::Display for VersionProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reads the actual state of this machine
#[derive(Debug, Clone)]
pub struct LocalStateInspector {
    platform: PlatformProfile,
}

impl LocalStateInspector {
    pub fn new(platform: PlatformProfile) -> Self {
        Self { platform }
    }

    /// Files whose presence means osquery is installed
    pub fn platform_well_known_paths(&self) -> &[PathBuf] {
        &self.platform.well_known_paths
    }

    /// Whether `path` exists. Permission errors read as absent.
    pub fn file_exists(&self, path: &Path) -> bool {
        fs::metadata(path).is_ok()
    }

    /// Compare trimmed file content against trimmed `expected`
    pub fn check_file_content(&self, path: &Path, expected: &str) -> ContentCheck {
        match fs::read_to_string(path) {
            Ok(actual) if actual.trim() == expected.trim() => ContentCheck::Match,
            Ok(_) => ContentCheck::Mismatch,
            Err(e) => ContentCheck::Unreadable(e.to_string()),
        }
    }

    /// Like [`check_file_content`](Self::check_file_content), collapsing
    /// unreadable files into "not equal"
    pub fn file_content_equals(&self, path: &Path, expected: &str) -> bool {
        match self.check_file_content(path, expected) {
            ContentCheck::Match => true,
            ContentCheck::Mismatch => false,
            ContentCheck::Unreadable(reason) => {
                tracing::debug!("Cannot read {}: {}", path.display(), reason);
                false
            }
        }
    }

    /// Write `content` to `path` unless it already holds the same content.
    ///
    /// New files are created owner-only. Existing files with different
    /// content are replaced only when `force` is set.
    pub fn write_if_different(
        &self,
        path: &Path,
        content: &str,
        force: bool,
    ) -> Result<WriteOutcome, LocalIoError> {
        if !self.file_exists(path) {
            create_private(path, content).map_err(|source| LocalIoError::Write {
                path: path.to_path_buf(),
                source,
            })?;
            tracing::info!("Created {}", path.display());
            return Ok(WriteOutcome::Created);
        }

        if self.file_content_equals(path, content) {
            tracing::debug!("{} is up to date", path.display());
            return Ok(WriteOutcome::Unchanged);
        }
        if !force {
            return Err(LocalIoError::ForceRequired {
                path: path.to_path_buf(),
            });
        }

        fs::write(path, content).map_err(|source| LocalIoError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!("Overwrote {}", path.display());
        Ok(WriteOutcome::Overwritten)
    }

    /// Find a process whose command line contains `pattern`.
    ///
    /// The lowest matching PID wins. A scan that outlives `deadline`
    /// reports not running.
    pub async fn find_running_process(&self, pattern: &str, deadline: Deadline) -> ProcessMatch {
        let needle = pattern.to_string();
        let scan = tokio::task::spawn_blocking(move || scan_processes(&needle));

        match deadline.run(scan).await {
            Ok(Ok(pid)) => ProcessMatch {
                running: pid.is_some(),
                pid,
            },
            Ok(Err(e)) => {
                tracing::warn!("Process scan failed: {}", e);
                ProcessMatch::default()
            }
            Err(_) => {
                tracing::debug!("Process scan exceeded {:?}", deadline.budget());
                ProcessMatch::default()
            }
        }
    }

    /// Run `binary flag` and take the third whitespace token of its output
    pub async fn installed_binary_version(
        &self,
        binary: &Path,
        flag: &str,
        deadline: Deadline,
    ) -> VersionProbe {
        let probe = tokio::process::Command::new(binary)
            .arg(flag)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match deadline.run(probe).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return unavailable(binary, format!("cannot run: {}", e)),
            Err(_) => {
                return unavailable(binary, format!("timed out after {:?}", deadline.budget()))
            }
        };
        if !output.status.success() {
            return unavailable(binary, format!("exited with {}", output.status));
        }

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        match combined.split_whitespace().nth(2) {
            Some(version) => VersionProbe::Found(version.to_string()),
            None => unavailable(binary, format!("unexpected output {:?}", combined.trim())),
        }
    }
}

fn unavailable(binary: &Path, reason: String) -> VersionProbe {
    tracing::debug!("Version probe of {} failed: {}", binary.display(), reason);
    VersionProbe::Unavailable(reason)
}

fn scan_processes(pattern: &str) -> Option<u32> {
    let system = System::new_with_specifics(
        RefreshKind::new().with_processes(ProcessRefreshKind::everything()),
    );
    system
        .processes()
        .iter()
        .filter(|(_, process)| {
            let cmdline = process
                .cmd()
                .iter()
                .map(|arg| arg.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ");
            cmdline.contains(pattern)
        })
        .map(|(pid, _)| pid.as_u32())
        .min()
}

fn create_private(path: &Path, content: &str) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o700);
    }
    let mut file = options.open(path)?;
    file.write_all(content.as_bytes())?;
    file.flush()
}
