//! Running server-issued scripts
//!
//! A script is written to a private temporary file, executed once and
//! removed afterwards, whatever the outcome.

use std::io::Write;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tempfile::TempPath;
use tokio::io::AsyncReadExt;

use od_core::{Deadline, PlatformProfile, ScriptError};

/// Prefix of materialized script files
pub const SCRIPT_PREFIX: &str = "osctrld-script-";

/// How long output is still collected after the script has exited
const OUTPUT_GRACE: Duration = Duration::from_secs(1);

/// Captured output of a successful script run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Materializes and runs script payloads
#[derive(Debug, Clone)]
pub struct ScriptExecutor {
    extension: String,
    interpreter: Vec<String>,
}

impl ScriptExecutor {
    pub fn new(platform: &PlatformProfile) -> Self {
        Self {
            extension: platform.script_extension.clone(),
            interpreter: platform.script_interpreter.clone(),
        }
    }

    /// Run `script` from a temporary file in `dir`.
    ///
    /// The child is killed if it outlives `deadline`. Stderr from a
    /// successful run is logged, not treated as failure.
    pub async fn run(
        &self,
        dir: &Path,
        script: &[u8],
        deadline: Deadline,
    ) -> Result<ScriptOutput, ScriptError> {
        let path = self.materialize(dir, script)?;
        tracing::debug!("Running script {}", path.display());

        let result = self.execute(dir, &path, deadline).await;

        if let Err(e) = path.close() {
            tracing::warn!("Failed to remove temporary script: {}", e);
        }

        let (status, output) = result?;
        if !status.success() {
            return Err(ScriptError::Failed {
                code: status.code(),
                stderr: output.stderr.trim().to_string(),
            });
        }
        if !output.stderr.trim().is_empty() {
            tracing::warn!("Script wrote to stderr: {}", output.stderr.trim());
        }
        Ok(output)
    }

    fn materialize(&self, dir: &Path, script: &[u8]) -> Result<TempPath, ScriptError> {
        let materialize_err = |source| ScriptError::Materialize {
            dir: dir.to_path_buf(),
            source,
        };

        let mut file = tempfile::Builder::new()
            .prefix(SCRIPT_PREFIX)
            .suffix(&self.extension)
            .tempfile_in(dir)
            .map_err(materialize_err)?;
        file.write_all(script).map_err(materialize_err)?;
        file.flush().map_err(materialize_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o700))
                .map_err(materialize_err)?;
        }

        // Closes the write handle; the path is still removed on drop
        Ok(file.into_temp_path())
    }

    async fn execute(
        &self,
        dir: &Path,
        path: &Path,
        deadline: Deadline,
    ) -> Result<(ExitStatus, ScriptOutput), ScriptError> {
        let mut command = match self.interpreter.split_first() {
            Some((program, args)) => {
                let mut command = tokio::process::Command::new(program);
                command.args(args).arg(path);
                command
            }
            None => tokio::process::Command::new(path),
        };

        let mut child = command
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ScriptError::Spawn {
                path: path.to_path_buf(),
                source,
            })?;

        let stdout_handle = child.stdout.take();
        let stderr_handle = child.stderr.take();
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        let status = {
            let reading = async {
                tokio::join!(
                    read_into(stdout_handle, &mut stdout),
                    read_into(stderr_handle, &mut stderr),
                );
            };
            tokio::pin!(reading);

            let mut drained = false;
            let waited = deadline
                .run(async {
                    tokio::select! {
                        status = child.wait() => status,
                        _ = &mut reading => {
                            drained = true;
                            child.wait().await
                        }
                    }
                })
                .await;

            let status = match waited {
                Ok(status) => status.map_err(|source| ScriptError::Spawn {
                    path: path.to_path_buf(),
                    source,
                })?,
                Err(_) => {
                    let _ = child.kill().await;
                    tracing::error!("Script exceeded {:?} and was killed", deadline.budget());
                    return Err(ScriptError::TimedOut {
                        after: deadline.budget(),
                    });
                }
            };

            // A background process started by the script may keep the pipes open
            if !drained
                && tokio::time::timeout(OUTPUT_GRACE, &mut reading)
                    .await
                    .is_err()
            {
                tracing::debug!("Script output still open after exit, keeping what was read");
            }
            status
        };

        let output = ScriptOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        };
        Ok((status, output))
    }
}

/// Append everything readable from `handle` to `buf`.
///
/// Bytes read before the future is dropped stay in `buf`.
async fn read_into<R: tokio::io::AsyncRead + Unpin>(handle: Option<R>, buf: &mut Vec<u8>) {
    if let Some(mut h) = handle {
        let _ = h.read_to_end(buf).await;
    }
}
