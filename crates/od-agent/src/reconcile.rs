//! Reconciliation of local osquery state with the osctrl server
//!
//! [`Orchestrator`] sequences the client, inspector and executor into the
//! five agent operations. Operations run one step at a time; every blocking
//! step gets its own deadline from the resolved configuration.

use std::path::{Path, PathBuf};

use od_core::config::ResolvedConfig;
use od_core::{compare_versions, Deadline, OdError, VersionOrdering};
use od_protocol::{ScriptKind, VerifyResponse};

use crate::client::RemoteStateClient;
use crate::inspect::{LocalStateInspector, VersionProbe, WriteOutcome};
use crate::report::{CheckName, CheckOutcome, VerificationReport};
use crate::script::{ScriptExecutor, ScriptOutput};

/// Server flag that makes osquery pin the server certificate
pub const TLS_SERVER_CERTS_FLAG: &str = "--tls_server_certs";

/// What to do with a fetched enroll/remove script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScriptAction {
    /// Hand the script back for printing
    #[default]
    Print,
    /// Write it to the configured script path
    Save,
    /// Run it in the osquery directory
    Execute,
}

/// Result of an enroll/remove operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptDisposition {
    Printed(String),
    Saved { path: PathBuf, outcome: WriteOutcome },
    Executed(ScriptOutput),
}

/// Verification stopped before the desired state was known.
///
/// Carries the checks that had already run so they can still be reported.
#[derive(Debug, thiserror::Error)]
#[error("verification aborted after {} checks", .report.checks().len())]
pub struct VerifyAborted {
    pub report: VerificationReport,
    #[source]
    pub source: OdError,
}

/// Drives enroll, remove, flags, cert and verify
pub struct Orchestrator {
    config: ResolvedConfig,
    client: RemoteStateClient,
    inspector: LocalStateInspector,
    executor: ScriptExecutor,
}

impl Orchestrator {
    pub fn new(config: ResolvedConfig) -> Result<Self, OdError> {
        let client = RemoteStateClient::new(&config)?;
        let inspector = LocalStateInspector::new(config.platform.clone());
        let executor = ScriptExecutor::new(&config.platform);
        Ok(Self {
            config,
            client,
            inspector,
            executor,
        })
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Fetch the enroll script and dispose of it per `action`
    pub async fn enroll(&self, action: ScriptAction) -> Result<ScriptDisposition, OdError> {
        self.script(ScriptKind::Enroll, action).await
    }

    /// Fetch the remove script and dispose of it per `action`
    pub async fn remove(&self, action: ScriptAction) -> Result<ScriptDisposition, OdError> {
        self.script(ScriptKind::Remove, action).await
    }

    async fn script(
        &self,
        kind: ScriptKind,
        action: ScriptAction,
    ) -> Result<ScriptDisposition, OdError> {
        let script = self.client.fetch_script(kind).await.map_err(|e| {
            tracing::error!("Failed to fetch {} script: {}", kind, e);
            e
        })?;
        tracing::info!("Fetched {} script ({} bytes)", kind, script.len());

        match action {
            ScriptAction::Print => Ok(ScriptDisposition::Printed(script)),
            ScriptAction::Save => {
                let path = self.config.script_path(kind).to_path_buf();
                let outcome = self
                    .inspector
                    .write_if_different(&path, &script, self.config.force)?;
                Ok(ScriptDisposition::Saved { path, outcome })
            }
            ScriptAction::Execute => {
                let deadline = Deadline::after(self.config.script_timeout);
                let output = self
                    .executor
                    .run(&self.config.osquery_path, script.as_bytes(), deadline)
                    .await
                    .map_err(|e| {
                        tracing::error!("{} script failed: {}", kind, e);
                        e
                    })?;
                tracing::info!("{} script completed", kind);
                Ok(ScriptDisposition::Executed(output))
            }
        }
    }

    /// Fetch flags and write them to the flag file
    pub async fn get_flags(&self) -> Result<WriteOutcome, OdError> {
        let flags = self.client.fetch_flags().await?;
        let outcome =
            self.inspector
                .write_if_different(&self.config.flag_file, &flags, self.config.force)?;
        Ok(outcome)
    }

    /// Fetch the server certificate and write it to the certificate file
    pub async fn get_cert(&self) -> Result<WriteOutcome, OdError> {
        let cert = self.client.fetch_certificate().await?;
        let outcome =
            self.inspector
                .write_if_different(&self.config.cert_file, &cert, self.config.force)?;
        Ok(outcome)
    }

    /// Compare local state against the server's desired state.
    ///
    /// Individual check failures land in the report. Only a failure to
    /// fetch the desired state aborts; the secret check has run by then and
    /// is returned inside [`VerifyAborted`].
    pub async fn verify(&self) -> Result<VerificationReport, VerifyAborted> {
        let mut report = VerificationReport::new();

        report.record(self.compare_file(
            CheckName::Secret,
            &self.config.secret_file,
            &self.config.secret,
        ));

        let desired: VerifyResponse = match self.client.fetch_verification().await {
            Ok(desired) => desired,
            Err(e) => {
                tracing::error!("Failed to fetch verification data: {}", e);
                return Err(VerifyAborted {
                    report,
                    source: e.into(),
                });
            }
        };

        report.record(self.compare_file(
            CheckName::Flags,
            &self.config.flag_file,
            &desired.flags,
        ));

        if desired.flags.contains(TLS_SERVER_CERTS_FLAG) {
            report.record(self.compare_file(
                CheckName::Certificate,
                &self.config.cert_file,
                &desired.certificate,
            ));
        }

        let installation = self.check_installation();
        let installed = installation.passed;
        report.record(installation);

        if installed {
            let (outcome, ordering) = self.check_version(&desired.osquery_version).await;
            report.version = Some(ordering);
            report.record(outcome);
            report.record(self.check_process().await);
        }

        Ok(report)
    }

    fn compare_file(&self, name: CheckName, path: &Path, expected: &str) -> CheckOutcome {
        if !self.inspector.file_exists(path) {
            return CheckOutcome::fail(name, format!("{} is missing", path.display()));
        }
        if self.inspector.file_content_equals(path, expected) {
            CheckOutcome::pass(name, format!("{} matches", path.display()))
        } else {
            CheckOutcome::fail(name, format!("{} does not match", path.display()))
        }
    }

    fn check_installation(&self) -> CheckOutcome {
        let platform = &self.config.platform;
        if !platform.is_known() {
            return CheckOutcome::fail(
                CheckName::Installation,
                format!("unknown platform {}, please install osquery", platform.id),
            );
        }

        let missing: Vec<String> = self
            .inspector
            .platform_well_known_paths()
            .iter()
            .filter(|path| !self.inspector.file_exists(path))
            .map(|path| path.display().to_string())
            .collect();

        if missing.is_empty() {
            CheckOutcome::pass(CheckName::Installation, "osquery is installed")
        } else {
            CheckOutcome::fail(
                CheckName::Installation,
                format!("missing {}, please install osquery", missing.join(", ")),
            )
        }
    }

    async fn check_version(&self, required: &str) -> (CheckOutcome, VersionOrdering) {
        let platform = &self.config.platform;
        let probe = match &platform.daemon_binary {
            Some(binary) => {
                self.inspector
                    .installed_binary_version(
                        binary,
                        &platform.version_flag,
                        Deadline::after(self.config.probe_timeout),
                    )
                    .await
            }
            None => VersionProbe::Unavailable("no daemon binary for this platform".to_string()),
        };
        let installed = probe.as_str();

        let ordering = compare_versions(installed, required);
        tracing::debug!(
            "Installed version {:?}, required {:?}: {}",
            installed,
            required,
            ordering
        );
        let outcome = match ordering {
            VersionOrdering::Equal | VersionOrdering::ActualHigher => CheckOutcome::pass(
                CheckName::Version,
                format!("installed {} satisfies required {}", installed, required),
            ),
            VersionOrdering::RequiredHigher => CheckOutcome::fail(
                CheckName::Version,
                format!("installed {} is lower than required {}", installed, required),
            ),
            // An unknown ordering is not a mismatch
            VersionOrdering::Indeterminate => {
                tracing::warn!(
                    "Could not compare installed version {:?} with required {:?}",
                    installed,
                    required
                );
                CheckOutcome::pass(
                    CheckName::Version,
                    format!(
                        "could not determine version (installed {:?}, required {:?})",
                        installed, required
                    ),
                )
            }
        };
        (outcome, ordering)
    }

    async fn check_process(&self) -> CheckOutcome {
        let found = self
            .inspector
            .find_running_process(
                &self.config.platform.process_pattern,
                Deadline::after(self.config.probe_timeout),
            )
            .await;
        match found.pid {
            Some(pid) if found.running => {
                CheckOutcome::pass(CheckName::Process, format!("osqueryd is running (pid {})", pid))
            }
            _ => CheckOutcome::fail(CheckName::Process, "osqueryd is not running"),
        }
    }
}
