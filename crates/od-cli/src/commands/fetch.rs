//! Flags and certificate commands

use std::path::Path;

use anyhow::{Context, Result};

use od_agent::{Orchestrator, WriteOutcome};

use crate::output::{print_info, print_success};

/// Retrieve osquery flags and write them to the flag file
pub async fn flags_command(orchestrator: &Orchestrator) -> Result<()> {
    let outcome = orchestrator
        .get_flags()
        .await
        .context("Failed to retrieve flags")?;
    report("Flags", &orchestrator.config().flag_file, outcome);
    Ok(())
}

/// Retrieve the server certificate and write it to the certificate file
pub async fn cert_command(orchestrator: &Orchestrator) -> Result<()> {
    let outcome = orchestrator
        .get_cert()
        .await
        .context("Failed to retrieve certificate")?;
    report("Certificate", &orchestrator.config().cert_file, outcome);
    Ok(())
}

fn report(what: &str, path: &Path, outcome: WriteOutcome) {
    match outcome {
        WriteOutcome::Unchanged => {
            print_info(&format!("{} in {} already up to date", what, path.display()))
        }
        _ => print_success(&format!("{} {} at {}", what, outcome, path.display())),
    }
}
