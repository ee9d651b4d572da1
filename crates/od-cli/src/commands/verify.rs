//! Verify command

use anyhow::{Context, Result};

use od_agent::{Orchestrator, VerificationReport};

use crate::output::{format_report, format_summary, print_success, print_warning};

/// Run verification and print the report.
///
/// Returns whether every check passed. When the server cannot be reached
/// the checks that already ran are still printed before the error.
pub async fn verify_command(orchestrator: &Orchestrator) -> Result<bool> {
    let report = match orchestrator.verify().await {
        Ok(report) => report,
        Err(aborted) => {
            println!("{}", format_report(&aborted.report));
            return Err(aborted.source).context("Verification aborted");
        }
    };

    print_report(&report);
    Ok(report.all_passed())
}

fn print_report(report: &VerificationReport) {
    println!("{}", format_report(report));
    let summary = format_summary(report);
    if report.all_passed() {
        print_success(&summary);
    } else {
        print_warning(&summary);
    }
}
