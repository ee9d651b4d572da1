//! Enroll and remove commands

use anyhow::{Context, Result};

use od_agent::{Orchestrator, ScriptAction, ScriptDisposition, WriteOutcome};
use od_protocol::ScriptKind;

use crate::output::{print_info, print_success};

/// Fetch the enroll or remove script and print, save or run it
pub async fn script_command(
    orchestrator: &Orchestrator,
    kind: ScriptKind,
    action: ScriptAction,
) -> Result<()> {
    let disposition = match kind {
        ScriptKind::Enroll => orchestrator.enroll(action).await,
        ScriptKind::Remove => orchestrator.remove(action).await,
    }
    .with_context(|| format!("{} failed", kind))?;

    match disposition {
        ScriptDisposition::Printed(script) => println!("{}", script),
        ScriptDisposition::Saved { path, outcome } => match outcome {
            WriteOutcome::Unchanged => {
                print_info(&format!("{} script at {} is up to date", kind, path.display()))
            }
            _ => print_success(&format!("{} script {} at {}", kind, outcome, path.display())),
        },
        ScriptDisposition::Executed(output) => {
            print!("{}", output.stdout);
            print_success(&format!("{} script completed", kind));
        }
    }
    Ok(())
}
