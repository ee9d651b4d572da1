//! od-agent: node state reconciliation for osctrld
//!
//! Fetches the desired state of an osquery node from the osctrl server,
//! inspects the local machine, reports differences and runs server-issued
//! enroll/remove scripts.

pub mod client;
pub mod inspect;
pub mod reconcile;
pub mod report;
pub mod script;

pub use client::RemoteStateClient;
pub use inspect::{ContentCheck, LocalStateInspector, ProcessMatch, VersionProbe, WriteOutcome};
pub use reconcile::{Orchestrator, ScriptAction, ScriptDisposition, VerifyAborted};
pub use report::{CheckName, CheckOutcome, VerificationReport};
pub use script::{ScriptExecutor, ScriptOutput};
