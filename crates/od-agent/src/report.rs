//! Verification report

use std::fmt;

use od_core::VersionOrdering;

/// Named check performed by `verify`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckName {
    Secret,
    Flags,
    Certificate,
    Installation,
    Version,
    Process,
}

impl CheckName {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckName::Secret => "secret",
            CheckName::Flags => "flags",
            CheckName::Certificate => "certificate",
            CheckName::Installation => "installation",
            CheckName::Version => "version",
            CheckName::Process => "process",
        }
    }
}

impl fmt::Display for CheckName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub name: CheckName,
    pub passed: bool,
    pub detail: String,
}

impl CheckOutcome {
    pub fn pass(name: CheckName, detail: impl Into<String>) -> Self {
        Self {
            name,
            passed: true,
            detail: detail.into(),
        }
    }

    pub fn fail(name: CheckName, detail: impl Into<String>) -> Self {
        Self {
            name,
            passed: false,
            detail: detail.into(),
        }
    }
}

/// Ordered outcomes of one `verify` run
#[derive(Debug, Clone, Default)]
pub struct VerificationReport {
    checks: Vec<CheckOutcome>,
    /// Installed vs required version, when the version check ran
    pub version: Option<VersionOrdering>,
}

impl VerificationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an outcome. Each check is reported at most once.
    pub fn record(&mut self, outcome: CheckOutcome) {
        if self.get(outcome.name).is_some() {
            tracing::debug!("Check {} already recorded", outcome.name);
            return;
        }
        if outcome.passed {
            tracing::info!("{}: {}", outcome.name, outcome.detail);
        } else {
            tracing::warn!("{}: {}", outcome.name, outcome.detail);
        }
        self.checks.push(outcome);
    }

    pub fn checks(&self) -> &[CheckOutcome] {
        &self.checks
    }

    pub fn get(&self, name: CheckName) -> Option<&CheckOutcome> {
        self.checks.iter().find(|c| c.name == name)
    }

    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failed(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.checks.iter().filter(|c| !c.passed)
    }
}
