//! Dotted version comparison
//!
//! Compares the installed osquery version against the minimum the server
//! requires. The rules are deliberately simple and must stay exactly as
//! they are: the server side evaluates versions the same way.

use std::fmt;

/// Result of comparing an installed version against a required one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionOrdering {
    /// Raw strings are identical
    Equal,
    /// Installed version is strictly higher at some segment
    ActualHigher,
    /// Installed version is not higher at any segment
    RequiredHigher,
    /// One side is empty or has a non-numeric segment
    Indeterminate,
}

impl fmt::Display for VersionOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VersionOrdering::Equal => "equal",
            VersionOrdering::ActualHigher => "installed is higher",
            VersionOrdering::RequiredHigher => "required is higher",
            VersionOrdering::Indeterminate => "indeterminate",
        };
        f.write_str(label)
    }
}

/// Compare `actual` against `required`.
///
/// Segments are split on `.` and the shorter side is padded with `"0"`.
/// Padding does not make two strings equal: `compare("1.2", "1.2.0")` is
/// [`VersionOrdering::RequiredHigher`], because only identical raw strings
/// compare [`VersionOrdering::Equal`].
pub fn compare(actual: &str, required: &str) -> VersionOrdering {
    if actual == required {
        return VersionOrdering::Equal;
    }
    if actual.is_empty() || required.is_empty() {
        return VersionOrdering::Indeterminate;
    }

    let mut ours: Vec<&str> = actual.split('.').collect();
    let mut theirs: Vec<&str> = required.split('.').collect();
    let len = ours.len().max(theirs.len());
    ours.resize(len, "0");
    theirs.resize(len, "0");

    for (a, r) in ours.iter().zip(theirs.iter()) {
        let (Ok(a), Ok(r)) = (a.parse::<u64>(), r.parse::<u64>()) else {
            return VersionOrdering::Indeterminate;
        };
        if a > r {
            return VersionOrdering::ActualHigher;
        }
    }
    VersionOrdering::RequiredHigher
}
