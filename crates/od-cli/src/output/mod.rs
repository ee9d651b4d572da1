//! Output formatting utilities for the CLI
//!
//! Stdout carries only what a caller may want to capture: the verification
//! table, printed scripts and script output. Colored status lines go to
//! stderr.

use tabled::{
    settings::{Style, Width},
    Table, Tabled,
};

use od_agent::VerificationReport;

/// Format a verification report as a table
///
/// One row per recorded check, in the order the checks ran. Long details
/// are wrapped so the table fits a normal terminal.
///
/// # Arguments
/// * `report` - Checks recorded by a verify run, possibly partial
///
/// # Returns
/// A formatted string suitable for terminal output, or "No checks performed"
/// if the report is empty.
pub fn format_report(report: &VerificationReport) -> String {
    if report.checks().is_empty() {
        return "No checks performed".to_string();
    }

    #[derive(Tabled)]
    struct CheckRow {
        #[tabled(rename = "CHECK")]
        name: String,
        #[tabled(rename = "RESULT")]
        result: &'static str,
        #[tabled(rename = "DETAIL")]
        detail: String,
    }

    let rows: Vec<CheckRow> = report
        .checks()
        .iter()
        .map(|c| CheckRow {
            name: c.name.to_string(),
            result: if c.passed { "✓ pass" } else { "✗ fail" },
            detail: c.detail.clone(),
        })
        .collect();

    Table::new(rows)
        .with(Style::rounded())
        .with(Width::wrap(100))
        .to_string()
}

/// One-line summary under the report table
///
/// # Returns
/// "All N checks passed", or "F of N checks failed" when any check failed.
pub fn format_summary(report: &VerificationReport) -> String {
    let total = report.checks().len();
    let failed = report.failed().count();
    if failed == 0 {
        format!("All {} checks passed", total)
    } else {
        format!("{} of {} checks failed", failed, total)
    }
}

/// Print a success message to stderr in green with a checkmark prefix
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message to stderr in red with an X prefix
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning to stderr in yellow
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message to stderr in cyan
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}
