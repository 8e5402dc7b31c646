//! `screen-driver` command

use anyhow::Context;
use panelsync_validator::{DriverScreen, ScreenReport};
use std::fmt::Write as _;
use std::path::Path;

/// Screen a driver source file
pub fn screen_file(path: &Path) -> anyhow::Result<ScreenReport> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read driver {}", path.display()))?;
    let report = DriverScreen::new().screen(&source)?;
    tracing::debug!(
        path = %path.display(),
        violations = report.violations.len(),
        "Driver screened"
    );
    Ok(report)
}

/// Human-readable screening result
#[must_use]
pub fn render(path: &Path, report: &ScreenReport) -> String {
    if report.passed() {
        return format!("{}: ok", path.display());
    }
    let mut out = format!(
        "{}: {} violation(s)",
        path.display(),
        report.violations.len()
    );
    for violation in &report.violations {
        let _ = write!(out, "\n  {violation}");
    }
    out
}
