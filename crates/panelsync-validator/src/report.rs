//! Validation results

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Issue severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Blocks promotion
    Error,
    /// Reported, never blocks
    Warning,
}

/// Stable classification of a validation issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    InvalidPath,
    FileTooLarge,
    MalformedDocument,
    NotAnObject,
    MissingField,
    WrongType,
    InvalidPosition,
    UnknownScene,
    UnknownDevice,
    UnknownControl,
    InvalidDelay,
    MissingRange,
    SmallTouchTarget,
    OverlappingElements,
    MissingLabel,
    UnknownHomePage,
    UnknownPage,
}

/// One finding against one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// File path as submitted
    pub path: String,
    /// JSON pointer into the document (`""` for the whole file)
    pub location: String,
    /// Classification
    pub code: IssueCode,
    /// Human-readable message; names the offending reference where there is one
    pub message: String,
}

impl ValidationIssue {
    /// Create new issue
    #[must_use]
    pub fn new(
        path: impl Into<String>,
        location: impl Into<String>,
        code: IssueCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            location: location.into(),
            code,
            message: message.into(),
        }
    }
}

impl Display for ValidationIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.location.is_empty() {
            write!(f, "{}: {}", self.path, self.message)
        } else {
            write!(f, "{}{}: {}", self.path, self.location, self.message)
        }
    }
}

/// Outcome of validating a batch of files
///
/// `valid` is false iff `errors` is non-empty. Warnings never affect it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Empty, valid report
    #[must_use]
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Record an issue with the given severity
    pub fn push(&mut self, severity: Severity, issue: ValidationIssue) {
        match severity {
            Severity::Error => {
                self.valid = false;
                self.errors.push(issue);
            }
            Severity::Warning => self.warnings.push(issue),
        }
    }

    /// Record an error
    pub fn error(&mut self, issue: ValidationIssue) {
        self.push(Severity::Error, issue);
    }

    /// Record a warning
    pub fn warning(&mut self, issue: ValidationIssue) {
        self.push(Severity::Warning, issue);
    }

    /// Fold another report into this one
    pub fn merge(&mut self, other: ValidationReport) {
        self.valid &= other.valid;
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Whether promotion is allowed
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Number of errors
    #[inline]
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Whether any issue (error or warning) has the given code
    #[must_use]
    pub fn has_code(&self, code: IssueCode) -> bool {
        self.errors.iter().chain(&self.warnings).any(|i| i.code == code)
    }
}

impl Display for ValidationReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} error(s), {} warning(s)",
            self.errors.len(),
            self.warnings.len()
        )?;
        for e in &self.errors {
            write!(f, "\n  error: {e}")?;
        }
        for w in &self.warnings {
            write!(f, "\n  warning: {w}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(code: IssueCode) -> ValidationIssue {
        ValidationIssue::new("gui/pages/main.json", "/elements/0", code, "msg")
    }

    #[test]
    fn warnings_keep_report_valid() {
        let mut report = ValidationReport::new();
        report.warning(issue(IssueCode::SmallTouchTarget));
        assert!(report.is_valid());
        report.error(issue(IssueCode::UnknownScene));
        assert!(!report.is_valid());
        assert!(report.has_code(IssueCode::SmallTouchTarget));
    }

    #[test]
    fn merge_propagates_invalidity() {
        let mut a = ValidationReport::new();
        let mut b = ValidationReport::new();
        b.error(issue(IssueCode::MissingField));
        a.merge(b);
        assert!(!a.is_valid());
        assert_eq!(a.error_count(), 1);
    }

    #[test]
    fn display_lists_issues() {
        let mut report = ValidationReport::new();
        report.error(issue(IssueCode::UnknownScene));
        let text = report.to_string();
        assert!(text.starts_with("1 error(s), 0 warning(s)"));
        assert!(text.contains("gui/pages/main.json/elements/0: msg"));
    }
}
