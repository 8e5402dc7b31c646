//! Content Validator
//!
//! Pure check of proposed configuration files. Checks run in order:
//! 1. path legality (namespace, traversal, extension)
//! 2. size bound
//! 3. document shape (JSON object)
//! 4. per-namespace schema and referential integrity
//!
//! Input is never mutated; every finding lands in the returned
//! [`ValidationReport`].

use crate::config::ValidatorConfig;
use crate::inventory::Inventory;
use crate::report::{IssueCode, ValidationIssue, ValidationReport};
use crate::rules::{gui, scene, FileCheck};
use panelsync_artifact::{ConfigPath, FileSet, Namespace};
use serde_json::Value;
use std::collections::BTreeSet;

/// Validator for configuration batches
#[derive(Debug, Clone, Default)]
pub struct ContentValidator {
    config: ValidatorConfig,
}

impl ContentValidator {
    /// Create validator with configuration
    #[inline]
    #[must_use]
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Validator configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validate files whose paths are already known to be legal
    #[must_use]
    pub fn validate(&self, files: &FileSet, inventory: &Inventory) -> ValidationReport {
        self.validate_raw(files.iter().map(|(p, c)| (p.as_str(), c)), inventory)
    }

    /// Validate `(path, content)` pairs as submitted
    ///
    /// Scenes and pages defined by other files in the same batch count as
    /// existing for reference checks.
    pub fn validate_raw<'a, I>(&self, files: I, inventory: &Inventory) -> ValidationReport
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut report = ValidationReport::new();

        let mut legal: Vec<(ConfigPath, &str)> = Vec::new();
        for (raw_path, content) in files {
            match ConfigPath::parse(raw_path) {
                Ok(path) => legal.push((path, content)),
                Err(e) => report.error(ValidationIssue::new(
                    raw_path,
                    "",
                    IssueCode::InvalidPath,
                    e.to_string(),
                )),
            }
        }

        let stems = |ns: Namespace| -> BTreeSet<String> {
            legal
                .iter()
                .filter(|(p, _)| p.namespace() == ns)
                .map(|(p, _)| p.stem().to_string())
                .collect()
        };
        let batch_scenes = stems(Namespace::Scene);
        let batch_pages = stems(Namespace::Page);

        for (path, content) in &legal {
            let mut check = FileCheck {
                path: path.as_str(),
                inventory,
                batch_scenes: &batch_scenes,
                batch_pages: &batch_pages,
                config: &self.config,
                report: &mut report,
            };
            check_file(&mut check, path.namespace(), content);
        }

        tracing::debug!(
            files = legal.len(),
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            "validated configuration batch"
        );
        report
    }
}

fn check_file(check: &mut FileCheck<'_>, namespace: Namespace, content: &str) {
    if content.len() > check.config.max_file_bytes {
        let max = check.config.max_file_bytes;
        check.error(
            "",
            IssueCode::FileTooLarge,
            format!("file is {} bytes (max: {max})", content.len()),
        );
        return;
    }

    let doc: Value = match serde_json::from_str(content) {
        Ok(doc) => doc,
        Err(e) => {
            check.error(
                "",
                IssueCode::MalformedDocument,
                format!("not valid JSON at line {}, column {}: {e}", e.line(), e.column()),
            );
            return;
        }
    };
    let Some(obj) = doc.as_object() else {
        check.error("", IssueCode::NotAnObject, "document must be a JSON object".to_string());
        return;
    };

    match namespace {
        Namespace::Page | Namespace::Component => gui::check_page(check, obj),
        Namespace::GuiConfig => gui::check_config(check, obj),
        Namespace::Scene => scene::check_scene(check, obj),
    }
}
