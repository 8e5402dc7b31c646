//! `validate` command

use anyhow::Context;
use panelsync_validator::{ContentValidator, Inventory, ValidationReport};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// One file argument: `<config-path>=<local file>` or a local file whose
/// relative path is already a config path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileArg {
    pub config_path: String,
    pub local: PathBuf,
}

impl FromStr for FileArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err("empty file argument".to_string());
        }
        if let Some((config_path, local)) = s.split_once('=') {
            if config_path.is_empty() || local.is_empty() {
                return Err(format!("expected <config-path>=<file>, got '{s}'"));
            }
            return Ok(Self {
                config_path: config_path.to_string(),
                local: PathBuf::from(local),
            });
        }
        let normalized = s.replace('\\', "/");
        let config_path = normalized.trim_start_matches("./").to_string();
        Ok(Self {
            config_path,
            local: PathBuf::from(s),
        })
    }
}

/// Read an inventory document
pub fn load_inventory(path: &Path) -> anyhow::Result<Inventory> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read inventory {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("failed to parse inventory {}", path.display()))
}

/// Read every file into `(config path, content)` pairs
pub fn read_files(args: &[FileArg]) -> anyhow::Result<Vec<(String, String)>> {
    args.iter()
        .map(|arg| {
            let content = std::fs::read_to_string(&arg.local)
                .with_context(|| format!("failed to read {}", arg.local.display()))?;
            Ok((arg.config_path.clone(), content))
        })
        .collect()
}

/// Validate the batch as one submission
#[must_use]
pub fn run(
    validator: &ContentValidator,
    inventory: &Inventory,
    files: &[(String, String)],
) -> ValidationReport {
    let report = validator.validate_raw(
        files.iter().map(|(p, c)| (p.as_str(), c.as_str())),
        inventory,
    );
    tracing::info!(
        files = files.len(),
        errors = report.error_count(),
        warnings = report.warnings.len(),
        "Batch validated"
    );
    report
}

/// Render for the terminal, or as pretty JSON
pub fn render(report: &ValidationReport, json: bool) -> anyhow::Result<String> {
    if json {
        return Ok(serde_json::to_string_pretty(report)?);
    }
    Ok(report.to_string())
}
