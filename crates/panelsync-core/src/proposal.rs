//! AI Proposal Gateway
//!
//! Turns an instruction into draft edits through an opaque language-model
//! backend. Backend output is untrusted:
//! 1. extract a JSON object (bare or inside a code fence)
//! 2. on malformed output, retry with a stricter instruction
//! 3. validate every proposed file against the inventory
//! 4. only then write to the draft, attributed to the model

use crate::error::{BackendError, ProposalError};
use async_trait::async_trait;
use panelsync_artifact::{ConfigPath, ControllerId, FileSet};
use panelsync_store::DraftStore;
use panelsync_validator::{ContentValidator, Inventory, ValidationIssue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Appended to the instruction on retries
pub const STRICT_SUFFIX: &str = "Respond with exactly one JSON object of the form \
{\"summary\": string, \"files\": [{\"path\": string, \"content\": object}]} and no other text.";

/// Token accounting reported by a backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Usage {
    fn absorb(&mut self, other: Usage) {
        self.model = other.model;
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// Raw backend reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendResponse {
    pub raw: String,
    pub usage: Usage,
}

/// What the backend is asked
#[derive(Debug, Clone, PartialEq)]
pub struct ProposalRequest {
    pub controller_id: ControllerId,
    pub instruction: String,
    /// Caller-supplied context (device list, selected page, ...)
    pub context: Value,
    /// Current draft, so the model edits rather than invents
    pub current_files: FileSet,
    /// 1-based attempt number
    pub attempt: u32,
    /// Set on retries after malformed output
    pub strict: bool,
}

/// Language-model capability
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProposalBackend: Send + Sync {
    async fn propose(&self, request: &ProposalRequest) -> Result<BackendResponse, BackendError>;
}

/// Accepted proposal
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProposalOutcome {
    pub summary: String,
    pub files_written: Vec<ConfigPath>,
    pub warnings: Vec<ValidationIssue>,
    pub usage: Usage,
    pub attempts: u32,
}

#[derive(Debug, Deserialize)]
struct RawProposal {
    #[serde(default)]
    summary: String,
    files: Vec<RawFile>,
}

#[derive(Debug, Deserialize)]
struct RawFile {
    path: String,
    content: Value,
}

/// Gateway between a backend and the draft store
pub struct ProposalGateway {
    backend: Arc<dyn ProposalBackend>,
    validator: ContentValidator,
    drafts: Arc<DraftStore>,
    retries: u32,
}

impl ProposalGateway {
    /// Create gateway
    #[must_use]
    pub fn new(
        backend: Arc<dyn ProposalBackend>,
        validator: ContentValidator,
        drafts: Arc<DraftStore>,
    ) -> Self {
        Self {
            backend,
            validator,
            drafts,
            retries: 1,
        }
    }

    /// Extra attempts after malformed output
    #[must_use]
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Ask the backend for a change and apply it to the draft if valid
    ///
    /// `inventory` must already include scenes and pages present in the
    /// draft. Nothing is written unless every file passes validation.
    pub async fn propose(
        &self,
        controller: &ControllerId,
        instruction: &str,
        context: Value,
        inventory: &Inventory,
    ) -> Result<ProposalOutcome, ProposalError> {
        let mut usage = Usage::default();
        let mut attempts = 0;
        let mut request = ProposalRequest {
            controller_id: controller.clone(),
            instruction: instruction.to_owned(),
            context,
            current_files: self.drafts.files(controller),
            attempt: 1,
            strict: false,
        };

        let proposal = loop {
            attempts += 1;
            request.attempt = attempts;
            let response = self.backend.propose(&request).await?;
            usage.absorb(response.usage);

            match parse_proposal(&response.raw) {
                Ok(p) => break p,
                Err(detail) if attempts <= self.retries => {
                    tracing::warn!(
                        controller = %controller,
                        attempt = attempts,
                        detail = %detail,
                        "Malformed proposal, retrying with strict instruction"
                    );
                    if !request.strict {
                        request.strict = true;
                        request.instruction = format!("{instruction}\n\n{STRICT_SUFFIX}");
                    }
                }
                Err(detail) => return Err(ProposalError::Malformed { attempts, detail }),
            }
        };

        let files = to_file_set(proposal.files)?;
        let report = self.validator.validate(&files, inventory);
        if !report.is_valid() {
            tracing::info!(
                controller = %controller,
                errors = report.error_count(),
                "Proposal rejected by validation"
            );
            return Err(ProposalError::Invalid(report));
        }

        let author = format!("ai:{}", usage.model);
        let files_written: Vec<ConfigPath> = files.paths().cloned().collect();
        for (path, content) in files {
            self.drafts.write(controller, path, content, &author);
        }
        tracing::info!(
            controller = %controller,
            files = files_written.len(),
            model = %usage.model,
            attempts,
            "Proposal applied to draft"
        );

        Ok(ProposalOutcome {
            summary: proposal.summary,
            files_written,
            warnings: report.warnings,
            usage,
            attempts,
        })
    }
}

fn parse_proposal(raw: &str) -> Result<RawProposal, String> {
    let json = extract_json(raw).ok_or_else(|| "no JSON object in response".to_owned())?;
    serde_json::from_str(json).map_err(|e| e.to_string())
}

/// Locate the JSON object in a model reply
fn extract_json(raw: &str) -> Option<&str> {
    let body = match raw.find("```") {
        Some(open) => {
            let after = &raw[open + 3..];
            // Skip an info string such as `json`.
            let start = after.find('\n').map_or(0, |i| i + 1);
            let inner = &after[start..];
            inner.find("```").map_or(inner, |end| &inner[..end])
        }
        None => raw,
    };
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    (start < end).then(|| &body[start..=end])
}

fn to_file_set(raw: Vec<RawFile>) -> Result<FileSet, ProposalError> {
    if raw.is_empty() {
        return Err(ProposalError::Empty);
    }
    let mut files = FileSet::new();
    for RawFile { path, content } in raw {
        let parsed = ConfigPath::parse(&path).map_err(|source| ProposalError::InvalidPath {
            path: path.clone(),
            source,
        })?;
        let text = match content {
            Value::String(s) => s,
            // Non-object documents are left for the validator to reject.
            other => serde_json::to_string_pretty(&other).unwrap_or_else(|_| other.to_string()),
        };
        files.insert(parsed, text);
    }
    Ok(files)
}
