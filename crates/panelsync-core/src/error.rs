//! Error types for panelsync core
//!
//! Layered like the components they come from:
//! - [`SyncError`]: orchestrator preconditions and edge outcomes
//! - [`ProposalError`]: AI proposal gateway
//! - [`ConfigError`]: service configuration loading
//! - [`ServiceError`]: everything surfaced by the service facade

use crate::types::{SyncId, SyncStatus};
use panelsync_artifact::{ControllerId, PathError};
use panelsync_store::StoreError;
use panelsync_validator::{ScreenError, ScreenReport, ValidationReport};

/// Top-level service error
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Content failed validation; nothing was written
    #[error("validation failed: {0}")]
    Validation(ValidationReport),

    /// Illegal configuration path
    #[error("invalid path: {0}")]
    Path(#[from] PathError),

    /// Draft or snapshot precondition
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Sync failure
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Proposal failure
    #[error(transparent)]
    Proposal(#[from] ProposalError),
}

impl ServiceError {
    /// Whether explicitly re-initiating the same request may succeed
    ///
    /// Local validation and precondition failures are deterministic and
    /// never are.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Sync(e) => e.is_retryable(),
            Self::Proposal(e) => e.is_retryable(),
            Self::Validation(_) | Self::Path(_) | Self::Store(_) => false,
        }
    }
}

/// Sync orchestration errors
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Controller has no live connection; no operation was created
    #[error("controller {0} is not connected")]
    NotConnected(ControllerId),

    /// A non-terminal sync already exists for the controller
    #[error("sync {sync_id} already in progress for {controller}")]
    SyncInProgress {
        controller: ControllerId,
        sync_id: SyncId,
    },

    /// No snapshot has been deployed yet
    #[error("nothing deployed for {0}")]
    NothingDeployed(ControllerId),

    /// Snapshot lookup failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Sync gate refused the attempt
    #[error("sync denied for {controller}: {reason}")]
    Denied {
        controller: ControllerId,
        reason: String,
    },

    /// Driver failed the security/syntax screen
    #[error("driver rejected by screen: {}", .0.diagnostic())]
    DriverScreenFailed(ScreenReport),

    /// Screen could not run
    #[error("driver screen unavailable: {0}")]
    Screen(#[from] ScreenError),

    /// No terminal report within the bound
    #[error("sync {sync_id} timed out after {timeout_secs}s")]
    SyncTimeout { sync_id: SyncId, timeout_secs: u64 },

    /// Edge reported failure
    #[error("sync {sync_id} rejected by edge: {detail}")]
    SyncRejected { sync_id: SyncId, detail: String },

    /// No such operation
    #[error("unknown sync id {0}")]
    UnknownSync(SyncId),

    /// State machine violation
    #[error("illegal sync transition {from:?} -> {to:?}")]
    IllegalTransition { from: SyncStatus, to: SyncStatus },
}

impl SyncError {
    /// Edge-side or connectivity failures; a fresh sync may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NotConnected(_) | Self::SyncTimeout { .. } | Self::SyncRejected { .. }
        )
    }
}

/// AI proposal gateway errors
#[derive(Debug, thiserror::Error)]
pub enum ProposalError {
    /// Backend call failed
    #[error("proposal backend failed: {0}")]
    Backend(#[from] BackendError),

    /// Response could not be parsed after all attempts
    #[error("malformed proposal after {attempts} attempt(s): {detail}")]
    Malformed { attempts: u32, detail: String },

    /// Proposal carried no files
    #[error("proposal contains no files")]
    Empty,

    /// Proposed path is illegal
    #[error("proposal path '{path}' rejected: {source}")]
    InvalidPath {
        path: String,
        #[source]
        source: PathError,
    },

    /// Proposed content failed validation
    #[error("proposal failed validation: {0}")]
    Invalid(ValidationReport),
}

impl ProposalError {
    /// Backend outages may clear up
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend(_))
    }
}

/// Failure reported by a language-model backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct BackendError(pub String);

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File unreadable
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// TOML syntax or type mismatch
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Value out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Result alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;
