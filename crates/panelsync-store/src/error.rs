//! Error types for draft and snapshot management

use panelsync_artifact::{ConfigPath, ControllerId};

/// Draft/snapshot precondition failures
///
/// All variants are deterministic and leave state unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No draft file at path
    #[error("draft file not found: {controller}/{path}")]
    NotFound {
        controller: ControllerId,
        path: ConfigPath,
    },

    /// Deploy requested with nothing in the draft
    #[error("nothing to deploy: draft for {0} is empty")]
    EmptyDraft(ControllerId),

    /// Snapshot version does not exist
    #[error("unknown version {version} for {controller}")]
    UnknownVersion { controller: ControllerId, version: u64 },
}

/// Result alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
