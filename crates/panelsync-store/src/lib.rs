//! Panelsync Store - draft working sets and versioned snapshots
//!
//! - [`DraftStore`]: per-controller mutable files with provenance
//! - [`SnapshotManager`]: immutable deploy history, rollback, live state

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod draft;
pub mod error;
pub mod snapshot;

pub use draft::{DraftEntry, DraftStore, FrozenDraft};
pub use error::{StoreError, StoreResult};
pub use snapshot::{
    DeployResult, DeployedSnapshot, DraftDiff, LiveState, LiveStateWriter, RollbackResult,
    SnapshotManager, StatusReport, VersionSummary, ROLLBACK_AUTHOR,
};

/// Panelsync store version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
