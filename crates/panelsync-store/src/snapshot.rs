//! Snapshot Manager
//!
//! Immutable, versioned snapshots per controller:
//! - deploy freezes the draft into version N+1 (first is 1)
//! - rollback replaces the draft with a past version
//! - live state tracks which version the edge last confirmed
//!
//! Snapshots are never mutated or removed once created.

use crate::draft::DraftStore;
use crate::error::{StoreError, StoreResult};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use panelsync_artifact::{ConfigPath, ContentHash, ControllerId, FileSet};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Author recorded on draft entries restored by rollback
pub const ROLLBACK_AUTHOR: &str = "system:rollback";

/// Frozen copy of a controller's draft at deploy time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedSnapshot {
    pub controller_id: ControllerId,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub commit_message: String,
    pub files: FileSet,
    pub checksum: ContentHash,
}

/// Listing row for a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSummary {
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub commit_message: String,
    pub file_count: usize,
    pub checksum: ContentHash,
    pub is_live: bool,
}

/// Outcome of a successful deploy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployResult {
    pub version: u64,
    pub files_deployed: usize,
    pub checksum: ContentHash,
}

/// Outcome of a successful rollback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackResult {
    pub restored_version: u64,
    pub files_restored: usize,
}

/// Version the edge last confirmed applying
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveState {
    pub controller_id: ControllerId,
    pub live_version: Option<u64>,
}

/// Draft/deployed/live summary for one controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub controller_id: ControllerId,
    pub draft_file_count: usize,
    pub deployed_file_count: usize,
    pub deployed_version: Option<u64>,
    pub live_version: Option<u64>,
    /// Latest deployed version differs from live
    pub needs_sync: bool,
}

/// Draft changes relative to the latest snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftDiff {
    pub added: Vec<ConfigPath>,
    pub modified: Vec<ConfigPath>,
    pub removed: Vec<ConfigPath>,
}

impl DraftDiff {
    /// No differences
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }
}

/// Write access to live state
///
/// Only the sync path records live versions; keeping it behind a trait lets
/// the orchestrator depend on this alone.
pub trait LiveStateWriter: Send + Sync {
    /// Record `version` as live on the controller
    fn mark_live(&self, controller: &ControllerId, version: u64) -> StoreResult<()>;
}

#[derive(Debug, Default)]
struct History {
    snapshots: Vec<Arc<DeployedSnapshot>>,
    live_version: Option<u64>,
}

impl History {
    fn get(&self, version: u64) -> Option<&Arc<DeployedSnapshot>> {
        let idx = usize::try_from(version.checked_sub(1)?).ok()?;
        self.snapshots.get(idx)
    }

    fn latest(&self) -> Option<&Arc<DeployedSnapshot>> {
        self.snapshots.last()
    }
}

/// Versioned snapshot history over a shared [`DraftStore`]
#[derive(Debug)]
pub struct SnapshotManager {
    drafts: Arc<DraftStore>,
    histories: DashMap<ControllerId, History>,
}

impl SnapshotManager {
    /// Create manager over a draft store
    #[must_use]
    pub fn new(drafts: Arc<DraftStore>) -> Self {
        Self {
            drafts,
            histories: DashMap::new(),
        }
    }

    /// Underlying draft store
    #[inline]
    #[must_use]
    pub fn drafts(&self) -> &Arc<DraftStore> {
        &self.drafts
    }

    /// Freeze the draft into a new immutable snapshot
    ///
    /// Writes to this controller wait while the draft is copied; the version
    /// number is assigned under the same lock so concurrent deploys get
    /// distinct, gapless versions. The draft is left in place.
    pub fn deploy(
        &self,
        controller: &ControllerId,
        author: &str,
        commit_message: &str,
    ) -> StoreResult<DeployResult> {
        self.deploy_checked(controller, author, commit_message, |_| Ok::<_, StoreError>(()))
    }

    /// [`deploy`](Self::deploy) with a gate on the frozen files
    ///
    /// `check` sees exactly the files that will be snapshotted, while writers
    /// are held off. An `Err` aborts the deploy before a version is assigned.
    pub fn deploy_checked<E>(
        &self,
        controller: &ControllerId,
        author: &str,
        commit_message: &str,
        check: impl FnOnce(&FileSet) -> Result<(), E>,
    ) -> Result<DeployResult, E>
    where
        E: From<StoreError>,
    {
        let result = self.drafts.freeze(controller, |draft| {
            if draft.is_empty() {
                return Err(E::from(StoreError::EmptyDraft(controller.clone())));
            }
            let files = draft.files();
            check(&files)?;
            let checksum = files.checksum();
            let files_deployed = files.len();

            let mut history = self.histories.entry(controller.clone()).or_default();
            let version = history.snapshots.len() as u64 + 1;
            history.snapshots.push(Arc::new(DeployedSnapshot {
                controller_id: controller.clone(),
                version,
                created_at: Utc::now(),
                created_by: author.to_owned(),
                commit_message: commit_message.to_owned(),
                files,
                checksum,
            }));

            Ok(DeployResult {
                version,
                files_deployed,
                checksum,
            })
        })?;

        tracing::info!(
            controller = %controller,
            version = result.version,
            files = result.files_deployed,
            checksum = %result.checksum.short(),
            "Deployed snapshot"
        );
        Ok(result)
    }

    /// Replace the draft with the contents of a past snapshot
    ///
    /// Draft files not present in the snapshot are removed. History and
    /// live state are untouched.
    pub fn rollback(&self, controller: &ControllerId, version: u64) -> StoreResult<RollbackResult> {
        let snapshot = self.get(controller, version)?;
        let files_restored = self.drafts.freeze(controller, |draft| {
            draft.replace_all(&snapshot.files, ROLLBACK_AUTHOR);
            draft.len()
        });
        tracing::info!(controller = %controller, version, files_restored, "Rolled back draft");
        Ok(RollbackResult {
            restored_version: version,
            files_restored,
        })
    }

    /// Drop every draft file, returning how many were removed
    pub fn discard(&self, controller: &ControllerId) -> usize {
        let removed = self.drafts.freeze(controller, |draft| draft.clear());
        tracing::info!(controller = %controller, removed, "Discarded draft");
        removed
    }

    /// Snapshot by version
    pub fn get(&self, controller: &ControllerId, version: u64) -> StoreResult<Arc<DeployedSnapshot>> {
        let found = self
            .histories
            .get(controller)
            .and_then(|h| h.get(version).cloned());
        found.ok_or_else(|| StoreError::UnknownVersion {
            controller: controller.clone(),
            version,
        })
    }

    /// Most recent snapshot
    #[must_use]
    pub fn latest(&self, controller: &ControllerId) -> Option<Arc<DeployedSnapshot>> {
        self.histories
            .get(controller)
            .and_then(|h| h.latest().cloned())
    }

    /// Snapshot listing, newest first
    #[must_use]
    pub fn list_versions(&self, controller: &ControllerId) -> Vec<VersionSummary> {
        let Some(history) = self.histories.get(controller) else {
            return Vec::new();
        };
        let live = history.live_version;
        let rows = history
            .snapshots
            .iter()
            .rev()
            .map(|s| VersionSummary {
                version: s.version,
                created_at: s.created_at,
                created_by: s.created_by.clone(),
                commit_message: s.commit_message.clone(),
                file_count: s.files.len(),
                checksum: s.checksum,
                is_live: live == Some(s.version),
            })
            .collect();
        rows
    }

    /// Live state for a controller
    #[must_use]
    pub fn live_state(&self, controller: &ControllerId) -> LiveState {
        let live_version = self.histories.get(controller).and_then(|h| h.live_version);
        LiveState {
            controller_id: controller.clone(),
            live_version,
        }
    }

    /// Draft/deployed/live summary
    ///
    /// Read-only; calling it twice with no intervening mutation yields
    /// identical reports.
    #[must_use]
    pub fn get_status(&self, controller: &ControllerId) -> StatusReport {
        let draft_file_count = self.drafts.len(controller);
        let (deployed_version, deployed_file_count, live_version) =
            match self.histories.get(controller) {
                Some(h) => (
                    h.latest().map(|s| s.version),
                    h.latest().map_or(0, |s| s.files.len()),
                    h.live_version,
                ),
                None => (None, 0, None),
            };
        StatusReport {
            controller_id: controller.clone(),
            draft_file_count,
            deployed_file_count,
            deployed_version,
            live_version,
            needs_sync: deployed_version.is_some() && deployed_version != live_version,
        }
    }

    /// Paths added, modified or removed in the draft since the latest deploy
    #[must_use]
    pub fn pending_changes(&self, controller: &ControllerId) -> DraftDiff {
        let draft = self.drafts.files(controller);
        let deployed = self
            .latest(controller)
            .map(|s| s.files.clone())
            .unwrap_or_default();

        let mut diff = DraftDiff::default();
        for (path, content) in draft.iter() {
            match deployed.get(path) {
                None => diff.added.push(path.clone()),
                Some(old) if old != content => diff.modified.push(path.clone()),
                Some(_) => {}
            }
        }
        diff.removed = deployed
            .paths()
            .filter(|p| !draft.contains(p))
            .cloned()
            .collect();
        diff
    }
}

impl LiveStateWriter for SnapshotManager {
    fn mark_live(&self, controller: &ControllerId, version: u64) -> StoreResult<()> {
        let mut history = self
            .histories
            .get_mut(controller)
            .ok_or_else(|| StoreError::UnknownVersion {
                controller: controller.clone(),
                version,
            })?;
        if history.get(version).is_none() {
            return Err(StoreError::UnknownVersion {
                controller: controller.clone(),
                version,
            });
        }
        history.live_version = Some(version);
        drop(history);
        tracing::info!(controller = %controller, version, "Live version updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctrl() -> ControllerId {
        ControllerId::new("lobby").unwrap()
    }

    fn page(name: &str) -> ConfigPath {
        ConfigPath::page(name).unwrap()
    }

    fn manager() -> SnapshotManager {
        SnapshotManager::new(Arc::new(DraftStore::new()))
    }

    #[test]
    fn deploy_empty_draft_fails() {
        let mgr = manager();
        assert_eq!(
            mgr.deploy(&ctrl(), "user:ana", "nothing"),
            Err(StoreError::EmptyDraft(ctrl()))
        );
        assert!(mgr.list_versions(&ctrl()).is_empty());
    }

    #[derive(Debug, PartialEq)]
    enum Gate {
        Store(StoreError),
        Rejected(usize),
    }

    impl From<StoreError> for Gate {
        fn from(e: StoreError) -> Self {
            Gate::Store(e)
        }
    }

    #[test]
    fn rejected_check_assigns_no_version() {
        let mgr = manager();
        assert_eq!(
            mgr.deploy_checked(&ctrl(), "user:ana", "empty", |_| Ok::<_, Gate>(())),
            Err(Gate::Store(StoreError::EmptyDraft(ctrl())))
        );

        mgr.drafts().write(&ctrl(), page("main"), "{}", "user:ana");
        let result = mgr.deploy_checked(&ctrl(), "user:ana", "blocked", |files| {
            Err(Gate::Rejected(files.len()))
        });
        assert_eq!(result, Err(Gate::Rejected(1)));
        assert!(mgr.list_versions(&ctrl()).is_empty());
        assert_eq!(mgr.deploy(&ctrl(), "user:ana", "ok").unwrap().version, 1);
    }

    #[test]
    fn versions_start_at_one_and_increase() {
        let mgr = manager();
        mgr.drafts().write(&ctrl(), page("main"), "{}", "user:ana");
        assert_eq!(mgr.deploy(&ctrl(), "user:ana", "first").unwrap().version, 1);
        // Unchanged re-deploy still creates a version
        assert_eq!(mgr.deploy(&ctrl(), "user:ana", "again").unwrap().version, 2);

        let versions: Vec<_> = mgr.list_versions(&ctrl()).iter().map(|v| v.version).collect();
        assert_eq!(versions, vec![2, 1]);
    }

    #[test]
    fn draft_kept_after_deploy() {
        let mgr = manager();
        mgr.drafts().write(&ctrl(), page("main"), "{}", "user:ana");
        mgr.deploy(&ctrl(), "user:ana", "v1").unwrap();
        assert_eq!(mgr.drafts().len(&ctrl()), 1);
        assert!(mgr.pending_changes(&ctrl()).is_empty());
    }

    #[test]
    fn snapshot_unaffected_by_later_writes() {
        let mgr = manager();
        mgr.drafts().write(&ctrl(), page("main"), "{\"v\":1}", "user:ana");
        mgr.deploy(&ctrl(), "user:ana", "v1").unwrap();
        mgr.drafts().write(&ctrl(), page("main"), "{\"v\":2}", "user:ana");

        let v1 = mgr.get(&ctrl(), 1).unwrap();
        assert_eq!(v1.files.get(&page("main")), Some("{\"v\":1}"));
    }

    #[test]
    fn rollback_restores_exact_set() {
        let mgr = manager();
        mgr.drafts().write(&ctrl(), page("main"), "{\"v\":1}", "user:ana");
        mgr.deploy(&ctrl(), "user:ana", "v1").unwrap();
        mgr.drafts().write(&ctrl(), page("main"), "{\"v\":2}", "user:ana");
        mgr.drafts().write(&ctrl(), page("extra"), "{}", "user:ana");

        let result = mgr.rollback(&ctrl(), 1).unwrap();
        assert_eq!(result.files_restored, 1);
        assert_eq!(mgr.drafts().files(&ctrl()), mgr.get(&ctrl(), 1).unwrap().files);
    }

    #[test]
    fn rollback_unknown_version_changes_nothing() {
        let mgr = manager();
        mgr.drafts().write(&ctrl(), page("main"), "{}", "user:ana");
        mgr.deploy(&ctrl(), "user:ana", "v1").unwrap();
        mgr.drafts().write(&ctrl(), page("other"), "{}", "user:ana");

        let err = mgr.rollback(&ctrl(), 9).unwrap_err();
        assert!(matches!(err, StoreError::UnknownVersion { version: 9, .. }));
        assert_eq!(mgr.drafts().len(&ctrl()), 2);
        assert!(mgr.rollback(&ctrl(), 0).is_err());
    }

    #[test]
    fn status_tracks_live_version() {
        let mgr = manager();
        let empty = mgr.get_status(&ctrl());
        assert_eq!(empty.deployed_version, None);
        assert!(!empty.needs_sync);

        mgr.drafts().write(&ctrl(), page("main"), "{}", "user:ana");
        mgr.deploy(&ctrl(), "user:ana", "v1").unwrap();
        let status = mgr.get_status(&ctrl());
        assert_eq!(status.deployed_version, Some(1));
        assert_eq!(status.live_version, None);
        assert!(status.needs_sync);

        mgr.mark_live(&ctrl(), 1).unwrap();
        let status = mgr.get_status(&ctrl());
        assert_eq!(status.live_version, Some(1));
        assert!(!status.needs_sync);
        assert_eq!(status, mgr.get_status(&ctrl()));
    }

    #[test]
    fn mark_live_rejects_unknown_version() {
        let mgr = manager();
        assert!(mgr.mark_live(&ctrl(), 1).is_err());
        mgr.drafts().write(&ctrl(), page("main"), "{}", "user:ana");
        mgr.deploy(&ctrl(), "user:ana", "v1").unwrap();
        assert!(mgr.mark_live(&ctrl(), 2).is_err());
        assert_eq!(mgr.live_state(&ctrl()).live_version, None);
    }

    #[test]
    fn discard_empties_draft_only() {
        let mgr = manager();
        mgr.drafts().write(&ctrl(), page("main"), "{}", "user:ana");
        mgr.deploy(&ctrl(), "user:ana", "v1").unwrap();
        assert_eq!(mgr.discard(&ctrl()), 1);
        assert_eq!(mgr.drafts().len(&ctrl()), 0);
        assert_eq!(mgr.list_versions(&ctrl()).len(), 1);

        let diff = mgr.pending_changes(&ctrl());
        assert_eq!(diff.removed, vec![page("main")]);
    }

    #[test]
    fn pending_changes_classifies_paths() {
        let mgr = manager();
        mgr.drafts().write(&ctrl(), page("keep"), "{}", "user:ana");
        mgr.drafts().write(&ctrl(), page("edit"), "{\"v\":1}", "user:ana");
        mgr.drafts().write(&ctrl(), page("gone"), "{}", "user:ana");
        mgr.deploy(&ctrl(), "user:ana", "v1").unwrap();

        mgr.drafts().write(&ctrl(), page("edit"), "{\"v\":2}", "user:ana");
        mgr.drafts().delete(&ctrl(), &page("gone")).unwrap();
        mgr.drafts().write(&ctrl(), page("new"), "{}", "user:ana");

        let diff = mgr.pending_changes(&ctrl());
        assert_eq!(diff.added, vec![page("new")]);
        assert_eq!(diff.modified, vec![page("edit")]);
        assert_eq!(diff.removed, vec![page("gone")]);
    }

    #[test]
    fn snapshot_serializes() {
        let mgr = manager();
        mgr.drafts().write(&ctrl(), page("main"), "{}", "user:ana");
        mgr.deploy(&ctrl(), "user:ana", "v1").unwrap();
        let snap = mgr.latest(&ctrl()).unwrap();
        let json = serde_json::to_value(snap.as_ref()).unwrap();
        assert_eq!(json["version"], 1);
        assert_eq!(json["files"]["gui/pages/main.json"], "{}");
    }
}
