//! Config service facade
//!
//! The boundary the dashboard/API layer calls. Every write path runs
//! through the validator first; sync and driver pushes go through the
//! orchestrator.

use crate::connection::ConnectionManager;
use crate::error::{BackendError, ProposalError, ServiceError, ServiceResult};
use crate::orchestrator::{SyncGate, SyncHandle, SyncOrchestrator};
use crate::proposal::{ProposalBackend, ProposalGateway, ProposalOutcome};
use crate::types::{ServiceConfig, SyncId, SyncOperation};
use dashmap::DashMap;
use panelsync_artifact::{ConfigPath, ControllerId, DriverArtifact, FileSet, Namespace};
use panelsync_store::{
    DeployResult, DraftDiff, DraftEntry, DraftStore, RollbackResult, SnapshotManager,
    StatusReport, VersionSummary,
};
use panelsync_validator::{ContentValidator, Inventory, ValidationIssue, ValidationReport};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Source of a controller's device/control/scene inventory
pub trait InventoryProvider: Send + Sync {
    fn inventory(&self, controller: &ControllerId) -> Inventory;
}

/// Inventory table held in memory
#[derive(Debug, Default)]
pub struct StaticInventory {
    inventories: DashMap<ControllerId, Inventory>,
}

impl StaticInventory {
    /// Empty table; unknown controllers get an empty inventory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a controller's inventory
    pub fn set(&self, controller: ControllerId, inventory: Inventory) {
        self.inventories.insert(controller, inventory);
    }

    /// With a controller's inventory
    #[must_use]
    pub fn with(self, controller: ControllerId, inventory: Inventory) -> Self {
        self.set(controller, inventory);
        self
    }
}

impl InventoryProvider for StaticInventory {
    fn inventory(&self, controller: &ControllerId) -> Inventory {
        self.inventories
            .get(controller)
            .map(|i| i.value().clone())
            .unwrap_or_default()
    }
}

/// Result of an accepted draft write
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteOutcome {
    pub path: ConfigPath,
    pub warnings: Vec<ValidationIssue>,
}

/// Configuration lifecycle service
pub struct ConfigService {
    config: ServiceConfig,
    validator: ContentValidator,
    snapshots: Arc<SnapshotManager>,
    connections: Arc<dyn ConnectionManager>,
    orchestrator: Arc<SyncOrchestrator>,
    inventory: Arc<dyn InventoryProvider>,
    proposals: Option<ProposalGateway>,
}

impl ConfigService {
    /// Create service with fresh stores
    #[must_use]
    pub fn new(
        config: ServiceConfig,
        connections: Arc<dyn ConnectionManager>,
        inventory: Arc<dyn InventoryProvider>,
    ) -> Self {
        let snapshots = Arc::new(SnapshotManager::new(Arc::new(DraftStore::new())));
        let orchestrator = Arc::new(SyncOrchestrator::new(
            Arc::clone(&snapshots),
            Arc::clone(&connections),
            config.sync_timeout(),
        ));
        Self {
            validator: ContentValidator::new(config.validator.clone()),
            config,
            snapshots,
            connections,
            orchestrator,
            inventory,
            proposals: None,
        }
    }

    /// Attach a language-model backend for `propose_change`
    #[must_use]
    pub fn with_proposal_backend(mut self, backend: Arc<dyn ProposalBackend>) -> Self {
        self.proposals = Some(
            ProposalGateway::new(
                backend,
                self.validator.clone(),
                Arc::clone(self.snapshots.drafts()),
            )
            .with_retries(self.config.proposal_retries),
        );
        self
    }

    /// Install a sync gate; call before the first sync
    #[must_use]
    pub fn with_sync_gate(mut self, gate: Arc<dyn SyncGate>) -> Self {
        self.orchestrator = Arc::new(
            SyncOrchestrator::new(
                Arc::clone(&self.snapshots),
                Arc::clone(&self.connections),
                self.config.sync_timeout(),
            )
            .with_gate(gate),
        );
        self
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn snapshots(&self) -> &Arc<SnapshotManager> {
        &self.snapshots
    }

    #[inline]
    #[must_use]
    pub fn orchestrator(&self) -> &Arc<SyncOrchestrator> {
        &self.orchestrator
    }

    /// Start the periodic timeout sweep
    pub fn spawn_background(&self) -> JoinHandle<()> {
        self.orchestrator
            .spawn_timeout_sweeper(self.config.sweep_interval())
    }

    /// Inventory plus scenes and pages already defined in the draft
    #[must_use]
    pub fn inventory_for(&self, controller: &ControllerId) -> Inventory {
        let mut inventory = self.inventory.inventory(controller);
        let drafts = self.snapshots.drafts().files(controller);
        inventory.extend_scenes(drafts.in_namespace(Namespace::Scene).map(|(p, _)| p.stem()));
        inventory.extend_pages(drafts.in_namespace(Namespace::Page).map(|(p, _)| p.stem()));
        inventory
    }

    /// Validate files without writing them
    #[must_use]
    pub fn validate_files(&self, controller: &ControllerId, files: &FileSet) -> ValidationReport {
        self.validator.validate(files, &self.inventory_for(controller))
    }

    /// Validate then write one draft file
    pub fn write_file(
        &self,
        controller: &ControllerId,
        path: &str,
        content: &str,
        author: &str,
    ) -> ServiceResult<WriteOutcome> {
        let report = self
            .validator
            .validate_raw([(path, content)], &self.inventory_for(controller));
        if !report.is_valid() {
            tracing::info!(
                controller = %controller,
                path,
                errors = report.error_count(),
                "Draft write rejected"
            );
            return Err(ServiceError::Validation(report));
        }
        let path = ConfigPath::parse(path)?;
        self.snapshots
            .drafts()
            .write(controller, path.clone(), content, author);
        Ok(WriteOutcome {
            path,
            warnings: report.warnings,
        })
    }

    pub fn read_file(&self, controller: &ControllerId, path: &str) -> ServiceResult<DraftEntry> {
        let path = ConfigPath::parse(path)?;
        Ok(self.snapshots.drafts().read(controller, &path)?)
    }

    #[must_use]
    pub fn list_files(&self, controller: &ControllerId) -> FileSet {
        self.snapshots.drafts().files(controller)
    }

    pub fn delete_file(&self, controller: &ControllerId, path: &str) -> ServiceResult<()> {
        let path = ConfigPath::parse(path)?;
        self.snapshots.drafts().delete(controller, &path)?;
        tracing::info!(controller = %controller, path = %path, "Draft file deleted");
        Ok(())
    }

    /// Ask the AI backend for a change and apply it to the draft
    pub async fn propose_change(
        &self,
        controller: &ControllerId,
        instruction: &str,
        context: Value,
    ) -> ServiceResult<ProposalOutcome> {
        let gateway = self.proposals.as_ref().ok_or_else(|| {
            ProposalError::Backend(BackendError("no proposal backend configured".into()))
        })?;
        let inventory = self.inventory_for(controller);
        Ok(gateway
            .propose(controller, instruction, context, &inventory)
            .await?)
    }

    /// Re-validate the draft against the current inventory and freeze it
    pub fn deploy(
        &self,
        controller: &ControllerId,
        author: &str,
        message: &str,
    ) -> ServiceResult<DeployResult> {
        let base = self.inventory.inventory(controller);
        self.snapshots.deploy_checked(controller, author, message, |files| {
            // Validated against the frozen files, not a pre-freeze copy.
            let mut inventory = base;
            inventory.extend_scenes(files.in_namespace(Namespace::Scene).map(|(p, _)| p.stem()));
            inventory.extend_pages(files.in_namespace(Namespace::Page).map(|(p, _)| p.stem()));
            let report = self.validator.validate(files, &inventory);
            if report.is_valid() {
                Ok(())
            } else {
                Err(ServiceError::Validation(report))
            }
        })
    }

    /// Push a deployed snapshot (latest when `version` is `None`)
    pub async fn sync(
        &self,
        controller: &ControllerId,
        version: Option<u64>,
    ) -> ServiceResult<SyncHandle> {
        Ok(self.orchestrator.sync(controller, version).await?)
    }

    /// Screen and push a driver
    pub async fn sync_driver(
        &self,
        controller: &ControllerId,
        driver: &DriverArtifact,
    ) -> ServiceResult<SyncHandle> {
        Ok(self.orchestrator.sync_driver(controller, driver).await?)
    }

    pub fn discard(&self, controller: &ControllerId) -> usize {
        self.snapshots.discard(controller)
    }

    pub fn rollback(&self, controller: &ControllerId, version: u64) -> ServiceResult<RollbackResult> {
        Ok(self.snapshots.rollback(controller, version)?)
    }

    #[must_use]
    pub fn get_status(&self, controller: &ControllerId) -> StatusReport {
        self.snapshots.get_status(controller)
    }

    #[must_use]
    pub fn list_versions(&self, controller: &ControllerId) -> Vec<VersionSummary> {
        self.snapshots.list_versions(controller)
    }

    #[must_use]
    pub fn pending_changes(&self, controller: &ControllerId) -> DraftDiff {
        self.snapshots.pending_changes(controller)
    }

    #[must_use]
    pub fn sync_history(&self, controller: &ControllerId) -> Vec<SyncOperation> {
        self.orchestrator.history(controller)
    }

    #[must_use]
    pub fn get_operation(&self, sync_id: SyncId) -> Option<SyncOperation> {
        self.orchestrator.get_operation(sync_id)
    }
}
