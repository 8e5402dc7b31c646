//! Sync Orchestrator
//!
//! Delivers deployed snapshots (and drivers) to edge nodes and correlates
//! the asynchronous reports that come back:
//! - at most one non-terminal operation per controller
//! - pending table keyed by sync id, each entry with a deadline
//! - inbound reports drive the state machine; unknown ids are ignored
//! - a periodic sweep fails operations whose deadline has passed
//!
//! `sync` returns as soon as the request is queued. Callers observe the
//! outcome through [`SyncHandle`] or by polling [`SyncOrchestrator::get_operation`].

use crate::connection::ConnectionManager;
use crate::error::SyncError;
use crate::protocol::{ConfigPayload, InboundMessage, OutboundMessage};
use crate::state_machine::validate_transition;
use crate::types::{FailureCause, SyncId, SyncOperation, SyncStatus, SyncTarget};
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use panelsync_artifact::ControllerId;
use panelsync_store::{LiveStateWriter, SnapshotManager};
use panelsync_validator::DriverScreen;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};

/// Pre-flight check consulted before a sync is created (billing, quota)
pub trait SyncGate: Send + Sync {
    /// `Err(reason)` refuses the attempt
    fn check(&self, controller: &ControllerId, target: &SyncTarget) -> Result<(), String>;
}

/// Gate that admits everything
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenGate;

impl SyncGate for OpenGate {
    fn check(&self, _controller: &ControllerId, _target: &SyncTarget) -> Result<(), String> {
        Ok(())
    }
}

/// Caller's view of one in-flight sync
#[derive(Debug)]
pub struct SyncHandle {
    sync_id: SyncId,
    timeout_secs: u64,
    rx: watch::Receiver<SyncOperation>,
}

impl SyncHandle {
    /// Correlation id
    #[inline]
    #[must_use]
    pub fn sync_id(&self) -> SyncId {
        self.sync_id
    }

    /// Latest known state
    #[must_use]
    pub fn current(&self) -> SyncOperation {
        self.rx.borrow().clone()
    }

    /// Wait for the terminal state
    ///
    /// Completed operations are returned as `Ok`; failures map to
    /// [`SyncError::SyncTimeout`] or [`SyncError::SyncRejected`].
    pub async fn wait(mut self) -> Result<SyncOperation, SyncError> {
        let op = match self.rx.wait_for(SyncOperation::is_terminal).await {
            Ok(op) => op.clone(),
            Err(_) => return Err(SyncError::UnknownSync(self.sync_id)),
        };
        match (op.status, op.failure) {
            (SyncStatus::Completed, _) => Ok(op),
            (_, Some(FailureCause::TimedOut)) => Err(SyncError::SyncTimeout {
                sync_id: op.sync_id,
                timeout_secs: self.timeout_secs,
            }),
            _ => Err(SyncError::SyncRejected {
                sync_id: op.sync_id,
                detail: op.error_detail.unwrap_or_default(),
            }),
        }
    }
}

#[derive(Debug)]
struct PendingSync {
    deadline: Instant,
    tx: watch::Sender<SyncOperation>,
}

#[derive(Debug)]
struct Record {
    seq: u64,
    op: SyncOperation,
}

/// Sync Orchestrator
pub struct SyncOrchestrator {
    snapshots: Arc<SnapshotManager>,
    connections: Arc<dyn ConnectionManager>,
    gate: Arc<dyn SyncGate>,
    pub(crate) screen: DriverScreen,
    timeout: Duration,
    /// controller → its single non-terminal sync
    active: DashMap<ControllerId, SyncId>,
    pending: DashMap<SyncId, PendingSync>,
    records: DashMap<SyncId, Record>,
    seq: AtomicU64,
}

impl SyncOrchestrator {
    /// Create orchestrator with an open gate
    #[must_use]
    pub fn new(
        snapshots: Arc<SnapshotManager>,
        connections: Arc<dyn ConnectionManager>,
        timeout: Duration,
    ) -> Self {
        Self {
            snapshots,
            connections,
            gate: Arc::new(OpenGate),
            screen: DriverScreen::new(),
            timeout,
            active: DashMap::new(),
            pending: DashMap::new(),
            records: DashMap::new(),
            seq: AtomicU64::new(0),
        }
    }

    /// Replace the sync gate
    #[must_use]
    pub fn with_gate(mut self, gate: Arc<dyn SyncGate>) -> Self {
        self.gate = gate;
        self
    }

    /// Report deadline
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Push a deployed snapshot to a controller
    ///
    /// `version` defaults to the latest deployed snapshot.
    pub async fn sync(
        &self,
        controller: &ControllerId,
        version: Option<u64>,
    ) -> Result<SyncHandle, SyncError> {
        let snapshot = match version {
            Some(v) => self.snapshots.get(controller, v)?,
            None => self
                .snapshots
                .latest(controller)
                .ok_or_else(|| SyncError::NothingDeployed(controller.clone()))?,
        };
        let target = SyncTarget::Snapshot {
            version: snapshot.version,
        };
        self.start(controller, target, |sync_id| OutboundMessage::ConfigSync {
            sync_id,
            controller_id: controller.clone(),
            version: snapshot.version,
            payload: ConfigPayload {
                files: snapshot.files.clone(),
                checksum: snapshot.checksum,
                commit_message: snapshot.commit_message.clone(),
            },
        })
        .await
    }

    /// Create the operation and send its request
    ///
    /// Fails without creating anything when the controller is offline, the
    /// gate refuses, or another sync is active.
    pub(crate) async fn start(
        &self,
        controller: &ControllerId,
        target: SyncTarget,
        build: impl FnOnce(SyncId) -> OutboundMessage,
    ) -> Result<SyncHandle, SyncError> {
        if !self.connections.is_connected(controller) {
            tracing::warn!(controller = %controller, "Sync refused: controller offline");
            return Err(SyncError::NotConnected(controller.clone()));
        }
        self.gate
            .check(controller, &target)
            .map_err(|reason| SyncError::Denied {
                controller: controller.clone(),
                reason,
            })?;

        let op = SyncOperation::pending(controller.clone(), target);
        let sync_id = op.sync_id;
        match self.active.entry(controller.clone()) {
            Entry::Occupied(existing) => {
                return Err(SyncError::SyncInProgress {
                    controller: controller.clone(),
                    sync_id: *existing.get(),
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(sync_id);
            }
        }

        let (tx, rx) = watch::channel(op.clone());
        self.record(op.clone());
        self.pending.insert(
            sync_id,
            PendingSync {
                deadline: Instant::now() + self.timeout,
                tx,
            },
        );

        let message = build(sync_id);
        if let Err(e) = self.connections.send(controller, message).await {
            tracing::warn!(controller = %controller, sync_id = %sync_id, error = %e, "Sync send failed");
            self.pending.remove(&sync_id);
            self.records.remove(&sync_id);
            self.active.remove_if(controller, |_, id| *id == sync_id);
            return Err(SyncError::NotConnected(controller.clone()));
        }

        tracing::info!(
            controller = %controller,
            sync_id = %sync_id,
            target = %op.target,
            "Sync started"
        );
        Ok(SyncHandle {
            sync_id,
            timeout_secs: self.timeout.as_secs(),
            rx,
        })
    }

    /// Apply one report from an edge node
    ///
    /// Reports for unknown or already-terminal operations are ignored.
    pub fn handle_inbound(&self, message: InboundMessage) {
        match message {
            InboundMessage::SyncProgress { sync_id, step } => self.on_progress(sync_id, step),
            InboundMessage::SyncComplete {
                sync_id,
                applied_version,
                driver_path,
            } => self.on_complete(sync_id, applied_version, driver_path),
            InboundMessage::SyncError {
                sync_id,
                error_message,
            } => self.on_error(sync_id, error_message),
        }
    }

    /// Parse and apply a raw JSON report
    pub fn handle_inbound_json(&self, text: &str) {
        match InboundMessage::from_json(text) {
            Ok(message) => self.handle_inbound(message),
            Err(e) => tracing::warn!(error = %e, "Dropping malformed inbound message"),
        }
    }

    fn on_progress(&self, sync_id: SyncId, step: String) {
        let Some(mut pending) = self.pending.get_mut(&sync_id) else {
            tracing::debug!(sync_id = %sync_id, "Ignoring progress for unknown sync");
            return;
        };
        let mut op = pending.tx.borrow().clone();
        if op.status == SyncStatus::Pending {
            if let Err(e) = advance(&mut op, SyncStatus::InProgress) {
                tracing::error!(sync_id = %sync_id, error = %e, "Progress rejected");
                return;
            }
        }
        tracing::debug!(sync_id = %sync_id, step = %step, "Sync progress");
        op.last_step = Some(step);
        pending.deadline = Instant::now() + self.timeout;
        // Recorded under the pending guard so a racing completion cannot be overwritten.
        self.record(op.clone());
        pending.tx.send_replace(op);
    }

    fn on_complete(&self, sync_id: SyncId, applied_version: Option<u64>, driver_path: Option<String>) {
        let Some((_, pending)) = self.pending.remove(&sync_id) else {
            tracing::debug!(sync_id = %sync_id, "Ignoring completion for unknown sync");
            return;
        };
        let mut op = pending.tx.borrow().clone();
        // An edge may finish without reporting progress first.
        if op.status == SyncStatus::Pending {
            op.status = SyncStatus::InProgress;
        }

        let outcome = match &op.target {
            SyncTarget::Snapshot { version } => match applied_version {
                Some(applied) if applied != *version => Err(format!(
                    "edge applied version {applied} but sync targeted {version}"
                )),
                _ => self
                    .snapshots
                    .mark_live(&op.controller_id, *version)
                    .map(|()| version.to_string())
                    .map_err(|e| e.to_string()),
            },
            SyncTarget::Driver { .. } => {
                driver_path.ok_or_else(|| "completion report missing driver path".to_owned())
            }
        };

        match outcome {
            Ok(detail) => match advance(&mut op, SyncStatus::Completed) {
                Ok(()) => {
                    op.completion_detail = Some(detail);
                    tracing::info!(
                        controller = %op.controller_id,
                        sync_id = %sync_id,
                        target = %op.target,
                        "Sync completed"
                    );
                }
                Err(e) => fail(&mut op, FailureCause::Rejected, e.to_string()),
            },
            Err(detail) => {
                tracing::warn!(sync_id = %sync_id, detail = %detail, "Inconsistent completion report");
                fail(&mut op, FailureCause::Rejected, detail);
            }
        }
        self.finish(pending, op);
    }

    fn on_error(&self, sync_id: SyncId, error_message: String) {
        let Some((_, pending)) = self.pending.remove(&sync_id) else {
            tracing::debug!(sync_id = %sync_id, "Ignoring error for unknown sync");
            return;
        };
        let mut op = pending.tx.borrow().clone();
        tracing::warn!(
            controller = %op.controller_id,
            sync_id = %sync_id,
            error = %error_message,
            "Sync rejected by edge"
        );
        fail(&mut op, FailureCause::Rejected, error_message);
        self.finish(pending, op);
    }

    /// Fail every operation whose deadline is at or before `now`
    ///
    /// Returns the ids that were failed.
    pub fn sweep_expired(&self, now: Instant) -> Vec<SyncId> {
        let expired: Vec<SyncId> = self
            .pending
            .iter()
            .filter(|e| e.value().deadline <= now)
            .map(|e| *e.key())
            .collect();

        let mut failed = Vec::with_capacity(expired.len());
        for sync_id in expired {
            // A progress report may have refreshed the deadline since the scan.
            let Some((_, pending)) = self.pending.remove_if(&sync_id, |_, p| p.deadline <= now) else {
                continue;
            };
            let mut op = pending.tx.borrow().clone();
            tracing::warn!(
                controller = %op.controller_id,
                sync_id = %sync_id,
                timeout_secs = self.timeout.as_secs(),
                "Sync timed out"
            );
            fail(
                &mut op,
                FailureCause::TimedOut,
                format!("no report from edge within {}s", self.timeout.as_secs()),
            );
            self.finish(pending, op);
            failed.push(sync_id);
        }
        failed
    }

    /// Run [`Self::sweep_expired`] every `period` until the orchestrator is dropped
    pub fn spawn_timeout_sweeper(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(this) = weak.upgrade() else { break };
                this.sweep_expired(Instant::now());
            }
        })
    }

    /// Apply reports from `rx` until the channel closes
    pub fn spawn_inbound_loop(self: &Arc<Self>, mut rx: mpsc::Receiver<InboundMessage>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                this.handle_inbound(message);
            }
            tracing::debug!("Inbound channel closed");
        })
    }

    /// Operation by id
    #[must_use]
    pub fn get_operation(&self, sync_id: SyncId) -> Option<SyncOperation> {
        self.records.get(&sync_id).map(|r| r.op.clone())
    }

    /// Non-terminal operation for a controller
    #[must_use]
    pub fn active(&self, controller: &ControllerId) -> Option<SyncOperation> {
        let sync_id = *self.active.get(controller)?;
        self.get_operation(sync_id)
    }

    /// All operations for a controller, newest first
    #[must_use]
    pub fn history(&self, controller: &ControllerId) -> Vec<SyncOperation> {
        let mut rows: Vec<(u64, SyncOperation)> = self
            .records
            .iter()
            .filter(|r| &r.value().op.controller_id == controller)
            .map(|r| (r.value().seq, r.value().op.clone()))
            .collect();
        rows.sort_by(|a, b| b.0.cmp(&a.0));
        rows.into_iter().map(|(_, op)| op).collect()
    }

    fn record(&self, op: SyncOperation) {
        match self.records.entry(op.sync_id) {
            Entry::Occupied(mut e) => e.get_mut().op = op,
            Entry::Vacant(e) => {
                let seq = self.seq.fetch_add(1, Ordering::Relaxed);
                e.insert(Record { seq, op });
            }
        }
    }

    fn finish(&self, pending: PendingSync, op: SyncOperation) {
        let sync_id = op.sync_id;
        let controller = op.controller_id.clone();
        self.record(op.clone());
        self.active.remove_if(&controller, |_, id| *id == sync_id);
        // Waiters observe the terminal state after the slot is free.
        pending.tx.send_replace(op);
    }
}

fn advance(op: &mut SyncOperation, to: SyncStatus) -> Result<(), SyncError> {
    validate_transition(op.status, to)?;
    op.status = to;
    if to.is_terminal() {
        op.completed_at = Some(Utc::now());
    }
    Ok(())
}

fn fail(op: &mut SyncOperation, cause: FailureCause, detail: String) {
    // Any non-terminal state may fail.
    op.status = SyncStatus::Failed;
    op.completed_at = Some(Utc::now());
    op.failure = Some(cause);
    op.error_detail = Some(detail);
}
