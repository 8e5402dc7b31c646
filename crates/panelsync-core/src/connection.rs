//! Connection manager
//!
//! Registry of reachable edge nodes, injected into the orchestrator.

use crate::protocol::OutboundMessage;
use async_trait::async_trait;
use dashmap::DashMap;
use panelsync_artifact::ControllerId;
use tokio::sync::mpsc;

/// Outbound channel buffer per controller
pub const OUTBOUND_BUFFER: usize = 64;

/// Why a message could not be delivered
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("controller {0} is not connected")]
    NotConnected(ControllerId),

    #[error("connection to {0} closed")]
    Closed(ControllerId),
}

/// Reachability and delivery to edge nodes
#[async_trait]
pub trait ConnectionManager: Send + Sync {
    /// Whether the controller currently has a live connection
    fn is_connected(&self, controller: &ControllerId) -> bool;

    /// Queue a message for delivery
    async fn send(&self, controller: &ControllerId, message: OutboundMessage) -> Result<(), SendError>;
}

/// In-memory registry backed by mpsc channels
#[derive(Debug, Default)]
pub struct ChannelConnectionManager {
    links: DashMap<ControllerId, mpsc::Sender<OutboundMessage>>,
}

impl ChannelConnectionManager {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a controller, returning the receiving end of its link
    ///
    /// Reconnecting replaces the previous link.
    pub fn connect(&self, controller: ControllerId) -> mpsc::Receiver<OutboundMessage> {
        let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
        tracing::info!(controller = %controller, "Controller connected");
        self.links.insert(controller, tx);
        rx
    }

    /// Drop a controller's link
    pub fn disconnect(&self, controller: &ControllerId) -> bool {
        let removed = self.links.remove(controller).is_some();
        if removed {
            tracing::info!(controller = %controller, "Controller disconnected");
        }
        removed
    }

    /// Connected controllers
    #[must_use]
    pub fn connected(&self) -> Vec<ControllerId> {
        let mut ids: Vec<_> = self
            .links
            .iter()
            .filter(|e| !e.value().is_closed())
            .map(|e| e.key().clone())
            .collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl ConnectionManager for ChannelConnectionManager {
    fn is_connected(&self, controller: &ControllerId) -> bool {
        self.links.get(controller).is_some_and(|tx| !tx.is_closed())
    }

    async fn send(&self, controller: &ControllerId, message: OutboundMessage) -> Result<(), SendError> {
        // Clone the sender so no map guard is held across the await.
        let tx = self
            .links
            .get(controller)
            .map(|tx| tx.value().clone())
            .ok_or_else(|| SendError::NotConnected(controller.clone()))?;
        tx.send(message)
            .await
            .map_err(|_| SendError::Closed(controller.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ConfigPayload, OutboundMessage};
    use crate::types::SyncId;
    use panelsync_artifact::FileSet;

    fn message(controller: &ControllerId) -> OutboundMessage {
        let files = FileSet::new();
        OutboundMessage::ConfigSync {
            sync_id: SyncId::new(),
            controller_id: controller.clone(),
            version: 1,
            payload: ConfigPayload {
                checksum: files.checksum(),
                files,
                commit_message: String::new(),
            },
        }
    }

    #[tokio::test]
    async fn send_reaches_receiver() {
        let mgr = ChannelConnectionManager::new();
        let ctrl = ControllerId::new("c1").unwrap();
        let mut rx = mgr.connect(ctrl.clone());
        assert!(mgr.is_connected(&ctrl));

        let msg = message(&ctrl);
        mgr.send(&ctrl, msg.clone()).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), msg);
    }

    #[tokio::test]
    async fn dropped_receiver_means_disconnected() {
        let mgr = ChannelConnectionManager::new();
        let ctrl = ControllerId::new("c1").unwrap();
        drop(mgr.connect(ctrl.clone()));
        assert!(!mgr.is_connected(&ctrl));
        assert_eq!(
            mgr.send(&ctrl, message(&ctrl)).await,
            Err(SendError::Closed(ctrl.clone()))
        );
        assert!(mgr.connected().is_empty());
    }

    #[tokio::test]
    async fn unknown_controller_not_connected() {
        let mgr = ChannelConnectionManager::new();
        let ctrl = ControllerId::new("ghost").unwrap();
        assert!(!mgr.is_connected(&ctrl));
        assert!(matches!(
            mgr.send(&ctrl, message(&ctrl)).await,
            Err(SendError::NotConnected(_))
        ));
        assert!(!mgr.disconnect(&ctrl));
    }
}
