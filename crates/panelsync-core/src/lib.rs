//! Panelsync Core - configuration sync for edge controllers
//!
//! Moves validated configuration from draft to deployed snapshot to live
//! on an edge node.
//!
//! # Architecture
//!
//! ```text
//! proposal ──▶ ContentValidator ──▶ DraftStore ──deploy──▶ SnapshotManager
//!                                                              │ sync
//!                                                              ▼
//!             LiveState ◀──sync_complete── edge ◀──── SyncOrchestrator
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use panelsync_core::{ChannelConnectionManager, ConfigService, ServiceConfig, StaticInventory};
//! use panelsync_artifact::ControllerId;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let connections = Arc::new(ChannelConnectionManager::new());
//! let service = ConfigService::new(
//!     ServiceConfig::default(),
//!     connections.clone(),
//!     Arc::new(StaticInventory::new()),
//! );
//!
//! let ctrl = ControllerId::new("lobby")?;
//! service.write_file(&ctrl, "gui/pages/main.json", r#"{"name":"Main","elements":[]}"#, "user:ana")?;
//! service.deploy(&ctrl, "user:ana", "first layout")?;
//!
//! let _link = connections.connect(ctrl.clone());
//! let handle = service.sync(&ctrl, None).await?;
//! println!("sync {} queued", handle.sync_id());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod connection;
mod driver_sync;
pub mod edge;
pub mod error;
pub mod orchestrator;
pub mod proposal;
pub mod protocol;
pub mod service;
pub mod state_machine;
pub mod types;

pub use connection::{ChannelConnectionManager, ConnectionManager, SendError};
pub use edge::{EdgeHost, EdgeRuntime, MemoryEdgeHost};
pub use error::{
    BackendError, ConfigError, ProposalError, ServiceError, ServiceResult, SyncError,
};
pub use orchestrator::{OpenGate, SyncGate, SyncHandle, SyncOrchestrator};
pub use proposal::{
    BackendResponse, ProposalBackend, ProposalGateway, ProposalOutcome, ProposalRequest, Usage,
};
pub use protocol::{ConfigPayload, DriverPayload, InboundMessage, OutboundMessage};
pub use service::{ConfigService, InventoryProvider, StaticInventory, WriteOutcome};
pub use types::{
    FailureCause, ServiceConfig, SyncId, SyncKind, SyncOperation, SyncStatus, SyncTarget,
};

/// Panelsync core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
