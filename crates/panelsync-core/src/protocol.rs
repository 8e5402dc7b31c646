//! Edge wire protocol
//!
//! JSON messages exchanged with edge nodes over the persistent connection.
//! Every message carries a `type` tag and the `sync_id` it belongs to.

use crate::types::SyncId;
use panelsync_artifact::{CommandMapping, ContentHash, ControllerId, FileSet};
use serde::{Deserialize, Serialize};

/// Payload of a `config_sync` message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigPayload {
    pub files: FileSet,
    /// Checksum of `files`, verified by the edge before applying
    pub checksum: ContentHash,
    pub commit_message: String,
}

/// Payload of a `driver_sync` message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverPayload {
    pub driver_type: String,
    pub version: String,
    pub source_code: String,
    pub command_mappings: Vec<CommandMapping>,
    #[serde(default)]
    pub protocol_config: serde_json::Value,
}

/// Orchestrator → edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    ConfigSync {
        sync_id: SyncId,
        controller_id: ControllerId,
        version: u64,
        payload: ConfigPayload,
    },
    DriverSync {
        sync_id: SyncId,
        controller_id: ControllerId,
        driver_id: String,
        payload: DriverPayload,
    },
}

impl OutboundMessage {
    /// Correlation id
    #[inline]
    #[must_use]
    pub fn sync_id(&self) -> SyncId {
        match self {
            Self::ConfigSync { sync_id, .. } | Self::DriverSync { sync_id, .. } => *sync_id,
        }
    }

    /// Encode as JSON text
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Edge → orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    SyncProgress {
        sync_id: SyncId,
        step: String,
    },
    SyncComplete {
        sync_id: SyncId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        applied_version: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        driver_path: Option<String>,
    },
    SyncError {
        sync_id: SyncId,
        error_message: String,
    },
}

impl InboundMessage {
    /// Decode from JSON text
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Correlation id
    #[inline]
    #[must_use]
    pub fn sync_id(&self) -> SyncId {
        match self {
            Self::SyncProgress { sync_id, .. }
            | Self::SyncComplete { sync_id, .. }
            | Self::SyncError { sync_id, .. } => *sync_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panelsync_artifact::ConfigPath;

    #[test]
    fn outbound_config_sync_shape() {
        let mut files = FileSet::new();
        files.insert(ConfigPath::page("main").unwrap(), "{}");
        let checksum = files.checksum();
        let msg = OutboundMessage::ConfigSync {
            sync_id: SyncId::new(),
            controller_id: ControllerId::new("c1").unwrap(),
            version: 3,
            payload: ConfigPayload {
                files,
                checksum,
                commit_message: "tweak".into(),
            },
        };
        let v: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(v["type"], "config_sync");
        assert_eq!(v["controller_id"], "c1");
        assert_eq!(v["version"], 3);
        assert_eq!(v["payload"]["files"]["gui/pages/main.json"], "{}");
        assert_eq!(v["payload"]["checksum"], checksum.to_string());
    }

    #[test]
    fn inbound_messages_parse() {
        let id = SyncId::new();
        let progress =
            InboundMessage::from_json(&format!(r#"{{"type":"sync_progress","sync_id":"{id}","step":"writing"}}"#))
                .unwrap();
        assert_eq!(progress.sync_id(), id);

        let complete = InboundMessage::from_json(&format!(
            r#"{{"type":"sync_complete","sync_id":"{id}","applied_version":1}}"#
        ))
        .unwrap();
        assert_eq!(
            complete,
            InboundMessage::SyncComplete {
                sync_id: id,
                applied_version: Some(1),
                driver_path: None,
            }
        );

        let error = InboundMessage::from_json(&format!(
            r#"{{"type":"sync_error","sync_id":"{id}","error_message":"disk full"}}"#
        ))
        .unwrap();
        assert!(matches!(error, InboundMessage::SyncError { .. }));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let id = SyncId::new();
        assert!(InboundMessage::from_json(&format!(r#"{{"type":"hello","sync_id":"{id}"}}"#)).is_err());
        assert!(InboundMessage::from_json("not json").is_err());
    }
}
