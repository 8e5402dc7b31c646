//! Device driver artifacts
//!
//! A driver is generated source code that translates control operations into
//! device-protocol commands. It has its own lifecycle, separate from the
//! draft/snapshot pipeline, but travels to the edge node over the same sync
//! mechanism.

use crate::hash::ContentHash;
use serde::{Deserialize, Serialize};

/// Maps a logical control onto a device-protocol command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandMapping {
    /// Control identifier (e.g. `volume`)
    pub control: String,
    /// Protocol command template sent for the control
    pub command: String,
    /// Optional human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CommandMapping {
    /// Create new mapping
    #[inline]
    #[must_use]
    pub fn new(control: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            control: control.into(),
            command: command.into(),
            description: None,
        }
    }
}

/// Generated driver ready to be pushed to an edge node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverArtifact {
    /// Unique driver identifier
    pub driver_id: String,
    /// Driver type; running instances of this type are hot-reloaded
    pub driver_type: String,
    /// Driver version label
    pub version: String,
    /// Driver source code
    pub source_code: String,
    /// Control → command metadata
    #[serde(default)]
    pub command_mappings: Vec<CommandMapping>,
    /// Transport/protocol settings (port, baud rate, ...)
    #[serde(default)]
    pub protocol_config: serde_json::Value,
}

impl DriverArtifact {
    /// Create a driver with empty metadata
    #[must_use]
    pub fn new(
        driver_id: impl Into<String>,
        driver_type: impl Into<String>,
        version: impl Into<String>,
        source_code: impl Into<String>,
    ) -> Self {
        Self {
            driver_id: driver_id.into(),
            driver_type: driver_type.into(),
            version: version.into(),
            source_code: source_code.into(),
            command_mappings: Vec::new(),
            protocol_config: serde_json::Value::Null,
        }
    }

    /// With command mappings
    #[inline]
    #[must_use]
    pub fn with_mappings(mut self, mappings: Vec<CommandMapping>) -> Self {
        self.command_mappings = mappings;
        self
    }

    /// With protocol configuration
    #[inline]
    #[must_use]
    pub fn with_protocol_config(mut self, config: serde_json::Value) -> Self {
        self.protocol_config = config;
        self
    }

    /// Hash of the source code
    #[inline]
    #[must_use]
    pub fn source_hash(&self) -> ContentHash {
        ContentHash::compute(self.source_code.as_bytes())
    }
}
