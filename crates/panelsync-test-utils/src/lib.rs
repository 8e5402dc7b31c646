//! Testing utilities for panelsync workspace
//!
//! Shared fixtures, document builders, an in-memory edge harness and a
//! scripted proposal backend.

#![allow(missing_docs)]

use async_trait::async_trait;
use panelsync_artifact::{CommandMapping, ControllerId, DriverArtifact};
use panelsync_core::{
    BackendError, BackendResponse, ChannelConnectionManager, ConfigService, EdgeRuntime,
    MemoryEdgeHost, ProposalBackend, ProposalRequest, ServiceConfig, StaticInventory, Usage,
};
use panelsync_validator::Inventory;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Controller id used across fixtures
pub fn test_controller() -> ControllerId {
    ControllerId::new("test-ctrl").unwrap()
}

/// Amp with volume/mute, lights with dimmer/power, scene "movie"
pub fn sample_inventory() -> Inventory {
    Inventory::new()
        .with_device("amp", ["volume", "mute"])
        .with_device("lights", ["dimmer", "power"])
        .with_scene("movie")
}

/// Builder for page documents
#[derive(Debug, Clone)]
pub struct PageBuilder {
    name: String,
    elements: Vec<Value>,
}

impl PageBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            elements: Vec::new(),
        }
    }

    pub fn button_to_scene(mut self, label: &str, scene: &str, x: f64, y: f64) -> Self {
        self.elements.push(json!({
            "type": "button",
            "label": label,
            "position": {"x": x, "y": y, "width": 120, "height": 60},
            "action": {"type": "scene", "scene": scene}
        }));
        self
    }

    pub fn slider(mut self, label: &str, device: &str, control: &str, width: f64, height: f64) -> Self {
        self.elements.push(json!({
            "type": "slider",
            "label": label,
            "position": {"x": 0, "y": 200, "width": width, "height": height},
            "device": device,
            "control": control,
            "min": 0,
            "max": 100
        }));
        self
    }

    pub fn build(self) -> String {
        json!({"name": self.name, "elements": self.elements}).to_string()
    }
}

/// Scene document with one step per `(device, control, value)`
pub fn scene_json(name: &str, steps: &[(&str, &str, i64)]) -> String {
    let steps: Vec<Value> = steps
        .iter()
        .map(|(device, control, value)| json!({"device": device, "control": control, "value": value}))
        .collect();
    json!({"name": name, "steps": steps}).to_string()
}

/// Driver that passes screening
pub const VALID_DRIVER_SOURCE: &str = r#"
class AmpDriver(BaseDriver):
    def connect(self):
        self.transport.open()

    def disconnect(self):
        self.transport.close()

    def send_command(self, command):
        return self.transport.write(command)
"#;

pub fn sample_driver(source: &str) -> DriverArtifact {
    DriverArtifact::new("amp-driver", "amp", "1.0.0", source)
        .with_mappings(vec![CommandMapping::new("volume", "VOL {value}")])
}

/// Proposal backend returning queued replies in order
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<ProposalRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, raw: impl Into<String>) -> Self {
        self.replies.lock().push_back(Ok(raw.into()));
        self
    }

    pub fn fail(self, message: impl Into<String>) -> Self {
        self.replies.lock().push_back(Err(message.into()));
        self
    }

    /// Requests seen so far
    pub fn requests(&self) -> Vec<ProposalRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ProposalBackend for ScriptedBackend {
    async fn propose(&self, request: &ProposalRequest) -> Result<BackendResponse, BackendError> {
        self.requests.lock().push(request.clone());
        let next = self
            .replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err("script exhausted".to_string()));
        let raw = next.map_err(BackendError)?;
        Ok(BackendResponse {
            usage: Usage {
                model: "scripted".to_string(),
                input_tokens: request.instruction.len() as u64,
                output_tokens: raw.len() as u64,
            },
            raw,
        })
    }
}

/// Service wired to connection registry and inventory for [`test_controller`]
pub struct TestHarness {
    pub service: ConfigService,
    pub connections: Arc<ChannelConnectionManager>,
}

impl TestHarness {
    pub fn new(config: ServiceConfig) -> Self {
        let connections = Arc::new(ChannelConnectionManager::new());
        let inventory = StaticInventory::new().with(test_controller(), sample_inventory());
        let service = ConfigService::new(config, connections.clone(), Arc::new(inventory));
        Self {
            service,
            connections,
        }
    }

    pub fn with_backend(mut self, backend: Arc<ScriptedBackend>) -> Self {
        self.service = self.service.with_proposal_backend(backend);
        self
    }

    /// Connect an in-memory edge node for `controller`
    pub fn attach_edge(&self, controller: &ControllerId) -> Arc<MemoryEdgeHost> {
        let host = Arc::new(MemoryEdgeHost::new());
        let outbound = self.connections.connect(controller.clone());
        let (report_tx, report_rx) = mpsc::channel(64);
        EdgeRuntime::new(Arc::clone(&host)).spawn(outbound, report_tx);
        self.service.orchestrator().spawn_inbound_loop(report_rx);
        host
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new(ServiceConfig::default())
    }
}
