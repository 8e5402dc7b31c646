//! `simulate` command
//!
//! Drives a fleet of in-memory controllers through draft, deploy, optional
//! rollback, sync and edge apply, then checks that what each edge applied
//! is exactly the snapshot the service reports as live.

use panelsync_artifact::{ContentHash, ControllerId};
use panelsync_core::{
    ChannelConnectionManager, ConfigService, EdgeRuntime, MemoryEdgeHost, ServiceConfig,
    StaticInventory,
};
use panelsync_validator::Inventory;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde_json::json;
use std::fmt::Write as _;
use std::sync::Arc;
use tokio::sync::mpsc;

const AUTHOR: &str = "user:simulator";

/// Simulator configuration
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Number of controllers
    pub controllers: usize,
    /// Random seed for reproducibility
    pub seed: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            controllers: 3,
            seed: 42,
        }
    }
}

/// Final state of one simulated controller
#[derive(Debug, Clone)]
pub struct ControllerOutcome {
    pub controller: ControllerId,
    pub versions: usize,
    pub live_version: Option<u64>,
    pub file_count: usize,
    pub checksum: Option<ContentHash>,
    pub rolled_back: bool,
    /// Sync failure, or a mismatch between edge and service state
    pub error: Option<String>,
}

impl ControllerOutcome {
    #[inline]
    #[must_use]
    pub fn consistent(&self) -> bool {
        self.error.is_none()
    }
}

/// Final report from simulator
#[derive(Debug, Clone)]
pub struct SimulatorReport {
    pub config: SimulatorConfig,
    pub outcomes: Vec<ControllerOutcome>,
}

impl SimulatorReport {
    /// Whether every controller ended consistent
    #[must_use]
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(ControllerOutcome::consistent)
    }

    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut out = String::from("Panelsync Simulation Report\n===========================\n");
        let _ = writeln!(out, "Seed: {}", self.config.seed);
        let _ = writeln!(out, "Controllers: {}", self.config.controllers);
        out.push('\n');
        for o in &self.outcomes {
            let live = o
                .live_version
                .map_or_else(|| "-".to_string(), |v| format!("v{v}"));
            let checksum = o
                .checksum
                .as_ref()
                .map_or_else(|| "-".to_string(), ContentHash::short);
            let _ = write!(
                out,
                "{:<10} versions={} live={} files={} checksum={}{}",
                o.controller,
                o.versions,
                live,
                o.file_count,
                checksum,
                if o.rolled_back { " (rolled back)" } else { "" },
            );
            match &o.error {
                None => out.push_str("  OK\n"),
                Some(e) => {
                    let _ = writeln!(out, "  FAILED: {e}");
                }
            }
        }
        let _ = write!(
            out,
            "\nStatus: {}",
            if self.passed() { "PASSED" } else { "FAILED" }
        );
        out
    }
}

fn simulated_inventory() -> Inventory {
    Inventory::new()
        .with_device("amp", ["volume", "mute"])
        .with_device("lights", ["dimmer", "power"])
}

fn scene_document(rng: &mut StdRng) -> String {
    json!({
        "name": "Evening",
        "steps": [
            {"device": "lights", "control": "dimmer", "value": rng.gen_range(0..=100)},
            {"device": "amp", "control": "volume", "value": rng.gen_range(10..=80), "delay_ms": 250}
        ]
    })
    .to_string()
}

fn page_document(rng: &mut StdRng) -> String {
    let buttons = rng.gen_range(1..=4);
    let mut elements: Vec<_> = (0..buttons)
        .map(|i| {
            json!({
                "type": "button",
                "label": format!("Evening {}", i + 1),
                "position": {"x": i * 140, "y": 0, "width": 120, "height": 60},
                "action": {"type": "scene", "scene": "evening"}
            })
        })
        .collect();
    elements.push(json!({
        "type": "slider",
        "label": "Volume",
        "position": {"x": 0, "y": 100, "width": 300, "height": 60},
        "device": "amp",
        "control": "volume",
        "min": 0,
        "max": 100
    }));
    json!({"name": "Main", "elements": elements}).to_string()
}

/// Run the simulation to completion
pub async fn run_simulator(
    service_config: ServiceConfig,
    config: SimulatorConfig,
) -> anyhow::Result<SimulatorReport> {
    let mut rng = StdRng::seed_from_u64(config.seed);

    let ids = (0..config.controllers)
        .map(|i| ControllerId::new(format!("sim-{i:03}")))
        .collect::<Result<Vec<_>, _>>()?;
    let inventory = StaticInventory::new();
    for id in &ids {
        inventory.set(id.clone(), simulated_inventory());
    }

    let connections = Arc::new(ChannelConnectionManager::new());
    let service = ConfigService::new(service_config, connections.clone(), Arc::new(inventory));
    let sweeper = service.spawn_background();

    let (report_tx, report_rx) = mpsc::channel(256);
    let inbound = service.orchestrator().spawn_inbound_loop(report_rx);
    let mut hosts = Vec::with_capacity(ids.len());
    for id in &ids {
        let host = Arc::new(MemoryEdgeHost::new());
        EdgeRuntime::new(Arc::clone(&host)).spawn(connections.connect(id.clone()), report_tx.clone());
        hosts.push(host);
    }
    drop(report_tx);

    let mut outcomes = Vec::with_capacity(ids.len());
    for (id, host) in ids.iter().zip(&hosts) {
        let rounds = rng.gen_range(1..=3);
        for round in 1..=rounds {
            service.write_file(id, "scenes/evening.json", &scene_document(&mut rng), AUTHOR)?;
            service.write_file(id, "gui/pages/main.json", &page_document(&mut rng), AUTHOR)?;
            service.deploy(id, AUTHOR, &format!("round {round}"))?;
        }

        let rolled_back = rounds > 1 && rng.gen_bool(0.3);
        if rolled_back {
            service.rollback(id, 1)?;
            service.deploy(id, AUTHOR, "restore round 1")?;
        }

        let mut error = match service.sync(id, None).await?.wait().await {
            Ok(_) => None,
            Err(e) => Some(e.to_string()),
        };

        let status = service.get_status(id);
        let versions = service.list_versions(id);
        let latest = versions.first();
        let applied = host.applied_files().map(|f| f.checksum());
        if error.is_none() {
            if host.applied_version() != status.live_version {
                error = Some(format!(
                    "edge applied {:?}, service reports live {:?}",
                    host.applied_version(),
                    status.live_version
                ));
            } else if applied.as_ref() != latest.map(|v| &v.checksum) {
                error = Some("applied files differ from the live snapshot".to_string());
            }
        }

        tracing::info!(
            controller = %id,
            versions = versions.len(),
            live = ?status.live_version,
            consistent = error.is_none(),
            "Controller simulated"
        );
        outcomes.push(ControllerOutcome {
            controller: id.clone(),
            versions: versions.len(),
            live_version: status.live_version,
            file_count: status.deployed_file_count,
            checksum: latest.map(|v| v.checksum),
            rolled_back,
            error,
        });
    }

    sweeper.abort();
    for id in &ids {
        connections.disconnect(id);
    }
    inbound.abort();

    Ok(SimulatorReport { config, outcomes })
}
