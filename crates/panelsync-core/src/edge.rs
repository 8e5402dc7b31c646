//! Edge-side reference runtime
//!
//! Consumes sync requests the way an edge node does and answers with
//! progress, completion or error reports. Host mechanics (writing files,
//! loading driver modules, restarting instances) sit behind [`EdgeHost`].

use crate::protocol::{ConfigPayload, DriverPayload, InboundMessage, OutboundMessage};
use crate::types::SyncId;
use dashmap::DashMap;
use panelsync_artifact::FileSet;
use panelsync_validator::DriverScreen;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Host-specific operations on an edge node
pub trait EdgeHost: Send + Sync {
    /// Replace the running configuration
    fn apply_config(&self, version: u64, files: &FileSet) -> Result<(), String>;

    /// Persist and load driver source, returning the on-disk path
    fn load_driver(&self, driver_type: &str, source: &str) -> Result<String, String>;

    /// Hot-reload running instances of a driver type, returning how many
    fn reload_instances(&self, driver_type: &str) -> Result<usize, String>;
}

/// Edge node protocol handler
#[derive(Debug)]
pub struct EdgeRuntime<H> {
    host: H,
    screen: DriverScreen,
}

impl<H: EdgeHost> EdgeRuntime<H> {
    /// Create runtime over a host
    #[must_use]
    pub fn new(host: H) -> Self {
        Self {
            host,
            screen: DriverScreen::new(),
        }
    }

    /// Underlying host
    #[inline]
    #[must_use]
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Process one request, returning the reports to send back in order
    #[must_use]
    pub fn handle(&self, message: &OutboundMessage) -> Vec<InboundMessage> {
        let mut reports = Vec::new();
        let sync_id = message.sync_id();
        let result = match message {
            OutboundMessage::ConfigSync {
                version, payload, ..
            } => self.apply_config(sync_id, *version, payload, &mut reports),
            OutboundMessage::DriverSync { payload, .. } => {
                self.install_driver(sync_id, payload, &mut reports)
            }
        };
        reports.push(match result {
            Ok(Completion::Version(v)) => InboundMessage::SyncComplete {
                sync_id,
                applied_version: Some(v),
                driver_path: None,
            },
            Ok(Completion::DriverPath(path)) => InboundMessage::SyncComplete {
                sync_id,
                applied_version: None,
                driver_path: Some(path),
            },
            Err(error_message) => InboundMessage::SyncError {
                sync_id,
                error_message,
            },
        });
        reports
    }

    fn apply_config(
        &self,
        sync_id: SyncId,
        version: u64,
        payload: &ConfigPayload,
        reports: &mut Vec<InboundMessage>,
    ) -> Result<Completion, String> {
        reports.push(progress(sync_id, "verifying"));
        let actual = payload.files.checksum();
        if actual != payload.checksum {
            return Err(format!(
                "checksum mismatch: expected {}, got {}",
                payload.checksum.short(),
                actual.short()
            ));
        }
        reports.push(progress(sync_id, "applying"));
        self.host.apply_config(version, &payload.files)?;
        Ok(Completion::Version(version))
    }

    fn install_driver(
        &self,
        sync_id: SyncId,
        payload: &DriverPayload,
        reports: &mut Vec<InboundMessage>,
    ) -> Result<Completion, String> {
        reports.push(progress(sync_id, "screening"));
        let report = self
            .screen
            .screen(&payload.source_code)
            .map_err(|e| e.to_string())?;
        if !report.passed() {
            return Err(report.diagnostic());
        }

        reports.push(progress(sync_id, "loading"));
        let path = self
            .host
            .load_driver(&payload.driver_type, &payload.source_code)?;

        reports.push(progress(sync_id, "reloading"));
        self.host.reload_instances(&payload.driver_type)?;
        Ok(Completion::DriverPath(path))
    }
}

impl<H: EdgeHost + 'static> EdgeRuntime<H> {
    /// Serve requests from `rx`, sending reports on `tx`, until either closes
    pub fn spawn(
        self,
        mut rx: mpsc::Receiver<OutboundMessage>,
        tx: mpsc::Sender<InboundMessage>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                for report in self.handle(&message) {
                    if tx.send(report).await.is_err() {
                        tracing::debug!("Report channel closed");
                        return;
                    }
                }
            }
        })
    }
}

enum Completion {
    Version(u64),
    DriverPath(String),
}

fn progress(sync_id: SyncId, step: &str) -> InboundMessage {
    InboundMessage::SyncProgress {
        sync_id,
        step: step.to_owned(),
    }
}

/// In-memory host for tests and simulation
#[derive(Debug, Default)]
pub struct MemoryEdgeHost {
    applied: Mutex<Option<(u64, FileSet)>>,
    drivers: DashMap<String, String>,
    reloads: DashMap<String, usize>,
    fail_next_apply: Mutex<Option<String>>,
}

impl MemoryEdgeHost {
    /// Empty host
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `apply_config` fail with `reason`
    pub fn fail_next_apply(&self, reason: impl Into<String>) {
        *self.fail_next_apply.lock() = Some(reason.into());
    }

    /// Version currently applied
    #[must_use]
    pub fn applied_version(&self) -> Option<u64> {
        self.applied.lock().as_ref().map(|(v, _)| *v)
    }

    /// Files currently applied
    #[must_use]
    pub fn applied_files(&self) -> Option<FileSet> {
        self.applied.lock().as_ref().map(|(_, f)| f.clone())
    }

    /// Loaded source for a driver type
    #[must_use]
    pub fn driver_source(&self, driver_type: &str) -> Option<String> {
        self.drivers.get(driver_type).map(|s| s.value().clone())
    }

    /// How many times a driver type was hot-reloaded
    #[must_use]
    pub fn reload_count(&self, driver_type: &str) -> usize {
        self.reloads.get(driver_type).map_or(0, |n| *n)
    }
}

impl EdgeHost for MemoryEdgeHost {
    fn apply_config(&self, version: u64, files: &FileSet) -> Result<(), String> {
        if let Some(reason) = self.fail_next_apply.lock().take() {
            return Err(reason);
        }
        *self.applied.lock() = Some((version, files.clone()));
        Ok(())
    }

    fn load_driver(&self, driver_type: &str, source: &str) -> Result<String, String> {
        self.drivers.insert(driver_type.to_owned(), source.to_owned());
        Ok(format!("drivers/{driver_type}.py"))
    }

    fn reload_instances(&self, driver_type: &str) -> Result<usize, String> {
        let mut count = self.reloads.entry(driver_type.to_owned()).or_insert(0);
        *count += 1;
        Ok(1)
    }
}

impl<T: EdgeHost + ?Sized> EdgeHost for std::sync::Arc<T> {
    fn apply_config(&self, version: u64, files: &FileSet) -> Result<(), String> {
        (**self).apply_config(version, files)
    }

    fn load_driver(&self, driver_type: &str, source: &str) -> Result<String, String> {
        (**self).load_driver(driver_type, source)
    }

    fn reload_instances(&self, driver_type: &str) -> Result<usize, String> {
        (**self).reload_instances(driver_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panelsync_artifact::{ConfigPath, ContentHash, ControllerId};

    fn config_sync(files: FileSet, checksum: ContentHash) -> OutboundMessage {
        OutboundMessage::ConfigSync {
            sync_id: SyncId::new(),
            controller_id: ControllerId::new("edge-1").unwrap(),
            version: 4,
            payload: ConfigPayload {
                files,
                checksum,
                commit_message: "v4".into(),
            },
        }
    }

    fn files() -> FileSet {
        let mut files = FileSet::new();
        files.insert(ConfigPath::page("main").unwrap(), "{}");
        files
    }

    #[test]
    fn config_applied_after_progress() {
        let runtime = EdgeRuntime::new(MemoryEdgeHost::new());
        let files = files();
        let reports = runtime.handle(&config_sync(files.clone(), files.checksum()));

        assert!(matches!(reports[0], InboundMessage::SyncProgress { .. }));
        assert!(matches!(
            reports.last(),
            Some(InboundMessage::SyncComplete {
                applied_version: Some(4),
                ..
            })
        ));
        assert_eq!(runtime.host().applied_version(), Some(4));
        assert_eq!(runtime.host().applied_files(), Some(files));
    }

    #[test]
    fn checksum_mismatch_is_reported() {
        let runtime = EdgeRuntime::new(MemoryEdgeHost::new());
        let reports = runtime.handle(&config_sync(files(), ContentHash::compute(b"other")));
        match reports.last() {
            Some(InboundMessage::SyncError { error_message, .. }) => {
                assert!(error_message.contains("checksum mismatch"));
            }
            other => panic!("unexpected report {other:?}"),
        }
        assert_eq!(runtime.host().applied_version(), None);
    }

    #[test]
    fn host_failure_is_reported() {
        let runtime = EdgeRuntime::new(MemoryEdgeHost::new());
        runtime.host().fail_next_apply("disk full");
        let files = files();
        let reports = runtime.handle(&config_sync(files.clone(), files.checksum()));
        assert!(matches!(
            reports.last(),
            Some(InboundMessage::SyncError { error_message, .. }) if error_message == "disk full"
        ));
    }

    #[test]
    fn driver_loaded_and_reloaded() {
        let runtime = EdgeRuntime::new(MemoryEdgeHost::new());
        let source = "class Amp(BaseDriver):\n    def connect(self): pass\n    def disconnect(self): pass\n    def send_command(self, c): pass\n";
        let message = OutboundMessage::DriverSync {
            sync_id: SyncId::new(),
            controller_id: ControllerId::new("edge-1").unwrap(),
            driver_id: "amp-1".into(),
            payload: DriverPayload {
                driver_type: "amp".into(),
                version: "1".into(),
                source_code: source.into(),
                command_mappings: Vec::new(),
                protocol_config: serde_json::Value::Null,
            },
        };
        let reports = runtime.handle(&message);
        assert!(matches!(
            reports.last(),
            Some(InboundMessage::SyncComplete { driver_path: Some(p), .. }) if p == "drivers/amp.py"
        ));
        assert_eq!(runtime.host().reload_count("amp"), 1);
        assert_eq!(runtime.host().driver_source("amp").as_deref(), Some(source));
    }

    #[test]
    fn driver_syntax_error_carries_location() {
        let runtime = EdgeRuntime::new(MemoryEdgeHost::new());
        let message = OutboundMessage::DriverSync {
            sync_id: SyncId::new(),
            controller_id: ControllerId::new("edge-1").unwrap(),
            driver_id: "amp-1".into(),
            payload: DriverPayload {
                driver_type: "amp".into(),
                version: "1".into(),
                source_code: "class Amp(BaseDriver:\n    pass\n".into(),
                command_mappings: Vec::new(),
                protocol_config: serde_json::Value::Null,
            },
        };
        let reports = runtime.handle(&message);
        assert!(matches!(
            reports.last(),
            Some(InboundMessage::SyncError { error_message, .. }) if error_message.contains("line")
        ));
        assert_eq!(runtime.host().reload_count("amp"), 0);
    }
}
