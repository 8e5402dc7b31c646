//! Driver sync
//!
//! Pushes generated driver source to an edge node through the same
//! operation table as configuration syncs. The security/syntax screen
//! takes the place of content validation; nothing is sent for a driver
//! that fails it.

use crate::error::SyncError;
use crate::orchestrator::{SyncHandle, SyncOrchestrator};
use crate::protocol::{DriverPayload, OutboundMessage};
use crate::types::SyncTarget;
use panelsync_artifact::{ControllerId, DriverArtifact};
use panelsync_validator::ScreenReport;

impl SyncOrchestrator {
    /// Screen a driver without sending it
    pub fn screen_driver(&self, driver: &DriverArtifact) -> Result<ScreenReport, SyncError> {
        Ok(self.screen.screen(&driver.source_code)?)
    }

    /// Screen and push a driver to a controller
    ///
    /// On success the edge writes the source, loads it, and hot-reloads
    /// running instances of `driver_type`; the completion report carries
    /// the on-disk path.
    pub async fn sync_driver(
        &self,
        controller: &ControllerId,
        driver: &DriverArtifact,
    ) -> Result<SyncHandle, SyncError> {
        let report = self.screen_driver(driver)?;
        if !report.passed() {
            tracing::warn!(
                controller = %controller,
                driver_id = %driver.driver_id,
                diagnostic = %report.diagnostic(),
                "Driver failed screening"
            );
            return Err(SyncError::DriverScreenFailed(report));
        }

        let target = SyncTarget::Driver {
            driver_id: driver.driver_id.clone(),
            driver_type: driver.driver_type.clone(),
            version: driver.version.clone(),
        };
        self.start(controller, target, |sync_id| OutboundMessage::DriverSync {
            sync_id,
            controller_id: controller.clone(),
            driver_id: driver.driver_id.clone(),
            payload: DriverPayload {
                driver_type: driver.driver_type.clone(),
                version: driver.version.clone(),
                source_code: driver.source_code.clone(),
                command_mappings: driver.command_mappings.clone(),
                protocol_config: driver.protocol_config.clone(),
            },
        })
        .await
    }
}
