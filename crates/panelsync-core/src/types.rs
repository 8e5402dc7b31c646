//! Core types for panelsync
//!
//! Service configuration, sync identifiers and the durable
//! `sync_operation` record.

use crate::error::ConfigError;
use chrono::{DateTime, Utc};
use panelsync_artifact::ControllerId;
use panelsync_validator::ValidatorConfig;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use ulid::Ulid;

/// Upper bound on `sync_timeout_secs`
pub const MAX_SYNC_TIMEOUT_SECS: u64 = 3_600;

/// Upper bound on `sweep_interval_ms`
pub const MAX_SWEEP_INTERVAL_MS: u64 = 60_000;

/// Service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Seconds without a report before a sync is failed
    pub sync_timeout_secs: u64,
    /// Period of the timeout sweep
    pub sweep_interval_ms: u64,
    /// Extra attempts on malformed AI output
    pub proposal_retries: u32,
    /// Content validation tunables
    pub validator: ValidatorConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            sync_timeout_secs: 30,
            sweep_interval_ms: 1_000,
            proposal_retries: 1,
            validator: ValidatorConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set sync timeout
    #[inline]
    #[must_use]
    pub fn with_sync_timeout_secs(mut self, secs: u64) -> Self {
        self.sync_timeout_secs = secs;
        self
    }

    /// Set sweep period
    #[inline]
    #[must_use]
    pub fn with_sweep_interval_ms(mut self, ms: u64) -> Self {
        self.sweep_interval_ms = ms;
        self
    }

    /// Set proposal retries
    #[inline]
    #[must_use]
    pub fn with_proposal_retries(mut self, retries: u32) -> Self {
        self.proposal_retries = retries;
        self
    }

    /// Set validator configuration
    #[inline]
    #[must_use]
    pub fn with_validator(mut self, validator: ValidatorConfig) -> Self {
        self.validator = validator;
        self
    }

    /// Sync timeout as a duration, capped at [`MAX_SYNC_TIMEOUT_SECS`]
    #[inline]
    #[must_use]
    pub fn sync_timeout(&self) -> Duration {
        Duration::from_secs(self.sync_timeout_secs.min(MAX_SYNC_TIMEOUT_SECS))
    }

    /// Sweep period as a duration, capped at [`MAX_SWEEP_INTERVAL_MS`]
    #[inline]
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.min(MAX_SWEEP_INTERVAL_MS))
    }

    /// Parse from TOML, filling missing keys with defaults
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Reject unusable values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync_timeout_secs == 0 {
            return Err(ConfigError::Invalid("sync_timeout_secs must be positive".into()));
        }
        if self.sync_timeout_secs > MAX_SYNC_TIMEOUT_SECS {
            return Err(ConfigError::Invalid(format!(
                "sync_timeout_secs must be at most {MAX_SYNC_TIMEOUT_SECS}"
            )));
        }
        if self.sweep_interval_ms == 0 {
            return Err(ConfigError::Invalid("sweep_interval_ms must be positive".into()));
        }
        if self.sweep_interval_ms > MAX_SWEEP_INTERVAL_MS {
            return Err(ConfigError::Invalid(format!(
                "sweep_interval_ms must be at most {MAX_SWEEP_INTERVAL_MS}"
            )));
        }
        if self.validator.min_touch_target_px < 0.0 {
            return Err(ConfigError::Invalid(
                "validator.min_touch_target_px must not be negative".into(),
            ));
        }
        Ok(())
    }
}

/// Correlation token for one sync operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncId(Ulid);

impl SyncId {
    /// Fresh, time-ordered id
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for SyncId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SyncId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SyncId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(Self)
    }
}

/// What a sync pushes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncKind {
    Gui,
    Driver,
}

/// Lifecycle of a sync operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Sent, not yet acknowledged
    Pending,
    /// Edge acknowledged and is applying
    InProgress,
    Completed,
    Failed,
}

impl SyncStatus {
    /// Completed or failed
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Why a sync failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    /// No terminal report within the bound
    TimedOut,
    /// Edge reported an error or an inconsistent completion
    Rejected,
}

/// What a sync delivers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncTarget {
    /// A deployed snapshot version
    Snapshot { version: u64 },
    /// A driver artifact
    Driver {
        driver_id: String,
        driver_type: String,
        version: String,
    },
}

impl Display for SyncTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Snapshot { version } => write!(f, "v{version}"),
            Self::Driver {
                driver_id, version, ..
            } => write!(f, "driver {driver_id}@{version}"),
        }
    }
}

/// Durable record of one sync attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOperation {
    pub sync_id: SyncId,
    pub controller_id: ControllerId,
    pub kind: SyncKind,
    pub target: SyncTarget,
    pub status: SyncStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureCause>,
    /// Most recent progress step reported by the edge
    pub last_step: Option<String>,
    /// Version applied (gui) or on-disk driver path (driver)
    pub completion_detail: Option<String>,
}

impl SyncOperation {
    /// New pending operation
    #[must_use]
    pub fn pending(controller_id: ControllerId, target: SyncTarget) -> Self {
        let kind = match target {
            SyncTarget::Snapshot { .. } => SyncKind::Gui,
            SyncTarget::Driver { .. } => SyncKind::Driver,
        };
        Self {
            sync_id: SyncId::new(),
            controller_id,
            kind,
            target,
            status: SyncStatus::Pending,
            started_at: Utc::now(),
            completed_at: None,
            error_detail: None,
            failure: None,
            last_step: None,
            completion_detail: None,
        }
    }

    /// Whether the operation reached a terminal state
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.sync_timeout(), Duration::from_secs(30));
        assert_eq!(config.proposal_retries, 1);
        assert!((config.validator.min_touch_target_px - 44.0).abs() < f64::EPSILON);
    }

    #[test]
    fn toml_partial_uses_defaults() {
        let config = ServiceConfig::from_toml_str(
            "sync_timeout_secs = 5\n[validator]\nmax_file_bytes = 1024\n",
        )
        .unwrap();
        assert_eq!(config.sync_timeout_secs, 5);
        assert_eq!(config.sweep_interval_ms, 1_000);
        assert_eq!(config.validator.max_file_bytes, 1024);
    }

    #[test]
    fn zero_timeout_rejected() {
        let err = ServiceConfig::from_toml_str("sync_timeout_secs = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn oversized_intervals_rejected() {
        let err = ServiceConfig::from_toml_str("sync_timeout_secs = 9223372036854775807").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("at most 3600")));
        assert!(ServiceConfig::new().with_sync_timeout_secs(u64::MAX).validate().is_err());
        assert!(ServiceConfig::new()
            .with_sync_timeout_secs(MAX_SYNC_TIMEOUT_SECS)
            .validate()
            .is_ok());
        assert!(ServiceConfig::new().with_sweep_interval_ms(u64::MAX).validate().is_err());

        // Unvalidated builder values are clamped before reaching Instant arithmetic
        let unchecked = ServiceConfig::new().with_sync_timeout_secs(u64::MAX);
        assert_eq!(unchecked.sync_timeout(), Duration::from_secs(MAX_SYNC_TIMEOUT_SECS));
    }

    #[test]
    fn bad_toml_is_parse_error() {
        let err = ServiceConfig::from_toml_str("sync_timeout_secs = \"soon\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "proposal_retries = 3").unwrap();
        let config = ServiceConfig::load(file.path()).unwrap();
        assert_eq!(config.proposal_retries, 3);

        let missing = ServiceConfig::load("/nonexistent/panelsync.toml").unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));
    }

    #[test]
    fn sync_id_round_trips_through_string() {
        let id = SyncId::new();
        assert_eq!(id.to_string().parse::<SyncId>().unwrap(), id);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
    }

    #[test]
    fn pending_kind_follows_target() {
        let ctrl = ControllerId::new("c1").unwrap();
        let op = SyncOperation::pending(ctrl.clone(), SyncTarget::Snapshot { version: 2 });
        assert_eq!(op.kind, SyncKind::Gui);
        assert_eq!(op.status, SyncStatus::Pending);

        let op = SyncOperation::pending(
            ctrl,
            SyncTarget::Driver {
                driver_id: "d".into(),
                driver_type: "projector".into(),
                version: "1".into(),
            },
        );
        assert_eq!(op.kind, SyncKind::Driver);
    }
}
