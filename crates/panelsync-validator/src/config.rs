//! Validator configuration

use serde::{Deserialize, Serialize};

/// Tunables for content validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Smallest comfortable touch target edge, in panel pixels
    pub min_touch_target_px: f64,
    /// Largest accepted configuration document
    pub max_file_bytes: usize,
}

impl ValidatorConfig {
    /// Default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With minimum touch target
    #[inline]
    #[must_use]
    pub fn with_min_touch_target(mut self, px: f64) -> Self {
        self.min_touch_target_px = px;
        self
    }

    /// With maximum file size
    #[inline]
    #[must_use]
    pub fn with_max_file_bytes(mut self, bytes: usize) -> Self {
        self.max_file_bytes = bytes;
        self
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            min_touch_target_px: 44.0,
            max_file_bytes: 256 * 1024,
        }
    }
}
