//! Controller inventory
//!
//! The set of devices, controls, scenes and pages that configuration files may
//! reference. Owned by the external project/device management layer; the
//! validator only reads it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Devices, their controls, and the scene/page identifiers known for a controller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    /// device id → control ids
    #[serde(default)]
    pub devices: BTreeMap<String, BTreeSet<String>>,
    /// Known scene ids
    #[serde(default)]
    pub scenes: BTreeSet<String>,
    /// Known page ids
    #[serde(default)]
    pub pages: BTreeSet<String>,
}

impl Inventory {
    /// Empty inventory
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With a device exposing the given controls
    #[must_use]
    pub fn with_device<I, S>(mut self, device: impl Into<String>, controls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.devices
            .entry(device.into())
            .or_default()
            .extend(controls.into_iter().map(Into::into));
        self
    }

    /// With a known scene
    #[must_use]
    pub fn with_scene(mut self, scene: impl Into<String>) -> Self {
        self.scenes.insert(scene.into());
        self
    }

    /// Add scene ids in place
    pub fn extend_scenes<I, S>(&mut self, scenes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scenes.extend(scenes.into_iter().map(Into::into));
    }

    /// Add page ids in place
    pub fn extend_pages<I, S>(&mut self, pages: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pages.extend(pages.into_iter().map(Into::into));
    }

    /// Whether the device exists
    #[inline]
    #[must_use]
    pub fn has_device(&self, device: &str) -> bool {
        self.devices.contains_key(device)
    }

    /// Whether the `(device, control)` pair exists
    #[must_use]
    pub fn has_control(&self, device: &str, control: &str) -> bool {
        self.devices
            .get(device)
            .is_some_and(|controls| controls.contains(control))
    }

    /// Whether the scene exists
    #[inline]
    #[must_use]
    pub fn has_scene(&self, scene: &str) -> bool {
        self.scenes.contains(scene)
    }

    /// Whether the page exists
    #[inline]
    #[must_use]
    pub fn has_page(&self, page: &str) -> bool {
        self.pages.contains(page)
    }
}
