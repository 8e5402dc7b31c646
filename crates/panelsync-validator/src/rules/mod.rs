//! Per-namespace content rules

pub(crate) mod gui;
pub(crate) mod scene;

use crate::config::ValidatorConfig;
use crate::inventory::Inventory;
use crate::report::{IssueCode, Severity, ValidationIssue, ValidationReport};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Everything a rule needs while checking one file
pub(crate) struct FileCheck<'a> {
    pub(crate) path: &'a str,
    pub(crate) inventory: &'a Inventory,
    /// Scenes defined by files in the same batch
    pub(crate) batch_scenes: &'a BTreeSet<String>,
    /// Pages defined by files in the same batch
    pub(crate) batch_pages: &'a BTreeSet<String>,
    pub(crate) config: &'a ValidatorConfig,
    pub(crate) report: &'a mut ValidationReport,
}

impl FileCheck<'_> {
    pub(crate) fn issue(&mut self, severity: Severity, location: &str, code: IssueCode, message: String) {
        self.report
            .push(severity, ValidationIssue::new(self.path, location, code, message));
    }

    pub(crate) fn error(&mut self, location: &str, code: IssueCode, message: String) {
        self.issue(Severity::Error, location, code, message);
    }

    pub(crate) fn warning(&mut self, location: &str, code: IssueCode, message: String) {
        self.issue(Severity::Warning, location, code, message);
    }

    pub(crate) fn scene_exists(&self, scene: &str) -> bool {
        self.inventory.has_scene(scene) || self.batch_scenes.contains(scene)
    }

    pub(crate) fn page_exists(&self, page: &str) -> bool {
        self.inventory.has_page(page) || self.batch_pages.contains(page)
    }

    /// Required string field
    pub(crate) fn require_str<'v>(
        &mut self,
        obj: &'v Map<String, Value>,
        key: &str,
        location: &str,
    ) -> Option<&'v str> {
        match obj.get(key) {
            Some(Value::String(s)) => Some(s.as_str()),
            Some(_) => {
                self.error(location, IssueCode::WrongType, format!("field '{key}' must be a string"));
                None
            }
            None => {
                self.error(location, IssueCode::MissingField, format!("missing required field '{key}'"));
                None
            }
        }
    }

    /// Required array field
    pub(crate) fn require_array<'v>(
        &mut self,
        obj: &'v Map<String, Value>,
        key: &str,
        location: &str,
    ) -> Option<&'v Vec<Value>> {
        match obj.get(key) {
            Some(Value::Array(items)) => Some(items),
            Some(_) => {
                self.error(location, IssueCode::WrongType, format!("field '{key}' must be an array"));
                None
            }
            None => {
                self.error(location, IssueCode::MissingField, format!("missing required field '{key}'"));
                None
            }
        }
    }

    /// Optional string field; wrong type is an error
    pub(crate) fn optional_str<'v>(
        &mut self,
        obj: &'v Map<String, Value>,
        key: &str,
        location: &str,
    ) -> Option<&'v str> {
        match obj.get(key) {
            Some(Value::String(s)) => Some(s.as_str()),
            Some(_) => {
                self.error(location, IssueCode::WrongType, format!("field '{key}' must be a string"));
                None
            }
            None => None,
        }
    }

    /// Resolve a `(device, control)` reference against the inventory
    ///
    /// Shared by GUI elements and scene steps.
    pub(crate) fn check_control_ref(&mut self, device: &str, control: &str, location: &str) -> bool {
        if !self.inventory.has_device(device) {
            self.error(
                location,
                IssueCode::UnknownDevice,
                format!("unknown device '{device}' (control '{control}')"),
            );
            return false;
        }
        if !self.inventory.has_control(device, control) {
            self.error(
                location,
                IssueCode::UnknownControl,
                format!("unknown control '{control}' on device '{device}'"),
            );
            return false;
        }
        true
    }

    /// Read `device` + `control` string fields and resolve them
    pub(crate) fn check_binding(&mut self, obj: &Map<String, Value>, location: &str) {
        let device = self.require_str(obj, "device", location);
        let control = self.require_str(obj, "control", location);
        if let (Some(device), Some(control)) = (device, control) {
            self.check_control_ref(device, control, location);
        }
    }
}
