//! Page, component and GUI-config rules

use super::FileCheck;
use crate::geometry::Rect;
use crate::report::IssueCode;
use serde_json::{Map, Value};

/// Elements a user touches
const INTERACTIVE: &[&str] = &["button", "slider", "toggle", "switch"];

/// Elements bound to a `(device, control)` pair
const BOUND: &[&str] = &["slider", "toggle", "switch", "control", "gauge"];

/// Pages and components share one schema: `name` plus an `elements` array
pub(crate) fn check_page(check: &mut FileCheck<'_>, doc: &Map<String, Value>) {
    check.require_str(doc, "name", "");
    let Some(elements) = check.require_array(doc, "elements", "") else {
        return;
    };

    let mut placed: Vec<(String, Rect)> = Vec::with_capacity(elements.len());
    for (i, element) in elements.iter().enumerate() {
        let location = format!("/elements/{i}");
        let Some(obj) = element.as_object() else {
            check.error(&location, IssueCode::WrongType, "element must be an object".to_string());
            continue;
        };
        if let Some(rect) = check_element(check, obj, &location) {
            placed.push((element_name(obj, i), rect));
        }
    }

    for (i, (a_name, a)) in placed.iter().enumerate() {
        for (b_name, b) in &placed[i + 1..] {
            if a.intersection_area(b) > 0.0 {
                check.warning(
                    "/elements",
                    IssueCode::OverlappingElements,
                    format!("elements '{a_name}' and '{b_name}' overlap"),
                );
            }
        }
    }
}

/// `gui/config.json`: free-form object with a few typed fields
pub(crate) fn check_config(check: &mut FileCheck<'_>, doc: &Map<String, Value>) {
    check.optional_str(doc, "theme", "");
    if let Some(home) = check.optional_str(doc, "home_page", "") {
        if !check.page_exists(home) {
            check.warning(
                "/home_page",
                IssueCode::UnknownHomePage,
                format!("home page '{home}' is not defined"),
            );
        }
    }
}

fn element_name(obj: &Map<String, Value>, index: usize) -> String {
    obj.get("id")
        .and_then(Value::as_str)
        .map_or_else(|| format!("#{index}"), str::to_string)
}

fn check_element(check: &mut FileCheck<'_>, obj: &Map<String, Value>, location: &str) -> Option<Rect> {
    let kind = check.require_str(obj, "type", location);
    let rect = check_position(check, obj, location);
    let kind = kind?;

    if INTERACTIVE.contains(&kind) {
        let min = check.config.min_touch_target_px;
        if let Some(r) = rect.filter(|r| !r.fits_touch_target(min)) {
            check.warning(
                &format!("{location}/position"),
                IssueCode::SmallTouchTarget,
                format!(
                    "{kind} touch target {}x{} is below the {min}px minimum",
                    r.width, r.height
                ),
            );
        }
        let labelled = obj
            .get("label")
            .and_then(Value::as_str)
            .is_some_and(|l| !l.trim().is_empty());
        if !labelled {
            check.warning(location, IssueCode::MissingLabel, format!("{kind} has no label"));
        }
    }

    if BOUND.contains(&kind) {
        check.check_binding(obj, location);
    }

    if kind == "slider" {
        check_range(check, obj, location);
    }

    if kind == "button" {
        if let Some(action) = obj.get("action") {
            check_action(check, action, &format!("{location}/action"));
        }
    }

    rect
}

fn check_position(check: &mut FileCheck<'_>, obj: &Map<String, Value>, location: &str) -> Option<Rect> {
    let position = match obj.get("position") {
        Some(Value::Object(p)) => p,
        Some(_) => {
            check.error(location, IssueCode::WrongType, "field 'position' must be an object".to_string());
            return None;
        }
        None => {
            check.error(location, IssueCode::MissingField, "missing required field 'position'".to_string());
            return None;
        }
    };

    let location = format!("{location}/position");
    match Rect::from_position(position) {
        Ok(rect) if rect.width > 0.0 && rect.height > 0.0 => Some(rect),
        Ok(rect) => {
            check.error(
                &location,
                IssueCode::InvalidPosition,
                format!("width and height must be positive (got {}x{})", rect.width, rect.height),
            );
            None
        }
        Err(missing) => {
            check.error(
                &location,
                IssueCode::InvalidPosition,
                format!("position needs numeric {}", missing.join(", ")),
            );
            None
        }
    }
}

fn check_range(check: &mut FileCheck<'_>, obj: &Map<String, Value>, location: &str) {
    let mut complete = true;
    for key in ["min", "max"] {
        match obj.get(key) {
            Some(v) if v.is_number() => {}
            Some(_) => {
                check.error(location, IssueCode::WrongType, format!("field '{key}' must be a number"));
            }
            None => complete = false,
        }
    }
    if !complete {
        check.warning(location, IssueCode::MissingRange, "slider has no numeric min/max range".to_string());
    }
}

fn check_action(check: &mut FileCheck<'_>, action: &Value, location: &str) {
    let Some(obj) = action.as_object() else {
        check.error(location, IssueCode::WrongType, "action must be an object".to_string());
        return;
    };
    let Some(kind) = check.require_str(obj, "type", location) else {
        return;
    };
    match kind {
        "scene" => {
            if let Some(scene) = check.require_str(obj, "scene", location) {
                if !check.scene_exists(scene) {
                    check.error(location, IssueCode::UnknownScene, format!("unknown scene '{scene}'"));
                }
            }
        }
        "control" => check.check_binding(obj, location),
        "navigate" => {
            if let Some(page) = check.require_str(obj, "page", location) {
                if !check.page_exists(page) {
                    check.warning(location, IssueCode::UnknownPage, format!("page '{page}' is not defined"));
                }
            }
        }
        other => {
            check.error(location, IssueCode::WrongType, format!("unsupported action type '{other}'"));
        }
    }
}
