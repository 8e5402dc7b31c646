//! Scene rules
//!
//! A scene is an ordered list of `(device, control, value)` steps.

use super::FileCheck;
use crate::report::IssueCode;
use serde_json::{Map, Value};

pub(crate) fn check_scene(check: &mut FileCheck<'_>, doc: &Map<String, Value>) {
    check.require_str(doc, "name", "");
    let Some(steps) = check.require_array(doc, "steps", "") else {
        return;
    };

    for (i, step) in steps.iter().enumerate() {
        let location = format!("/steps/{i}");
        let Some(obj) = step.as_object() else {
            check.error(&location, IssueCode::WrongType, "step must be an object".to_string());
            continue;
        };
        check.check_binding(obj, &location);
        if !obj.contains_key("value") {
            check.error(&location, IssueCode::MissingField, "missing required field 'value'".to_string());
        }
        if let Some(delay) = obj.get("delay_ms") {
            if delay.as_u64().is_none() {
                check.error(
                    &format!("{location}/delay_ms"),
                    IssueCode::InvalidDelay,
                    format!("delay_ms must be a non-negative integer, got {delay}"),
                );
            }
        }
    }
}
