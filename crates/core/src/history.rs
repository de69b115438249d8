//! History record vocabulary and payload encoding.

use serde_json::Value;

/// Subject kind for page history.
pub const SUBJECT_PAGE: &str = "pages";

/// Subject kind for URL registry history.
pub const SUBJECT_URL: &str = "urls";

pub const ACTION_CREATED: &str = "created";
pub const ACTION_NEW_VERSION: &str = "new_version";
pub const ACTION_SAVED: &str = "saved";
pub const ACTION_DISCARDED: &str = "discarded";
pub const ACTION_SCHEDULED: &str = "scheduled";
pub const ACTION_UNSCHEDULED: &str = "unscheduled";
pub const ACTION_PUBLISHED: &str = "published";
pub const ACTION_TRASHED: &str = "trashed";
pub const ACTION_RESTORED: &str = "restored";
pub const ACTION_PURGED: &str = "purged";
pub const ACTION_ORDER_CHANGED: &str = "order_changed";
pub const ACTION_DELAYED_PUBLISH_FAILED: &str = "delayed_publish_failed";
pub const ACTION_REDIRECT_ADDED: &str = "redirect_added";
pub const ACTION_REDIRECT_REMOVED: &str = "redirect_removed";

/// Stable textual form of a history payload.
///
/// Strings are stored verbatim; any other value becomes compact JSON with
/// object keys in sorted order.
pub fn encode_payload(payload: &Value) -> String {
    match payload {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => canonical_json(other),
    }
}

fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let body: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{}:{}", Value::String(k.clone()), canonical_json(&map[k])))
                .collect();
            format!("{{{}}}", body.join(","))
        }
        Value::Array(items) => {
            let body: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", body.join(","))
        }
        scalar => scalar.to_string(),
    }
}
