//! Nested status document → flat key/value document
//!
//! Consumers on the other end of the hub expect a single-level document
//! where every field is always present: null or missing values are emitted
//! as the empty string rather than omitted, so a downstream template can
//! reference any key unconditionally.

use serde_json::{Map, Value};

/// Flat single-level document produced by [`flatten`].
pub type FlatStatus = Map<String, Value>;

/// Inserts a value under `key`, mapping null to the empty string.
///
/// Every rule below funnels through here, which is what guarantees the
/// anti-null convention: a flat document never contains `null`.
fn put(flat: &mut FlatStatus, key: impl Into<String>, value: Value) {
    let value = match value {
        Value::Null => Value::String(String::new()),
        other => other,
    };
    flat.insert(key.into(), value);
}

/// The field as a string, or the empty string when missing or non-string.
fn string_of(status: &Map<String, Value>, key: &str) -> Value {
    match status.get(key) {
        Some(Value::String(s)) => Value::String(s.clone()),
        _ => Value::String(String::new()),
    }
}

/// The field as a bool, defaulting to false when missing or non-bool.
fn bool_of(status: &Map<String, Value>, key: &str) -> Value {
    Value::Bool(matches!(status.get(key), Some(Value::Bool(true))))
}

/// Builds a flat document from a nested status document.
///
/// Pure and deterministic: identical input yields identical output, and no
/// state is read or written. The key naming rules are fixed:
///
/// - top-level scalars are copied under renamed keys (`deviceId` →
///   `device_id`, with `id` as the fallback when `deviceId` is absent)
/// - the `hygieneState` sub-object is copied one level deep under a
///   `hygiene_` prefix
/// - each list of objects contributes a `<name>_count` field plus one
///   field per element key, named `<namespace>_<index>_<key>`
/// - the first notification's common fields are duplicated under fixed,
///   non-indexed keys so simple consumers can skip the indexed scheme
/// - `additionalStatusFields` is heterogeneous: objects flatten per key,
///   nested lists are carried as their compact JSON text, scalars are
///   copied through
pub fn flatten(status: &Value) -> FlatStatus {
    let empty = Map::new();
    let status = status.as_object().unwrap_or(&empty);

    let mut flat = FlatStatus::new();

    // Basics
    let device_id = match status.get("deviceId") {
        Some(Value::String(s)) => Value::String(s.clone()),
        _ => string_of(status, "id"),
    };
    put(&mut flat, "device_id", device_id);
    put(&mut flat, "id", string_of(status, "id"));
    put(&mut flat, "is_online", bool_of(status, "isOnline"));
    put(&mut flat, "is_in_use", bool_of(status, "isInUse"));
    put(
        &mut flat,
        "has_info",
        status.get("hasInfo").cloned().unwrap_or(Value::Null),
    );

    // Hygiene sub-object, one level deep
    if let Some(Value::Object(hygiene)) = status.get("hygieneState") {
        for (key, value) in hygiene {
            put(&mut flat, format!("hygiene_{key}"), value.clone());
        }
    }

    // Notifications
    let notifications = list_of(status, "notifications");
    put(&mut flat, "notifications_count", Value::from(notifications.len()));
    if let Some(Value::Object(head)) = notifications.first() {
        for key in ["category", "description", "errorNumber", "id", "text"] {
            put(
                &mut flat,
                format!("notification_{key}"),
                head.get(key).cloned().unwrap_or(Value::Null),
            );
        }
    } else {
        for key in ["category", "description", "errorNumber", "id", "text"] {
            put(&mut flat, format!("notification_{key}"), Value::Null);
        }
    }
    flatten_object_list(&mut flat, notifications, "notifications");

    // Critical errors
    let critical = list_of(status, "criticalErrors");
    put(&mut flat, "critical_errors_count", Value::from(critical.len()));
    flatten_object_list(&mut flat, critical, "critical");

    // Other notifications
    let other = list_of(status, "otherNotifications");
    put(
        &mut flat,
        "other_notifications_count",
        Value::from(other.len()),
    );
    flatten_object_list(&mut flat, other, "other_notifications");

    // Additional status: heterogeneous list
    let additional = list_of(status, "additionalStatusFields");
    put(
        &mut flat,
        "additional_status_fields_count",
        Value::from(additional.len()),
    );
    for (i, element) in additional.iter().enumerate() {
        match element {
            Value::Object(object) => {
                for (key, value) in object {
                    put(&mut flat, format!("additional_{i}_{key}"), value.clone());
                }
            }
            Value::Array(list) => {
                let text = serde_json::to_string(list).unwrap_or_default();
                put(&mut flat, format!("additional_{i}"), Value::String(text));
            }
            scalar => put(&mut flat, format!("additional_{i}"), scalar.clone()),
        }
    }

    flat
}

/// The field as a list, or the empty list when missing or non-list.
fn list_of<'a>(status: &'a Map<String, Value>, key: &str) -> &'a [Value] {
    match status.get(key) {
        Some(Value::Array(list)) => list.as_slice(),
        _ => &[],
    }
}

/// Emits `<namespace>_<index>_<key>` for every key of every object element.
/// Non-object elements contribute nothing beyond the count.
fn flatten_object_list(flat: &mut FlatStatus, list: &[Value], namespace: &str) {
    for (i, element) in list.iter().enumerate() {
        if let Value::Object(object) = element {
            for (key, value) in object {
                put(flat, format!("{namespace}_{i}_{key}"), value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_document_yields_zero_counts_and_empty_fields() {
        let flat = flatten(&json!({}));

        assert_eq!(flat["device_id"], json!(""));
        assert_eq!(flat["id"], json!(""));
        assert_eq!(flat["is_online"], json!(false));
        assert_eq!(flat["is_in_use"], json!(false));
        assert_eq!(flat["has_info"], json!(""));
        assert_eq!(flat["notifications_count"], json!(0));
        assert_eq!(flat["critical_errors_count"], json!(0));
        assert_eq!(flat["other_notifications_count"], json!(0));
        assert_eq!(flat["additional_status_fields_count"], json!(0));
        assert_eq!(flat["notification_category"], json!(""));
        assert_eq!(flat["notification_description"], json!(""));
        assert_eq!(flat["notification_errorNumber"], json!(""));
        assert_eq!(flat["notification_id"], json!(""));
        assert_eq!(flat["notification_text"], json!(""));
    }

    #[test]
    fn flatten_is_pure() {
        let status = json!({
            "id": "dev-7",
            "isOnline": true,
            "notifications": [{"category": "rinse", "id": 3}],
        });

        assert_eq!(flatten(&status), flatten(&status));
    }

    #[test]
    fn device_id_falls_back_to_id() {
        let flat = flatten(&json!({"id": "unit-1"}));
        assert_eq!(flat["device_id"], json!("unit-1"));
        assert_eq!(flat["id"], json!("unit-1"));

        let flat = flatten(&json!({"deviceId": "dev-9", "id": "unit-1"}));
        assert_eq!(flat["device_id"], json!("dev-9"));
    }

    #[test]
    fn hygiene_state_is_prefixed_one_level_deep() {
        let flat = flatten(&json!({
            "hygieneState": {"rinsing": true, "cycle": 4, "detail": null}
        }));

        assert_eq!(flat["hygiene_rinsing"], json!(true));
        assert_eq!(flat["hygiene_cycle"], json!(4));
        // nulls inside sub-objects follow the anti-null convention too
        assert_eq!(flat["hygiene_detail"], json!(""));
    }

    #[test]
    fn first_notification_is_duplicated_under_fixed_keys() {
        let flat = flatten(&json!({
            "notifications": [
                {"category": "warning", "description": "low water", "errorNumber": 12, "id": 1, "text": "refill"},
                {"category": "info", "id": 2},
            ]
        }));

        assert_eq!(flat["notifications_count"], json!(2));
        assert_eq!(flat["notification_category"], json!("warning"));
        assert_eq!(flat["notification_description"], json!("low water"));
        assert_eq!(flat["notification_errorNumber"], json!(12));
        assert_eq!(flat["notification_id"], json!(1));
        assert_eq!(flat["notification_text"], json!("refill"));
        assert_eq!(flat["notifications_0_category"], json!("warning"));
        assert_eq!(flat["notifications_1_category"], json!("info"));
        assert_eq!(flat["notifications_1_id"], json!(2));
    }

    #[test]
    fn fixed_notification_keys_are_empty_for_empty_list() {
        let flat = flatten(&json!({"notifications": []}));

        assert_eq!(flat["notifications_count"], json!(0));
        assert_eq!(flat["notification_category"], json!(""));
        assert_eq!(flat["notification_text"], json!(""));
    }

    #[test]
    fn critical_and_other_lists_are_indexed() {
        let flat = flatten(&json!({
            "criticalErrors": [{"code": 500}],
            "otherNotifications": [{"note": "a"}, {"note": "b"}],
        }));

        assert_eq!(flat["critical_errors_count"], json!(1));
        assert_eq!(flat["critical_0_code"], json!(500));
        assert_eq!(flat["other_notifications_count"], json!(2));
        assert_eq!(flat["other_notifications_0_note"], json!("a"));
        assert_eq!(flat["other_notifications_1_note"], json!("b"));
    }

    #[test]
    fn additional_status_handles_heterogeneous_elements() {
        let flat = flatten(&json!({
            "additionalStatusFields": [
                {"pressure": 2.5},
                ["a", 1],
                "plain",
                null,
            ]
        }));

        assert_eq!(flat["additional_status_fields_count"], json!(4));
        assert_eq!(flat["additional_0_pressure"], json!(2.5));
        // nested lists are carried as compact JSON text
        assert_eq!(flat["additional_1"], json!("[\"a\",1]"));
        assert_eq!(flat["additional_2"], json!("plain"));
        assert_eq!(flat["additional_3"], json!(""));
    }

    #[test]
    fn non_object_document_behaves_like_empty() {
        let flat = flatten(&json!(["not", "an", "object"]));
        assert_eq!(flat["id"], json!(""));
        assert_eq!(flat["notifications_count"], json!(0));
    }
}
