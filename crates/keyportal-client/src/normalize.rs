//! Success predicates and payload normalizers for the probed key operations.
//!
//! The backend has shipped several response shapes for the same operation; each normalizer
//! checks them in a fixed priority order.

use serde_json::Value;

/// `"success": true` (strictly a boolean).
pub fn is_success(payload: &Value) -> bool {
    payload.get("success").and_then(Value::as_bool) == Some(true)
}

/// `"success": false`; absence is not a rejection.
pub fn is_rejected(payload: &Value) -> bool {
    payload.get("success").and_then(Value::as_bool) == Some(false)
}

/// `message`, falling back to `error`.
pub fn detail(payload: &Value) -> Option<String> {
    ["message", "error"]
        .iter()
        .find_map(|field| payload.get(*field).and_then(Value::as_str))
        .map(str::to_string)
}

fn non_empty_array(value: Option<&Value>) -> bool {
    value.and_then(Value::as_array).is_some_and(|items| !items.is_empty())
}

pub fn accepts_key_list(payload: &Value) -> bool {
    is_success(payload) || non_empty_array(Some(payload)) || non_empty_array(payload.get("keys"))
}

/// `keys` array, then a top-level array, then a `data` array.
pub fn key_list(payload: &Value) -> Option<Vec<Value>> {
    payload
        .get("keys")
        .and_then(Value::as_array)
        .or_else(|| payload.as_array())
        .or_else(|| payload.get("data").and_then(Value::as_array))
        .cloned()
}

fn non_empty_str<'a>(payload: &'a Value, field: &str) -> Option<&'a str> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

pub fn accepts_generated_key(payload: &Value) -> bool {
    is_success(payload)
        || non_empty_str(payload, "key").is_some()
        || non_empty_str(payload, "api_key").is_some()
}

/// `api_key`, then `prefix.key` when both are present, then `key`.
pub fn generated_key(payload: &Value) -> Option<String> {
    if let Some(api_key) = non_empty_str(payload, "api_key") {
        return Some(api_key.to_string());
    }
    let key = non_empty_str(payload, "key")?;
    match non_empty_str(payload, "prefix") {
        Some(prefix) => Some(format!("{prefix}.{key}")),
        None => Some(key.to_string()),
    }
}

pub fn accepts_status_change(payload: &Value) -> bool {
    is_success(payload) || payload.get("message").is_some_and(|m| !m.is_null())
}

/// The `message` string, if any. A missing message is still a success.
pub fn status_message(payload: &Value) -> Option<String> {
    payload
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_must_be_boolean_true() {
        assert!(is_success(&json!({"success": true})));
        assert!(!is_success(&json!({"success": "true"})));
        assert!(!is_success(&json!({})));
        assert!(is_rejected(&json!({"success": false})));
        assert!(!is_rejected(&json!({})));
    }

    #[test]
    fn detail_prefers_message() {
        assert_eq!(
            detail(&json!({"message": "m", "error": "e"})).as_deref(),
            Some("m")
        );
        assert_eq!(detail(&json!({"error": "e"})).as_deref(), Some("e"));
        assert_eq!(detail(&json!({"message": 3})), None);
    }

    #[test]
    fn key_list_acceptance() {
        assert!(accepts_key_list(&json!({"success": true, "keys": []})));
        assert!(accepts_key_list(&json!([{"id": 1}])));
        assert!(accepts_key_list(&json!({"keys": [{"id": 1}]})));
        assert!(!accepts_key_list(&json!([])));
        assert!(!accepts_key_list(&json!({"keys": []})));
        assert!(!accepts_key_list(&json!({"error": "Not found"})));
    }

    #[test]
    fn key_list_priority() {
        let both = json!({"keys": [{"id": "k"}], "data": [{"id": "d"}]});
        assert_eq!(key_list(&both).unwrap()[0]["id"], "k");
        assert_eq!(key_list(&json!([{"id": 1}])).unwrap().len(), 1);
        assert_eq!(key_list(&json!({"data": [{"id": "d"}]})).unwrap()[0]["id"], "d");
        assert_eq!(key_list(&json!({"success": true})), None);
    }

    #[test]
    fn generated_key_priority() {
        assert_eq!(
            generated_key(&json!({"api_key": "full", "key": "short", "prefix": "pk"})).as_deref(),
            Some("full")
        );
        assert_eq!(
            generated_key(&json!({"key": "secret", "prefix": "pk"})).as_deref(),
            Some("pk.secret")
        );
        assert_eq!(generated_key(&json!({"key": "secret"})).as_deref(), Some("secret"));
        assert_eq!(generated_key(&json!({"success": true})), None);
        assert_eq!(generated_key(&json!({"api_key": "", "key": "k"})).as_deref(), Some("k"));
    }

    #[test]
    fn generated_key_acceptance() {
        assert!(accepts_generated_key(&json!({"success": true})));
        assert!(accepts_generated_key(&json!({"api_key": "x"})));
        assert!(accepts_generated_key(&json!({"key": "x"})));
        assert!(!accepts_generated_key(&json!({"name": "x"})));
    }

    #[test]
    fn status_change_acceptance_and_message() {
        assert!(accepts_status_change(&json!({"success": true})));
        assert!(accepts_status_change(&json!({"message": "updated"})));
        assert!(!accepts_status_change(&json!({"status": "active"})));
        assert_eq!(
            status_message(&json!({"message": "updated"})).as_deref(),
            Some("updated")
        );
        assert_eq!(status_message(&json!({"success": true})), None);
    }
}
