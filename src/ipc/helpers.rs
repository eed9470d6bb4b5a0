use crate::attendance::{AttendanceError, Result};

pub fn get_required_str(params: &serde_json::Value, key: &'static str) -> Result<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AttendanceError::validation(key, format!("missing {}", key)))
}

pub fn get_optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn get_required_i64(params: &serde_json::Value, key: &'static str) -> Result<i64> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => {
            Err(AttendanceError::validation(key, format!("missing {}", key)))
        }
        Some(v) => v
            .as_i64()
            .ok_or_else(|| AttendanceError::validation(key, format!("{} must be an integer", key))),
    }
}

pub fn get_optional_i64(params: &serde_json::Value, key: &'static str) -> Result<Option<i64>> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(_) => get_required_i64(params, key).map(Some),
    }
}

/// Lenient read used for batch items: a missing or non-string value becomes
/// empty and is rejected later, per item.
pub fn str_or_empty(params: &serde_json::Value, key: &str) -> String {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}
