use crate::attendance::AttendanceError;
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

impl AttendanceError {
    pub fn response(&self, id: &str) -> serde_json::Value {
        err(id, self.code(), self.to_string(), self.details())
    }

    /// Error object embedded in a batch item rather than a whole response.
    pub fn to_json(&self) -> serde_json::Value {
        let mut error = json!({
            "code": self.code(),
            "message": self.to_string(),
        });
        if let Some(d) = self.details() {
            error["details"] = d;
        }
        error
    }
}
