use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::errors::BridgeError;

pub const STATUS_OK: u16 = 200;
pub const STATUS_ERROR: u16 = 500;

/// The uniform reply of every invocation: a status code plus a JSON-encoded body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    pub body: String,
}

impl ResponseEnvelope {
    pub fn ok(body: Value) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Self {
            status_code: STATUS_OK,
            headers: Some(headers),
            body: body.to_string(),
        }
    }

    /// A 500 envelope carrying `{"error": ...}`; the streaming variant also flags the mode
    pub fn failure(error: &BridgeError, streaming: bool) -> Self {
        let body = if streaming {
            json!({ "error": error.to_string(), "streaming": true, "mode": "streaming" })
        } else {
            json!({ "error": error.to_string() })
        };
        Self {
            status_code: STATUS_ERROR,
            headers: None,
            body: body.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == STATUS_OK
    }

    /// Decode the body back into JSON
    pub fn body_json(&self) -> serde_json::Result<Value> {
        serde_json::from_str(&self.body)
    }
}
