//! Tool call envelopes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An incoming tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRequest {
    pub name: String,
    #[serde(default, alias = "args")]
    pub arguments: Map<String, Value>,
}

impl ToolRequest {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        ToolRequest {
            name: name.into(),
            arguments,
        }
    }
}

/// Outcome of a tool call. Serializes flat:
/// `{"status":"success", ...payload}` or `{"status":"error","message":"..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResponse {
    Success(Map<String, Value>),
    Error { message: String },
}

impl ToolResponse {
    /// Non-object payloads are wrapped as `{"result": value}`.
    pub fn success(payload: Value) -> Self {
        match payload {
            Value::Object(map) => ToolResponse::Success(map),
            other => {
                let mut map = Map::new();
                map.insert("result".to_string(), other);
                ToolResponse::Success(map)
            }
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ToolResponse::Error {
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ToolResponse::Error { .. })
    }

    pub fn to_value(&self) -> Value {
        match self {
            ToolResponse::Success(payload) => {
                let mut map = Map::with_capacity(payload.len() + 1);
                map.insert("status".to_string(), Value::from("success"));
                map.extend(payload.iter().map(|(k, v)| (k.clone(), v.clone())));
                Value::Object(map)
            }
            ToolResponse::Error { message } => serde_json::json!({
                "status": "error",
                "message": message,
            }),
        }
    }
}
