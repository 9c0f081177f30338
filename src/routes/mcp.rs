//! JSON-RPC 2.0 endpoint exposing the calendar tools.
//!
//! Requests carrying an `id` get a JSON response; notifications (no `id`)
//! are acknowledged with 202 and no body.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use calbridge_core::ToolRequest;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::state::AppState;

const JSONRPC_VERSION: &str = "2.0";
/// Offered when the client does not ask for a specific revision.
const PROTOCOL_VERSION: &str = "2025-03-26";

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

pub fn router() -> Router<AppState> {
    Router::new().route("/mcp", post(handle))
}

#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[serde(default)]
    jsonrpc: Option<String>,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl RpcError {
    fn new(code: i64, message: impl Into<String>) -> Self {
        RpcError {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct RpcResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
}

impl RpcResponse {
    fn result(id: Value, result: Value) -> Self {
        RpcResponse {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Value, error: RpcError) -> Self {
        RpcResponse {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(error),
        }
    }
}

impl IntoResponse for RpcResponse {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

async fn handle(State(state): State<AppState>, body: Bytes) -> Response {
    let value: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            return RpcResponse::error(Value::Null, RpcError::new(PARSE_ERROR, e.to_string()))
                .into_response();
        }
    };

    // An explicit `"id": null` is still a request
    let is_notification = value.get("id").is_none();
    let id = value.get("id").cloned().unwrap_or(Value::Null);
    let request: RpcRequest = match serde_json::from_value(value) {
        Ok(request) => request,
        Err(e) => {
            return RpcResponse::error(id, RpcError::new(INVALID_REQUEST, e.to_string()))
                .into_response();
        }
    };

    if request.jsonrpc.as_deref() != Some(JSONRPC_VERSION) {
        return RpcResponse::error(
            id,
            RpcError::new(INVALID_REQUEST, "jsonrpc must be \"2.0\""),
        )
        .into_response();
    }

    if is_notification {
        tracing::debug!(method = %request.method, "Notification received");
        return StatusCode::ACCEPTED.into_response();
    }

    let response = match call_method(&state, &request.method, request.params).await {
        Ok(result) => RpcResponse::result(id, result),
        Err(error) => RpcResponse::error(id, error),
    };
    response.into_response()
}

async fn call_method(state: &AppState, method: &str, params: Value) -> Result<Value, RpcError> {
    match method {
        "initialize" => Ok(initialize(&params)),
        "ping" => Ok(json!({})),
        "tools/list" => Ok(json!({ "tools": state.dispatcher.tools() })),
        "tools/call" => {
            let request: ToolRequest = serde_json::from_value(params)
                .map_err(|e| RpcError::new(INVALID_PARAMS, e.to_string()))?;
            let response = state.dispatcher.dispatch(request).await;
            let structured = response.to_value();

            Ok(json!({
                "content": [{"type": "text", "text": structured.to_string()}],
                "structuredContent": structured,
                "isError": response.is_error(),
            }))
        }
        other => Err(RpcError::new(
            METHOD_NOT_FOUND,
            format!("Method not found: {other}"),
        )),
    }
}

fn initialize(params: &Value) -> Value {
    let version = params
        .get("protocolVersion")
        .and_then(Value::as_str)
        .unwrap_or(PROTOCOL_VERSION);

    json!({
        "protocolVersion": version,
        "capabilities": {"tools": {"listChanged": false}},
        "serverInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        },
    })
}
