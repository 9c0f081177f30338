//! Tool dispatch: validate a tool call, get a credential, run the calendar
//! operation, and turn whatever happened into a `ToolResponse`.

use std::sync::Arc;

use calbridge_core::{
    CalBridgeResult, CalendarClient, CredentialManager, ToolRequest, ToolResponse,
    ValidationError,
};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

pub const CREATE_EVENT: &str = "create_calendar_event";
pub const LIST_EVENTS: &str = "list_calendar_events";
pub const DELETE_EVENT: &str = "delete_calendar_event";

pub const DEFAULT_TIMEZONE: &str = "America/Los_Angeles";
pub const DEFAULT_MAX_RESULTS: u32 = 10;
/// Largest page the Calendar API will return.
pub const MAX_RESULTS_LIMIT: u32 = 2500;

/// A tool as published by `tools/list`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

pub fn tool_specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: CREATE_EVENT,
            description: "Create an event on the calendar. Times are ISO 8601 date-times \
                          (e.g. 2024-01-15T14:00:00), interpreted in `timezone`.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "summary": {"type": "string", "description": "Event title"},
                    "start_time": {"type": "string", "description": "Start date-time"},
                    "end_time": {"type": "string", "description": "End date-time"},
                    "timezone": {
                        "type": "string",
                        "description": "IANA timezone name",
                        "default": DEFAULT_TIMEZONE
                    }
                },
                "required": ["summary", "start_time", "end_time"]
            }),
        },
        ToolSpec {
            name: LIST_EVENTS,
            description: "List upcoming events in ascending start order.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "max_results": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": MAX_RESULTS_LIMIT,
                        "default": DEFAULT_MAX_RESULTS
                    },
                    "time_min": {
                        "type": "string",
                        "description": "Only events ending after this RFC 3339 time. Defaults to now."
                    }
                }
            }),
        },
        ToolSpec {
            name: DELETE_EVENT,
            description: "Delete an event by id.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "event_id": {"type": "string"}
                },
                "required": ["event_id"]
            }),
        },
    ]
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_max_results() -> u32 {
    DEFAULT_MAX_RESULTS
}

#[derive(Debug, Deserialize)]
struct CreateEventArgs {
    summary: String,
    start_time: String,
    end_time: String,
    #[serde(default = "default_timezone")]
    timezone: String,
}

#[derive(Debug, Deserialize)]
struct ListEventsArgs {
    #[serde(default = "default_max_results")]
    max_results: u32,
    #[serde(default)]
    time_min: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeleteEventArgs {
    event_id: String,
}

/// A tool call whose arguments have been checked against its declared shape.
#[derive(Debug)]
enum ToolCall {
    CreateEvent(CreateEventArgs),
    ListEvents(ListEventsArgs),
    DeleteEvent(DeleteEventArgs),
}

impl ToolCall {
    fn parse(request: &ToolRequest) -> Result<Self, ValidationError> {
        let name = request.name.as_str();
        let args = &request.arguments;

        let call = match name {
            CREATE_EVENT => ToolCall::CreateEvent(parse_args(name, args)?),
            LIST_EVENTS => {
                let list: ListEventsArgs = parse_args(name, args)?;
                if !(1..=MAX_RESULTS_LIMIT).contains(&list.max_results) {
                    return Err(ValidationError::InvalidArguments {
                        tool: name.to_string(),
                        reason: format!(
                            "max_results must be between 1 and {MAX_RESULTS_LIMIT}, got {}",
                            list.max_results
                        ),
                    });
                }
                ToolCall::ListEvents(list)
            }
            DELETE_EVENT => ToolCall::DeleteEvent(parse_args(name, args)?),
            other => return Err(ValidationError::UnknownTool(other.to_string())),
        };

        Ok(call)
    }
}

fn parse_args<T: DeserializeOwned>(
    tool: &str,
    args: &Map<String, Value>,
) -> Result<T, ValidationError> {
    serde_json::from_value(Value::Object(args.clone())).map_err(|e| {
        ValidationError::InvalidArguments {
            tool: tool.to_string(),
            reason: e.to_string(),
        }
    })
}

pub struct ToolDispatcher {
    credentials: Arc<CredentialManager>,
    calendar: CalendarClient,
}

impl ToolDispatcher {
    pub fn new(credentials: Arc<CredentialManager>, calendar: CalendarClient) -> Self {
        ToolDispatcher {
            credentials,
            calendar,
        }
    }

    pub fn tools(&self) -> Vec<ToolSpec> {
        tool_specs()
    }

    /// Never fails: every error ends up as `ToolResponse::Error`.
    pub async fn dispatch(&self, request: ToolRequest) -> ToolResponse {
        let call = match ToolCall::parse(&request) {
            Ok(call) => call,
            Err(e) => {
                tracing::warn!(tool = %request.name, error = %e, "Rejected tool call");
                return ToolResponse::error(e.to_string());
            }
        };

        match self.execute(call).await {
            Ok(payload) => {
                tracing::debug!(tool = %request.name, "Tool call succeeded");
                ToolResponse::success(payload)
            }
            Err(e) => {
                tracing::error!(tool = %request.name, error = %e, "Tool call failed");
                ToolResponse::error(e.to_string())
            }
        }
    }

    async fn execute(&self, call: ToolCall) -> CalBridgeResult<Value> {
        let credential = self.credentials.acquire().await?;

        match call {
            ToolCall::CreateEvent(args) => {
                let created = self
                    .calendar
                    .create_event(
                        &credential,
                        &args.summary,
                        &args.start_time,
                        &args.end_time,
                        &args.timezone,
                    )
                    .await?;
                Ok(json!({
                    "event_id": created.event_id,
                    "event_link": created.link,
                }))
            }
            ToolCall::ListEvents(args) => {
                let events = self
                    .calendar
                    .list_events(&credential, args.max_results, args.time_min.as_deref())
                    .await?;
                let events: Vec<Value> = events
                    .into_iter()
                    .map(|e| {
                        json!({
                            "id": e.id,
                            "summary": e.summary,
                            "start": e.start,
                            "link": e.link,
                        })
                    })
                    .collect();
                Ok(json!({ "events": events }))
            }
            ToolCall::DeleteEvent(args) => {
                self.calendar
                    .delete_event(&credential, &args.event_id)
                    .await?;
                Ok(json!({
                    "message": format!("Event {} deleted successfully", args.event_id),
                }))
            }
        }
    }
}
