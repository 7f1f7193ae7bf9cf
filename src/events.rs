use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::interrupt::InterruptPayload;
use crate::registry::ToolCallStatus;

pub const EVENT_CREATED: &str = "response.created";
pub const EVENT_TEXT_DELTA: &str = "response.output_text.delta";
pub const EVENT_TEXT_COMPLETE: &str = "response.output_text.complete";
pub const EVENT_TOOL_CALLS: &str = "response.tool_calls.complete";
pub const EVENT_TOOL: &str = "response.tool";
pub const EVENT_INTERRUPT: &str = "response.interrupt";
pub const EVENT_RESUMED: &str = "response.resumed";
pub const EVENT_COMPLETED: &str = "response.completed";
pub const EVENT_ERROR: &str = "response.error";
pub const EVENT_UPDATE: &str = "response.update";

/// One tool invocation announced by the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallDecl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

/// Normalized protocol event, identical for both transport modes.
///
/// Exactly one `TurnStarted` precedes all others for a given turn; at most
/// one `TurnCompleted` or terminal `Error` per turn. `response.resumed`
/// normalizes to `TurnStarted` as a continuation marker.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    TurnStarted {
        conversation_id: Option<String>,
    },
    TextDelta {
        text: String,
    },
    TextComplete {
        text: String,
    },
    ToolCallsDeclared {
        calls: Vec<ToolCallDecl>,
    },
    ToolResult {
        tool_call_id: String,
        tool_name: Option<String>,
        args: Option<Value>,
        content: Value,
        status: Option<ToolCallStatus>,
    },
    Interrupt {
        payload: InterruptPayload,
    },
    TurnCompleted,
    Error {
        message: String,
    },
}

/// Decode one wire record payload into a normalized event.
///
/// Malformed payloads and unknown `event` values are local failures: logged
/// and skipped (`None`), never fatal to the surrounding turn.
pub fn decode_event(data: &str) -> Option<TurnEvent> {
    let value: Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(error) => {
            warn!(%error, "skipping malformed event payload");
            return None;
        }
    };

    let Some(event_name) = value.get("event").and_then(Value::as_str) else {
        warn!("skipping event payload without an 'event' discriminator");
        return None;
    };

    match event_name {
        EVENT_CREATED | EVENT_RESUMED => Some(TurnEvent::TurnStarted {
            conversation_id: string_field(&value, "conversation_id"),
        }),
        EVENT_TEXT_DELTA => Some(TurnEvent::TextDelta {
            text: value
                .get("delta")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_owned(),
        }),
        EVENT_TEXT_COMPLETE => Some(TurnEvent::TextComplete {
            text: value
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_owned(),
        }),
        EVENT_TOOL_CALLS => {
            let calls = value
                .get("tool_calls")
                .cloned()
                .unwrap_or_else(|| Value::Array(Vec::new()));
            match serde_json::from_value::<Vec<ToolCallDecl>>(calls) {
                Ok(calls) => Some(TurnEvent::ToolCallsDeclared { calls }),
                Err(error) => {
                    warn!(%error, "skipping malformed tool call declaration");
                    None
                }
            }
        }
        EVENT_TOOL => {
            let Some(tool_call_id) = string_field(&value, "tool_call_id") else {
                warn!("skipping tool result without a tool_call_id");
                return None;
            };
            Some(TurnEvent::ToolResult {
                tool_call_id,
                tool_name: string_field(&value, "tool_name"),
                args: value.get("args").cloned(),
                content: value.get("content").cloned().unwrap_or(Value::Null),
                status: value
                    .get("status")
                    .and_then(Value::as_str)
                    .and_then(ToolCallStatus::parse),
            })
        }
        EVENT_INTERRUPT => match serde_json::from_value::<InterruptPayload>(value.clone()) {
            Ok(payload) => Some(TurnEvent::Interrupt { payload }),
            Err(error) => {
                warn!(%error, "skipping malformed interrupt event");
                None
            }
        },
        EVENT_COMPLETED => Some(TurnEvent::TurnCompleted),
        EVENT_ERROR => Some(TurnEvent::Error {
            message: value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("agent reported an unspecified error")
                .to_owned(),
        }),
        EVENT_UPDATE => {
            debug!("ignoring progress update event");
            None
        }
        other => {
            warn!(event = other, "ignoring unknown event type");
            None
        }
    }
}

fn string_field(value: &Value, field: &str) -> Option<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToString::to_string)
}
