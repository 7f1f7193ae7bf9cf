use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::TurnError;
use crate::events::{ToolCallDecl, TurnEvent};
use crate::interrupt::{InterruptPayload, ToolDecisionInput};
use crate::registry::ToolCallStatus;

/// Request body for the turns endpoint, for both fresh turns and resumes.
#[derive(Debug, Clone, Serialize)]
pub struct TurnRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub input: Value,
    pub stream: bool,
}

impl TurnRequest {
    pub fn open(conversation_id: Option<String>, input: Value, stream: bool) -> Self {
        Self {
            conversation_id,
            input,
            stream,
        }
    }

    /// Resume body: a single tool decision addressed to the paused call.
    pub fn resume(
        conversation_id: String,
        decision: ToolDecisionInput,
        stream: bool,
    ) -> Result<Self, TurnError> {
        Ok(Self {
            conversation_id: Some(conversation_id),
            input: Value::Array(vec![serde_json::to_value(decision)?]),
            stream,
        })
    }
}

/// Non-streaming body returned when `stream` is false: the already-assembled
/// turn as an output list plus any interrupts raised before the pause.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchResponse {
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub output: Vec<BatchOutputItem>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub interrupts: Vec<InterruptPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchOutputItem {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallDecl>>,
    #[serde(default)]
    pub tool_call_id: Option<String>,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub args: Option<Value>,
    #[serde(default)]
    pub status: Option<String>,
}

impl BatchResponse {
    /// Lower the batch shape onto the same event sequence a stream would
    /// produce, so the assembler is the single reconstruction path.
    pub fn into_events(self) -> Vec<TurnEvent> {
        let mut events = vec![TurnEvent::TurnStarted {
            conversation_id: self.conversation_id,
        }];

        for item in self.output {
            match item.role.as_str() {
                "assistant" => {
                    if let Some(text) = item.content.as_str() {
                        if !text.is_empty() {
                            events.push(TurnEvent::TextComplete {
                                text: text.to_owned(),
                            });
                        }
                    }
                    if let Some(calls) = item.tool_calls {
                        if !calls.is_empty() {
                            events.push(TurnEvent::ToolCallsDeclared { calls });
                        }
                    }
                }
                "tool" => {
                    let Some(tool_call_id) = item.tool_call_id else {
                        warn!("skipping tool output item without a tool_call_id");
                        continue;
                    };
                    events.push(TurnEvent::ToolResult {
                        tool_call_id,
                        tool_name: item.tool_name,
                        args: item.args,
                        content: item.content,
                        status: item.status.as_deref().and_then(ToolCallStatus::parse),
                    });
                }
                role => {
                    debug!(role, "skipping batch output item with unhandled role");
                }
            }
        }

        let interrupted = !self.interrupts.is_empty();
        for payload in self.interrupts {
            events.push(TurnEvent::Interrupt { payload });
        }

        match self.status.as_deref() {
            Some("failed") | Some("error") => {
                events.push(TurnEvent::Error {
                    message: "turn failed".to_owned(),
                });
            }
            // An interrupted batch ends suspended, not completed.
            _ if interrupted => {}
            _ => events.push(TurnEvent::TurnCompleted),
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{BatchResponse, TurnRequest};
    use crate::events::TurnEvent;
    use crate::interrupt::ToolDecisionInput;
    use crate::registry::ToolCallStatus;

    #[test]
    fn resume_request_serializes_a_tagged_decision_list() {
        let request = TurnRequest::resume(
            "c1".to_owned(),
            ToolDecisionInput {
                tool_call_id: "t1".to_owned(),
                decision: "reject".to_owned(),
                args: None,
                message: Some("not now".to_owned()),
            },
            true,
        )
        .expect("serializable decision");

        let body = serde_json::to_value(&request).expect("serialize");
        assert_eq!(
            body,
            json!({
                "conversation_id": "c1",
                "input": [{
                    "type": "tool_decision",
                    "tool_call_id": "t1",
                    "decision": "reject",
                    "message": "not now",
                }],
                "stream": true,
            })
        );
    }

    #[test]
    fn open_request_omits_an_unknown_conversation() {
        let request = TurnRequest::open(None, json!([{"role": "user", "content": "hi"}]), false);
        let body = serde_json::to_value(&request).expect("serialize");
        assert!(body.get("conversation_id").is_none());
        assert_eq!(body["stream"], json!(false));
    }

    #[test]
    fn batch_lowers_to_the_streaming_event_sequence() {
        let response: BatchResponse = serde_json::from_value(json!({
            "conversation_id": "c1",
            "output": [
                {"role": "assistant", "content": "Hello",
                 "tool_calls": [{"id": "t1", "name": "search", "args": {"q": "x"}}]},
                {"role": "tool", "tool_call_id": "t1", "content": "42", "status": "completed"},
                {"role": "system", "content": "ignored"},
            ],
            "status": "completed",
        }))
        .expect("batch shape");

        let events = response.into_events();
        assert_eq!(events.len(), 5);
        assert!(matches!(
            &events[0],
            TurnEvent::TurnStarted { conversation_id: Some(id) } if id == "c1"
        ));
        assert!(matches!(&events[1], TurnEvent::TextComplete { text } if text == "Hello"));
        assert!(matches!(&events[2], TurnEvent::ToolCallsDeclared { calls } if calls.len() == 1));
        assert!(matches!(
            &events[3],
            TurnEvent::ToolResult { tool_call_id, status, .. }
                if tool_call_id == "t1" && *status == Some(ToolCallStatus::Completed)
        ));
        assert!(matches!(&events[4], TurnEvent::TurnCompleted));
    }

    #[test]
    fn unknown_tool_status_strings_map_to_none() {
        let response: BatchResponse = serde_json::from_value(json!({
            "output": [
                {"role": "tool", "tool_call_id": "t1", "content": "42", "status": "weird"},
            ],
        }))
        .expect("batch shape");

        let events = response.into_events();
        assert!(matches!(
            &events[1],
            TurnEvent::ToolResult { status: None, .. }
        ));
    }

    #[test]
    fn batch_interrupts_suppress_completion() {
        let response: BatchResponse = serde_json::from_value(json!({
            "conversation_id": "c1",
            "output": [{"role": "assistant", "content": "Checking."}],
            "interrupts": [{
                "interrupt_id": "i1",
                "action": "write",
                "args": {"path": "a"},
            }],
        }))
        .expect("batch shape");

        let events = response.into_events();
        assert!(matches!(
            events.last(),
            Some(TurnEvent::Interrupt { .. })
        ));
        assert!(!events
            .iter()
            .any(|event| matches!(event, TurnEvent::TurnCompleted)));
    }

    #[test]
    fn failed_batch_status_becomes_a_terminal_error() {
        let response: BatchResponse = serde_json::from_value(json!({
            "output": [],
            "status": "failed",
        }))
        .expect("batch shape");

        let events = response.into_events();
        assert!(matches!(events.last(), Some(TurnEvent::Error { .. })));
    }
}
