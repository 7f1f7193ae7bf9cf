use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wire payload of a human-review interrupt event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterruptPayload {
    pub interrupt_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Name of the tool whose execution is paused.
    pub action: String,
    #[serde(default)]
    pub args: Value,
    #[serde(default)]
    pub config: InterruptConfig,
    #[serde(default)]
    pub description: String,
}

/// Which decisions the server will accept for an interrupt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptConfig {
    #[serde(default)]
    pub allow_accept: bool,
    #[serde(default)]
    pub allow_edit: bool,
    #[serde(default)]
    pub allow_respond: bool,
}

/// Outstanding human-review request held while a turn is suspended.
///
/// Exactly one may be outstanding per turn; it is cleared when a decision is
/// dispatched successfully and preserved across dispatch failures so the
/// same decision can be retried.
#[derive(Debug, Clone, PartialEq)]
pub struct InterruptRequest {
    pub interrupt_id: String,
    pub tool_call_id: String,
    pub action: String,
    pub args: Value,
    pub config: InterruptConfig,
    pub description: String,
    pub conversation_id: Option<String>,
}

/// Human decision for an outstanding interrupt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Accept,
    /// `None` requests an editable view of the prior args (no network call);
    /// `Some` carries the edited JSON object text.
    Edit(Option<String>),
    /// Optional message explaining the rejection.
    Reject(Option<String>),
    /// Free-form answer to the agent; tool records are left untouched.
    Feedback(String),
}

impl Decision {
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Edit(_) => "edit",
            Self::Reject(_) => "reject",
            Self::Feedback(_) => "feedback",
        }
    }
}

/// One `tool_decision` entry of a resume request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "tool_decision")]
pub struct ToolDecisionInput {
    pub tool_call_id: String,
    pub decision: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Decision, InterruptPayload, ToolDecisionInput};

    #[test]
    fn decision_wire_names_are_stable() {
        assert_eq!(Decision::Accept.wire_name(), "accept");
        assert_eq!(Decision::Edit(None).wire_name(), "edit");
        assert_eq!(Decision::Reject(None).wire_name(), "reject");
        assert_eq!(Decision::Feedback(String::new()).wire_name(), "feedback");
    }

    #[test]
    fn tool_decision_input_serializes_with_type_tag() {
        let input = ToolDecisionInput {
            tool_call_id: "t1".into(),
            decision: "reject".into(),
            args: None,
            message: Some("too risky".into()),
        };

        let value = serde_json::to_value(&input).expect("serialize decision input");
        assert_eq!(value["type"], "tool_decision");
        assert_eq!(value["decision"], "reject");
        assert_eq!(value["message"], "too risky");
        assert!(value.get("args").is_none());
    }

    #[test]
    fn interrupt_payload_defaults_optional_fields() {
        let payload: InterruptPayload = serde_json::from_value(json!({
            "interrupt_id": "i1",
            "action": "search",
            "args": {"q": "x"},
            "config": {"allow_accept": true}
        }))
        .expect("deserialize interrupt payload");

        assert_eq!(payload.interrupt_id, "i1");
        assert!(payload.tool_call_id.is_none());
        assert!(payload.config.allow_accept);
        assert!(!payload.config.allow_edit);
        assert!(payload.description.is_empty());
    }
}
