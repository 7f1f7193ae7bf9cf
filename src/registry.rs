use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Lifecycle status of one tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Pending,
    Executing,
    Completed,
    Rejected,
    Error,
}

impl ToolCallStatus {
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "pending" => Self::Pending,
            "executing" => Self::Executing,
            "completed" => Self::Completed,
            "rejected" => Self::Rejected,
            "error" => Self::Error,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
            Self::Error => "error",
        }
    }
}

/// One tracked tool invocation.
///
/// Identity key: `id` when present, otherwise the structural key
/// `(name, canonical-JSON(args))`. No two records in the registry share an
/// identity key; later arrivals merge into the existing record.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRecord {
    pub id: Option<String>,
    pub name: String,
    pub args: Value,
    pub status: ToolCallStatus,
    pub content: Option<Value>,
}

/// Result fields reported for a tool invocation.
#[derive(Debug, Clone, Default)]
pub struct ToolOutcome {
    pub content: Value,
    pub status: Option<ToolCallStatus>,
    pub tool_name: Option<String>,
    pub args: Option<Value>,
}

/// Registry effect of an interrupt decision.
#[derive(Debug, Clone, PartialEq)]
pub enum DecisionEffect {
    /// The call is approved and handed back to the server to run.
    Accept,
    /// Approved with replacement arguments.
    Edit(Value),
    Reject,
}

/// Tool invocation bookkeeping for one turn, in first-declared order.
#[derive(Debug, Default)]
pub struct ToolCallRegistry {
    records: Vec<ToolCallRecord>,
}

impl ToolCallRegistry {
    /// Insert or update a declaration in `pending` status.
    ///
    /// A matching identity key overwrites the stored args instead of
    /// appending; a structural match without an id adopts a newly supplied
    /// id so later id-keyed arrivals land on the same record.
    pub fn declare(&mut self, id: Option<String>, name: &str, args: Value) {
        let id = sanitize_id(id);
        if let Some(index) = self.find_index(id.as_deref(), name, &args) {
            let record = &mut self.records[index];
            record.args = args;
            if record.id.is_none() {
                record.id = id;
            }
            return;
        }

        self.records.push(ToolCallRecord {
            id,
            name: name.to_owned(),
            args,
            status: ToolCallStatus::Pending,
            content: None,
        });
    }

    /// Record a result for `tool_call_id`, matching by id first and by
    /// structural key second. Results can precede declarations (notably on
    /// resumed turns), in which case a completed record is synthesized.
    pub fn record_result(&mut self, tool_call_id: &str, outcome: ToolOutcome) {
        let index = self
            .records
            .iter()
            .position(|record| record.id.as_deref() == Some(tool_call_id))
            .or_else(|| match (&outcome.tool_name, &outcome.args) {
                (Some(name), Some(args)) => self.structural_index(name, args),
                _ => None,
            });

        match index {
            Some(index) => {
                let record = &mut self.records[index];
                record.content = Some(outcome.content);
                record.status = outcome.status.unwrap_or(ToolCallStatus::Completed);
                if let Some(name) = outcome.tool_name {
                    record.name = name;
                }
                if let Some(args) = outcome.args {
                    record.args = args;
                }
                if record.id.is_none() {
                    record.id = Some(tool_call_id.to_owned());
                }
            }
            None => self.records.push(ToolCallRecord {
                id: Some(tool_call_id.to_owned()),
                name: outcome.tool_name.unwrap_or_default(),
                args: outcome.args.unwrap_or(Value::Null),
                status: outcome.status.unwrap_or(ToolCallStatus::Completed),
                content: Some(outcome.content),
            }),
        }
    }

    /// Apply a human decision to the matching record in place. Unknown ids
    /// are logged and ignored.
    pub fn apply_decision(&mut self, tool_call_id: &str, effect: &DecisionEffect) {
        let Some(record) = self
            .records
            .iter_mut()
            .find(|record| record.id.as_deref() == Some(tool_call_id))
        else {
            warn!(tool_call_id, "ignoring decision for unknown tool call");
            return;
        };

        match effect {
            DecisionEffect::Accept => record.status = ToolCallStatus::Executing,
            DecisionEffect::Edit(args) => {
                record.args = args.clone();
                record.status = ToolCallStatus::Executing;
            }
            DecisionEffect::Reject => record.status = ToolCallStatus::Rejected,
        }
    }

    /// Records in first-declared order. Deduplication is maintained at
    /// insert time, so re-querying before the next mutation yields the same
    /// sequence.
    pub fn list(&self) -> impl Iterator<Item = &ToolCallRecord> + '_ {
        self.records.iter()
    }

    pub fn find_by_id(&self, tool_call_id: &str) -> Option<&ToolCallRecord> {
        self.records
            .iter()
            .find(|record| record.id.as_deref() == Some(tool_call_id))
    }

    pub fn find_structural(&self, name: &str, args: &Value) -> Option<&ToolCallRecord> {
        self.structural_index(name, args)
            .map(|index| &self.records[index])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    fn find_index(&self, id: Option<&str>, name: &str, args: &Value) -> Option<usize> {
        if let Some(id) = id {
            if let Some(index) = self
                .records
                .iter()
                .position(|record| record.id.as_deref() == Some(id))
            {
                return Some(index);
            }
        }

        let key = canonical_args(args);
        self.records.iter().position(|record| {
            (record.id.is_none() || id.is_none())
                && record.name == name
                && canonical_args(&record.args) == key
        })
    }

    fn structural_index(&self, name: &str, args: &Value) -> Option<usize> {
        let key = canonical_args(args);
        self.records
            .iter()
            .position(|record| record.name == name && canonical_args(&record.args) == key)
    }
}

/// Canonical JSON for structural identity keys: object keys serialized in
/// sorted order at every depth, independent of map ordering.
pub fn canonical_args(value: &Value) -> String {
    fn write(value: &Value, out: &mut String) {
        match value {
            Value::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                out.push('{');
                for (index, key) in keys.iter().enumerate() {
                    if index > 0 {
                        out.push(',');
                    }
                    out.push_str(&Value::String((*key).clone()).to_string());
                    out.push(':');
                    write(&map[key.as_str()], out);
                }
                out.push('}');
            }
            Value::Array(items) => {
                out.push('[');
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        out.push(',');
                    }
                    write(item, out);
                }
                out.push(']');
            }
            other => out.push_str(&other.to_string()),
        }
    }

    let mut out = String::new();
    write(value, &mut out);
    out
}

fn sanitize_id(id: Option<String>) -> Option<String> {
    id.map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}
