use serde::Serialize;
use serde::ser::Serializer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentItem {
    InputText { text: String },
    OutputText { text: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Message,
}

/// A message input item. `kind` is only set (and serialized as
/// `"type": "message"`) for profiles that wrap content in a typed layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageItem {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<MessageKind>,
    pub role: Role,
    pub content: Vec<ContentItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReasoningSummary {
    SummaryText { text: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TypedItem {
    FunctionCall {
        call_id: String,
        name: String,
        // The Responses API carries arguments as a *string* containing JSON.
        arguments: String,
    },
    FunctionCallOutput {
        call_id: String,
        output: ToolOutput,
    },
    Reasoning {
        id: String,
        summary: Vec<ReasoningSummary>,
        #[serde(skip_serializing_if = "Option::is_none")]
        encrypted_content: Option<String>,
    },
}

/// One entry of the `input` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum WireItem {
    Message(MessageItem),
    Typed(TypedItem),
}

impl WireItem {
    pub fn call_id(&self) -> Option<&str> {
        match self {
            WireItem::Typed(TypedItem::FunctionCall { call_id, .. })
            | WireItem::Typed(TypedItem::FunctionCallOutput { call_id, .. }) => Some(call_id),
            _ => None,
        }
    }

    pub fn is_reasoning(&self) -> bool {
        matches!(self, WireItem::Typed(TypedItem::Reasoning { .. }))
    }
}

/// Output produced by a tool executor. Failures are ordinary results whose
/// content describes the error, so they serialize exactly like successes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub content: String,
    pub success: Option<bool>,
}

impl ToolOutput {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            success: Some(true),
        }
    }

    pub fn failure(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            success: Some(false),
        }
    }
}

impl From<&str> for ToolOutput {
    fn from(content: &str) -> Self {
        Self {
            content: content.to_string(),
            success: None,
        }
    }
}

impl From<String> for ToolOutput {
    fn from(content: String) -> Self {
        Self {
            content,
            success: None,
        }
    }
}

// Backends reject `{ content, success }` objects for `function_call_output`;
// `output` is always a bare string and `success` stays local bookkeeping.
impl Serialize for ToolOutput {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.content)
    }
}

impl std::fmt::Display for ToolOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.content)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn serializes_failure_output_as_plain_string() {
        let item = WireItem::Typed(TypedItem::FunctionCallOutput {
            call_id: "call1".into(),
            output: ToolOutput::failure("patch did not apply"),
        });

        assert_eq!(
            serde_json::to_value(&item).unwrap(),
            json!({
                "type": "function_call_output",
                "call_id": "call1",
                "output": "patch did not apply"
            })
        );
    }

    #[test]
    fn message_kind_is_omitted_unless_set() {
        let flat = MessageItem {
            kind: None,
            role: Role::User,
            content: vec![ContentItem::InputText { text: "hi".into() }],
        };
        assert_eq!(
            serde_json::to_value(WireItem::Message(flat.clone())).unwrap(),
            json!({"role": "user", "content": [{"type": "input_text", "text": "hi"}]})
        );

        let wrapped = MessageItem {
            kind: Some(MessageKind::Message),
            ..flat
        };
        assert_eq!(
            serde_json::to_value(WireItem::Message(wrapped)).unwrap(),
            json!({
                "type": "message",
                "role": "user",
                "content": [{"type": "input_text", "text": "hi"}]
            })
        );
    }

    #[test]
    fn reasoning_item_shape() {
        let item = WireItem::Typed(TypedItem::Reasoning {
            id: "rs_1".into(),
            summary: vec![ReasoningSummary::SummaryText {
                text: "thinking".into(),
            }],
            encrypted_content: None,
        });
        assert!(item.is_reasoning());
        assert_eq!(item.call_id(), None);
        assert_eq!(
            serde_json::to_value(&item).unwrap(),
            json!({
                "type": "reasoning",
                "id": "rs_1",
                "summary": [{"type": "summary_text", "text": "thinking"}]
            })
        );

        let replayed = WireItem::Typed(TypedItem::Reasoning {
            id: "rs_2".into(),
            summary: Vec::new(),
            encrypted_content: Some("gAAAA".into()),
        });
        assert_eq!(
            serde_json::to_value(&replayed).unwrap(),
            json!({
                "type": "reasoning",
                "id": "rs_2",
                "summary": [],
                "encrypted_content": "gAAAA"
            })
        );
    }
}
