//! Conversation turns and their vendor wire form.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use serde_json::{json, Value};

use crate::error::{ProviderError, Result};
use crate::ToolCall;

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    System,
    Assistant,
    User,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::Assistant => "assistant",
            Role::User => "user",
            Role::Tool => "tool",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "system" => Ok(Role::System),
            "assistant" => Ok(Role::Assistant),
            "user" => Ok(Role::User),
            "tool" => Ok(Role::Tool),
            other => Err(ProviderError::InvalidRole(other.to_string())),
        }
    }
}

/// One turn of a conversation.
///
/// Immutable once built: the builder-style `with_*` methods consume and return
/// the message, and the fields are only readable through accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    role: Role,
    content: String,
    image_ref: Option<String>,
    tool_calls: Vec<ToolCall>,
    tool_call_id: Option<String>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            image_ref: None,
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Assistant turn that requested tool invocations.
    pub fn assistant_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self::new(Role::Assistant, String::new()).with_tool_calls(tool_calls)
    }

    /// Result of a tool invocation, answering the call with `tool_call_id`.
    /// Structured results are stringified before storage.
    pub fn tool_result(tool_call_id: impl Into<String>, result: &Value) -> Self {
        Self::new(Role::Tool, stringify_content(result)).with_tool_call_id(tool_call_id)
    }

    /// Build a message from loosely-typed parts, as handed over by a caller
    /// that keeps its history as raw JSON.
    ///
    /// Fails with [`ProviderError::InvalidRole`] for an unknown role and with
    /// [`ProviderError::InvalidToolCalls`] when `tool_calls` is not an array of
    /// tool-call objects.
    pub fn from_parts(
        role: &str,
        content: Option<&Value>,
        image_ref: Option<&str>,
        tool_calls: Option<&Value>,
        tool_call_id: Option<&str>,
    ) -> Result<Self> {
        let role: Role = role.parse()?;
        let tool_calls = match tool_calls {
            None | Some(Value::Null) => Vec::new(),
            Some(value) => parse_tool_calls(value)?,
        };

        Ok(Self {
            role,
            content: content.map(stringify_content).unwrap_or_default(),
            image_ref: image_ref.map(str::to_string),
            tool_calls,
            tool_call_id: tool_call_id.map(str::to_string),
        })
    }

    pub fn with_image(mut self, image_ref: impl Into<String>) -> Self {
        self.image_ref = Some(image_ref.into());
        self
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    pub fn with_tool_call_id(mut self, tool_call_id: impl Into<String>) -> Self {
        self.tool_call_id = Some(tool_call_id.into());
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn image_ref(&self) -> Option<&str> {
        self.image_ref.as_deref()
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        &self.tool_calls
    }

    pub fn tool_call_id(&self) -> Option<&str> {
        self.tool_call_id.as_deref()
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }

    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }

    pub fn is_tool(&self) -> bool {
        self.role == Role::Tool
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    /// True for anything the model itself emitted, tool-call turns included.
    pub fn produced_by_model(&self) -> bool {
        self.is_assistant()
    }

    /// The JSON object the vendor expects for this turn.
    pub fn to_wire(&self) -> Value {
        match self.role {
            // The vendor rejects content next to tool_calls, so it is dropped.
            Role::Assistant if !self.tool_calls.is_empty() => json!({
                "role": "assistant",
                "tool_calls": self.tool_calls,
            }),
            Role::Assistant => json!({
                "role": "assistant",
                "content": self.content,
            }),
            Role::System => json!({
                "role": "system",
                "content": self.content,
            }),
            Role::Tool => match &self.tool_call_id {
                Some(id) => json!({
                    "role": "tool",
                    "tool_call_id": id,
                    "content": self.content,
                }),
                None => json!({
                    "role": "tool",
                    "content": self.content,
                }),
            },
            Role::User => match &self.image_ref {
                Some(url) => json!({
                    "role": "user",
                    "content": [
                        { "type": "text", "text": self.content },
                        { "type": "image_url", "image_url": { "url": url } },
                    ],
                }),
                None => json!({
                    "role": "user",
                    "content": self.content,
                }),
            },
        }
    }
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_wire().serialize(serializer)
    }
}

fn stringify_content(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn parse_tool_calls(value: &Value) -> Result<Vec<ToolCall>> {
    let Value::Array(items) = value else {
        return Err(ProviderError::InvalidToolCalls(format!(
            "expected an array of tool calls, got {}",
            json_kind(value)
        )));
    };

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            if !item.is_object() {
                return Err(ProviderError::InvalidToolCalls(format!(
                    "tool_calls[{}] is {}, expected an object",
                    i,
                    json_kind(item)
                )));
            }
            serde_json::from_value(item.clone()).map_err(|e| {
                ProviderError::InvalidToolCalls(format!("tool_calls[{}]: {}", i, e))
            })
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FunctionCall;

    fn weather_call() -> ToolCall {
        ToolCall {
            id: Some("call_1".to_string()),
            kind: Some("function".to_string()),
            function: FunctionCall {
                name: "get_weather".to_string(),
                arguments: r#"{"city":"Paris"}"#.to_string(),
            },
        }
    }

    #[test]
    fn test_every_role_serializes_its_wire_name() {
        for role in [Role::System, Role::Assistant, Role::User, Role::Tool] {
            let wire = Message::new(role, "hi").to_wire();
            assert_eq!(wire["role"], role.as_str());
            assert!(
                wire.get("tool_calls").is_none(),
                "{} message without tool calls must not carry tool_calls",
                role
            );
        }
    }

    #[test]
    fn test_assistant_with_tool_calls_omits_content() {
        let msg = Message::new(Role::Assistant, "thinking...").with_tool_calls(vec![weather_call()]);
        let wire = msg.to_wire();

        assert_eq!(wire["role"], "assistant");
        assert!(wire.get("content").is_none());
        assert_eq!(wire["tool_calls"][0]["id"], "call_1");
        assert_eq!(wire["tool_calls"][0]["type"], "function");
        assert_eq!(wire["tool_calls"][0]["function"]["name"], "get_weather");
    }

    #[test]
    fn test_tool_message_carries_call_id() {
        let msg = Message::tool_result("call_1", &json!({"temp": 21}));
        assert_eq!(
            msg.to_wire(),
            json!({"role": "tool", "tool_call_id": "call_1", "content": "{\"temp\":21}"})
        );
    }

    #[test]
    fn test_tool_message_without_call_id_omits_key() {
        let msg = Message::new(Role::Tool, "done");
        let wire = msg.to_wire();
        assert_eq!(wire, json!({"role": "tool", "content": "done"}));
        assert!(wire.get("tool_call_id").is_none());
    }

    #[test]
    fn test_user_image_becomes_content_parts() {
        let wire = Message::user("what is this?")
            .with_image("https://img.example/cat.png")
            .to_wire();
        assert_eq!(wire["content"][0]["text"], "what is this?");
        assert_eq!(wire["content"][1]["image_url"]["url"], "https://img.example/cat.png");
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let err = Message::from_parts("narrator", None, None, None, None).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRole(ref r) if r == "narrator"));

        let err = "Assistant".parse::<Role>().unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRole(_)));
    }

    #[test]
    fn test_tool_calls_must_be_array_of_objects() {
        let not_array = json!({"id": "call_1"});
        let err = Message::from_parts("assistant", None, None, Some(&not_array), None).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidToolCalls(_)));

        let strings = json!(["get_weather"]);
        let err = Message::from_parts("assistant", None, None, Some(&strings), None).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidToolCalls(_)));

        let missing_function = json!([{"id": "call_1"}]);
        let err =
            Message::from_parts("assistant", None, None, Some(&missing_function), None).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidToolCalls(_)));
    }

    #[test]
    fn test_from_parts_coerces_structured_content() {
        let calls = json!([{
            "id": "call_9",
            "type": "function",
            "function": {"name": "lookup", "arguments": {"q": "rust"}}
        }]);
        let msg = Message::from_parts(
            "assistant",
            Some(&json!(null)),
            None,
            Some(&calls),
            None,
        )
        .unwrap();

        assert_eq!(msg.content(), "");
        assert_eq!(msg.tool_calls()[0].function.arguments, r#"{"q":"rust"}"#);

        let tool = Message::from_parts("tool", Some(&json!([1, 2])), None, None, Some("call_9")).unwrap();
        assert_eq!(tool.content(), "[1,2]");
        assert_eq!(tool.tool_call_id(), Some("call_9"));
    }

    #[test]
    fn test_predicates() {
        let assistant = Message::assistant_tool_calls(vec![weather_call()]);
        assert!(assistant.is_assistant());
        assert!(assistant.produced_by_model());
        assert!(!assistant.is_user());

        assert!(Message::system("rules").is_system());
        assert!(Message::user("hi").is_user());
        assert!(Message::tool_result("c", &json!("ok")).is_tool());
        assert!(!Message::user("hi").produced_by_model());
    }

    #[test]
    fn test_serialize_matches_wire_form() {
        let msg = Message::user("Hello");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json, json!({"role": "user", "content": "Hello"}));
    }
}
