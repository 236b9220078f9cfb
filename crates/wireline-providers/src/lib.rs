mod collector;
mod error;
mod message;
mod response;
mod streaming;

pub mod assembler;
pub mod compat;
pub mod embedding;
pub mod mock;
pub mod transport;

pub use assembler::{accumulate, ResponseChunk, ToolCallAssembler};
pub use collector::StreamCollector;
pub use compat::{ChatRequest, CompatProvider, CompletionOptions, ProviderSettings};
pub use embedding::EmbeddingModels;
pub use error::{ProviderError, Result};
pub use message::{Message, Role};
pub use mock::MockTransport;
pub use response::ApiResponse;
pub use streaming::{decode_utf8_streaming, is_incomplete_json_error};
pub use transport::{ChatTransport, ChunkSink, HttpTransport};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

/// Callback that sees every raw chunk of a streamed chat call.
pub type ChunkObserver<'a> = &'a mut (dyn FnMut(&Value) + Send);

/// Trait the assistant framework talks to.
#[async_trait::async_trait]
pub trait LLMProvider: Send + Sync {
    /// Non-streaming chat; the reply is passed through untouched.
    async fn chat(&self, request: ChatRequest) -> Result<ApiResponse>;

    /// Streaming chat; `on_chunk` sees every chunk as it arrives and the
    /// returned response is synthesized from the whole stream.
    async fn chat_streaming(
        &self,
        request: ChatRequest,
        on_chunk: ChunkObserver<'_>,
    ) -> Result<ApiResponse>;

    /// Single-prompt completion routed through the chat endpoint.
    async fn complete(&self, prompt: &str, options: CompletionOptions) -> Result<ApiResponse>;

    /// Embed `text`, optionally with a specific model and end-user id.
    async fn embed(
        &self,
        text: &str,
        model: Option<&str>,
        user: Option<&str>,
    ) -> Result<ApiResponse>;

    /// Concise summary of `text`.
    async fn summarize(&self, text: &str) -> Result<ApiResponse>;

    /// Get the provider name
    fn name(&self) -> &str;

    /// Model used when a request does not name one
    fn default_model(&self) -> &str;
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// Serialized JSON arguments. Structured values are accepted on input and
    /// stored in their canonical string form.
    #[serde(default, deserialize_with = "deserialize_arguments")]
    pub arguments: String,
}

/// Tool definition offered to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl Tool {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    pub fn to_wire(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

/// Token accounting as reported by the vendor. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

/// Canonical string form of a tool-call argument payload.
///
/// Strings are taken as-is (they are either complete JSON or a streamed
/// fragment of it). Anything structured is serialized with object keys
/// sorted at every level, so equal objects always produce equal strings.
pub(crate) fn arguments_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(canonicalize(other).to_string()),
    }
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), canonicalize(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

fn deserialize_arguments<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(arguments_to_string(&value).unwrap_or_default())
}
