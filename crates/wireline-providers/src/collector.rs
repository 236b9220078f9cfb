use std::collections::BTreeMap;

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::assembler::{ResponseChunk, ToolCallAssembler};
use crate::compat::api_error_from_body;
use crate::error::ProviderError;
use crate::Usage;

#[derive(Debug, Default)]
struct ChoiceState {
    role: Option<String>,
    content: String,
    finish_reason: Option<String>,
    tool_calls: ToolCallAssembler,
}

/// Per-call accumulation of a streamed chat reply.
///
/// Collects text, role and finish reason per choice index, the last usage
/// report, and one [`ToolCallAssembler`] per choice. [`finish`] turns it into
/// the payload a non-streamed call would have returned.
///
/// [`finish`]: StreamCollector::finish
#[derive(Debug)]
pub struct StreamCollector {
    provider: String,
    requested_model: String,
    id: Option<String>,
    model: Option<String>,
    usage: Option<Usage>,
    choices: BTreeMap<usize, ChoiceState>,
    error: Option<ProviderError>,
    chunk_count: usize,
}

impl StreamCollector {
    pub fn new(provider: impl Into<String>, requested_model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            requested_model: requested_model.into(),
            id: None,
            model: None,
            usage: None,
            choices: BTreeMap::new(),
            error: None,
            chunk_count: 0,
        }
    }

    /// Feed one raw chunk exactly as the transport delivered it.
    pub fn push_raw(&mut self, raw: &Value) {
        self.chunk_count += 1;

        if let Some(err) = api_error_from_body(raw, &self.provider) {
            debug!("Stream carried an error body at chunk {}", self.chunk_count);
            if self.error.is_none() {
                self.error = Some(err);
            }
            return;
        }

        match ResponseChunk::deserialize_lenient(raw) {
            Some(chunk) => self.push(&chunk),
            None => debug!("Ignoring undecodable chunk {}: {}", self.chunk_count, raw),
        }
    }

    /// Feed one decoded chunk.
    pub fn push(&mut self, chunk: &ResponseChunk) {
        if self.id.is_none() {
            self.id = chunk.id.clone().filter(|id| !id.is_empty());
        }
        if let Some(model) = chunk.model.as_ref().filter(|m| !m.is_empty()) {
            self.model = Some(model.clone());
        }
        if let Some(usage) = &chunk.usage {
            self.usage = Some(usage.clone());
        }

        for choice in &chunk.choices {
            let state = self.choices.entry(choice.index).or_default();
            let delta = &choice.delta;

            if let Some(role) = delta.role.as_ref().filter(|r| !r.is_empty()) {
                state.role = Some(role.clone());
            }
            if let Some(content) = &delta.content {
                state.content.push_str(content);
            }
            if state.finish_reason.is_none() {
                state.finish_reason = choice.finish_reason.clone();
            }
            state.tool_calls.push_delta(delta);
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    /// Synthesize the final payload, or return the error body the stream carried.
    pub fn finish(self) -> Result<Value, ProviderError> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let choices: Vec<Value> = self
            .choices
            .into_iter()
            .map(|(index, state)| {
                let tool_calls = state.tool_calls.finish().filter(|calls| !calls.is_empty());

                let mut message = Map::new();
                message.insert(
                    "role".to_string(),
                    json!(state.role.unwrap_or_else(|| "assistant".to_string())),
                );
                let content = if state.content.is_empty() && tool_calls.is_some() {
                    Value::Null
                } else {
                    Value::String(state.content)
                };
                message.insert("content".to_string(), content);
                if let Some(calls) = tool_calls {
                    message.insert("tool_calls".to_string(), json!(calls));
                }

                json!({
                    "index": index,
                    "message": message,
                    "finish_reason": state.finish_reason,
                })
            })
            .collect();

        let mut payload = json!({
            "id": self
                .id
                .unwrap_or_else(|| format!("chatcmpl-{}", uuid::Uuid::new_v4())),
            "object": "chat.completion",
            "created": chrono::Utc::now().timestamp(),
            "model": self.model.unwrap_or(self.requested_model),
            "choices": choices,
        });
        if let Some(usage) = self.usage {
            payload["usage"] = json!(usage);
        }

        Ok(payload)
    }
}
