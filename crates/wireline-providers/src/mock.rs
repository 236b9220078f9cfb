//! Scripted transport for testing.
//!
//! [`MockTransport`] replays a queue of canned replies and records every
//! request it receives, so tests can assert on both the parameters the adapter
//! built and the response it assembled.
//!
//! # Example
//!
//! ```rust,ignore
//! use wireline_providers::mock::{MockChunk, MockTransport};
//!
//! // Plain reply
//! let transport = MockTransport::new()
//!     .with_reply(json!({"choices": [{"message": {"content": "Hi"}}]}));
//!
//! // Streamed reply
//! let transport = MockTransport::new().with_chunks(vec![
//!     MockChunk::content("Hel"),
//!     MockChunk::content("lo"),
//!     MockChunk::usage(10, 11, 12),
//! ]);
//! ```

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::transport::{ChatTransport, ChunkSink};

/// Which transport entry point a request went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Chat,
    ChatStream,
    Embeddings,
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub endpoint: Endpoint,
    pub params: Value,
}

#[derive(Debug, Clone)]
pub enum MockReply {
    /// One JSON body. A streaming request receives it as a single chunk.
    Json(Value),
    /// A sequence of stream chunks.
    Chunks(Vec<Value>),
    /// A transport-level failure.
    Failure(String),
}

#[derive(Debug, Default)]
pub struct MockTransport {
    replies: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(self, body: Value) -> Self {
        self.push(MockReply::Json(body))
    }

    pub fn with_chunks(self, chunks: Vec<Value>) -> Self {
        self.push(MockReply::Chunks(chunks))
    }

    pub fn with_failure(self, message: &str) -> Self {
        self.push(MockReply::Failure(message.to_string()))
    }

    fn push(self, reply: MockReply) -> Self {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply);
        self
    }

    /// Every request seen so far, oldest first.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn last_params(&self) -> Option<Value> {
        self.requests().pop().map(|r| r.params)
    }

    fn record(&self, endpoint: Endpoint, params: Value) -> Result<MockReply> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedRequest { endpoint, params });
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .ok_or_else(|| anyhow!("MockTransport has no scripted reply left"))
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn chat(&self, params: Value) -> Result<Value> {
        match self.record(Endpoint::Chat, params)? {
            MockReply::Json(body) => Ok(body),
            MockReply::Chunks(_) => Err(anyhow!("scripted a stream for a non-streaming call")),
            MockReply::Failure(message) => Err(anyhow!(message)),
        }
    }

    async fn chat_stream(&self, params: Value, on_chunk: ChunkSink<'_>) -> Result<()> {
        match self.record(Endpoint::ChatStream, params)? {
            MockReply::Json(body) => on_chunk(body),
            MockReply::Chunks(chunks) => {
                for chunk in chunks {
                    on_chunk(chunk);
                }
            }
            MockReply::Failure(message) => return Err(anyhow!(message)),
        }
        Ok(())
    }

    async fn embeddings(&self, params: Value) -> Result<Value> {
        match self.record(Endpoint::Embeddings, params)? {
            MockReply::Json(body) => Ok(body),
            MockReply::Chunks(_) => Err(anyhow!("scripted a stream for an embeddings call")),
            MockReply::Failure(message) => Err(anyhow!(message)),
        }
    }
}

/// Builders for vendor-shaped stream chunks.
pub struct MockChunk;

impl MockChunk {
    /// Text fragment for choice 0.
    pub fn content(text: &str) -> Value {
        Self::delta(json!({ "content": text }))
    }

    /// Function-call fragment for choice 0.
    pub fn function_call(fragment: Value) -> Value {
        Self::delta(json!({ "function_call": fragment }))
    }

    /// Correlation id with no function-call index.
    pub fn correlation_id(id: &str) -> Value {
        Self::delta(json!({ "tool_call_id": id }))
    }

    pub fn finished(reason: &str) -> Value {
        json!({
            "id": "chatcmpl-mock",
            "choices": [{ "index": 0, "delta": {}, "finish_reason": reason }],
        })
    }

    /// Trailing usage-only chunk.
    pub fn usage(prompt_tokens: u64, completion_tokens: u64, total_tokens: u64) -> Value {
        json!({
            "usage": {
                "prompt_tokens": prompt_tokens,
                "completion_tokens": completion_tokens,
                "total_tokens": total_tokens,
            }
        })
    }

    pub fn delta(delta: Value) -> Value {
        json!({
            "id": "chatcmpl-mock",
            "choices": [{ "index": 0, "delta": delta }],
        })
    }
}
