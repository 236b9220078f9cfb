//! HTTP transport for the vendor API.
//!
//! [`ChatTransport`] is the seam between the adapter and whatever actually
//! moves bytes. [`HttpTransport`] is the `reqwest` implementation; tests use
//! [`crate::MockTransport`].

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures_util::stream::StreamExt;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::streaming::{SseDecoder, SseEvent};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Per-chunk callback driven by a streaming transport.
pub type ChunkSink<'a> = &'a mut (dyn FnMut(Value) + Send);

#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a chat request and return the reply body.
    async fn chat(&self, params: Value) -> Result<Value>;

    /// Send a streaming chat request, calling `on_chunk` once per decoded
    /// chunk in delivery order. Returns once the stream has ended.
    async fn chat_stream(&self, params: Value, on_chunk: ChunkSink<'_>) -> Result<()>;

    /// Send an embeddings request and return the reply body.
    async fn embeddings(&self, params: Value) -> Result<Value>;
}

#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    api_key: String,
    base_url: String,
}

impl HttpTransport {
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout.unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)))
            .build()
            .context("Failed to build HTTP client")?;

        let base_url = base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client,
            api_key,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post(&self, path: &str, params: &Value, stream: bool) -> Result<reqwest::Response> {
        let url = format!("{}/{}", self.base_url, path);
        debug!("POST {}", url);

        let mut request = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(params);
        if stream {
            request = request.header("Accept", "text/event-stream");
        }

        request
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))
    }

    async fn read_json(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        if !status.is_success() {
            debug!("Vendor replied {}: {}", status, text);
            return Ok(error_body(status, &text));
        }

        serde_json::from_str(&text)
            .with_context(|| format!("Vendor returned a non-JSON body: {}", truncate(&text, 200)))
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn chat(&self, params: Value) -> Result<Value> {
        let response = self.post("chat/completions", &params, false).await?;
        Self::read_json(response).await
    }

    async fn chat_stream(&self, params: Value, on_chunk: ChunkSink<'_>) -> Result<()> {
        let response = self.post("chat/completions", &params, true).await?;

        let is_event_stream = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("text/event-stream"))
            .unwrap_or(false);

        // Errors (and some vendor replies) arrive as one plain JSON body
        if !response.status().is_success() || !is_event_stream {
            let body = Self::read_json(response).await?;
            on_chunk(body);
            return Ok(());
        }

        let mut stream = response.bytes_stream();
        let mut decoder = SseDecoder::new();
        let mut chunk_count = 0usize;

        while let Some(chunk_result) = stream.next().await {
            let bytes = chunk_result.map_err(|e| {
                error!("Stream error at chunk {}: {}", chunk_count, e);
                anyhow!("Stream error: {}", e)
            })?;

            for event in decoder.push(&bytes) {
                match event {
                    SseEvent::Data(value) => {
                        chunk_count += 1;
                        on_chunk(value);
                    }
                    SseEvent::Done => {
                        debug!("Stream completed after {} chunks", chunk_count);
                        return Ok(());
                    }
                }
            }
        }

        if let Some(SseEvent::Data(value)) = decoder.finish() {
            chunk_count += 1;
            on_chunk(value);
        }
        debug!("Stream ended without [DONE] after {} chunks", chunk_count);
        Ok(())
    }

    async fn embeddings(&self, params: Value) -> Result<Value> {
        let response = self.post("embeddings", &params, false).await?;
        Self::read_json(response).await
    }
}

/// Shape a failed HTTP reply as a `{status, message}` body so the adapter
/// treats transport-level and body-level failures alike.
fn error_body(status: StatusCode, text: &str) -> Value {
    let code = status.as_u16();
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(mut map)) => {
            if !map.contains_key("status") {
                let message = map
                    .get("message")
                    .and_then(Value::as_str)
                    .or_else(|| map.get("error").and_then(|e| e.get("message")).and_then(Value::as_str))
                    .or_else(|| map.get("error").and_then(Value::as_str))
                    .unwrap_or(text)
                    .to_string();
                map.insert("status".to_string(), json!(code));
                map.insert("message".to_string(), json!(message));
            }
            Value::Object(map)
        }
        _ => json!({ "status": code, "message": text }),
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
