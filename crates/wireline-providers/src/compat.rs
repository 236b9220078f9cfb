//! Client adapter for the vendor's OpenAI-compatible chat API.
//!
//! Builds request parameters, hands them to a [`ChatTransport`], and turns
//! whatever comes back into an [`ApiResponse`]. For streamed chats every
//! chunk goes both to the caller's observer and to a [`StreamCollector`];
//! once the transport reports the end of the stream the collector
//! synthesizes the payload a non-streamed call would have returned.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::collector::StreamCollector;
use crate::embedding::EmbeddingModels;
use crate::error::{ProviderError, Result};
use crate::transport::{ChatTransport, HttpTransport};
use crate::{ApiResponse, ChunkObserver, LLMProvider, Message, Tool};

pub const DEFAULT_PROVIDER_NAME: &str = "Compat";
pub const DEFAULT_CHAT_MODEL: &str = "chat-large-latest";
pub const LEGACY_COMPLETION_MODELS: &[&str] = &["chat-instruct-legacy", "text-large-001"];

const SUMMARIZE_PROMPT: &str =
    "Write a concise summary of the following:\n\n{text}\n\nCONCISE SUMMARY:";

/// Optional request parameters forwarded verbatim. Anything else a caller
/// passes is dropped.
const PASSTHROUGH_PARAMS: &[&str] = &[
    "max_tokens",
    "top_p",
    "stop",
    "seed",
    "n",
    "presence_penalty",
    "frequency_penalty",
    "response_format",
    "user",
    "random_seed",
    "safe_prompt",
    "parallel_tool_calls",
];

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// Display name, used in error messages.
    pub name: String,
    pub default_model: String,
    /// Model names `complete` silently replaces with `default_model`.
    pub legacy_models: Vec<String>,
    pub embeddings: EmbeddingModels,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_PROVIDER_NAME.to_string(),
            default_model: DEFAULT_CHAT_MODEL.to_string(),
            legacy_models: LEGACY_COMPLETION_MODELS
                .iter()
                .map(|m| m.to_string())
                .collect(),
            embeddings: EmbeddingModels::default(),
        }
    }
}

/// Options for [`LLMProvider::complete`].
#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub overrides: Map<String, Value>,
}

impl CompletionOptions {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_override(mut self, key: impl Into<String>, value: Value) -> Self {
        self.overrides.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub model: Option<String>,
    pub temperature: f64,
    pub tools: Option<Vec<Tool>>,
    pub tool_choice: Option<Value>,
    pub overrides: Map<String, Value>,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            model: None,
            temperature: 0.0,
            tools: None,
            tool_choice: None,
            overrides: Map::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// `"auto"`, `"none"`, `"any"`, or a vendor-specific object.
    pub fn with_tool_choice(mut self, tool_choice: Value) -> Self {
        self.tool_choice = Some(tool_choice);
        self
    }

    pub fn with_override(mut self, key: impl Into<String>, value: Value) -> Self {
        self.overrides.insert(key.into(), value);
        self
    }
}

pub struct CompatProvider<T = HttpTransport> {
    transport: T,
    settings: ProviderSettings,
}

impl<T: ChatTransport> CompatProvider<T> {
    pub fn new(settings: ProviderSettings, transport: T) -> Self {
        Self {
            transport,
            settings,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    /// Request body for a chat call. Fails before any I/O if `tool_choice`
    /// is given without tools.
    pub fn chat_params(&self, request: &ChatRequest) -> Result<Value> {
        let has_tools = request.tools.as_ref().is_some_and(|t| !t.is_empty());
        if request.tool_choice.is_some() && !has_tools {
            return Err(ProviderError::ArgumentConflict(
                "tool_choice requires tools to be specified".to_string(),
            ));
        }

        let mut params = json!({
            "model": self.chat_model(request),
            "messages": request.messages,
            "temperature": request.temperature,
        });

        if let Some(tools) = request.tools.as_ref().filter(|t| !t.is_empty()) {
            params["tools"] = Value::Array(tools.iter().map(Tool::to_wire).collect());
        }
        if let Some(tool_choice) = &request.tool_choice {
            params["tool_choice"] = tool_choice.clone();
        }
        apply_overrides(&mut params, &request.overrides);

        Ok(params)
    }

    /// Request body for an embeddings call.
    pub fn embed_params(&self, text: &str, model: Option<&str>, user: Option<&str>) -> Value {
        let model = model.unwrap_or_else(|| self.settings.embeddings.default_model());
        let mut params = json!({
            "input": text,
            "model": model,
        });
        if let Some(dimensions) = self.settings.embeddings.dimensions_for(model) {
            params["dimensions"] = json!(dimensions);
        }
        if let Some(user) = user {
            params["user"] = json!(user);
        }
        params
    }

    fn chat_model<'a>(&'a self, request: &'a ChatRequest) -> &'a str {
        request
            .model
            .as_deref()
            .unwrap_or(&self.settings.default_model)
    }

    fn completion_model(&self, requested: Option<&str>) -> String {
        match requested {
            Some(model) if self.settings.legacy_models.iter().any(|m| m == model) => {
                warn!(
                    "DEPRECATION WARNING: model '{}' is no longer supported by {}; using '{}' instead",
                    model, self.settings.name, self.settings.default_model
                );
                self.settings.default_model.clone()
            }
            Some(model) => model.to_string(),
            None => self.settings.default_model.clone(),
        }
    }

    fn check_reply(&self, body: Value) -> Result<ApiResponse> {
        match api_error_from_body(&body, &self.settings.name) {
            Some(err) => Err(err),
            None => Ok(ApiResponse::new(body)),
        }
    }

    async fn dispatch_chat(
        &self,
        request: ChatRequest,
        on_chunk: Option<ChunkObserver<'_>>,
    ) -> Result<ApiResponse> {
        let mut params = self.chat_params(&request)?;

        let Some(observer) = on_chunk else {
            debug!(
                "Sending chat request to {}: model={}, {} messages",
                self.settings.name,
                params["model"],
                request.messages.len()
            );
            let body = self.transport.chat(params).await?;
            return self.check_reply(body);
        };

        params["stream"] = json!(true);
        let model = self.chat_model(&request).to_string();
        debug!(
            "Sending streaming chat request to {}: model={}, {} messages",
            self.settings.name,
            model,
            request.messages.len()
        );

        let mut collector = StreamCollector::new(self.settings.name.clone(), model);
        let mut sink = |chunk: Value| {
            observer(&chunk);
            collector.push_raw(&chunk);
        };
        self.transport.chat_stream(params, &mut sink).await?;

        debug!(
            "Stream finished after {} chunks, assembling final response",
            collector.chunk_count()
        );
        let payload = collector.finish()?;
        Ok(ApiResponse::new(payload))
    }
}

#[async_trait]
impl<T: ChatTransport> LLMProvider for CompatProvider<T> {
    async fn chat(&self, request: ChatRequest) -> Result<ApiResponse> {
        self.dispatch_chat(request, None).await
    }

    async fn chat_streaming(
        &self,
        request: ChatRequest,
        on_chunk: ChunkObserver<'_>,
    ) -> Result<ApiResponse> {
        self.dispatch_chat(request, Some(on_chunk)).await
    }

    async fn complete(&self, prompt: &str, options: CompletionOptions) -> Result<ApiResponse> {
        let model = self.completion_model(options.model.as_deref());
        let mut request = ChatRequest::new(vec![Message::user(prompt)])
            .with_model(model)
            .with_temperature(options.temperature.unwrap_or(0.0));
        request.overrides = options.overrides;

        self.dispatch_chat(request, None).await
    }

    async fn embed(
        &self,
        text: &str,
        model: Option<&str>,
        user: Option<&str>,
    ) -> Result<ApiResponse> {
        let params = self.embed_params(text, model, user);
        debug!(
            "Sending embeddings request to {}: model={}",
            self.settings.name, params["model"]
        );
        let body = self.transport.embeddings(params).await?;
        self.check_reply(body)
    }

    async fn summarize(&self, text: &str) -> Result<ApiResponse> {
        let prompt = SUMMARIZE_PROMPT.replace("{text}", text);
        self.complete(&prompt, CompletionOptions::default()).await
    }

    fn name(&self) -> &str {
        &self.settings.name
    }

    fn default_model(&self) -> &str {
        &self.settings.default_model
    }
}

fn apply_overrides(params: &mut Value, overrides: &Map<String, Value>) {
    for (key, value) in overrides {
        if PASSTHROUGH_PARAMS.contains(&key.as_str()) {
            params[key.as_str()] = value.clone();
        } else {
            debug!("Ignoring unrecognized request parameter '{}'", key);
        }
    }
}

/// The vendor reports failures as a JSON body with a non-2xx `status`.
pub(crate) fn api_error_from_body(body: &Value, provider: &str) -> Option<ProviderError> {
    let status = body.get("status")?;
    let status = status
        .as_i64()
        .or_else(|| status.as_str().and_then(|s| s.trim().parse().ok()))?;
    if (200..300).contains(&status) {
        return None;
    }

    let message = match body.get("message") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };

    Some(ProviderError::Api {
        provider: provider.to_string(),
        status,
        message,
    })
}
