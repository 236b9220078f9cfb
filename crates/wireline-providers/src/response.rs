use serde_json::Value;

use crate::ToolCall;

/// Uniform view over a vendor reply.
///
/// Wraps the payload untouched; every accessor is a read that returns `None`
/// when the vendor left the field out.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    raw: Value,
}

impl ApiResponse {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn into_raw(self) -> Value {
        self.raw
    }

    pub fn model_name(&self) -> Option<&str> {
        self.raw.get("model").and_then(Value::as_str)
    }

    /// The `choices` array verbatim.
    pub fn completions(&self) -> &[Value] {
        self.raw
            .get("choices")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn first_completion_text(&self) -> Option<&str> {
        self.completions()
            .first()?
            .pointer("/message/content")?
            .as_str()
    }

    pub fn chat_completion_text(&self) -> Option<&str> {
        self.first_completion_text()
    }

    pub fn completion(&self) -> Option<&str> {
        self.first_completion_text()
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.completions().first()?.get("finish_reason")?.as_str()
    }

    /// Tool calls of the first choice, decoded. Malformed entries are skipped.
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.completions()
            .first()
            .and_then(|choice| choice.pointer("/message/tool_calls"))
            .and_then(Value::as_array)
            .map(|calls| {
                calls
                    .iter()
                    .filter_map(|call| serde_json::from_value(call.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn prompt_tokens(&self) -> Option<u64> {
        self.usage_field("prompt_tokens")
    }

    pub fn completion_tokens(&self) -> Option<u64> {
        self.usage_field("completion_tokens")
    }

    pub fn total_tokens(&self) -> Option<u64> {
        self.usage_field("total_tokens")
    }

    /// First vector of an embeddings reply.
    pub fn embedding(&self) -> Option<Vec<f64>> {
        self.embeddings().into_iter().next()
    }

    /// Every vector of an embeddings reply, in `data` order.
    pub fn embeddings(&self) -> Vec<Vec<f64>> {
        self.raw
            .get("data")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get("embedding")?.as_array())
                    .map(|vector| vector.iter().filter_map(Value::as_f64).collect())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn usage_field(&self, key: &str) -> Option<u64> {
        self.raw.get("usage")?.get(key)?.as_u64()
    }
}

impl From<Value> for ApiResponse {
    fn from(raw: Value) -> Self {
        Self::new(raw)
    }
}
