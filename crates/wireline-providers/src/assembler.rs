//! Reconstruction of tool calls from streamed chunk fragments.
//!
//! The vendor streams a tool call as a series of sparse fragments: the name
//! may come first, the arguments token by token (or as one finished object),
//! and the correlation id often only in a later chunk that carries no index
//! at all. [`ToolCallAssembler`] merges these into the list of calls a
//! non-streamed reply would have contained.
//!
//! Merge policy, applied per fragment by [`PendingCall::merge`]:
//!
//! * the fragment's `index` selects the accumulator (when absent: 0 for a
//!   lone `function_call`, the array position inside `tool_calls`);
//! * `id`, `type` and `name` are last-non-empty-wins;
//! * string `arguments` are appended, structured `arguments` replace whatever
//!   was accumulated with their canonical serialization;
//! * a correlation id without an index goes to the most recently touched
//!   accumulator, or is held until one exists.
//!
//! Absent or empty fields never count as an update.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

use crate::{arguments_to_string, FunctionCall, ToolCall, Usage};

/// One element of a streamed chat reply.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseChunk {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub choices: Vec<ChunkChoice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ResponseChunk {
    /// Decode a raw chunk, treating anything that does not fit as "no update".
    pub fn deserialize_lenient(raw: &Value) -> Option<Self> {
        serde_json::from_value(raw.clone()).ok()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkChoice {
    #[serde(default, deserialize_with = "null_as_default")]
    pub index: usize,
    #[serde(default, deserialize_with = "null_as_default")]
    pub delta: PartialDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// A `null` where a record or number is expected counts as absent.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Sparse fragment of an assistant message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartialDelta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub function_call: Option<FunctionCallFragment>,
    #[serde(default)]
    pub tool_calls: Option<Vec<FunctionCallFragment>>,
    #[serde(default, alias = "correlation_id")]
    pub tool_call_id: Option<String>,
}

impl PartialDelta {
    /// Fragments paired with the index to use when they carry none: 0 for a
    /// lone `function_call`, the array position inside `tool_calls`.
    fn positioned_fragments(&self) -> impl Iterator<Item = (usize, &FunctionCallFragment)> {
        self.function_call
            .iter()
            .map(|fragment| (0, fragment))
            .chain(self.tool_calls.iter().flatten().enumerate())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FunctionCallFragment {
    #[serde(default)]
    pub index: Option<usize>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<Value>,
    #[serde(default)]
    pub function: Option<FunctionFragment>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FunctionFragment {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// Accumulated state for a single tool call being streamed in chunks.
#[derive(Debug, Default, Clone, PartialEq)]
struct PendingCall {
    id: Option<String>,
    kind: Option<String>,
    name: Option<String>,
    arguments: Option<String>,
    correlation_id: Option<String>,
}

impl PendingCall {
    fn merge(&mut self, fragment: &FunctionCallFragment) {
        let nested = fragment.function.as_ref();

        overwrite(&mut self.id, fragment.id.as_deref());
        overwrite(&mut self.kind, fragment.kind.as_deref());
        overwrite(
            &mut self.name,
            fragment
                .name
                .as_deref()
                .or_else(|| nested.and_then(|f| f.name.as_deref())),
        );

        let arguments = fragment
            .arguments
            .as_ref()
            .or_else(|| nested.and_then(|f| f.arguments.as_ref()));
        match arguments {
            Some(Value::String(piece)) => {
                self.arguments.get_or_insert_with(String::new).push_str(piece);
            }
            Some(value) => {
                if let Some(whole) = arguments_to_string(value) {
                    self.arguments = Some(whole);
                }
            }
            None => {}
        }
    }

    fn into_tool_call(self) -> Option<ToolCall> {
        let name = self.name?;
        Some(ToolCall {
            id: self.id.or(self.correlation_id),
            kind: Some(self.kind.unwrap_or_else(|| "function".to_string())),
            function: FunctionCall {
                name,
                arguments: self
                    .arguments
                    .filter(|a| !a.is_empty())
                    .unwrap_or_else(|| "{}".to_string()),
            },
        })
    }
}

fn overwrite(slot: &mut Option<String>, value: Option<&str>) {
    if let Some(v) = value.filter(|v| !v.is_empty()) {
        *slot = Some(v.to_string());
    }
}

/// Incremental tool-call accumulator for one streamed call.
#[derive(Debug, Default)]
pub struct ToolCallAssembler {
    calls: BTreeMap<usize, PendingCall>,
    last_touched: Option<usize>,
    unclaimed_correlation_id: Option<String>,
    saw_fragment: bool,
}

impl ToolCallAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed every choice of `chunk`.
    pub fn push(&mut self, chunk: &ResponseChunk) {
        for choice in &chunk.choices {
            self.push_delta(&choice.delta);
        }
    }

    /// Feed a single delta.
    pub fn push_delta(&mut self, delta: &PartialDelta) {
        let mut explicit_index = None;
        for (fallback_index, fragment) in delta.positioned_fragments() {
            self.saw_fragment = true;
            let index = fragment.index.unwrap_or(fallback_index);
            if fragment.index.is_some() {
                explicit_index = Some(index);
            }
            self.touch(index).merge(fragment);
        }

        if let Some(correlation_id) = delta.tool_call_id.as_deref().filter(|id| !id.is_empty()) {
            self.attach_correlation_id(correlation_id, explicit_index);
        }
    }

    /// Whether any function-call fragment has been seen.
    pub fn has_tool_calls(&self) -> bool {
        self.saw_fragment
    }

    /// Merged calls in ascending index order, or `None` for a pure text stream.
    /// Accumulators that never received a name are dropped.
    pub fn finish(self) -> Option<Vec<ToolCall>> {
        if !self.saw_fragment {
            return None;
        }
        if let Some(id) = &self.unclaimed_correlation_id {
            debug!("Dropping correlation id {} that never matched a tool call", id);
        }

        let calls: Vec<ToolCall> = self
            .calls
            .into_iter()
            .filter_map(|(index, call)| {
                let tool_call = call.into_tool_call();
                if tool_call.is_none() {
                    debug!("Dropping nameless tool call fragment at index {}", index);
                }
                tool_call
            })
            .collect();
        Some(calls)
    }

    fn touch(&mut self, index: usize) -> &mut PendingCall {
        self.last_touched = Some(index);
        let call = self.calls.entry(index).or_default();
        if call.correlation_id.is_none() {
            call.correlation_id = self.unclaimed_correlation_id.take();
        }
        call
    }

    /// Attach a correlation id to the accumulator it most plausibly belongs to.
    ///
    /// With several accumulators open and no index on the chunk the protocol
    /// gives no answer; the most recently touched one wins.
    fn attach_correlation_id(&mut self, correlation_id: &str, explicit_index: Option<usize>) {
        let target = explicit_index.or(self.last_touched).or_else(|| {
            if self.calls.len() == 1 {
                self.calls.keys().next().copied()
            } else {
                None
            }
        });

        match target.and_then(|index| self.calls.get_mut(&index)) {
            Some(call) => call.correlation_id = Some(correlation_id.to_string()),
            None => {
                debug!("Holding correlation id {} until a tool call opens", correlation_id);
                self.unclaimed_correlation_id = Some(correlation_id.to_string());
            }
        }
    }
}

/// Merge the full chunk history of one streamed call into its tool calls.
///
/// Returns `None` when no chunk carried a function-call fragment.
pub fn accumulate<'a, I>(chunks: I) -> Option<Vec<ToolCall>>
where
    I: IntoIterator<Item = &'a ResponseChunk>,
{
    let mut assembler = ToolCallAssembler::new();
    for chunk in chunks {
        assembler.push(chunk);
    }
    assembler.finish()
}
