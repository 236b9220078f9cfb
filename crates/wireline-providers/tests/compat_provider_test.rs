//! End-to-end behaviour of `CompatProvider` over a scripted transport.
//!
//! Every test drives the public `LLMProvider` surface and then checks two
//! things: the request parameters the adapter handed the transport, and the
//! response it returned.

use serde_json::{json, Value};
use wireline_providers::embedding::DEFAULT_EMBEDDING_MODEL;
use wireline_providers::mock::{Endpoint, MockChunk, MockTransport};
use wireline_providers::{
    ChatRequest, CompatProvider, CompletionOptions, LLMProvider, Message, ProviderError,
    ProviderSettings, Tool,
};

fn provider(transport: MockTransport) -> CompatProvider<MockTransport> {
    CompatProvider::new(ProviderSettings::default(), transport)
}

fn chat_reply(content: &str) -> Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "model": "chat-large-latest",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 3, "completion_tokens": 1, "total_tokens": 4}
    })
}

#[tokio::test]
async fn test_complete_sends_single_user_message() {
    let provider = provider(MockTransport::new().with_reply(chat_reply("X")));

    let response = provider
        .complete("Hello World", CompletionOptions::default())
        .await
        .unwrap();

    assert_eq!(response.completion(), Some("X"));
    assert_eq!(
        provider.transport().last_params().unwrap(),
        json!({
            "model": "chat-large-latest",
            "messages": [{"content": "Hello World", "role": "user"}],
            "temperature": 0.0
        })
    );
}

#[tokio::test]
async fn test_legacy_model_is_remapped() {
    let provider = provider(MockTransport::new().with_reply(chat_reply("ok")));

    provider
        .complete("Hi", CompletionOptions::default().with_model("text-large-001"))
        .await
        .unwrap();

    let params = provider.transport().last_params().unwrap();
    assert_eq!(params["model"], "chat-large-latest");
}

#[tokio::test]
async fn test_non_legacy_model_is_kept() {
    let provider = provider(MockTransport::new().with_reply(chat_reply("ok")));

    provider
        .complete(
            "Hi",
            CompletionOptions::default()
                .with_model("chat-small-latest")
                .with_temperature(0.7)
                .with_override("max_tokens", json!(32)),
        )
        .await
        .unwrap();

    let params = provider.transport().last_params().unwrap();
    assert_eq!(params["model"], "chat-small-latest");
    assert_eq!(params["temperature"], 0.7);
    assert_eq!(params["max_tokens"], 32);
}

#[tokio::test]
async fn test_error_body_becomes_api_error() {
    let provider = provider(MockTransport::new().with_reply(json!({"status": 400, "message": "M"})));

    let err = provider
        .complete("Hello", CompletionOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Compat API error: 400, M");
    assert_eq!(err.status(), Some(400));
}

#[tokio::test]
async fn test_chat_passes_reply_through() {
    let reply = chat_reply("Hi there");
    let provider = provider(MockTransport::new().with_reply(reply.clone()));

    let response = provider
        .chat(ChatRequest::new(vec![Message::user("Hi")]))
        .await
        .unwrap();

    assert_eq!(response.raw(), &reply);
    assert_eq!(response.total_tokens(), Some(4));
    assert_eq!(provider.transport().requests()[0].endpoint, Endpoint::Chat);
}

#[tokio::test]
async fn test_streamed_text_and_usage_are_synthesized() {
    let provider = provider(MockTransport::new().with_chunks(vec![
        MockChunk::content("Hel"),
        MockChunk::content("lo"),
        MockChunk::usage(10, 11, 12),
    ]));

    let mut seen = Vec::new();
    let mut observer = |chunk: &Value| seen.push(chunk.clone());
    let response = provider
        .chat_streaming(ChatRequest::new(vec![Message::user("Hi")]), &mut observer)
        .await
        .unwrap();

    assert_eq!(seen.len(), 3);
    assert_eq!(response.chat_completion_text(), Some("Hello"));
    assert_eq!(response.prompt_tokens(), Some(10));
    assert_eq!(response.completion_tokens(), Some(11));
    assert_eq!(response.total_tokens(), Some(12));
    assert_eq!(response.raw()["id"], "chatcmpl-mock");
    assert!(response.tool_calls().is_empty());

    let request = &provider.transport().requests()[0];
    assert_eq!(request.endpoint, Endpoint::ChatStream);
    assert_eq!(request.params["stream"], true);
}

#[tokio::test]
async fn test_streamed_tool_call_gets_late_correlation_id() {
    let provider = provider(MockTransport::new().with_chunks(vec![
        MockChunk::function_call(json!({"name": "get_weather"})),
        MockChunk::function_call(json!({"arguments": "{\"city\":"})),
        MockChunk::function_call(json!({"arguments": "\"Paris\"}"})),
        MockChunk::correlation_id("call_abc"),
        MockChunk::finished("tool_calls"),
    ]));

    let request = ChatRequest::new(vec![Message::user("Weather in Paris?")])
        .with_tools(vec![Tool::new(
            "get_weather",
            "Current weather for a city",
            json!({"type": "object", "properties": {"city": {"type": "string"}}}),
        )])
        .with_tool_choice(json!("auto"));

    let mut observer = |_: &Value| {};
    let response = provider.chat_streaming(request, &mut observer).await.unwrap();

    let calls = response.tool_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].id.as_deref(), Some("call_abc"));
    assert_eq!(calls[0].function.name, "get_weather");
    assert_eq!(calls[0].function.arguments, r#"{"city":"Paris"}"#);
    assert_eq!(response.finish_reason(), Some("tool_calls"));
    assert_eq!(response.raw()["choices"][0]["message"]["content"], Value::Null);

    let params = provider.transport().last_params().unwrap();
    assert_eq!(params["tool_choice"], "auto");
    assert_eq!(params["tools"][0]["type"], "function");
}

#[tokio::test]
async fn test_streamed_error_body_becomes_api_error() {
    let provider = provider(
        MockTransport::new().with_reply(json!({"status": 503, "message": "overloaded"})),
    );

    let mut observer = |_: &Value| {};
    let err = provider
        .chat_streaming(ChatRequest::new(vec![Message::user("Hi")]), &mut observer)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Compat API error: 503, overloaded");
}

#[tokio::test]
async fn test_tool_choice_without_tools_fails_before_sending() {
    let provider = provider(MockTransport::new());

    let request = ChatRequest::new(vec![Message::user("Hi")]).with_tool_choice(json!("any"));
    let err = provider.chat(request).await.unwrap_err();

    assert!(matches!(err, ProviderError::ArgumentConflict(_)));
    assert!(provider.transport().requests().is_empty());
}

#[tokio::test]
async fn test_embed_with_default_model_omits_dimensions() {
    let provider = provider(MockTransport::new().with_reply(json!({
        "data": [{"index": 0, "embedding": [0.25, -0.5]}],
        "model": DEFAULT_EMBEDDING_MODEL
    })));

    let response = provider.embed("some text", None, None).await.unwrap();

    assert_eq!(response.embedding(), Some(vec![0.25, -0.5]));
    assert_eq!(
        provider.transport().last_params().unwrap(),
        json!({"input": "some text", "model": DEFAULT_EMBEDDING_MODEL})
    );
    assert_eq!(provider.transport().requests()[0].endpoint, Endpoint::Embeddings);
}

#[tokio::test]
async fn test_embed_with_sized_model_sends_dimensions() {
    let provider = provider(MockTransport::new().with_reply(json!({"data": []})));

    provider
        .embed("some text", Some("embed-large-v3"), Some("user-42"))
        .await
        .unwrap();

    assert_eq!(
        provider.transport().last_params().unwrap(),
        json!({
            "input": "some text",
            "model": "embed-large-v3",
            "dimensions": 3072,
            "user": "user-42"
        })
    );
}

#[tokio::test]
async fn test_summarize_wraps_text_in_prompt() {
    let provider = provider(MockTransport::new().with_reply(chat_reply("Short.")));

    let response = provider.summarize("A long story.").await.unwrap();

    assert_eq!(response.completion(), Some("Short."));
    let params = provider.transport().last_params().unwrap();
    assert_eq!(
        params["messages"][0]["content"],
        "Write a concise summary of the following:\n\nA long story.\n\nCONCISE SUMMARY:"
    );
    assert_eq!(params["model"], "chat-large-latest");
}

#[tokio::test]
async fn test_transport_failure_propagates() {
    let provider = provider(MockTransport::new().with_failure("connection reset"));

    let err = provider
        .chat(ChatRequest::new(vec![Message::user("Hi")]))
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Transport(_)));
    assert!(err.to_string().contains("connection reset"));
}

#[tokio::test]
async fn test_tool_round_trip_messages_serialize() {
    let provider = provider(MockTransport::new().with_reply(chat_reply("It is sunny.")));

    let first = ChatRequest::new(vec![Message::user("Weather?")]);
    let call_message = Message::from_parts(
        "assistant",
        None,
        None,
        Some(&json!([{"id": "call_1", "type": "function",
                       "function": {"name": "get_weather", "arguments": "{}"}}])),
        None,
    )
    .unwrap();
    let mut messages = first.messages;
    messages.push(call_message);
    messages.push(Message::tool_result("call_1", &json!({"sky": "clear"})));

    provider.chat(ChatRequest::new(messages)).await.unwrap();

    let params = provider.transport().last_params().unwrap();
    let sent = params["messages"].as_array().unwrap();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[1]["tool_calls"][0]["id"], "call_1");
    assert!(sent[1].get("content").is_none());
    assert_eq!(sent[2]["role"], "tool");
    assert_eq!(sent[2]["tool_call_id"], "call_1");
}
