//! wireline CLI - command-line front end for the chat adapter.

mod cli_args;
mod utils;

use anyhow::Result;
use serde_json::Value;
use std::io::Write;
use tracing::debug;

use wireline_providers::{ApiResponse, ChatRequest, CompletionOptions, LLMProvider, Message};

pub use cli_args::{Cli, Command};
use clap::Parser;

pub use utils::{build_provider, initialize_logging, load_config_with_cli_overrides, provider_settings};

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    initialize_logging(cli.verbose);

    let config = load_config_with_cli_overrides(&cli)?;
    let provider = build_provider(&config)?;
    debug!(
        "Using {} with default model {}",
        provider.name(),
        provider.default_model()
    );

    let mut stdout = std::io::stdout();
    execute(&provider, cli.command, &mut stdout).await
}

/// Run one subcommand against `provider`, writing human-readable output to `out`.
pub async fn execute(
    provider: &dyn LLMProvider,
    command: Command,
    out: &mut (dyn Write + Send),
) -> Result<()> {
    match command {
        Command::Chat {
            prompt,
            system,
            no_stream,
            temperature,
        } => {
            let mut messages = Vec::new();
            if let Some(system) = system {
                messages.push(Message::system(system));
            }
            messages.push(Message::user(prompt));
            let request = ChatRequest::new(messages).with_temperature(temperature);

            if no_stream {
                let response = provider.chat(request).await?;
                write_reply(out, &response)?;
            } else {
                // First output failure; later deltas are not written
                let mut write_error: Option<std::io::Error> = None;
                let response = {
                    let mut print_delta = |chunk: &Value| {
                        if write_error.is_some() {
                            return;
                        }
                        if let Some(text) = chunk
                            .pointer("/choices/0/delta/content")
                            .and_then(Value::as_str)
                        {
                            if let Err(e) = write!(out, "{}", text).and_then(|_| out.flush()) {
                                debug!("Failed to write streamed delta: {}", e);
                                write_error = Some(e);
                            }
                        }
                    };
                    provider.chat_streaming(request, &mut print_delta).await?
                };
                if let Some(e) = write_error {
                    return Err(e.into());
                }
                writeln!(out)?;
                write_tool_calls(out, &response)?;
                write_usage(&response);
            }
        }
        Command::Complete { prompt } => {
            let response = provider
                .complete(&prompt, CompletionOptions::default())
                .await?;
            write_reply(out, &response)?;
        }
        Command::Embed {
            text,
            embedding_model,
        } => {
            let response = provider
                .embed(&text, embedding_model.as_deref(), None)
                .await?;
            let vector = response.embedding().unwrap_or_default();
            writeln!(out, "{}", serde_json::to_string(&vector)?)?;
        }
        Command::Summarize { text } => {
            let response = provider.summarize(&text).await?;
            write_reply(out, &response)?;
        }
    }

    Ok(())
}

fn write_reply(out: &mut (dyn Write + Send), response: &ApiResponse) -> Result<()> {
    if let Some(text) = response.completion() {
        writeln!(out, "{}", text)?;
    }
    write_tool_calls(out, response)?;
    write_usage(response);
    Ok(())
}

fn write_tool_calls(out: &mut (dyn Write + Send), response: &ApiResponse) -> Result<()> {
    for call in response.tool_calls() {
        writeln!(
            out,
            "tool call {} {}({})",
            call.id.as_deref().unwrap_or("-"),
            call.function.name,
            call.function.arguments
        )?;
    }
    Ok(())
}

fn write_usage(response: &ApiResponse) {
    if let Some(total) = response.total_tokens() {
        debug!(
            "Token usage: prompt={:?} completion={:?} total={}",
            response.prompt_tokens(),
            response.completion_tokens(),
            total
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wireline_providers::mock::{MockChunk, MockTransport};
    use wireline_providers::{CompatProvider, ProviderSettings};

    fn provider(transport: MockTransport) -> CompatProvider<MockTransport> {
        CompatProvider::new(ProviderSettings::default(), transport)
    }

    async fn run_command(provider: &CompatProvider<MockTransport>, command: Command) -> String {
        let mut out: Vec<u8> = Vec::new();
        execute(provider, command, &mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn test_streamed_chat_prints_deltas() {
        let provider = provider(MockTransport::new().with_chunks(vec![
            MockChunk::content("Hel"),
            MockChunk::content("lo"),
            MockChunk::finished("stop"),
        ]));

        let output = run_command(
            &provider,
            Command::Chat {
                prompt: "Hi".to_string(),
                system: Some("Be brief.".to_string()),
                no_stream: false,
                temperature: 0.0,
            },
        )
        .await;

        assert_eq!(output, "Hello\n");
        let params = provider.transport().last_params().unwrap();
        assert_eq!(params["messages"][0]["role"], "system");
        assert_eq!(params["stream"], true);
    }

    #[tokio::test]
    async fn test_streamed_tool_call_is_listed() {
        let provider = provider(MockTransport::new().with_chunks(vec![
            MockChunk::function_call(json!({"name": "ping", "arguments": {"host": "a"}})),
            MockChunk::correlation_id("call_9"),
        ]));

        let output = run_command(
            &provider,
            Command::Chat {
                prompt: "ping a".to_string(),
                system: None,
                no_stream: false,
                temperature: 0.0,
            },
        )
        .await;

        assert_eq!(output, "\ntool call call_9 ping({\"host\":\"a\"})\n");
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_streamed_write_failure_is_returned() {
        let provider = provider(MockTransport::new().with_chunks(vec![
            MockChunk::content("Hel"),
            MockChunk::content("lo"),
        ]));

        let mut out = BrokenPipe;
        let err = execute(
            &provider,
            Command::Chat {
                prompt: "Hi".to_string(),
                system: None,
                no_stream: false,
                temperature: 0.0,
            },
            &mut out,
        )
        .await
        .unwrap_err();

        let io_err = err.downcast_ref::<std::io::Error>().unwrap();
        assert_eq!(io_err.kind(), std::io::ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn test_complete_prints_text() {
        let provider = provider(MockTransport::new().with_reply(json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "done"}}]
        })));

        let output = run_command(&provider, Command::Complete { prompt: "go".to_string() }).await;
        assert_eq!(output, "done\n");
    }

    #[tokio::test]
    async fn test_embed_prints_vector() {
        let provider = provider(
            MockTransport::new().with_reply(json!({"data": [{"embedding": [0.5, 1.5]}]})),
        );

        let output = run_command(
            &provider,
            Command::Embed {
                text: "t".to_string(),
                embedding_model: None,
            },
        )
        .await;
        assert_eq!(output, "[0.5,1.5]\n");
    }

    #[tokio::test]
    async fn test_api_error_is_returned() {
        let provider = provider(
            MockTransport::new().with_reply(json!({"status": 401, "message": "bad key"})),
        );

        let mut out: Vec<u8> = Vec::new();
        let err = execute(&provider, Command::Summarize { text: "t".to_string() }, &mut out)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Compat API error: 401, bad key");
    }
}
