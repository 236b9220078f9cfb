//! CLI argument parsing for wireline.

use clap::{Parser, Subcommand};

#[derive(Parser, Clone, Debug)]
#[command(name = "wireline")]
#[command(about = "Talk to an OpenAI-compatible chat vendor from the terminal")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Override the configured default model
    #[arg(long, value_name = "MODEL", global = true)]
    pub model: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    /// Send a chat message, streaming the reply by default
    Chat {
        prompt: String,

        /// System message to send before the prompt
        #[arg(long, value_name = "TEXT")]
        system: Option<String>,

        /// Wait for the whole reply instead of streaming it
        #[arg(long)]
        no_stream: bool,

        #[arg(long, default_value_t = 0.0)]
        temperature: f64,
    },

    /// Single-prompt completion
    Complete { prompt: String },

    /// Print the embedding vector for a piece of text
    Embed {
        text: String,

        /// Embedding model (defaults to the configured one)
        #[arg(long = "embedding-model", value_name = "MODEL")]
        embedding_model: Option<String>,
    },

    /// Summarize a piece of text
    Summarize { text: String },
}
