//! Switchboard CLI: entry point.
//!
//! # Commands
//!
//! - `switchboard ask <PROMPT> [-m MODEL] [-s SYSTEM] [--schema FILE] [--stream]`: one invocation
//! - `switchboard providers`: routing table and credential status

mod helpers;
mod providers;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use tracing::info;

use switchboard_core::config::load_config;
use switchboard_llm::{InvocationResult, InvokeOptions, LlmClient, StreamOptions};
use switchboard_providers::ProviderRegistry;

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// Switchboard: one prompt, any model
#[derive(Parser)]
#[command(name = "switchboard", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one prompt to a model
    Ask {
        /// The prompt. Use "-" to read it from stdin.
        prompt: String,

        /// Model identifier (e.g. "claude-sonnet-4-5", "ollama:llama3.1")
        #[arg(short, long)]
        model: Option<String>,

        /// Replace the default system prompt
        #[arg(short, long)]
        system: Option<String>,

        /// Token budget shared by system and user prompt
        #[arg(long)]
        max_prompt_tokens: Option<usize>,

        /// JSON Schema file; the answer is returned as a validated object
        #[arg(long, conflicts_with = "stream")]
        schema: Option<PathBuf>,

        /// Print the answer as it is generated
        #[arg(long, default_value_t = false)]
        stream: bool,

        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Show how models are routed and which credentials are set
    Providers,
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ask {
            prompt,
            model,
            system,
            max_prompt_tokens,
            schema,
            stream,
            logs,
        } => {
            init_logging(logs);
            let prompt = helpers::read_prompt(&prompt)?;
            let client = build_client();
            if stream {
                run_stream(
                    &client,
                    &prompt,
                    StreamOptions {
                        model,
                        system_prompt: system,
                        max_prompt_tokens,
                    },
                )
                .await
            } else {
                let output_schema = schema
                    .as_deref()
                    .map(helpers::load_schema)
                    .transpose()?;
                run_ask(
                    &client,
                    &prompt,
                    InvokeOptions {
                        model,
                        system_prompt: system,
                        output_schema,
                        tools: None,
                        max_prompt_tokens,
                    },
                    logs,
                )
                .await
            }
        }
        Commands::Providers => providers::run(),
    }
}

/// Build the client from the config file and the process environment.
fn build_client() -> LlmClient {
    let config = load_config(None);
    LlmClient::from_config(&config, Arc::new(ProviderRegistry::from_env()))
}

// ─────────────────────────────────────────────
// Ask command
// ─────────────────────────────────────────────

async fn run_ask(
    client: &LlmClient,
    prompt: &str,
    options: InvokeOptions,
    show_logs: bool,
) -> Result<()> {
    info!(model = ?options.model, structured = options.output_schema.is_some(), "asking");

    if !show_logs {
        helpers::print_thinking();
    }
    let result = client.invoke(prompt, &options).await;
    if !show_logs {
        helpers::clear_thinking();
    }

    match result.context("invocation failed")? {
        InvocationResult::PlainText(text) => helpers::print_response(&text),
        InvocationResult::StructuredObject(value) => {
            let pretty = serde_json::to_string_pretty(&value)
                .context("failed to format structured result")?;
            helpers::print_response(&pretty);
        }
        InvocationResult::ToolCallMessage(message) => {
            helpers::print_response(message.content.as_deref().unwrap_or_default());
            for call in &message.tool_calls {
                println!("  → {}({})", call.name(), call.function.arguments);
            }
        }
    }

    Ok(())
}

async fn run_stream(client: &LlmClient, prompt: &str, options: StreamOptions) -> Result<()> {
    let mut fragments = client
        .stream(prompt, &options)
        .context("failed to start stream")?;

    let mut stdout = std::io::stdout();
    while let Some(fragment) = fragments.next().await {
        let fragment = fragment.context("stream failed")?;
        stdout.write_all(fragment.as_bytes())?;
        stdout.flush()?;
    }
    println!();

    Ok(())
}

/// Initialize tracing/logging.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("switchboard=debug,info")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
