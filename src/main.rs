//! Binary entry point.
//!
//! No flags: trailing arguments join into the prompt, otherwise a built-in
//! demo prompt runs. Exit code 0 on success, 1 on any unhandled error, with
//! a remediation hint where one is known.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use foundry_docs_agent::agents::AgentError;
use foundry_docs_agent::credentials::AzureCliCredential;
use foundry_docs_agent::{Config, DocsAssistant};

const DEMO_PROMPT: &str =
    "Search Microsoft Learn for 'Azure Functions quickstart' and summarize the key steps.";

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("error: {error:#}");
        if let Some(hint) = error
            .downcast_ref::<AgentError>()
            .and_then(AgentError::remediation)
        {
            eprintln!("hint: {hint}");
        }
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    // Values already set in the environment win over `.env`.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("foundry_docs_agent=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env().context("failed to load configuration")?;
    tracing::info!(
        endpoint = %config.project_endpoint,
        model = %config.model_deployment,
        mcp_server = %config.mcp_tool.server_url,
        approval = %config.mcp_tool.require_approval,
        "starting docs agent"
    );

    let prompt = {
        let args: Vec<String> = std::env::args().skip(1).collect();
        if args.is_empty() {
            DEMO_PROMPT.to_string()
        } else {
            args.join(" ")
        }
    };

    let credential = Arc::new(AzureCliCredential::new());
    let assistant = DocsAssistant::new(&config, credential);

    println!("> {prompt}");
    let reply = assistant.ask(&prompt).await?;

    println!();
    println!("{}", reply.text);
    if !reply.tool_calls.is_empty() {
        println!();
        println!("tools used: {}", reply.tool_calls.join(", "));
    }

    Ok(())
}
