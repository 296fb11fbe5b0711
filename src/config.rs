//! Process configuration.
//!
//! Everything is read once from the environment at startup and is immutable
//! for the lifetime of the process. `PROJECT_ENDPOINT` is the only required
//! variable; the rest default to the Microsoft Learn MCP setup.

use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::mcp::{sanitize_label, ApprovalMode, McpError, McpToolDescriptor};

const DEFAULT_MODEL_DEPLOYMENT: &str = "gpt-4o-mini";
const DEFAULT_MCP_SERVER_URL: &str = "https://learn.microsoft.com/api/mcp";
const DEFAULT_MCP_SERVER_NAME: &str = "Microsoft Learn MCP";
const DEFAULT_MAX_APPROVAL_ROUNDS: u32 = 8;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Tools the Microsoft Learn MCP server exposes.
pub const DEFAULT_ALLOWED_TOOLS: &[&str] = &[
    "microsoft_docs_search",
    "microsoft_code_sample_search",
    "microsoft_docs_fetch",
];

/// Configuration errors. All of them are raised before the first network
/// call is attempted.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),
    #[error("invalid value '{value}' for {name}: expected {expected}")]
    InvalidVar {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("invalid project endpoint '{url}': {message}")]
    InvalidEndpoint { url: String, message: String },
    #[error(transparent)]
    Mcp(#[from] McpError),
}

/// Immutable process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Azure AI Foundry project endpoint, without a trailing slash.
    pub project_endpoint: String,
    /// Name of the model deployment the agent binds to.
    pub model_deployment: String,
    /// Descriptor of the MCP server attached to the agent.
    pub mcp_tool: McpToolDescriptor,
    /// Upper bound on approval round-trips before a run is abandoned.
    pub max_approval_rounds: u32,
    /// Interval between run status polls.
    pub poll_interval: Duration,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = first_of(&lookup, &["PROJECT_ENDPOINT", "AZURE_AI_PROJECT_ENDPOINT"])
            .ok_or(ConfigError::MissingVar("PROJECT_ENDPOINT"))?;
        let project_endpoint = validate_endpoint(&endpoint)?;

        let model_deployment = first_of(
            &lookup,
            &["MODEL_DEPLOYMENT_NAME", "AZURE_AI_MODEL_DEPLOYMENT_NAME"],
        )
        .unwrap_or_else(|| DEFAULT_MODEL_DEPLOYMENT.to_string());

        let mcp_server_url = first_of(&lookup, &["MCP_SERVER_URL"])
            .unwrap_or_else(|| DEFAULT_MCP_SERVER_URL.to_string());

        let server_name = first_of(&lookup, &["MCP_SERVER_NAME", "MCP_SERVER_LABEL"])
            .unwrap_or_else(|| DEFAULT_MCP_SERVER_NAME.to_string());
        let server_label = sanitize_label(&server_name);

        let approval_mode = match first_of(&lookup, &["MCP_APPROVAL_MODE"]) {
            Some(value) => value.parse::<ApprovalMode>()?,
            None => ApprovalMode::Always,
        };

        let allowed_tools = match first_of(&lookup, &["MCP_ALLOWED_TOOLS"]) {
            Some(value) => value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            None => DEFAULT_ALLOWED_TOOLS
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>(),
        };

        let mut mcp_tool = McpToolDescriptor::new(server_label, mcp_server_url)?
            .allow_tools(allowed_tools)
            .approval(approval_mode);
        if let Some(token) = first_of(&lookup, &["MCP_SERVER_BEARER_TOKEN"]) {
            mcp_tool = mcp_tool.bearer_token(token);
        }

        let max_approval_rounds = match first_of(&lookup, &["AGENT_MAX_APPROVAL_ROUNDS"]) {
            Some(value) => match value.parse::<u32>() {
                Ok(rounds) if rounds >= 1 => rounds,
                _ => {
                    return Err(ConfigError::InvalidVar {
                        name: "AGENT_MAX_APPROVAL_ROUNDS",
                        value,
                        expected: "a positive integer",
                    })
                }
            },
            None => DEFAULT_MAX_APPROVAL_ROUNDS,
        };

        let poll_interval = match first_of(&lookup, &["AGENT_POLL_INTERVAL_MS"]) {
            Some(value) => match value.parse::<u64>() {
                Ok(ms) if ms >= 1 => Duration::from_millis(ms),
                _ => {
                    return Err(ConfigError::InvalidVar {
                        name: "AGENT_POLL_INTERVAL_MS",
                        value,
                        expected: "a positive integer of milliseconds",
                    })
                }
            },
            None => Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        };

        Ok(Self {
            project_endpoint,
            model_deployment,
            mcp_tool,
            max_approval_rounds,
            poll_interval,
        })
    }
}

/// First non-empty value among the given variable names.
fn first_of<F>(lookup: &F, names: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    names
        .iter()
        .filter_map(|name| lookup(name))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

fn validate_endpoint(endpoint: &str) -> Result<String, ConfigError> {
    let parsed = Url::parse(endpoint).map_err(|e| ConfigError::InvalidEndpoint {
        url: endpoint.to_string(),
        message: e.to_string(),
    })?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ConfigError::InvalidEndpoint {
            url: endpoint.to_string(),
            message: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }
    Ok(endpoint.trim_end_matches('/').to_string())
}
