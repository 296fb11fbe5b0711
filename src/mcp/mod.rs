//! MCP (Model Context Protocol) tool descriptors.
//!
//! The agent service talks to MCP servers on our behalf; nothing in this
//! process speaks the protocol itself. What the caller controls is the
//! descriptor attached to the agent: which server, which tools the model may
//! call, and whether each call must be approved before it executes.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use url::Url;

/// Errors building an MCP tool descriptor.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("invalid MCP server label '{0}': expected one or more of [A-Za-z0-9_-]")]
    InvalidLabel(String),
    #[error("invalid MCP server URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },
    #[error("invalid approval mode '{0}': expected 'always' or 'never'")]
    InvalidApprovalMode(String),
}

/// Approval gate for tool calls issued against an MCP server.
///
/// `Always` pauses the run in `requires_action` until every pending call is
/// approved or rejected by the caller. `Never` lets the service execute
/// calls without asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalMode {
    Always,
    Never,
}

impl ApprovalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalMode::Always => "always",
            ApprovalMode::Never => "never",
        }
    }
}

impl fmt::Display for ApprovalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApprovalMode {
    type Err = McpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(ApprovalMode::Always),
            "never" => Ok(ApprovalMode::Never),
            other => Err(McpError::InvalidApprovalMode(other.to_string())),
        }
    }
}

/// Descriptor for one remote MCP server attached to an agent.
///
/// Built once at startup and passed by value into agent creation; the
/// service uses it for tool discovery and invocation during runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolDescriptor {
    /// Identifier the model uses to reference the server. Must be
    /// identifier-safe; see [`sanitize_label`] for display names.
    pub server_label: String,
    /// Streamable-HTTP endpoint of the MCP server.
    pub server_url: String,
    /// Tool names the model may call. Empty means every tool the server
    /// exposes; whether a name actually exists is enforced remotely.
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    /// Approval gate applied to this server's tool calls.
    pub require_approval: ApprovalMode,
    /// Extra HTTP headers the service sends to the MCP server, e.g. a
    /// bearer token for authenticated servers.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl McpToolDescriptor {
    /// Create a descriptor after validating the label and URL.
    pub fn new(
        server_label: impl Into<String>,
        server_url: impl Into<String>,
    ) -> Result<Self, McpError> {
        let server_label = server_label.into();
        if !is_valid_label(&server_label) {
            return Err(McpError::InvalidLabel(server_label));
        }

        let server_url = server_url.into();
        let parsed = Url::parse(&server_url).map_err(|e| McpError::InvalidUrl {
            url: server_url.clone(),
            message: e.to_string(),
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(McpError::InvalidUrl {
                url: server_url,
                message: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        Ok(Self {
            server_label,
            server_url,
            allowed_tools: Vec::new(),
            require_approval: ApprovalMode::Always,
            headers: BTreeMap::new(),
        })
    }

    /// Add a tool name to the allow list. Repeats are ignored.
    pub fn allow_tool(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.allowed_tools.contains(&name) {
            self.allowed_tools.push(name);
        }
        self
    }

    /// Add several tool names to the allow list, preserving order.
    pub fn allow_tools<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self = self.allow_tool(name);
        }
        self
    }

    /// Set the approval gate.
    pub fn approval(mut self, mode: ApprovalMode) -> Self {
        self.require_approval = mode;
        self
    }

    /// Attach an HTTP header forwarded to the MCP server.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Attach an `Authorization: Bearer` header for authenticated servers.
    pub fn bearer_token(self, token: impl AsRef<str>) -> Self {
        self.header("Authorization", format!("Bearer {}", token.as_ref()))
    }

    /// Tool entry for the agent-creation request.
    pub fn tool_definition(&self) -> Value {
        let mut definition = json!({
            "type": "mcp",
            "server_label": self.server_label,
            "server_url": self.server_url,
        });
        if !self.allowed_tools.is_empty() {
            definition["allowed_tools"] = json!(self.allowed_tools);
        }
        definition
    }

    /// Per-run resource entry carrying the approval mode and headers.
    pub fn tool_resource(&self) -> Value {
        let mut resource = json!({
            "server_label": self.server_label,
            "require_approval": self.require_approval.as_str(),
        });
        if !self.headers.is_empty() {
            resource["headers"] = json!(self.headers);
        }
        resource
    }
}

/// Turn a display name like "Microsoft Learn MCP" into an identifier-safe
/// server label ("microsoft_learn_mcp"). Runs of non-alphanumeric characters
/// collapse into a single underscore.
pub fn sanitize_label(name: &str) -> String {
    let mut label = String::with_capacity(name.len());
    let mut last_was_separator = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            label.push(c.to_ascii_lowercase());
            last_was_separator = false;
        } else if !last_was_separator {
            label.push('_');
            last_was_separator = true;
        }
    }
    while label.ends_with('_') {
        label.pop();
    }
    label
}

fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
