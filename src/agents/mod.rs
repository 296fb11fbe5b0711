//! Types and client for the Azure AI Foundry Agent Service.
//!
//! These are pass-through records of a remote resource model: agents bind a
//! model deployment to tools and instructions, threads hold messages, and a
//! run executes an agent against a thread through a server-owned state
//! machine. Nothing here is persisted locally.

mod client;
mod error;
#[cfg(test)]
pub(crate) mod test_support;

pub use client::AgentsClient;
pub use error::{classify_http_status, AgentError, HttpErrorKind, RetryConfig};

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::mcp::McpToolDescriptor;

// ─────────────────────────────────────────────────────────────────────────────
// Wire Records
// ─────────────────────────────────────────────────────────────────────────────

/// A remote agent resource.
#[derive(Debug, Clone, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: Option<String>,
    pub model: String,
}

/// A conversation thread.
#[derive(Debug, Clone, Deserialize)]
pub struct Thread {
    pub id: String,
}

/// Role of a thread message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One message on a thread. Content arrives as a list of typed blocks; only
/// text blocks are read here.
#[derive(Debug, Clone, Deserialize)]
pub struct ThreadMessage {
    pub id: String,
    pub role: MessageRole,
    #[serde(default)]
    pub content: Vec<MessageContent>,
}

impl ThreadMessage {
    /// Concatenated text of all text blocks in this message.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| block.text.as_ref())
            .map(|text| text.value.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A content block. `kind` is the wire `type`; unknown kinds deserialize
/// with `text: None` and are skipped by readers.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageContent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<TextBlock>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextBlock {
    pub value: String,
}

/// Server-owned run states.
///
/// `queued → in_progress → requires_action ⇄ in_progress → terminal`, where
/// terminal is one of `completed`, `failed`, `cancelled`, `expired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Expired,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled | RunStatus::Expired
        )
    }
}

/// One execution of an agent against a thread.
#[derive(Debug, Clone, Deserialize)]
pub struct Run {
    pub id: String,
    pub thread_id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub required_action: Option<RequiredAction>,
    #[serde(default)]
    pub last_error: Option<RunError>,
}

impl Run {
    /// Pending MCP approval requests, when the run is waiting on them.
    pub fn pending_approvals(&self) -> Option<&[McpApprovalRequest]> {
        self.required_action
            .as_ref()
            .filter(|action| action.kind == "submit_tool_approval")
            .and_then(|action| action.submit_tool_approval.as_ref())
            .map(|submit| submit.tool_calls.as_slice())
    }
}

/// Action the service is waiting on before the run can continue.
#[derive(Debug, Clone, Deserialize)]
pub struct RequiredAction {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub submit_tool_approval: Option<SubmitToolApproval>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitToolApproval {
    pub tool_calls: Vec<McpApprovalRequest>,
}

/// One tool call awaiting an approval decision. Arguments are the raw JSON
/// string the model produced; they are relayed, never modified.
#[derive(Debug, Clone, Deserialize)]
pub struct McpApprovalRequest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: String,
    pub server_label: String,
}

/// The caller's answer to one approval request.
#[derive(Debug, Clone, Serialize)]
pub struct ToolApproval {
    pub tool_call_id: String,
    pub approve: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
}

/// Terminal error reported by a failed run.
#[derive(Debug, Clone, Deserialize)]
pub struct RunError {
    pub code: String,
    pub message: String,
}

/// One step of a run, used to reconstruct the tool-call trace.
#[derive(Debug, Clone, Deserialize)]
pub struct RunStep {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    #[serde(default)]
    pub step_details: Option<StepDetails>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StepDetails {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub tool_calls: Vec<StepToolCall>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StepToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub server_label: Option<String>,
}

/// Paged list envelope used by the service.
#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Request Types
// ─────────────────────────────────────────────────────────────────────────────

/// Request body for agent creation.
#[derive(Debug, Clone, Serialize)]
pub struct CreateAgentRequest {
    pub model: String,
    pub name: String,
    pub instructions: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Value>,
}

impl CreateAgentRequest {
    pub fn new(
        model: impl Into<String>,
        name: impl Into<String>,
        instructions: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            name: name.into(),
            instructions: instructions.into(),
            tools: Vec::new(),
        }
    }

    /// Attach an MCP server to the agent.
    pub fn with_mcp_tool(mut self, descriptor: &McpToolDescriptor) -> Self {
        self.tools.push(descriptor.tool_definition());
        self
    }
}

/// Request body for run creation.
#[derive(Debug, Clone, Serialize)]
pub struct CreateRunRequest {
    pub assistant_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_resources: Option<Value>,
}

impl CreateRunRequest {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            assistant_id: agent_id.into(),
            tool_resources: None,
        }
    }

    /// Attach per-run MCP resources: the approval mode and any headers.
    pub fn with_mcp_resources(mut self, descriptor: &McpToolDescriptor) -> Self {
        self.tool_resources = Some(serde_json::json!({
            "mcp": [descriptor.tool_resource()],
        }));
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Service Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Operations this sample needs from the agent service.
///
/// `AgentsClient` is the HTTP implementation; tests substitute a scripted
/// one.
#[async_trait]
pub trait AgentsApi: Send + Sync {
    async fn create_agent(&self, request: &CreateAgentRequest) -> Result<Agent, AgentError>;
    async fn delete_agent(&self, agent_id: &str) -> Result<(), AgentError>;
    async fn create_thread(&self) -> Result<Thread, AgentError>;
    async fn create_message(
        &self,
        thread_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<ThreadMessage, AgentError>;
    async fn create_run(
        &self,
        thread_id: &str,
        request: &CreateRunRequest,
    ) -> Result<Run, AgentError>;
    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AgentError>;
    async fn submit_tool_approvals(
        &self,
        thread_id: &str,
        run_id: &str,
        approvals: &[ToolApproval],
    ) -> Result<Run, AgentError>;
    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AgentError>;
    async fn list_run_steps(
        &self,
        thread_id: &str,
        run_id: &str,
    ) -> Result<Vec<RunStep>, AgentError>;
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, AgentError>;
}
