//! The docs assistant: one agent, one thread, one run.
//!
//! Wires the credential, client, descriptor, and run driver into the single
//! call sequence the binary uses. The agent is created fresh for each
//! `ask` and deleted afterwards so nothing accumulates in the project.

use std::sync::Arc;

use crate::agents::{
    AgentError, AgentsApi, AgentsClient, CreateAgentRequest, CreateRunRequest, MessageRole,
    RunStep, ThreadMessage,
};
use crate::config::Config;
use crate::credentials::TokenCredential;
use crate::mcp::McpToolDescriptor;
use crate::runner::{drive_run, ApprovalPolicy, ApproveAll, RunOptions};

/// Name under which the agent is created on the service.
pub const AGENT_NAME: &str = "docs-assistant";

const INSTRUCTIONS: &str = "\
You are a helpful documentation assistant specializing in Microsoft Azure \
and .NET documentation, with access to Microsoft Learn through MCP tools.

Always search the documentation with the MCP tools before answering; do not \
rely on training data alone. Summarize what you find clearly and cite the \
source URLs.";

/// Final output of one `ask`: the assistant's answer plus the names of the
/// MCP tools the run invoked.
#[derive(Debug, Clone)]
pub struct AssistantReply {
    pub text: String,
    pub tool_calls: Vec<String>,
}

/// High-level flow over the agent service.
pub struct DocsAssistant {
    api: Arc<dyn AgentsApi>,
    policy: Arc<dyn ApprovalPolicy>,
    model: String,
    descriptor: McpToolDescriptor,
    options: RunOptions,
}

impl DocsAssistant {
    /// Build the assistant against the real service.
    pub fn new(config: &Config, credential: Arc<dyn TokenCredential>) -> Self {
        let api = AgentsClient::new(config.project_endpoint.clone(), credential);
        Self::with_api(Arc::new(api), config)
    }

    /// Build the assistant over any `AgentsApi` implementation.
    pub fn with_api(api: Arc<dyn AgentsApi>, config: &Config) -> Self {
        let descriptor = config.mcp_tool.clone();
        let approval_headers =
            (!descriptor.headers.is_empty()).then(|| descriptor.headers.clone());

        Self {
            api,
            policy: Arc::new(ApproveAll),
            model: config.model_deployment.clone(),
            descriptor,
            options: RunOptions {
                poll_interval: config.poll_interval,
                max_approval_rounds: config.max_approval_rounds,
                approval_headers,
            },
        }
    }

    /// Replace the approval policy. The default approves every request.
    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn ApprovalPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Run one prompt through a fresh agent and return its reply.
    pub async fn ask(&self, prompt: &str) -> Result<AssistantReply, AgentError> {
        let request = CreateAgentRequest::new(&self.model, AGENT_NAME, INSTRUCTIONS)
            .with_mcp_tool(&self.descriptor);
        let agent = self.api.create_agent(&request).await?;
        tracing::info!(agent_id = %agent.id, model = %agent.model, "created agent");

        let result = self.run_once(&agent.id, prompt).await;

        // The agent is disposable; losing the delete only leaks a resource
        // the service will garbage-collect.
        if let Err(error) = self.api.delete_agent(&agent.id).await {
            tracing::warn!(agent_id = %agent.id, "failed to delete agent: {}", error);
        }

        result
    }

    async fn run_once(&self, agent_id: &str, prompt: &str) -> Result<AssistantReply, AgentError> {
        let thread = self.api.create_thread().await?;
        self.api
            .create_message(&thread.id, MessageRole::User, prompt)
            .await?;

        let request = CreateRunRequest::new(agent_id).with_mcp_resources(&self.descriptor);
        let run = self.api.create_run(&thread.id, &request).await?;
        tracing::info!(run_id = %run.id, thread_id = %thread.id, "run started");

        let completed = drive_run(self.api.as_ref(), self.policy.as_ref(), run, &self.options).await?;
        tracing::info!(run_id = %completed.id, "run completed");

        let messages = self.api.list_messages(&thread.id).await?;
        let text = latest_assistant_text(&messages);

        let steps = self.api.list_run_steps(&thread.id, &completed.id).await?;
        let tool_calls = mcp_tool_names(&steps);

        Ok(AssistantReply { text, tool_calls })
    }
}

/// Text of the newest assistant message. Messages arrive newest-first.
fn latest_assistant_text(messages: &[ThreadMessage]) -> String {
    messages
        .iter()
        .find(|message| message.role == MessageRole::Assistant)
        .map(ThreadMessage::text)
        .unwrap_or_default()
}

/// Names of the MCP tools invoked across the run's tool-call steps.
fn mcp_tool_names(steps: &[RunStep]) -> Vec<String> {
    steps
        .iter()
        .filter_map(|step| step.step_details.as_ref())
        .flat_map(|details| details.tool_calls.iter())
        .filter(|call| call.kind == "mcp")
        .filter_map(|call| call.name.clone())
        .collect()
}
