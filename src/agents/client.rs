//! REST client for the Azure AI Foundry Agent Service with automatic retry
//! for transient errors.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use super::error::{AgentError, RetryConfig};
use super::{
    Agent, AgentsApi, CreateAgentRequest, CreateRunRequest, ListResponse, MessageRole, Run,
    RunStep, Thread, ThreadMessage, ToolApproval,
};
use crate::credentials::{TokenCredential, AGENTS_TOKEN_SCOPE};

const API_VERSION: &str = "v1";

/// HTTP client for one Foundry project endpoint.
///
/// Every request carries a bearer token from the credential (which caches
/// it) and the `api-version` query parameter.
pub struct AgentsClient {
    http: Client,
    endpoint: String,
    credential: Arc<dyn TokenCredential>,
    retry_config: RetryConfig,
}

impl AgentsClient {
    /// Create a client for the given project endpoint.
    pub fn new(endpoint: impl Into<String>, credential: Arc<dyn TokenCredential>) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            credential,
            retry_config: RetryConfig::default(),
        }
    }

    /// Replace the retry policy.
    #[must_use]
    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    fn url(&self, path: &str) -> String {
        let separator = if path.contains('?') { '&' } else { '?' };
        format!(
            "{}/{}{}api-version={}",
            self.endpoint, path, separator, API_VERSION
        )
    }

    /// Parse Retry-After header if present.
    fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
        headers
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok().map(Duration::from_secs))
    }

    /// Execute a single request without retry.
    async fn execute_once(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, AgentError> {
        let token = self.credential.get_token(AGENTS_TOKEN_SCOPE).await?;

        let mut request = self
            .http
            .request(method, self.url(path))
            .bearer_auth(&token.token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                if e.is_timeout() {
                    return Err(AgentError::Network(format!("request timeout: {e}")));
                } else if e.is_connect() {
                    return Err(AgentError::Network(format!("connection failed: {e}")));
                } else {
                    return Err(AgentError::Network(format!("request failed: {e}")));
                }
            }
        };

        let status = response.status();
        let retry_after = Self::parse_retry_after(response.headers());
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(AgentError::from_status(status.as_u16(), &text, retry_after));
        }

        if text.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| AgentError::Parse(format!("{e}, body: {text}")))
    }

    /// Execute a request with automatic retry for transient errors.
    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, AgentError> {
        let start = Instant::now();
        let mut attempt = 0;

        let value = loop {
            match self.execute_once(method.clone(), path, body).await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!(
                            "request to {} succeeded after {} retries",
                            path,
                            attempt
                        );
                    }
                    break value;
                }
                Err(error) => {
                    let should_retry = self.retry_config.should_retry(&error)
                        && attempt < self.retry_config.max_retries
                        && start.elapsed() < self.retry_config.max_retry_duration;
                    if !should_retry {
                        return Err(error);
                    }

                    let remaining = self
                        .retry_config
                        .max_retry_duration
                        .saturating_sub(start.elapsed());
                    let delay = error.suggested_delay(attempt).min(remaining);

                    tracing::warn!(
                        "transient failure on {} (attempt {}), retrying in {:?}: {}",
                        path,
                        attempt + 1,
                        delay,
                        error
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        };

        serde_json::from_value(value).map_err(|e| AgentError::Parse(e.to_string()))
    }
}

#[async_trait]
impl AgentsApi for AgentsClient {
    async fn create_agent(&self, request: &CreateAgentRequest) -> Result<Agent, AgentError> {
        let body = serde_json::to_value(request)
            .map_err(|e| AgentError::Parse(e.to_string()))?;
        self.execute(Method::POST, "assistants", Some(&body)).await
    }

    async fn delete_agent(&self, agent_id: &str) -> Result<(), AgentError> {
        let path = format!("assistants/{agent_id}");
        let _: Value = self.execute(Method::DELETE, &path, None).await?;
        Ok(())
    }

    async fn create_thread(&self) -> Result<Thread, AgentError> {
        self.execute(Method::POST, "threads", Some(&json!({}))).await
    }

    async fn create_message(
        &self,
        thread_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<ThreadMessage, AgentError> {
        let path = format!("threads/{thread_id}/messages");
        let body = json!({ "role": role, "content": content });
        self.execute(Method::POST, &path, Some(&body)).await
    }

    async fn create_run(
        &self,
        thread_id: &str,
        request: &CreateRunRequest,
    ) -> Result<Run, AgentError> {
        let path = format!("threads/{thread_id}/runs");
        let body = serde_json::to_value(request)
            .map_err(|e| AgentError::Parse(e.to_string()))?;
        self.execute(Method::POST, &path, Some(&body)).await
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AgentError> {
        let path = format!("threads/{thread_id}/runs/{run_id}");
        self.execute(Method::GET, &path, None).await
    }

    async fn submit_tool_approvals(
        &self,
        thread_id: &str,
        run_id: &str,
        approvals: &[ToolApproval],
    ) -> Result<Run, AgentError> {
        let path = format!("threads/{thread_id}/runs/{run_id}/submit_tool_outputs");
        let body = json!({ "tool_approvals": approvals });
        self.execute(Method::POST, &path, Some(&body)).await
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AgentError> {
        let path = format!("threads/{thread_id}/runs/{run_id}/cancel");
        self.execute(Method::POST, &path, None).await
    }

    async fn list_run_steps(
        &self,
        thread_id: &str,
        run_id: &str,
    ) -> Result<Vec<RunStep>, AgentError> {
        let path = format!("threads/{thread_id}/runs/{run_id}/steps?order=asc");
        let list: ListResponse<RunStep> = self.execute(Method::GET, &path, None).await?;
        Ok(list.data)
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, AgentError> {
        let path = format!("threads/{thread_id}/messages?order=desc");
        let list: ListResponse<ThreadMessage> = self.execute(Method::GET, &path, None).await?;
        Ok(list.data)
    }
}
