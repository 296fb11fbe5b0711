//! Error taxonomy and retry policy for the agent service client.
//!
//! Transient failures (429, 5xx, network) are retried at the transport
//! layer; everything else terminates the flow. A run that the service
//! reports as `failed` is never retried here.

use std::time::Duration;

use thiserror::Error;

use crate::credentials::CredentialError;

/// Errors surfaced by the agents client and the run driver.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("rate limited by the agent service: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },
    #[error("agent service error (HTTP {status}): {message}")]
    Server { status: u16, message: String },
    #[error("request rejected (HTTP {status}): {message}")]
    Client { status: u16, message: String },
    #[error("failed to parse service response: {0}")]
    Parse(String),
    #[error("run failed ({code}): {message}")]
    RunFailed { code: String, message: String },
    #[error("run was cancelled before completion")]
    RunCancelled,
    #[error("run expired before completion")]
    RunExpired,
    #[error("run still required tool approvals after {rounds} rounds")]
    ApprovalRoundsExceeded { rounds: u32 },
}

impl AgentError {
    /// Map a non-success HTTP response to an error.
    pub fn from_status(status: u16, body: &str, retry_after: Option<Duration>) -> Self {
        let message = if body.trim().is_empty() {
            "(empty response body)".to_string()
        } else {
            body.trim().to_string()
        };

        match classify_http_status(status) {
            HttpErrorKind::RateLimited => AgentError::RateLimited {
                message,
                retry_after,
            },
            HttpErrorKind::ServerError => AgentError::Server { status, message },
            HttpErrorKind::ClientError if status == 401 || status == 403 => {
                AgentError::Auth(message)
            }
            HttpErrorKind::ClientError => AgentError::Client { status, message },
        }
    }

    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AgentError::Network(_) | AgentError::RateLimited { .. } | AgentError::Server { .. }
        )
    }

    /// Delay before the next attempt: the server's `Retry-After` when given,
    /// otherwise exponential backoff capped at ten seconds.
    pub fn suggested_delay(&self, attempt: u32) -> Duration {
        if let AgentError::RateLimited {
            retry_after: Some(delay),
            ..
        } = self
        {
            return *delay;
        }
        let backoff = Duration::from_millis(500) * 2u32.saturating_pow(attempt);
        backoff.min(Duration::from_secs(10))
    }

    /// A short next-step for the user, where one exists.
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            AgentError::Auth(_) => {
                Some("Run `az login` first; the sample authenticates with your Azure CLI session.")
            }
            AgentError::Client { status: 404, .. } => Some(
                "Check PROJECT_ENDPOINT and that the model deployment exists in the project.",
            ),
            _ => None,
        }
    }
}

impl From<CredentialError> for AgentError {
    fn from(error: CredentialError) -> Self {
        AgentError::Auth(error.to_string())
    }
}

/// Coarse classification of an HTTP status for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpErrorKind {
    RateLimited,
    ServerError,
    ClientError,
}

pub fn classify_http_status(status: u16) -> HttpErrorKind {
    match status {
        429 => HttpErrorKind::RateLimited,
        s if s >= 500 => HttpErrorKind::ServerError,
        _ => HttpErrorKind::ClientError,
    }
}

/// Retry policy for transient HTTP failures.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts after the first request.
    pub max_retries: u32,
    /// Hard ceiling on time spent retrying one request.
    pub max_retry_duration: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_retry_duration: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            max_retry_duration: Duration::ZERO,
        }
    }

    pub fn should_retry(&self, error: &AgentError) -> bool {
        self.max_retries > 0 && error.is_transient()
    }
}
