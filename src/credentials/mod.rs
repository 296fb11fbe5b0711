//! Azure credential acquisition.
//!
//! Tokens come from the ambient Azure CLI session (`az account
//! get-access-token`) rather than a service principal, matching how the
//! sample is run by a developer at a terminal. The credential caches tokens
//! per scope and refreshes them shortly before expiry.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::RwLock;

/// OAuth scope for the Azure AI Foundry Agent Service.
pub const AGENTS_TOKEN_SCOPE: &str = "https://ai.azure.com/.default";

/// How long before expiry a cached token is considered stale.
const REFRESH_MARGIN_SECS: i64 = 300;

/// Errors acquiring a token from the Azure CLI.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("failed to run the Azure CLI: {0}")]
    Spawn(String),
    #[error("the Azure CLI returned an error: {0}")]
    Cli(String),
    #[error("failed to parse Azure CLI token output: {0}")]
    Parse(String),
}

/// A bearer token plus its expiry instant.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_on: DateTime<Utc>,
}

impl AccessToken {
    /// Whether the token expires within the given margin from now.
    pub fn expires_within(&self, margin: Duration) -> bool {
        Utc::now() + margin >= self.expires_on
    }
}

/// Source of bearer tokens for the agent service.
#[async_trait]
pub trait TokenCredential: Send + Sync {
    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError>;
}

/// Raw shape of `az account get-access-token -o json`.
#[derive(Debug, Deserialize)]
struct AzTokenOutput {
    #[serde(rename = "accessToken")]
    access_token: String,
    /// Unix timestamp; present on azure-cli >= 2.54.
    #[serde(default, rename = "expires_on")]
    expires_on: Option<i64>,
    /// Local-time string used by older CLI versions.
    #[serde(default, rename = "expiresOn")]
    expires_on_local: Option<String>,
}

impl AzTokenOutput {
    fn into_access_token(self) -> Result<AccessToken, CredentialError> {
        let expires_on = if let Some(epoch) = self.expires_on {
            Utc.timestamp_opt(epoch, 0)
                .single()
                .ok_or_else(|| CredentialError::Parse(format!("bad expires_on value {epoch}")))?
        } else if let Some(text) = self.expires_on_local.as_deref() {
            let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
                .map_err(|e| CredentialError::Parse(format!("bad expiresOn '{text}': {e}")))?;
            Local
                .from_local_datetime(&naive)
                .single()
                .ok_or_else(|| {
                    CredentialError::Parse(format!("ambiguous local expiry '{text}'"))
                })?
                .with_timezone(&Utc)
        } else {
            return Err(CredentialError::Parse(
                "token output carries no expiry field".to_string(),
            ));
        };

        Ok(AccessToken {
            token: self.access_token,
            expires_on,
        })
    }
}

/// Credential backed by the logged-in Azure CLI session.
pub struct AzureCliCredential {
    cache: RwLock<HashMap<String, AccessToken>>,
    refresh_margin: Duration,
}

impl AzureCliCredential {
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            refresh_margin: Duration::seconds(REFRESH_MARGIN_SECS),
        }
    }

    async fn fetch_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let output = Command::new("az")
            .args(["account", "get-access-token", "--scope", scope, "-o", "json"])
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    CredentialError::Spawn("'az' was not found on PATH".to_string())
                } else {
                    CredentialError::Spawn(e.to_string())
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CredentialError::Cli(stderr.trim().to_string()));
        }

        let parsed: AzTokenOutput = serde_json::from_slice(&output.stdout)
            .map_err(|e| CredentialError::Parse(e.to_string()))?;
        parsed.into_access_token()
    }
}

impl Default for AzureCliCredential {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenCredential for AzureCliCredential {
    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        {
            let cache = self.cache.read().await;
            if let Some(token) = cache.get(scope) {
                if !token.expires_within(self.refresh_margin) {
                    return Ok(token.clone());
                }
            }
        }

        let token = self.fetch_token(scope).await?;
        tracing::debug!(scope, expires_on = %token.expires_on, "acquired Azure CLI token");

        let mut cache = self.cache.write().await;
        cache.insert(scope.to_string(), token.clone());
        Ok(token)
    }
}

/// Fixed-token credential for tests and pre-fetched tokens.
pub struct StaticCredential {
    token: String,
}

impl StaticCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenCredential for StaticCredential {
    async fn get_token(&self, _scope: &str) -> Result<AccessToken, CredentialError> {
        Ok(AccessToken {
            token: self.token.clone(),
            expires_on: Utc::now() + Duration::hours(1),
        })
    }
}
