//! Credential client
//!
//! Exchanges a model identifier for a short-lived transport secret.

use anyhow::{Context, Result};
use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::Value;
use tracing::{debug, warn};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// `Ok(None)` when the endpoint answered without a usable secret.
    async fn fetch_secret(&self, model: &str) -> Result<Option<SecretString>>;
}

pub struct HttpCredentialProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpCredentialProvider {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl CredentialProvider for HttpCredentialProvider {
    async fn fetch_secret(&self, model: &str) -> Result<Option<SecretString>> {
        debug!(endpoint = %self.endpoint, model, "Requesting session credential");
        let body: Value = self
            .client
            .get(&self.endpoint)
            .query(&[("model", model)])
            .send()
            .await
            .context("Credential request failed")?
            .error_for_status()
            .context("Credential endpoint returned an error status")?
            .json()
            .await
            .context("Credential response was not JSON")?;
        let secret = extract_secret(&body);
        if secret.is_none() {
            warn!("No ephemeral key provided by the credential endpoint");
        }
        Ok(secret)
    }
}

/// The secret lives at `client_secret.value`.
pub fn extract_secret(body: &Value) -> Option<SecretString> {
    body.pointer("/client_secret/value")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(|s| SecretString::from(s.to_string()))
}
