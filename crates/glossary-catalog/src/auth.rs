use async_trait::async_trait;
use glossary_core::{AuthConfig, ServiceError, ServiceResult};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// Tokens are refreshed this long before they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);
const DEFAULT_LIFETIME: Duration = Duration::from_secs(3600);

/// Supplies bearer tokens for catalog requests.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> ServiceResult<String>;

    /// Drops any cached token; called after the catalog answers `401`.
    async fn invalidate(&self) {}
}

/// A token acquired out of band.
pub struct StaticToken {
    token: SecretString,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::from(token.into()),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> ServiceResult<String> {
        Ok(self.token.expose_secret().to_string())
    }
}

struct CachedToken {
    value: SecretString,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Seconds; Azure AD v1 endpoints send it as a string
    #[serde(default)]
    expires_in: Option<serde_json::Value>,
}

impl TokenResponse {
    fn lifetime(&self) -> Duration {
        let secs = match &self.expires_in {
            Some(serde_json::Value::Number(n)) => n.as_u64(),
            Some(serde_json::Value::String(s)) => s.parse().ok(),
            _ => None,
        };
        secs.map(Duration::from_secs).unwrap_or(DEFAULT_LIFETIME)
    }
}

/// OAuth2 client credentials grant against a token endpoint, with caching.
pub struct ClientCredentials {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: SecretString,
    resource: String,
    cached: Mutex<Option<CachedToken>>,
}

impl ClientCredentials {
    pub fn new(
        client: Client,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            client,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
            resource: resource.into(),
            cached: Mutex::new(None),
        }
    }

    async fn fetch(&self) -> ServiceResult<CachedToken> {
        debug!("Requesting access token from {}", self.token_url);
        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.expose_secret()),
                ("resource", self.resource.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ServiceError::Auth(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ServiceError::Auth(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Auth(format!("invalid token response: {e}")))?;

        Ok(CachedToken {
            expires_at: Instant::now() + token.lifetime(),
            value: SecretString::from(token.access_token),
        })
    }
}

#[async_trait]
impl TokenProvider for ClientCredentials {
    async fn token(&self) -> ServiceResult<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + EXPIRY_MARGIN {
                return Ok(token.value.expose_secret().to_string());
            }
        }

        let fresh = self.fetch().await?;
        let value = fresh.value.expose_secret().to_string();
        *cached = Some(fresh);
        Ok(value)
    }

    async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }
}

/// Picks a token provider from configuration: a static token wins over client
/// credentials.
pub fn provider_from_config(
    auth: &AuthConfig,
    client: Client,
) -> ServiceResult<Arc<dyn TokenProvider>> {
    if let Some(token) = &auth.access_token {
        return Ok(Arc::new(StaticToken::new(token.clone())));
    }

    match (&auth.token_url, &auth.client_id, &auth.client_secret) {
        (Some(url), Some(id), Some(secret)) => Ok(Arc::new(ClientCredentials::new(
            client,
            url.clone(),
            id.clone(),
            secret.clone(),
            auth.resource.clone(),
        ))),
        _ => Err(ServiceError::Auth(
            "no credentials configured: set GLOSSARY_ACCESS_TOKEN or GLOSSARY_TOKEN_URL, \
             GLOSSARY_CLIENT_ID and GLOSSARY_CLIENT_SECRET"
                .to_string(),
        )),
    }
}
