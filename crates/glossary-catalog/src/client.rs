use crate::auth::{provider_from_config, TokenProvider};
use async_trait::async_trait;
use glossary_core::{
    CatalogConfig, GlossaryConfig, RemoteTerm, RemoteTermService, ServiceError, ServiceResult,
    TermPayload,
};
use reqwest::header::{ACCEPT, CONTENT_LENGTH, LOCATION};
use reqwest::{Client, Method, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Asks the catalog to include `id` and `parentId` in listings.
const FULL_METADATA: &str = "application/json;adc.metadata=full";

#[derive(Deserialize)]
struct TermList {
    #[serde(default)]
    value: Vec<RemoteTerm>,
}

/// REST client for the glossary terms of one catalog.
///
/// Redirects are followed by hand so the method and body survive the hop, and a `401`
/// refreshes the token once. Throttled, 5xx and transport failures are retried with
/// exponential backoff; creates are retried only after `429` or a failed connect.
pub struct CatalogClient {
    http: Client,
    config: CatalogConfig,
    tokens: Arc<dyn TokenProvider>,
    retry_base: Duration,
}

impl CatalogClient {
    pub fn new(config: CatalogConfig, tokens: Arc<dyn TokenProvider>) -> ServiceResult<Self> {
        let http = build_http_client(&config)?;
        Ok(Self {
            http,
            config,
            tokens,
            retry_base: Duration::from_secs(1),
        })
    }

    pub fn from_config(config: &GlossaryConfig) -> ServiceResult<Self> {
        let http = build_http_client(&config.catalog)?;
        let tokens = provider_from_config(&config.auth, http.clone())?;
        Ok(Self {
            http,
            config: config.catalog.clone(),
            tokens,
            retry_base: Duration::from_secs(1),
        })
    }

    /// First retry waits `base`, each later one twice as long.
    pub fn with_retry_base(mut self, base: Duration) -> Self {
        self.retry_base = base;
        self
    }

    /// Collection URL of the configured glossary's terms.
    pub fn terms_url(&self) -> ServiceResult<Url> {
        let raw = format!(
            "{}/catalogs/{}/glossaries/{}/terms",
            self.config.base_url.trim_end_matches('/'),
            self.config.catalog_name,
            self.config.glossary(),
        );
        let url = Url::parse(&raw)
            .map_err(|e| ServiceError::Transport(format!("invalid catalog url {raw}: {e}")))?;
        Ok(self.with_api_version(url))
    }

    fn term_url(&self, location: &str) -> ServiceResult<Url> {
        let url = Url::parse(location)
            .map_err(|e| ServiceError::Transport(format!("invalid term location {location}: {e}")))?;
        Ok(self.with_api_version(url))
    }

    fn with_api_version(&self, mut url: Url) -> Url {
        if !url.query_pairs().any(|(k, _)| k == "api-version") {
            url.query_pairs_mut()
                .append_pair("api-version", &self.config.api_version);
        }
        url
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&TermPayload>,
        accept: Option<&str>,
    ) -> ServiceResult<Response> {
        // A failed create may still have been stored, so POST is only retried when the
        // server cannot have processed it.
        let idempotent = method != Method::POST;
        let mut target = url;
        let mut attempt: u32 = 0;
        let mut redirects = 0usize;
        let mut refreshed = false;

        loop {
            let token = self.tokens.token().await?;
            let mut request = self
                .http
                .request(method.clone(), target.clone())
                .bearer_auth(token);
            if let Some(accept) = accept {
                request = request.header(ACCEPT, accept);
            }
            request = match body {
                Some(payload) => request.json(payload),
                None => request.header(CONTENT_LENGTH, 0),
            };

            let response = match request.send().await {
                Ok(response) => response,
                Err(e)
                    if attempt < self.config.max_retries && (idempotent || e.is_connect()) =>
                {
                    attempt += 1;
                    warn!(
                        "{} {} failed (attempt {}/{}), retrying: {}",
                        method, target, attempt, self.config.max_retries, e
                    );
                    tokio::time::sleep(self.backoff(attempt)).await;
                    continue;
                }
                Err(e) => return Err(ServiceError::Transport(e.to_string())),
            };

            let status = response.status();

            if is_redirect(status) {
                redirects += 1;
                if redirects > self.config.max_redirects {
                    return Err(ServiceError::TooManyRedirects(self.config.max_redirects));
                }
                let next = location_header(&response).ok_or(ServiceError::MissingLocation)?;
                target = target.join(&next).map_err(|e| {
                    ServiceError::Transport(format!("invalid redirect target {next}: {e}"))
                })?;
                debug!("{} redirected to {}", method, target);
                continue;
            }

            if status == StatusCode::UNAUTHORIZED && !refreshed {
                refreshed = true;
                debug!("Catalog rejected the access token, refreshing");
                self.tokens.invalidate().await;
                continue;
            }

            let retryable = if idempotent {
                is_retryable(status)
            } else {
                status == StatusCode::TOO_MANY_REQUESTS
            };
            if retryable && attempt < self.config.max_retries {
                attempt += 1;
                warn!(
                    "{} {} returned {} (attempt {}/{}), retrying",
                    method, target, status, attempt, self.config.max_retries
                );
                tokio::time::sleep(self.backoff(attempt)).await;
                continue;
            }

            if !status.is_success() {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(match status {
                    StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ServiceError::Auth(body),
                    StatusCode::NOT_FOUND => ServiceError::NotFound(target.to_string()),
                    _ => ServiceError::Http {
                        status: status.as_u16(),
                        body,
                    },
                });
            }

            return Ok(response);
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.retry_base * 2u32.pow(attempt.saturating_sub(1))
    }
}

fn build_http_client(config: &CatalogConfig) -> ServiceResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| ServiceError::Transport(format!("failed to create HTTP client: {e}")))
}

fn is_redirect(status: StatusCode) -> bool {
    matches!(status.as_u16(), 301 | 302 | 303 | 307 | 308)
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn location_header(response: &Response) -> Option<String> {
    response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

#[async_trait]
impl RemoteTermService for CatalogClient {
    async fn list_all(&self) -> ServiceResult<Vec<RemoteTerm>> {
        let url = self.terms_url()?;
        let response = self.send(Method::GET, url, None, Some(FULL_METADATA)).await?;
        let list: TermList = response
            .json()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))?;
        debug!("Catalog lists {} glossary terms", list.value.len());
        Ok(list.value)
    }

    async fn create(&self, payload: &TermPayload) -> ServiceResult<String> {
        let url = self.terms_url()?;
        let response = self.send(Method::POST, url, Some(payload), None).await?;
        location_header(&response).ok_or(ServiceError::MissingLocation)
    }

    async fn update(&self, location: &str, payload: &TermPayload) -> ServiceResult<String> {
        let url = self.term_url(location)?;
        let response = self.send(Method::PUT, url, Some(payload), None).await?;
        Ok(location_header(&response).unwrap_or_else(|| location.to_string()))
    }

    async fn delete(&self, location: &str) -> ServiceResult<bool> {
        let url = self.term_url(location)?;
        let response = self.send(Method::DELETE, url, None, None).await?;
        Ok(response.status() == StatusCode::NO_CONTENT)
    }
}
