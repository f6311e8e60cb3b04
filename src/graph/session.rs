//! Authenticated Graph session with retry and backoff.

use std::time::Duration;

use reqwest::header::{HeaderName, ACCEPT, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::models::Page;
use super::retry::{is_retryable_response, is_retryable_transport, parse_retry_after, RetryPolicy};
use crate::auth::{CredentialsClient, TokenCache};
use crate::config::Config;
use crate::error::{ApiError, Result, SharePointError};

/// Header Graph echoes back for request correlation.
const CLIENT_REQUEST_ID: &str = "client-request-id";

/// Body of an outbound request. Kept owned so each attempt can rebuild it.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Bytes { data: Vec<u8>, content_type: String },
}

/// A Graph request that can be sent more than once.
#[derive(Debug, Clone)]
pub struct GraphRequest {
    pub method: Method,
    pub url: String,
    pub body: RequestBody,
    pub headers: Vec<(HeaderName, String)>,
    /// Attach the bearer token. Pre-authenticated URLs (upload sessions) must not carry it.
    pub authenticated: bool,
    /// Apply the session retry policy.
    pub retry: bool,
}

impl GraphRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: RequestBody::Empty,
            headers: Vec::new(),
            authenticated: true,
            retry: true,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(Method::PATCH, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn bytes(mut self, data: Vec<u8>, content_type: impl Into<String>) -> Self {
        self.body = RequestBody::Bytes {
            data,
            content_type: content_type.into(),
        };
        self
    }

    pub fn header(mut self, name: HeaderName, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn unauthenticated(mut self) -> Self {
        self.authenticated = false;
        self
    }

    pub fn without_retry(mut self) -> Self {
        self.retry = false;
        self
    }

    /// Method and URL without the query string; safe to log.
    pub fn operation(&self) -> String {
        let path = self.url.split('?').next().unwrap_or(&self.url);
        format!("{} {}", self.method, path)
    }
}

/// Graph session: one HTTP client, one token cache, one retry policy.
pub struct GraphSession {
    http_client: Client,
    tokens: TokenCache,
    retry: RetryPolicy,
    base_url: String,
    beta_url: String,
}

impl GraphSession {
    pub fn new(
        tokens: TokenCache,
        retry: RetryPolicy,
        base_url: impl Into<String>,
        beta_url: impl Into<String>,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(SharePointError::Network)?;

        Ok(Self {
            http_client,
            tokens,
            retry,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            beta_url: beta_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Build a session (and its token cache) from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let credentials_client = CredentialsClient::new(
            config.auth.authority_host.clone(),
            config.auth.scope.clone(),
            config.http_timeout(),
            config.http_connect_timeout(),
        )?;
        let tokens = TokenCache::new(
            credentials_client,
            config.credentials()?,
            config.refresh_margin(),
        );

        Self::new(
            tokens,
            config.retry.policy(),
            config.api.graph_base_url.clone(),
            config.api.graph_beta_url.clone(),
            config.http_timeout(),
            config.http_connect_timeout(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn beta_url(&self) -> &str {
        &self.beta_url
    }

    pub fn tokens(&self) -> &TokenCache {
        &self.tokens
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Send a request, retrying throttled and transient failures.
    ///
    /// A 401 triggers one token renewal and an immediate resend. Non-success
    /// responses that are not retried become [`ApiError`]s; when retries run
    /// out the last failure is wrapped in [`SharePointError::RetriesExhausted`].
    pub async fn execute(&self, request: GraphRequest) -> Result<Response> {
        let max_retries = if request.retry { self.retry.max_retries } else { 0 };
        let mut retries = 0u32;
        let mut renewed_token = false;

        loop {
            let (failure, retryable, retry_after) = match self.send_once(&request).await? {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    let retry_after = parse_retry_after(response.headers().get(RETRY_AFTER));
                    let (body, body_lost) = match response.text().await {
                        Ok(body) => (body, false),
                        Err(e) => {
                            warn!(
                                "{} returned {} but its body could not be read: {}",
                                request.operation(),
                                status,
                                e.without_url()
                            );
                            (String::new(), true)
                        }
                    };

                    if status == StatusCode::UNAUTHORIZED && request.authenticated && !renewed_token
                    {
                        warn!("{} returned 401, renewing token", request.operation());
                        renewed_token = true;
                        self.tokens.invalidate().await;
                        continue;
                    }

                    // A cut-off body may have carried a retryable marker.
                    let retryable = body_lost || is_retryable_response(status, &body);
                    (
                        ApiError::from_response(status, &body, retry_after),
                        retryable,
                        retry_after,
                    )
                }
                Err(e) if is_retryable_transport(&e) => {
                    let failure = if e.is_timeout() {
                        ApiError::Timeout(e.without_url().to_string())
                    } else {
                        ApiError::RequestFailed(e.without_url().to_string())
                    };
                    (failure, true, None)
                }
                Err(e) => return Err(SharePointError::Network(e.without_url())),
            };

            if !retryable {
                return Err(failure.into());
            }

            if retries >= max_retries {
                if retries == 0 {
                    return Err(failure.into());
                }
                error!(
                    "{} failed after {} attempts: {}",
                    request.operation(),
                    retries + 1,
                    failure
                );
                return Err(SharePointError::RetriesExhausted {
                    operation: request.operation(),
                    attempts: retries + 1,
                    last: failure,
                });
            }

            retries += 1;
            let delay = self.retry.delay_for(retries, retry_after);
            warn!(
                "{} failed ({}), retrying in {:?} (attempt {}/{})",
                request.operation(),
                failure,
                delay,
                retries + 1,
                max_retries + 1
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// One attempt. The outer `Result` carries token failures, the inner one transport errors.
    async fn send_once(
        &self,
        request: &GraphRequest,
    ) -> Result<std::result::Result<Response, reqwest::Error>> {
        // Pre-authenticated URLs carry their token in the query string.
        debug!("{}", request.operation());

        let mut builder = self
            .http_client
            .request(request.method.clone(), &request.url)
            .header(ACCEPT, "application/json")
            .header(CLIENT_REQUEST_ID, Uuid::new_v4().to_string());

        if request.authenticated {
            let token = self.tokens.access_token().await?;
            builder = builder.bearer_auth(token);
        }

        for (name, value) in &request.headers {
            builder = builder.header(name.clone(), value.as_str());
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Bytes { data, content_type } => builder
                .header(CONTENT_TYPE, content_type.as_str())
                .body(data.clone()),
        };

        Ok(builder.send().await)
    }

    /// Send a request and decode its JSON body.
    pub async fn send_json<T: DeserializeOwned>(&self, request: GraphRequest) -> Result<T> {
        let response = self.execute(request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::ParseFailed(e.to_string()).into())
    }

    /// GET a URL and decode its JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.send_json(GraphRequest::get(url)).await
    }

    /// Send a request whose response body is not needed; returns the status.
    pub async fn send_empty(&self, request: GraphRequest) -> Result<StatusCode> {
        let response = self.execute(request).await?;
        Ok(response.status())
    }

    /// GET a URL and return the raw body.
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.execute(GraphRequest::get(url)).await?;
        let bytes = response.bytes().await.map_err(SharePointError::Network)?;
        Ok(bytes.to_vec())
    }

    /// GET a collection, following `@odata.nextLink` until exhausted.
    pub async fn get_all_pages<T: DeserializeOwned>(&self, url: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(url.to_string());

        while let Some(url) = next.take() {
            let page: Page<T> = self.get_json(&url).await?;
            items.extend(page.value);
            next = page.next_link;
        }

        Ok(items)
    }
}
