//! OAuth2 client-credentials grant against Azure AD.

use std::time::Duration;

use serde::Deserialize;
use zeroize::Zeroize;

use super::secure::SecureString;
use crate::error::AuthError;

/// App registration credentials used for the client-credentials grant.
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: SecureString,
}

impl ClientCredentials {
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<SecureString>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Check that no field is empty.
    pub fn ensure_complete(&self) -> Result<(), AuthError> {
        if self.tenant_id.is_empty() {
            return Err(AuthError::MissingCredential("tenant_id"));
        }
        if self.client_id.is_empty() {
            return Err(AuthError::MissingCredential("client_id"));
        }
        if self.client_secret.as_str().is_empty() {
            return Err(AuthError::MissingCredential("client_secret"));
        }
        Ok(())
    }
}

/// Token client for the Azure AD v2.0 token endpoint.
pub struct CredentialsClient {
    authority_host: String,
    scope: String,
    http_client: reqwest::Client,
}

impl CredentialsClient {
    /// Create a token client.
    ///
    /// `authority_host` is e.g. `https://login.microsoftonline.com`; `scope`
    /// is normally `https://graph.microsoft.com/.default`.
    pub fn new(
        authority_host: impl Into<String>,
        scope: impl Into<String>,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, AuthError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| AuthError::TokenRequestFailed(e.to_string()))?;

        Ok(Self {
            authority_host: authority_host.into().trim_end_matches('/').to_string(),
            scope: scope.into(),
            http_client,
        })
    }

    /// Token endpoint for a tenant.
    pub fn token_url(&self, tenant_id: &str) -> String {
        format!("{}/{}/oauth2/v2.0/token", self.authority_host, tenant_id)
    }

    /// Exchange client credentials for an application access token.
    pub async fn request_token(
        &self,
        credentials: &ClientCredentials,
    ) -> Result<TokenResponse, AuthError> {
        credentials.ensure_complete()?;

        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("scope", self.scope.as_str()),
        ];

        tracing::debug!("Requesting app token for client {}", credentials.client_id);

        let response = self
            .http_client
            .post(self.token_url(&credentials.tenant_id))
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::TokenRequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = token_error_reason(&body)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            tracing::error!("Token request failed: HTTP {} - {}", status, reason);
            return Err(AuthError::TokenRequestFailed(reason));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidTokenResponse(e.to_string()))?;

        if token_response.access_token.is_empty() {
            return Err(AuthError::InvalidTokenResponse(
                "response carried an empty access_token".into(),
            ));
        }

        tracing::info!(
            "Acquired app token, expires in {} seconds",
            token_response.expires_in
        );
        Ok(token_response)
    }
}

/// Token response from Azure AD.
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub expires_in: u64,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

impl Drop for TokenResponse {
    fn drop(&mut self) {
        self.access_token.zeroize();
    }
}

#[derive(Deserialize)]
struct TokenErrorBody {
    error: Option<String>,
    error_description: Option<String>,
}

/// Pull the human-readable reason out of an AAD error body.
fn token_error_reason(body: &str) -> Option<String> {
    let parsed: TokenErrorBody = serde_json::from_str(body).ok()?;
    parsed.error_description.or(parsed.error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_url() {
        let client = CredentialsClient::new(
            "https://login.microsoftonline.com/",
            "https://graph.microsoft.com/.default",
            Duration::from_secs(5),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            client.token_url("contoso"),
            "https://login.microsoftonline.com/contoso/oauth2/v2.0/token"
        );

        let local = CredentialsClient::new(
            "http://127.0.0.1:9999",
            "scope",
            Duration::from_secs(5),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(local.token_url("tenant"), "http://127.0.0.1:9999/tenant/oauth2/v2.0/token");
    }

    #[test]
    fn test_token_error_reason() {
        let body = r#"{"error":"invalid_client","error_description":"AADSTS7000215: Invalid client secret provided."}"#;
        assert_eq!(
            token_error_reason(body).as_deref(),
            Some("AADSTS7000215: Invalid client secret provided.")
        );
        assert_eq!(
            token_error_reason(r#"{"error":"unauthorized_client"}"#).as_deref(),
            Some("unauthorized_client")
        );
        assert_eq!(token_error_reason("<html>"), None);
    }

    #[test]
    fn test_ensure_complete() {
        let creds = ClientCredentials::new("t", "c", "");
        assert!(matches!(
            creds.ensure_complete(),
            Err(AuthError::MissingCredential("client_secret"))
        ));
        assert!(ClientCredentials::new("t", "c", "s").ensure_complete().is_ok());
    }

    #[test]
    fn test_token_response_debug_redacts() {
        let token: TokenResponse =
            serde_json::from_str(r#"{"access_token":"eyJ0eXAi","expires_in":3599}"#).unwrap();
        assert_eq!(token.token_type, "Bearer");
        assert!(!format!("{token:?}").contains("eyJ0eXAi"));
    }
}
