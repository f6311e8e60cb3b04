//! Access token cache with refresh-before-expiry.

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::credentials::{ClientCredentials, CredentialsClient};
use crate::error::AuthError;

/// An acquired access token and the instant it stops being valid.
#[derive(Clone)]
pub struct CachedToken {
    pub value: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// A token issued now and valid for `expires_in_seconds`.
    ///
    /// Lifetimes that do not fit a timestamp are rejected.
    pub fn new(value: String, expires_in_seconds: u64) -> Result<Self, AuthError> {
        let issued_at = Utc::now();
        let expires_at = i64::try_from(expires_in_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
            .ok_or_else(|| {
                AuthError::InvalidTokenResponse(format!(
                    "expires_in of {expires_in_seconds} seconds is out of range"
                ))
            })?;

        Ok(Self {
            value,
            issued_at,
            expires_at,
        })
    }

    /// True while the token is still valid for at least `margin` past `now`.
    ///
    /// The margin is capped at half the token lifetime, so short-lived tokens
    /// are still reused for a while.
    pub fn is_fresh(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        let half_lifetime = (self.expires_at - self.issued_at) / 2;
        now + margin.min(half_lifetime) < self.expires_at
    }
}

impl std::fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedToken")
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

struct CacheState {
    credentials: ClientCredentials,
    token: Option<CachedToken>,
}

/// Caches one application token and renews it shortly before it expires.
///
/// The state lock is held across acquisition so concurrent callers wait for
/// a single token request instead of each issuing their own.
pub struct TokenCache {
    client: CredentialsClient,
    refresh_margin: Duration,
    state: Mutex<CacheState>,
}

impl TokenCache {
    pub fn new(
        client: CredentialsClient,
        credentials: ClientCredentials,
        refresh_margin: std::time::Duration,
    ) -> Self {
        Self {
            client,
            refresh_margin: Duration::from_std(refresh_margin).unwrap_or(Duration::minutes(5)),
            state: Mutex::new(CacheState {
                credentials,
                token: None,
            }),
        }
    }

    /// Return a valid access token, acquiring a new one when needed.
    pub async fn access_token(&self) -> Result<String, AuthError> {
        let mut state = self.state.lock().await;

        if let Some(token) = &state.token {
            if token.is_fresh(Utc::now(), self.refresh_margin) {
                return Ok(token.value.clone());
            }
            debug!("Cached token expires at {}, renewing", token.expires_at);
        }

        let response = self.client.request_token(&state.credentials).await?;
        let token = CachedToken::new(response.access_token.clone(), response.expires_in)?;
        info!("Token cached until {}", token.expires_at);

        let value = token.value.clone();
        state.token = Some(token);
        Ok(value)
    }

    /// Drop the cached token so the next call acquires a fresh one.
    pub async fn invalidate(&self) {
        self.state.lock().await.token = None;
    }

    /// Swap the app credentials; the cached token is discarded.
    pub async fn replace_credentials(&self, credentials: ClientCredentials) {
        let mut state = self.state.lock().await;
        info!("Replacing credentials for client {}", credentials.client_id);
        state.credentials = credentials;
        state.token = None;
    }

    /// Apply an in-place edit to the current credentials; the cached token is discarded.
    pub async fn update_credentials(&self, edit: impl FnOnce(&mut ClientCredentials)) {
        let mut state = self.state.lock().await;
        edit(&mut state.credentials);
        state.token = None;
    }

    /// Expiry of the cached token, if one is held.
    pub async fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().await.token.as_ref().map(|t| t.expires_at)
    }

    /// Seed the cache with an externally acquired token.
    pub async fn seed(&self, token: CachedToken) {
        self.state.lock().await.token = Some(token);
    }
}
