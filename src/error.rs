//! Error types for the SharePoint client.
//!
//! Uses `thiserror` for library-style errors with automatic `Display` and `Error` implementations.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = SharePointError> = std::result::Result<T, E>;

/// Top-level client error type.
#[derive(Error, Debug)]
pub enum SharePointError {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Drive '{0}' not found")]
    DriveNotFound(String),

    #[error("No {kind} found in '{path}'")]
    EmptyDirectory { kind: &'static str, path: String },

    #[error("Timeout waiting for '{name}' in '{folder}' after {waited:?}")]
    WaitTimeout {
        name: String,
        folder: String,
        waited: Duration,
    },

    #[error("{operation} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last: ApiError,
    },
}

/// Token acquisition errors.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Could not obtain access token: {0}")]
    TokenRequestFailed(String),

    #[error("Invalid token response: {0}")]
    InvalidTokenResponse(String),

    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),
}

/// Graph API errors derived from HTTP responses.
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized (401): token rejected")]
    Unauthorized,

    #[error("Forbidden (403): insufficient permissions")]
    Forbidden,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict (409): {0}")]
    Conflict(String),

    #[error("Rate limited (429): too many requests")]
    RateLimited { retry_after: Option<u64> },

    #[error("Graph API error {status}: {code}: {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Graph request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse API response: {0}")]
    ParseFailed(String),
}

impl ApiError {
    /// Build an error from a non-success status and its response body.
    ///
    /// Graph wraps failures as `{"error": {"code": "...", "message": "..."}}`;
    /// anything else is carried verbatim.
    pub fn from_response(status: StatusCode, body: &str, retry_after: Option<u64>) -> Self {
        let (code, message) = parse_error_envelope(body)
            .unwrap_or_else(|| (String::new(), body.trim().to_string()));

        match status.as_u16() {
            400 => Self::BadRequest(message),
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound(message),
            409 => Self::Conflict(message),
            429 => Self::RateLimited { retry_after },
            status => Self::Service {
                status,
                code,
                message,
            },
        }
    }

    /// HTTP status this error was built from, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::BadRequest(_) => Some(400),
            Self::Unauthorized => Some(401),
            Self::Forbidden => Some(403),
            Self::NotFound(_) => Some(404),
            Self::Conflict(_) => Some(409),
            Self::RateLimited { .. } => Some(429),
            Self::Service { status, .. } => Some(*status),
            Self::Timeout(_) | Self::RequestFailed(_) | Self::ParseFailed(_) => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[derive(serde::Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(serde::Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

fn parse_error_envelope(body: &str) -> Option<(String, String)> {
    let envelope: ErrorEnvelope = serde_json::from_str(body).ok()?;
    Some((envelope.error.code, envelope.error.message))
}

impl SharePointError {
    /// Returns a short message suitable for showing to an operator.
    pub fn user_message(&self) -> &str {
        match self {
            Self::Auth(AuthError::MissingCredential(_)) => {
                "Client credentials are incomplete. Check configuration."
            }
            Self::Auth(_) => "Could not authenticate against Azure AD.",
            Self::Api(ApiError::Unauthorized) => "Access token rejected. Check app credentials.",
            Self::Api(ApiError::Forbidden) => "The app registration lacks the required Graph permissions.",
            Self::Api(ApiError::NotFound(_)) => "The requested SharePoint resource does not exist.",
            Self::Api(ApiError::RateLimited { .. }) | Self::RetriesExhausted { .. } => {
                "SharePoint is throttling requests. Try again later."
            }
            Self::DriveNotFound(_) => "Document library not found on the site.",
            Self::EmptyDirectory { .. } => "The folder has no matching entries.",
            Self::WaitTimeout { .. } => "The item did not appear in time.",
            Self::Network(_) => "Network error. Check your connection.",
            Self::Config(_) => "Configuration error. Please check settings.",
            _ => "An error occurred. Please try again.",
        }
    }

    /// Returns true if the failure means the credentials themselves are bad.
    pub fn requires_reauth(&self) -> bool {
        matches!(
            self,
            Self::Auth(AuthError::TokenRequestFailed(_))
                | Self::Auth(AuthError::MissingCredential(_))
                | Self::Api(ApiError::Unauthorized)
        )
    }

    /// The underlying Graph error, if this failure came from an HTTP response.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Api(e) => Some(e),
            Self::RetriesExhausted { last, .. } => Some(last),
            _ => None,
        }
    }
}
