//! Configuration loading and management.
//!
//! Loads configuration from an embedded config.toml (or a user file) with
//! environment variable overrides.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::auth::{ClientCredentials, SecureString};
use crate::error::{Result, SharePointError};
use crate::graph::retry::RetryPolicy;
use crate::sharepoint::WaitOptions;

/// Embedded configuration file content.
const CONFIG_TOML: &str = include_str!("../config.toml");

/// User configuration file name.
const CONFIG_FILE: &str = "config.toml";

/// Upload session chunks must be multiples of this many bytes.
pub const UPLOAD_CHUNK_ALIGNMENT: usize = 320 * 1024;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub auth: AuthConfig,
    pub api: ApiConfig,
    pub http: HttpConfig,
    pub token: TokenConfig,
    pub retry: RetryConfig,
    pub polling: PollingConfig,
    pub download: DownloadConfig,
    pub upload: UploadConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub tenant_id: String,
    pub client_id: String,
    /// Never read from TOML; only from `AZURE_CLIENT_SECRET`.
    #[serde(skip)]
    pub client_secret: Option<SecureString>,
    pub authority_host: String,
    pub scope: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub graph_base_url: String,
    pub graph_beta_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub refresh_before_expiry_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    pub timeout_seconds: u64,
    pub poll_interval_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadConfig {
    pub default_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub simple_upload_limit_bytes: usize,
    pub chunk_size_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Config {
    /// Load configuration with environment variable overrides.
    ///
    /// A `config.toml` in the platform config directory replaces the embedded
    /// defaults when present.
    pub fn load() -> Result<Self> {
        match user_config_path().filter(|p| p.exists()) {
            Some(path) => Self::load_from(&path),
            None => Self::from_env(Self::defaults()?),
        }
    }

    /// Load configuration from an explicit file, then apply environment overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_env(Self::from_toml_str(&content)?)
    }

    /// The embedded defaults, without environment overrides or validation.
    pub fn defaults() -> Result<Self> {
        Self::from_toml_str(CONFIG_TOML)
    }

    /// Parse a TOML document into a configuration.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| SharePointError::Config(format!("Failed to parse config: {e}")))
    }

    fn from_env(mut config: Config) -> Result<Self> {
        if let Ok(client_id) = env::var("AZURE_CLIENT_ID") {
            config.auth.client_id = client_id;
        }

        if let Ok(tenant) = env::var("AZURE_TENANT_ID") {
            config.auth.tenant_id = tenant;
        }

        if let Ok(secret) = env::var("AZURE_CLIENT_SECRET") {
            config.auth.client_secret = Some(SecureString::new(secret));
        }

        if let Ok(base_url) = env::var("GRAPH_BASE_URL") {
            config.api.graph_base_url = base_url;
        }

        if let Ok(log_level) = env::var("RUST_LOG") {
            config.logging.level = log_level;
        }

        config.validate()?;

        Ok(config)
    }

    /// Validate that required configuration is present and consistent.
    pub fn validate(&self) -> Result<()> {
        if self.auth.client_id.is_empty() || self.auth.client_id == "YOUR_AZURE_AD_CLIENT_ID" {
            return Err(SharePointError::Config(
                "Azure AD client_id not configured. Set AZURE_CLIENT_ID environment variable \
                 or update config.toml"
                    .into(),
            ));
        }

        if self.auth.tenant_id.is_empty() || self.auth.tenant_id == "YOUR_TENANT_ID" {
            return Err(SharePointError::Config(
                "Azure AD tenant not configured. Set AZURE_TENANT_ID environment variable \
                 or update config.toml"
                    .into(),
            ));
        }

        if self
            .auth
            .client_secret
            .as_ref()
            .map_or(true, |s| s.as_str().is_empty())
        {
            return Err(SharePointError::Config(
                "Client secret not configured. Set AZURE_CLIENT_SECRET environment variable"
                    .into(),
            ));
        }

        if self.polling.poll_interval_seconds == 0 {
            return Err(SharePointError::Config(
                "polling.poll_interval_seconds must be greater than zero".into(),
            ));
        }

        for (key, value) in [
            ("auth.authority_host", &self.auth.authority_host),
            ("api.graph_base_url", &self.api.graph_base_url),
            ("api.graph_beta_url", &self.api.graph_beta_url),
        ] {
            let parsed = Url::parse(value)
                .map_err(|e| SharePointError::Config(format!("{key} '{value}' is not a URL: {e}")))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(SharePointError::Config(format!("{key} must be an http(s) URL")));
            }
        }

        let chunk = self.upload.chunk_size_bytes;
        if chunk == 0 || chunk % UPLOAD_CHUNK_ALIGNMENT != 0 {
            return Err(SharePointError::Config(format!(
                "upload.chunk_size_bytes must be a non-zero multiple of {UPLOAD_CHUNK_ALIGNMENT}"
            )));
        }

        Ok(())
    }

    /// Client credentials assembled from the auth section.
    pub fn credentials(&self) -> Result<ClientCredentials> {
        let secret = self
            .auth
            .client_secret
            .clone()
            .ok_or_else(|| SharePointError::Config("client secret missing".into()))?;
        Ok(ClientCredentials::new(
            self.auth.tenant_id.clone(),
            self.auth.client_id.clone(),
            secret,
        ))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_seconds)
    }

    pub fn http_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.http.connect_timeout_seconds)
    }

    pub fn refresh_margin(&self) -> Duration {
        Duration::from_secs(self.token.refresh_before_expiry_seconds)
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_secs(self.max_delay_seconds),
        }
    }
}

impl PollingConfig {
    pub fn wait_options(&self) -> WaitOptions {
        WaitOptions {
            timeout: Duration::from_secs(self.timeout_seconds),
            poll_interval: Duration::from_secs(self.poll_interval_seconds),
        }
    }
}

/// Path of the optional user configuration file.
///
/// `~/.config/sharepoint-access/config.toml` on Linux.
pub fn user_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "sharepoint-access").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}
