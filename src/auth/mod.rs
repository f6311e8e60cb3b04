//! Azure AD client-credentials authentication.
//!
//! Exchanges an app registration's client id and secret for a Graph bearer
//! token and caches it until shortly before expiry.

pub mod credentials;
pub mod secure;
pub mod token_cache;

pub use credentials::{ClientCredentials, CredentialsClient, TokenResponse};
pub use secure::SecureString;
pub use token_cache::{CachedToken, TokenCache};
