//! OAuth client: token endpoint, usage endpoint, and account profile.

pub mod http;
pub mod oauth;
pub mod profile;

pub use oauth::OAuthClient;
pub use profile::{AccountProfile, SubscriptionLevel};

use async_trait::async_trait;
use thiserror::Error;

use crate::auth::{AuthError, Credentials};

pub const CLIENT_ID: &str = "9d1c250a-e61b-44d9-88ed-5944d1962f5e";
pub const AUTHORIZE_URL: &str = "https://claude.ai/oauth/authorize";
pub const TOKEN_URL: &str = "https://console.anthropic.com/v1/oauth/token";
pub const REDIRECT_URI: &str = "https://console.anthropic.com/oauth/code/callback";
pub const SCOPES: &str = "org:create_api_key user:profile user:inference";
pub const USAGE_URL: &str = "https://api.anthropic.com/api/oauth/usage";
pub const PROFILE_URL: &str = "https://api.anthropic.com/api/oauth/profile";
pub const API_BETA_HEADER: &str = "anthropic-beta";
pub const API_BETA_VERSION: &str = "oauth-2025-04-20";

/// Outcome classes of an authenticated GET.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// HTTP 401. The caller may force a refresh and retry once.
    #[error("Unauthorized (HTTP 401)")]
    Unauthorized,
    /// Network failure, timeout, any other non-2xx, or an unexpected body.
    #[error("Transient failure: {message}")]
    Transient { status: Option<u16>, message: String },
}

impl From<crate::util::timeout::TimedOut> for FetchError {
    fn from(elapsed: crate::util::timeout::TimedOut) -> Self {
        Self::Transient {
            status: None,
            message: format!("request timed out after {}ms", elapsed.millis()),
        }
    }
}

/// The network operations the credential manager and coordinator depend on.
///
/// [`OAuthClient`] is the production implementation; tests substitute
/// call-counting doubles.
#[async_trait]
pub trait OAuthApi: Send + Sync {
    /// Trade an authorization code and its PKCE verifier for credentials.
    async fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
        state: Option<&str>,
    ) -> Result<Credentials, AuthError>;

    /// Trade a refresh token for new credentials. `refresh_token` is `None`
    /// in the result when the server did not rotate it.
    async fn refresh(&self, refresh_token: &str) -> Result<Credentials, AuthError>;

    /// Fetch the raw usage payload, always a JSON object.
    async fn fetch_usage(&self, access_token: &str) -> Result<serde_json::Value, FetchError>;

    /// Fetch the account label shown next to the usage figures.
    async fn fetch_profile(&self, _access_token: &str) -> Result<AccountProfile, FetchError> {
        Ok(AccountProfile::default())
    }
}
