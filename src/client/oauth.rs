use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::http::{
    bearer_headers, json_headers, status_to_fetch_error, transport_to_auth_error,
    transport_to_fetch_error, truncate_body,
};
use super::profile::ProfileResponse;
use super::{
    AccountProfile, FetchError, OAuthApi, CLIENT_ID, PROFILE_URL, TOKEN_URL, USAGE_URL,
};
use crate::auth::token::DEFAULT_EXPIRES_IN_SECONDS;
use crate::auth::{AuthError, Credentials};
use crate::config::{MeterConfig, DEFAULT_REQUEST_TIMEOUT};

/// HTTP implementation of [`OAuthApi`].
///
/// Holds one `reqwest::Client` so every call reuses the same connection pool.
/// Each request is bounded by the configured timeout.
///
/// # Example
/// ```no_run
/// use claude_meter::client::{OAuthApi, OAuthClient};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = OAuthClient::new();
/// let payload = client.fetch_usage("access-token").await?;
/// println!("{payload}");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
    token_url: String,
    usage_url: String,
    profile_url: String,
    timeout: Duration,
}

impl Default for OAuthClient {
    fn default() -> Self {
        Self::new()
    }
}

impl OAuthClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            token_url: TOKEN_URL.to_string(),
            usage_url: USAGE_URL.to_string(),
            profile_url: PROFILE_URL.to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn from_config(config: &MeterConfig) -> Self {
        Self::new()
            .with_token_url(config.token_url.clone())
            .with_usage_url(config.usage_url.clone())
            .with_profile_url(config.profile_url.clone())
            .with_timeout(config.request_timeout)
    }

    /// Share an existing connection pool with the host.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub fn with_usage_url(mut self, url: impl Into<String>) -> Self {
        self.usage_url = url.into();
        self
    }

    pub fn with_profile_url(mut self, url: impl Into<String>) -> Self {
        self.profile_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn post_token(&self, request: &TokenRequest<'_>) -> Result<Credentials, AuthError> {
        let resp = self
            .http
            .post(&self.token_url)
            .headers(json_headers())
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|err| transport_to_auth_error(err, self.timeout))?;
        let received_at = Utc::now();
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|err| transport_to_auth_error(err, self.timeout))?;

        if !status.is_success() {
            tracing::warn!(
                status = status.as_u16(),
                grant_type = request.grant_type,
                "token endpoint rejected request"
            );
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let payload: TokenResponse = serde_json::from_str(&body)?;
        payload.into_credentials(received_at)
    }

    async fn get_json(&self, url: &str, access_token: &str) -> Result<serde_json::Value, FetchError> {
        let resp = self
            .http
            .get(url)
            .headers(bearer_headers(access_token))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| transport_to_fetch_error(err, self.timeout))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::debug!(status = status.as_u16(), url, "authenticated GET failed");
            return Err(status_to_fetch_error(status, &body));
        }
        resp.json::<serde_json::Value>()
            .await
            .map_err(|err| transport_to_fetch_error(err, self.timeout))
    }
}

#[async_trait]
impl OAuthApi for OAuthClient {
    async fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
        state: Option<&str>,
    ) -> Result<Credentials, AuthError> {
        let request = TokenRequest {
            grant_type: "authorization_code",
            client_id: CLIENT_ID,
            code: Some(code),
            code_verifier: Some(verifier),
            redirect_uri: Some(redirect_uri),
            state,
            refresh_token: None,
        };
        let credentials = self.post_token(&request).await?;
        tracing::info!(expires_at = %credentials.expires_at, "authorization code exchanged");
        Ok(credentials)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Credentials, AuthError> {
        let request = TokenRequest {
            grant_type: "refresh_token",
            client_id: CLIENT_ID,
            code: None,
            code_verifier: None,
            redirect_uri: None,
            state: None,
            refresh_token: Some(refresh_token),
        };
        let credentials = self.post_token(&request).await?;
        tracing::debug!(
            expires_at = %credentials.expires_at,
            rotated = credentials.refresh_token.is_some(),
            "access token refreshed"
        );
        Ok(credentials)
    }

    async fn fetch_usage(&self, access_token: &str) -> Result<serde_json::Value, FetchError> {
        let payload = self.get_json(&self.usage_url, access_token).await?;
        if !payload.is_object() {
            return Err(FetchError::Transient {
                status: None,
                message: format!("usage payload is not a JSON object: {}", truncate_body(&payload.to_string())),
            });
        }
        Ok(payload)
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<AccountProfile, FetchError> {
        let payload = self.get_json(&self.profile_url, access_token).await?;
        let response: ProfileResponse =
            serde_json::from_value(payload).map_err(|err| FetchError::Transient {
                status: None,
                message: format!("unexpected profile shape: {err}"),
            })?;
        Ok(response.into())
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    client_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code_verifier: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect_uri: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    #[allow(dead_code)]
    token_type: Option<String>,
}

impl TokenResponse {
    fn into_credentials(self, received_at: DateTime<Utc>) -> Result<Credentials, AuthError> {
        let access_token = self
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingAccessToken)?;
        let refresh_token = self.refresh_token.filter(|token| !token.is_empty());
        let expires_in = self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECONDS);
        Credentials::try_issued(access_token, refresh_token, expires_in, received_at).ok_or_else(
            || AuthError::Serialization(format!("expires_in out of range: {expires_in}")),
        )
    }
}
