//! Header construction and response classification shared by every call.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;

use super::{FetchError, API_BETA_HEADER, API_BETA_VERSION};
use crate::auth::AuthError;

const MAX_BODY_CHARS: usize = 512;

/// Headers required on every request, authenticated or not.
pub fn json_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(API_BETA_HEADER, HeaderValue::from_static(API_BETA_VERSION));
    headers
}

/// [`json_headers`] plus the bearer token.
pub fn bearer_headers(access_token: &str) -> HeaderMap {
    let mut headers = json_headers();
    if let Ok(val) = HeaderValue::from_str(&format!("Bearer {access_token}")) {
        headers.insert(AUTHORIZATION, val);
    }
    headers
}

/// Classify a non-success status from an authenticated GET.
pub fn status_to_fetch_error(status: StatusCode, body: &str) -> FetchError {
    if status == StatusCode::UNAUTHORIZED {
        return FetchError::Unauthorized;
    }
    FetchError::Transient {
        status: Some(status.as_u16()),
        message: format!("HTTP {status}: {}", truncate_body(body)),
    }
}

/// Transport failure on an authenticated GET.
pub fn transport_to_fetch_error(error: reqwest::Error, timeout: Duration) -> FetchError {
    let message = if error.is_timeout() {
        format!("request timed out after {}ms", timeout.as_millis())
    } else {
        error.to_string()
    };
    FetchError::Transient {
        status: None,
        message,
    }
}

/// Transport failure on the token endpoint.
pub fn transport_to_auth_error(error: reqwest::Error, timeout: Duration) -> AuthError {
    if error.is_timeout() {
        return AuthError::Timeout(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
    }
    AuthError::from(error)
}

/// Keep diagnostics readable when a proxy returns an HTML error page.
pub fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_BODY_CHARS {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(MAX_BODY_CHARS).collect();
    format!("{cut}...")
}
