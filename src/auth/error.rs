use thiserror::Error;

/// Failures of the code exchange, refresh, and credential bookkeeping.
///
/// `Clone` so a single refresh outcome can be handed to every caller that
/// waited on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Not logged in")]
    NotLoggedIn,
    #[error("Authorization code is empty")]
    MissingCode,
    #[error("Invalid authorize URL: {0}")]
    InvalidUrl(String),
    #[error("OAuth state mismatch: expected {expected}, got {returned}")]
    StateMismatch { expected: String, returned: String },
    #[error("Token endpoint rejected the request (status {status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("Token response did not contain an access token")]
    MissingAccessToken,
    #[error("No refresh token available")]
    MissingRefreshToken,
    #[error("Token refresh already attempted in this poll cycle")]
    RefreshRepeated,
    #[error("Network error: {0}")]
    Network(String),
    #[error("Timed out after {0}ms")]
    Timeout(u64),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AuthError {
    /// Failures the next poll may recover from without the user
    /// reconfiguring anything: transport trouble and token responses of an
    /// unexpected shape.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout(_) | Self::Serialization(_) | Self::MissingAccessToken
        )
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            return Self::Serialization(error.to_string());
        }
        Self::Network(error.to_string())
    }
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::de::Error> for AuthError {
    fn from(error: toml::de::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::ser::Error> for AuthError {
    fn from(error: toml::ser::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<crate::util::timeout::TimedOut> for AuthError {
    fn from(elapsed: crate::util::timeout::TimedOut) -> Self {
        Self::Timeout(elapsed.millis())
    }
}
