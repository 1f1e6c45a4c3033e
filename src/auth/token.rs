use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Margin subtracted from `expires_at` before a token is considered stale.
pub const REFRESH_SKEW_SECONDS: i64 = 60;

/// Lifetime assumed when the token endpoint omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECONDS: i64 = 3600;

/// OAuth credentials for the single monitored account.
///
/// # Example
/// ```
/// use chrono::{Duration, Utc};
/// use claude_meter::auth::Credentials;
///
/// let now = Utc::now();
/// let creds = Credentials::issued("access", Some("refresh".to_string()), 3600, now);
/// assert_eq!(creds.expires_at, now + Duration::seconds(3600));
/// assert!(!creds.needs_refresh(now));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    /// Absent when the server did not issue one. The manager fills it from
    /// the previous credentials after a refresh.
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl Credentials {
    /// Credentials whose expiry is anchored at `received_at`.
    ///
    /// A lifetime outside chrono's range saturates at the representable
    /// bounds; use [`try_issued`](Self::try_issued) to reject it instead.
    pub fn issued(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: i64,
        received_at: DateTime<Utc>,
    ) -> Self {
        let access_token = access_token.into();
        match expires_at(expires_in_secs, received_at) {
            Some(expires_at) => Self {
                access_token,
                refresh_token,
                expires_at,
            },
            None => Self {
                access_token,
                refresh_token,
                expires_at: if expires_in_secs < 0 {
                    DateTime::<Utc>::MIN_UTC
                } else {
                    DateTime::<Utc>::MAX_UTC
                },
            },
        }
    }

    /// Like [`issued`](Self::issued), but `None` when `received_at +
    /// expires_in_secs` is not a representable instant.
    pub fn try_issued(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: i64,
        received_at: DateTime<Utc>,
    ) -> Option<Self> {
        Some(Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: expires_at(expires_in_secs, received_at)?,
        })
    }

    /// True once `now` is inside the skew margin before expiry.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .checked_sub_signed(Duration::seconds(REFRESH_SKEW_SECONDS))
            .map_or(true, |deadline| now >= deadline)
    }

    /// Keep the previous refresh token when the refresh response did not
    /// rotate it.
    pub fn retaining_refresh_token(mut self, previous: Option<&str>) -> Self {
        if self.refresh_token.as_deref().map_or(true, str::is_empty) {
            self.refresh_token = previous.map(str::to_string);
        }
        self
    }
}

fn expires_at(expires_in_secs: i64, received_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
    received_at.checked_add_signed(Duration::try_seconds(expires_in_secs)?)
}
