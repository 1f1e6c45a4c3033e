use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;

use super::error::AuthError;
use super::store::TokenStore;
use super::token::Credentials;
use crate::client::OAuthApi;
use crate::config::DEFAULT_REQUEST_TIMEOUT;
use crate::util::timeout::with_timeout;

/// Owns the account's credentials and keeps the access token fresh.
///
/// A token is handed out as-is while `now < expires_at - 60s`; otherwise it
/// is refreshed first. Refreshes are single-flight: callers that arrive while
/// one is running wait for it and receive its outcome (the same credentials,
/// or a clone of the same error) instead of sending a second refresh with a
/// refresh token the first one may already have rotated.
///
/// Credentials are replaced in one synchronous step after a complete refresh
/// response, so dropping a caller mid-refresh (shutdown) leaves the previous
/// credentials intact and releases the refresh lock.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use claude_meter::auth::{CredentialManager, FileTokenStore};
/// use claude_meter::client::OAuthClient;
///
/// # async fn example() -> Result<(), claude_meter::auth::AuthError> {
/// let manager = CredentialManager::load(
///     Arc::new(OAuthClient::new()),
///     Arc::new(FileTokenStore::new_default()),
/// )?;
/// let access_token = manager.get_valid_token().await?;
/// # Ok(())
/// # }
/// ```
pub struct CredentialManager {
    api: Arc<dyn OAuthApi>,
    store: Arc<dyn TokenStore>,
    current: RwLock<Option<Credentials>>,
    refresh: Mutex<RefreshLedger>,
    /// Mirror of `RefreshLedger::generation`, readable without the lock.
    generation: AtomicU64,
    wait_timeout: Duration,
}

/// Outcome of the most recent refresh, shared with callers that waited on it.
#[derive(Default)]
struct RefreshLedger {
    generation: u64,
    last_outcome: Option<Result<Credentials, AuthError>>,
}

impl CredentialManager {
    /// Manager with no credentials yet; call [`replace`](Self::replace) after
    /// the code exchange.
    pub fn new(api: Arc<dyn OAuthApi>, store: Arc<dyn TokenStore>) -> Self {
        Self {
            api,
            store,
            current: RwLock::new(None),
            refresh: Mutex::new(RefreshLedger::default()),
            generation: AtomicU64::new(0),
            wait_timeout: DEFAULT_REQUEST_TIMEOUT * 2,
        }
    }

    /// Manager seeded from whatever the store holds.
    pub fn load(api: Arc<dyn OAuthApi>, store: Arc<dyn TokenStore>) -> Result<Self, AuthError> {
        let loaded = store.load()?;
        let manager = Self::new(api, store);
        if let Some(credentials) = loaded {
            manager.install(credentials)?;
        }
        Ok(manager)
    }

    /// Upper bound for one refresh call and for waiting on another caller's.
    pub fn with_wait_timeout(mut self, wait_timeout: Duration) -> Self {
        self.wait_timeout = wait_timeout;
        self
    }

    /// Copy of the current credentials.
    pub fn credentials(&self) -> Result<Option<Credentials>, AuthError> {
        self.current
            .read()
            .map(|guard| guard.clone())
            .map_err(|_| AuthError::Io("credential lock poisoned".to_string()))
    }

    pub fn is_logged_in(&self) -> bool {
        matches!(self.credentials(), Ok(Some(_)))
    }

    /// Install credentials from a fresh login and persist them.
    pub fn replace(&self, credentials: Credentials) -> Result<(), AuthError> {
        self.store.save(&credentials)?;
        self.install(credentials)
    }

    /// Forget the credentials everywhere. Only explicit reconfiguration
    /// (logout) calls this; no failure path does.
    pub fn clear(&self) -> Result<(), AuthError> {
        self.store.clear()?;
        let mut guard = self
            .current
            .write()
            .map_err(|_| AuthError::Io("credential lock poisoned".to_string()))?;
        *guard = None;
        tracing::info!("credentials cleared");
        Ok(())
    }

    /// Access token valid for at least the skew margin, refreshing if needed.
    pub async fn get_valid_token(&self) -> Result<String, AuthError> {
        self.valid_token(None).await
    }

    /// Refresh after the server rejected `rejected_token` with a 401.
    ///
    /// No network call is made when another caller already replaced the
    /// rejected token.
    pub async fn force_refresh(&self, rejected_token: &str) -> Result<String, AuthError> {
        self.valid_token(Some(rejected_token)).await
    }

    async fn valid_token(&self, rejected: Option<&str>) -> Result<String, AuthError> {
        let seen = self.generation.load(Ordering::Acquire);
        let current = self.credentials()?.ok_or(AuthError::NotLoggedIn)?;
        if !is_stale(&current, rejected) {
            return Ok(current.access_token);
        }

        let mut ledger = with_timeout(self.wait_timeout, async {
            Ok::<_, AuthError>(self.refresh.lock().await)
        })
        .await?;

        if ledger.generation != seen {
            match &ledger.last_outcome {
                Some(Ok(_)) => return self.current_access_token(),
                Some(Err(err)) => return Err(err.clone()),
                None => {}
            }
        }

        let current = self.credentials()?.ok_or(AuthError::NotLoggedIn)?;
        if !is_stale(&current, rejected) {
            return Ok(current.access_token);
        }

        let outcome = self.refresh_now(&current).await;
        ledger.generation += 1;
        ledger.last_outcome = Some(outcome.clone());
        self.generation.store(ledger.generation, Ordering::Release);
        outcome.map(|credentials| credentials.access_token)
    }

    async fn refresh_now(&self, current: &Credentials) -> Result<Credentials, AuthError> {
        let refresh_token = current
            .refresh_token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingRefreshToken)?;

        tracing::debug!(expires_at = %current.expires_at, "refreshing access token");
        let refreshed = match with_timeout(self.wait_timeout, self.api.refresh(refresh_token)).await {
            Ok(refreshed) => refreshed.retaining_refresh_token(Some(refresh_token)),
            Err(err) => {
                tracing::warn!(error = %err, "token refresh failed; keeping previous credentials");
                return Err(err);
            }
        };

        self.install(refreshed.clone())?;
        if let Err(err) = self.store.save(&refreshed) {
            tracing::warn!(error = %err, "failed to persist refreshed credentials");
        }
        Ok(refreshed)
    }

    fn install(&self, credentials: Credentials) -> Result<(), AuthError> {
        let mut guard = self
            .current
            .write()
            .map_err(|_| AuthError::Io("credential lock poisoned".to_string()))?;
        *guard = Some(credentials);
        Ok(())
    }

    fn current_access_token(&self) -> Result<String, AuthError> {
        self.credentials()?
            .map(|credentials| credentials.access_token)
            .ok_or(AuthError::NotLoggedIn)
    }
}

fn is_stale(current: &Credentials, rejected: Option<&str>) -> bool {
    rejected.is_some_and(|token| token == current.access_token) || current.needs_refresh(Utc::now())
}
