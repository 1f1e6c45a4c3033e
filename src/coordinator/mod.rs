//! Polling coordinator: scheduled usage fetches and state publishing.
//!
//! One attempt runs at a time. Each attempt asks the [`CredentialManager`]
//! for a valid token, fetches usage, retries once after a forced refresh on
//! HTTP 401, and publishes either `Ready(snapshot)` or `Failed(reason)`
//! through a [`watch`] channel. Transient failures are never retried inside
//! an attempt; the next tick is the retry.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::auth::{AuthError, CredentialManager};
use crate::client::{FetchError, OAuthApi};
use crate::config::{PollInterval, DEFAULT_REQUEST_TIMEOUT};
use crate::usage::UsageSnapshot;
use crate::util::timeout::with_timeout;

/// Latest published outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinatorState {
    /// No attempt has completed yet.
    Idle,
    Ready(Arc<UsageSnapshot>),
    Failed(PollFailure),
}

impl CoordinatorState {
    pub fn snapshot(&self) -> Option<&Arc<UsageSnapshot>> {
        match self {
            Self::Ready(snapshot) => Some(snapshot),
            _ => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// Why an attempt produced no snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollFailure {
    /// Credentials were rejected; the user has to log in again.
    #[error("authentication failed, reconfigure: {0}")]
    Auth(AuthError),
    /// Network trouble, timeouts, server errors. The next tick retries.
    #[error("usage temporarily unavailable: {0}")]
    Transient(String),
}

impl PollFailure {
    pub fn requires_reconfiguration(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

impl From<AuthError> for PollFailure {
    fn from(error: AuthError) -> Self {
        if error.is_transient() {
            Self::Transient(error.to_string())
        } else {
            Self::Auth(error)
        }
    }
}

impl From<FetchError> for PollFailure {
    fn from(error: FetchError) -> Self {
        match error {
            FetchError::Unauthorized => Self::Auth(AuthError::RefreshRepeated),
            FetchError::Transient { message, .. } => Self::Transient(message),
        }
    }
}

/// Drives scheduled polls and publishes [`CoordinatorState`].
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use claude_meter::auth::{CredentialManager, FileTokenStore};
/// use claude_meter::client::OAuthClient;
/// use claude_meter::config::PollInterval;
/// use claude_meter::coordinator::UsageCoordinator;
///
/// # async fn example() -> Result<(), claude_meter::auth::AuthError> {
/// let api = Arc::new(OAuthClient::new());
/// let credentials = Arc::new(CredentialManager::load(
///     api.clone(),
///     Arc::new(FileTokenStore::new_default()),
/// )?);
/// let coordinator = UsageCoordinator::new(api, credentials, PollInterval::default());
/// let state = coordinator.poll_now().await;
/// println!("{state:?}");
/// # Ok(())
/// # }
/// ```
pub struct UsageCoordinator {
    api: Arc<dyn OAuthApi>,
    credentials: Arc<CredentialManager>,
    poll_lock: Mutex<()>,
    state_tx: watch::Sender<CoordinatorState>,
    interval_tx: watch::Sender<PollInterval>,
    fetch_timeout: Duration,
}

impl UsageCoordinator {
    pub fn new(
        api: Arc<dyn OAuthApi>,
        credentials: Arc<CredentialManager>,
        interval: PollInterval,
    ) -> Self {
        let (state_tx, _) = watch::channel(CoordinatorState::Idle);
        let (interval_tx, _) = watch::channel(interval);
        Self {
            api,
            credentials,
            poll_lock: Mutex::new(()),
            state_tx,
            interval_tx,
            fetch_timeout: DEFAULT_REQUEST_TIMEOUT * 2,
        }
    }

    /// Outer bound on a single usage fetch, on top of the client's own
    /// request timeout.
    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    /// Subscribe to published states.
    ///
    /// Callers can `.changed().await` on the receiver; reading it never
    /// blocks on a poll in progress.
    pub fn subscribe(&self) -> watch::Receiver<CoordinatorState> {
        self.state_tx.subscribe()
    }

    /// Most recently published state.
    pub fn current(&self) -> CoordinatorState {
        self.state_tx.borrow().clone()
    }

    pub fn interval(&self) -> PollInterval {
        *self.interval_tx.borrow()
    }

    /// Change the schedule. The running loop picks it up without polling
    /// immediately; the next poll is one new interval from now.
    pub fn set_interval(&self, interval: PollInterval) {
        self.interval_tx.send_if_modified(|current| {
            if *current == interval {
                return false;
            }
            tracing::info!(from = %current, to = %interval, "poll interval changed");
            *current = interval;
            true
        });
    }

    pub fn is_polling(&self) -> bool {
        self.poll_lock.try_lock().is_err()
    }

    /// Run one attempt now, after any attempt already in progress finishes.
    pub async fn poll_now(&self) -> CoordinatorState {
        let _polling = self.poll_lock.lock().await;
        let state = match self.attempt().await {
            Ok(snapshot) => {
                tracing::debug!(empty = snapshot.is_empty(), "usage snapshot ready");
                CoordinatorState::Ready(Arc::new(snapshot))
            }
            Err(failure) => {
                tracing::warn!(
                    error = %failure,
                    reconfigure = failure.requires_reconfiguration(),
                    "usage poll failed"
                );
                CoordinatorState::Failed(failure)
            }
        };
        self.state_tx.send_replace(state.clone());
        state
    }

    /// Poll on the configured interval until `shutdown` fires.
    ///
    /// The first poll runs immediately; each later one starts a full interval
    /// after the previous attempt finished, so a slow fetch never causes a
    /// catch-up burst. Cancelling drops any in-flight attempt.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut interval_rx = self.interval_tx.subscribe();
        let mut start = Instant::now();

        loop {
            let period = interval_rx.borrow_and_update().as_duration();
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::debug!("usage coordinator stopped");
                        return;
                    }
                    changed = interval_rx.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        start = Instant::now() + interval_rx.borrow().as_duration();
                        break;
                    }
                    _ = ticker.tick() => {
                        tokio::select! {
                            _ = shutdown.cancelled() => {
                                tracing::debug!("usage coordinator stopped mid-poll");
                                return;
                            }
                            _ = self.poll_now() => {}
                        }
                        ticker.reset();
                    }
                }
            }
        }
    }

    /// Spawn [`run`](Self::run) on the current runtime.
    pub fn spawn(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move { coordinator.run(shutdown).await })
    }

    async fn attempt(&self) -> Result<UsageSnapshot, PollFailure> {
        let mut token = self.credentials.get_valid_token().await?;
        let mut refreshed = false;

        let payload = loop {
            match with_timeout(self.fetch_timeout, self.api.fetch_usage(&token)).await {
                Ok(payload) => break payload,
                Err(FetchError::Unauthorized) if !refreshed => {
                    tracing::info!("usage endpoint returned 401; forcing token refresh");
                    refreshed = true;
                    token = self.credentials.force_refresh(&token).await?;
                }
                Err(err) => return Err(err.into()),
            }
        };

        Ok(UsageSnapshot::from_payload(&payload, Utc::now()))
    }
}
