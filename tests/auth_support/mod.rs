#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use claude_meter::auth::{AuthError, Credentials, TokenStore};
use claude_meter::client::{FetchError, OAuthApi};
use serde_json::Value;

#[derive(Default)]
pub struct InMemoryTokenStore {
    credentials: Mutex<Option<Credentials>>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(credentials: Credentials) -> Self {
        let store = Self::default();
        *store.credentials.lock().expect("store lock poisoned") = Some(credentials);
        store
    }

    pub fn get(&self) -> Option<Credentials> {
        self.credentials.lock().expect("store lock poisoned").clone()
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn fail_saves(&self) {
        self.fail_saves.store(true, Ordering::SeqCst);
    }
}

impl TokenStore for InMemoryTokenStore {
    fn load(&self) -> Result<Option<Credentials>, AuthError> {
        Ok(self.get())
    }

    fn save(&self, credentials: &Credentials) -> Result<(), AuthError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(AuthError::Io("disk full".to_string()));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.credentials.lock().expect("store lock poisoned") = Some(credentials.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), AuthError> {
        *self.credentials.lock().expect("store lock poisoned") = None;
        Ok(())
    }
}

/// Credentials expiring `expires_in_secs` from now.
pub fn credentials(access_token: &str, refresh_token: Option<&str>, expires_in_secs: i64) -> Credentials {
    Credentials::issued(
        access_token,
        refresh_token.map(str::to_string),
        expires_in_secs,
        Utc::now(),
    )
}

/// Call-counting [`OAuthApi`] double.
///
/// Refreshes return `refreshed-<n>` access tokens (optionally rotating the
/// refresh token) unless a failure is configured. Usage fetches pop scripted
/// responses and fall back to an empty object.
pub struct FakeApi {
    refresh_calls: AtomicUsize,
    exchange_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    refresh_delay: Duration,
    fetch_delay: Duration,
    rotate_refresh_token: bool,
    refresh_failure: Mutex<Option<AuthError>>,
    fetch_script: Mutex<VecDeque<Result<Value, FetchError>>>,
    fetched_with: Mutex<Vec<String>>,
    refreshed_with: Mutex<Vec<String>>,
}

impl Default for FakeApi {
    fn default() -> Self {
        Self {
            refresh_calls: AtomicUsize::new(0),
            exchange_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            refresh_delay: Duration::ZERO,
            fetch_delay: Duration::ZERO,
            rotate_refresh_token: true,
            refresh_failure: Mutex::new(None),
            fetch_script: Mutex::new(VecDeque::new()),
            fetched_with: Mutex::new(Vec::new()),
            refreshed_with: Mutex::new(Vec::new()),
        }
    }
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    /// Refresh responses carry no `refresh_token`.
    pub fn without_rotation(mut self) -> Self {
        self.rotate_refresh_token = false;
        self
    }

    pub fn failing_refresh(self, error: AuthError) -> Self {
        *self.refresh_failure.lock().expect("lock poisoned") = Some(error);
        self
    }

    pub fn script_fetch(&self, responses: impl IntoIterator<Item = Result<Value, FetchError>>) {
        self.fetch_script
            .lock()
            .expect("lock poisoned")
            .extend(responses);
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn exchange_calls(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn fetched_with(&self) -> Vec<String> {
        self.fetched_with.lock().expect("lock poisoned").clone()
    }

    pub fn refreshed_with(&self) -> Vec<String> {
        self.refreshed_with.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl OAuthApi for FakeApi {
    async fn exchange_code(
        &self,
        code: &str,
        _verifier: &str,
        _redirect_uri: &str,
        _state: Option<&str>,
    ) -> Result<Credentials, AuthError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        Ok(credentials(&format!("access-for-{code}"), Some("refresh-0"), 3600))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Credentials, AuthError> {
        let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.refreshed_with
            .lock()
            .expect("lock poisoned")
            .push(refresh_token.to_string());
        if !self.refresh_delay.is_zero() {
            tokio::time::sleep(self.refresh_delay).await;
        }
        if let Some(error) = self.refresh_failure.lock().expect("lock poisoned").clone() {
            return Err(error);
        }
        let rotated = self.rotate_refresh_token.then(|| format!("refresh-{n}"));
        Ok(Credentials::issued(
            format!("refreshed-{n}"),
            rotated,
            3600,
            Utc::now(),
        ))
    }

    async fn fetch_usage(&self, access_token: &str) -> Result<Value, FetchError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.fetched_with
            .lock()
            .expect("lock poisoned")
            .push(access_token.to_string());
        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }
        self.fetch_script
            .lock()
            .expect("lock poisoned")
            .pop_front()
            .unwrap_or_else(|| Ok(serde_json::json!({})))
    }
}
