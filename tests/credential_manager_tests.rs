mod auth_support;

use std::sync::Arc;
use std::time::Duration;

use claude_meter::auth::{AuthError, CredentialManager};
use futures::future::join_all;
use pretty_assertions::assert_eq;

use auth_support::{credentials, FakeApi, InMemoryTokenStore};

fn manager_with(
    api: &Arc<FakeApi>,
    store: &Arc<InMemoryTokenStore>,
) -> CredentialManager {
    CredentialManager::load(api.clone(), store.clone()).expect("load manager")
}

#[tokio::test]
async fn fresh_token_is_returned_without_refresh() {
    let api = Arc::new(FakeApi::new());
    let store = Arc::new(InMemoryTokenStore::seeded(credentials(
        "access-a",
        Some("refresh-0"),
        120,
    )));
    let manager = manager_with(&api, &store);

    assert_eq!(manager.get_valid_token().await.unwrap(), "access-a");
    assert_eq!(api.refresh_calls(), 0);
}

#[tokio::test]
async fn token_inside_skew_margin_is_refreshed_and_persisted() {
    let api = Arc::new(FakeApi::new());
    let store = Arc::new(InMemoryTokenStore::seeded(credentials(
        "access-a",
        Some("refresh-0"),
        30,
    )));
    let manager = manager_with(&api, &store);

    assert_eq!(manager.get_valid_token().await.unwrap(), "refreshed-1");
    assert_eq!(api.refresh_calls(), 1);
    assert_eq!(api.refreshed_with(), vec!["refresh-0".to_string()]);

    let saved = store.get().expect("saved credentials");
    assert_eq!(saved.access_token, "refreshed-1");
    assert_eq!(saved.refresh_token.as_deref(), Some("refresh-1"));

    // the new token is good for an hour; no second refresh
    assert_eq!(manager.get_valid_token().await.unwrap(), "refreshed-1");
    assert_eq!(api.refresh_calls(), 1);
}

#[tokio::test]
async fn concurrent_callers_share_one_refresh() {
    let api = Arc::new(FakeApi::new().with_refresh_delay(Duration::from_millis(50)));
    let store = Arc::new(InMemoryTokenStore::seeded(credentials(
        "access-a",
        Some("refresh-0"),
        10,
    )));
    let manager = Arc::new(manager_with(&api, &store));

    let results = join_all((0..8).map(|_| {
        let manager = manager.clone();
        async move { manager.get_valid_token().await }
    }))
    .await;

    assert_eq!(api.refresh_calls(), 1);
    for result in results {
        assert_eq!(result.unwrap(), "refreshed-1");
    }
}

#[tokio::test]
async fn concurrent_callers_share_one_failure() {
    let rejection = AuthError::Rejected {
        status: 400,
        body: r#"{"error":"invalid_grant"}"#.to_string(),
    };
    let api = Arc::new(
        FakeApi::new()
            .with_refresh_delay(Duration::from_millis(50))
            .failing_refresh(rejection.clone()),
    );
    let original = credentials("access-a", Some("refresh-0"), 10);
    let store = Arc::new(InMemoryTokenStore::seeded(original.clone()));
    let manager = Arc::new(manager_with(&api, &store));

    let results = join_all((0..5).map(|_| {
        let manager = manager.clone();
        async move { manager.get_valid_token().await }
    }))
    .await;

    assert_eq!(api.refresh_calls(), 1);
    for result in results {
        assert_eq!(result, Err(rejection.clone()));
    }
    assert_eq!(manager.credentials().unwrap(), Some(original.clone()));
    assert_eq!(store.get(), Some(original));
}

#[tokio::test]
async fn missing_refresh_token_in_response_keeps_previous() {
    let api = Arc::new(FakeApi::new().without_rotation());
    let store = Arc::new(InMemoryTokenStore::seeded(credentials(
        "access-a",
        Some("refresh-0"),
        0,
    )));
    let manager = manager_with(&api, &store);

    assert_eq!(manager.get_valid_token().await.unwrap(), "refreshed-1");
    let current = manager.credentials().unwrap().expect("credentials");
    assert_eq!(current.refresh_token.as_deref(), Some("refresh-0"));
    assert_eq!(
        store.get().and_then(|saved| saved.refresh_token),
        Some("refresh-0".to_string())
    );
}

#[tokio::test]
async fn force_refresh_skips_network_when_token_already_replaced() {
    let api = Arc::new(FakeApi::new());
    let store = Arc::new(InMemoryTokenStore::seeded(credentials(
        "access-b",
        Some("refresh-0"),
        3600,
    )));
    let manager = manager_with(&api, &store);

    assert_eq!(manager.force_refresh("access-a").await.unwrap(), "access-b");
    assert_eq!(api.refresh_calls(), 0);

    assert_eq!(manager.force_refresh("access-b").await.unwrap(), "refreshed-1");
    assert_eq!(api.refresh_calls(), 1);
}

#[tokio::test]
async fn not_logged_in_never_calls_the_server() {
    let api = Arc::new(FakeApi::new());
    let store = Arc::new(InMemoryTokenStore::new());
    let manager = manager_with(&api, &store);

    assert!(!manager.is_logged_in());
    assert_eq!(manager.get_valid_token().await, Err(AuthError::NotLoggedIn));
    assert_eq!(api.refresh_calls(), 0);
}

#[tokio::test]
async fn expired_without_refresh_token_requires_login() {
    let api = Arc::new(FakeApi::new());
    let store = Arc::new(InMemoryTokenStore::seeded(credentials("access-a", None, -5)));
    let manager = manager_with(&api, &store);

    assert_eq!(
        manager.get_valid_token().await,
        Err(AuthError::MissingRefreshToken)
    );
    assert_eq!(api.refresh_calls(), 0);
    assert!(manager.is_logged_in());
}

#[tokio::test]
async fn persistence_failure_keeps_refreshed_credentials_in_memory() {
    let api = Arc::new(FakeApi::new());
    let original = credentials("access-a", Some("refresh-0"), 0);
    let store = Arc::new(InMemoryTokenStore::seeded(original.clone()));
    store.fail_saves();
    let manager = manager_with(&api, &store);

    assert_eq!(manager.get_valid_token().await.unwrap(), "refreshed-1");
    assert_eq!(
        manager.credentials().unwrap().map(|c| c.access_token),
        Some("refreshed-1".to_string())
    );
    assert_eq!(store.get(), Some(original));
}

#[tokio::test(start_paused = true)]
async fn slow_refresh_times_out_and_keeps_credentials() {
    let api = Arc::new(FakeApi::new().with_refresh_delay(Duration::from_secs(60)));
    let original = credentials("access-a", Some("refresh-0"), 0);
    let store = Arc::new(InMemoryTokenStore::seeded(original.clone()));
    let manager = manager_with(&api, &store).with_wait_timeout(Duration::from_secs(5));

    let result = manager.get_valid_token().await;

    assert_eq!(result, Err(AuthError::Timeout(5_000)));
    assert!(result.unwrap_err().is_transient());
    assert_eq!(manager.credentials().unwrap(), Some(original));
}

#[tokio::test]
async fn replace_and_clear_round_trip_through_store() {
    let api = Arc::new(FakeApi::new());
    let store = Arc::new(InMemoryTokenStore::new());
    let manager = manager_with(&api, &store);

    let fresh = credentials("access-new", Some("refresh-new"), 3600);
    manager.replace(fresh.clone()).unwrap();
    assert_eq!(store.get(), Some(fresh));
    assert_eq!(manager.get_valid_token().await.unwrap(), "access-new");

    manager.clear().unwrap();
    assert!(store.get().is_none());
    assert!(!manager.is_logged_in());
}
