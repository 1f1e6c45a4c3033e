//! CLI auth command handlers for login, status, and logout.

use std::io::Write;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::auth::{AuthorizationFlow, CredentialManager, Credentials, FileTokenStore, TokenStore};
use crate::client::{OAuthApi, OAuthClient};
use crate::config::{MeterConfig, Settings};
use crate::error::Result;

/// Handle `claude-meter auth login`.
pub async fn handle_login(config: &MeterConfig, mut settings: Settings) -> Result<()> {
    let api = Arc::new(OAuthClient::from_config(config));
    let store = Arc::new(FileTokenStore::new(config.data_dir.clone()));

    let flow = AuthorizationFlow::new(api.clone()).with_authorize_url(config.authorize_url.clone());
    let session = flow.start()?;
    println!("🔗 Visit: {}", session.authorize_url);
    println!("📋 After authorizing, paste the response code below:");
    print!("> ");
    std::io::stdout().flush()?;

    let mut response = String::new();
    std::io::stdin().read_line(&mut response)?;

    let credentials = flow.complete(session, &response).await?;
    let access_token = credentials.access_token.clone();
    CredentialManager::new(api.clone(), store).replace(credentials)?;
    println!("✅ Claude login successful!");

    match api.fetch_profile(&access_token).await {
        Ok(profile) => {
            let title = profile.title();
            println!("   {title}");
            settings.account_title = Some(title);
            settings.save_to_path(config.settings_path())?;
        }
        Err(err) => tracing::warn!(error = %err, "could not fetch account profile"),
    }
    Ok(())
}

/// Handle `claude-meter auth status`.
pub async fn handle_status(config: &MeterConfig, settings: &Settings) -> Result<()> {
    let store = FileTokenStore::new(config.data_dir.clone());

    println!("🔐 Authentication Status\n");
    match store.load() {
        Ok(Some(credentials)) => {
            let status = login_status(&credentials, Utc::now());
            println!("  Claude: {status}");
            if let Some(title) = &settings.account_title {
                println!("  Account: {title}");
            }
        }
        Ok(None) => println!("  Claude: ❌ Not logged in"),
        Err(e) => println!("  Claude: ⚠️  Error: {e}"),
    }
    println!("  Credentials: {}", store.path().display());
    println!("  Poll interval: {}", config.poll_interval);
    Ok(())
}

/// Status line for stored credentials. A token inside the refresh margin
/// counts as expired, matching what the next poll will do with it.
fn login_status(credentials: &Credentials, now: DateTime<Utc>) -> String {
    if !credentials.needs_refresh(now) {
        format!(
            "✅ Logged in (expires {})",
            credentials.expires_at.format("%Y-%m-%d %H:%M")
        )
    } else if credentials.refresh_token.is_some() {
        "⚠️  Token expired (will refresh on next poll)".to_string()
    } else {
        "⚠️  Token expired, log in again".to_string()
    }
}

/// Handle `claude-meter auth logout`.
pub async fn handle_logout(config: &MeterConfig, mut settings: Settings) -> Result<()> {
    FileTokenStore::new(config.data_dir.clone()).clear()?;
    if settings.account_title.take().is_some() {
        settings.save_to_path(config.settings_path())?;
    }
    println!("✅ Logged out");
    Ok(())
}
