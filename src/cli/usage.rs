//! CLI handlers for `usage`, `watch`, and `config interval`.

use std::fmt::Write as _;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::auth::{CredentialManager, FileTokenStore};
use crate::client::{FetchError, OAuthClient};
use crate::config::{MeterConfig, PollInterval, Settings};
use crate::coordinator::{CoordinatorState, PollFailure, UsageCoordinator};
use crate::error::{MeterError, Result};
use crate::usage::{UsageSnapshot, UsageWindow};

fn coordinator(config: &MeterConfig) -> Result<Arc<UsageCoordinator>> {
    let api = Arc::new(OAuthClient::from_config(config));
    let store = Arc::new(FileTokenStore::new(config.data_dir.clone()));
    let credentials = Arc::new(CredentialManager::load(api.clone(), store)?);
    Ok(Arc::new(UsageCoordinator::new(
        api,
        credentials,
        config.poll_interval,
    )))
}

/// Handle `claude-meter usage`.
pub async fn handle_usage(config: &MeterConfig, settings: &Settings, json: bool) -> Result<()> {
    let state = coordinator(config)?.poll_now().await;
    match (&state, json) {
        (CoordinatorState::Ready(snapshot), true) => {
            println!("{}", serde_json::to_string_pretty(&**snapshot)?);
        }
        _ => print!("{}", render_state(&state, settings.account_title.as_deref())),
    }
    poll_outcome(state)
}

/// Turn a one-shot poll result into the command's exit result.
fn poll_outcome(state: CoordinatorState) -> Result<()> {
    match state {
        CoordinatorState::Failed(PollFailure::Auth(err)) => Err(MeterError::Auth(err)),
        CoordinatorState::Failed(PollFailure::Transient(message)) => {
            Err(MeterError::Fetch(FetchError::Transient {
                status: None,
                message,
            }))
        }
        _ => Ok(()),
    }
}

/// Handle `claude-meter watch`. Returns once `shutdown` fires.
pub async fn handle_watch(
    config: &MeterConfig,
    settings: &Settings,
    shutdown: CancellationToken,
) -> Result<()> {
    let coordinator = coordinator(config)?;
    let mut states = coordinator.subscribe();
    let handle = coordinator.spawn(shutdown.clone());
    println!("⏳ Polling every {} (Ctrl-C to stop)", config.poll_interval);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                print!("{}", render_state(&state, settings.account_title.as_deref()));
            }
        }
    }

    if let Err(err) = handle.await {
        tracing::warn!(error = %err, "coordinator task ended abnormally");
    }
    Ok(())
}

/// Handle `claude-meter config interval <secs>`.
pub fn handle_interval(config: &MeterConfig, mut settings: Settings, secs: u64) -> Result<()> {
    let interval = PollInterval::from_secs(secs)?;
    settings.poll_interval_secs = Some(interval.as_secs());
    settings.save_to_path(config.settings_path())?;
    println!("✅ Poll interval set to {interval}");
    Ok(())
}

/// Human-readable rendering of one published state.
pub fn render_state(state: &CoordinatorState, title: Option<&str>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", title.unwrap_or("Claude Usage"));
    match state {
        CoordinatorState::Idle => {
            let _ = writeln!(out, "  waiting for first poll");
        }
        CoordinatorState::Ready(snapshot) => render_snapshot(&mut out, snapshot),
        CoordinatorState::Failed(failure) if failure.requires_reconfiguration() => {
            let _ = writeln!(out, "  ❌ {failure}");
        }
        CoordinatorState::Failed(failure) => {
            let _ = writeln!(out, "  ⚠️  {failure}");
        }
    }
    out
}

fn render_snapshot(out: &mut String, snapshot: &UsageSnapshot) {
    if snapshot.is_empty() {
        let _ = writeln!(out, "  no usage limits reported for this account");
        return;
    }
    render_window(out, "Session (5h)", snapshot.five_hour.as_ref());
    render_window(out, "Week (all models)", snapshot.seven_day.as_ref());
    render_window(out, "Week (Sonnet)", snapshot.seven_day_sonnet.as_ref());

    if let Some(pace) = &snapshot.week_usage_pace {
        let _ = writeln!(
            out,
            "  {:<18} {:+.1}% ({})",
            "Weekly pace",
            pace.delta_percent,
            pace.status()
        );
    }

    if let Some(extra) = snapshot.extra_usage.as_ref().filter(|extra| extra.is_enabled) {
        match (extra.used_credits_amount(), extra.monthly_limit_amount()) {
            (Some(used), Some(limit)) => {
                let _ = writeln!(out, "  {:<18} {used:.2} / {limit:.2}", "Extra usage");
            }
            (Some(used), None) => {
                let _ = writeln!(out, "  {:<18} {used:.2}", "Extra usage");
            }
            _ => {
                let _ = writeln!(out, "  {:<18} enabled", "Extra usage");
            }
        }
    }
}

fn render_window(out: &mut String, label: &str, window: Option<&UsageWindow>) {
    let Some(window) = window else {
        return;
    };
    match window.utilization {
        Some(utilization) => {
            let _ = write!(out, "  {label:<18} {utilization:>5.1}%");
        }
        None => {
            let _ = write!(out, "  {label:<18} {:>6}", "n/a");
        }
    }
    if let Some(resets_at) = window.resets_at {
        let local = resets_at.with_timezone(&chrono::Local);
        let _ = write!(out, "  resets {}", local.format("%a %H:%M"));
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthError;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn renders_absent_groups_as_missing_lines() {
        let snapshot = UsageSnapshot::from_payload(
            &json!({ "five_hour": { "utilization": 42.0, "resets_at": null } }),
            Utc::now(),
        );
        let out = render_state(&CoordinatorState::Ready(Arc::new(snapshot)), None);
        assert!(out.contains("Session (5h)"));
        assert!(out.contains("42.0%"));
        assert!(!out.contains("Week (all models)"));
    }

    #[test]
    fn renders_missing_utilization_as_not_available() {
        let snapshot = UsageSnapshot::from_payload(
            &json!({ "five_hour": { "utilization": null, "resets_at": "2026-10-19T18:00:00Z" } }),
            Utc::now(),
        );
        let out = render_state(&CoordinatorState::Ready(Arc::new(snapshot)), None);
        assert!(out.contains("n/a"));
        assert!(out.contains("resets"));
    }

    #[test]
    fn failed_poll_maps_to_categorized_errors() {
        let auth = poll_outcome(CoordinatorState::Failed(PollFailure::Auth(
            AuthError::NotLoggedIn,
        )))
        .unwrap_err();
        assert_eq!(crate::cli::exit_code(&auth), crate::cli::EXIT_AUTH);

        let transient = poll_outcome(CoordinatorState::Failed(PollFailure::Transient(
            "HTTP 503".to_string(),
        )))
        .unwrap_err();
        assert!(transient.is_retryable());

        let ready = CoordinatorState::Ready(Arc::new(UsageSnapshot::from_payload(
            &json!({}),
            Utc::now(),
        )));
        assert!(poll_outcome(ready).is_ok());
    }

    #[test]
    fn renders_free_tier_message() {
        let snapshot = UsageSnapshot::from_payload(&json!({}), Utc::now());
        let out = render_state(
            &CoordinatorState::Ready(Arc::new(snapshot)),
            Some("Claude Usage (Ada)"),
        );
        assert!(out.starts_with("Claude Usage (Ada)\n"));
        assert!(out.contains("no usage limits reported"));
    }

    #[test]
    fn renders_failures_by_class() {
        let auth = render_state(
            &CoordinatorState::Failed(PollFailure::Auth(AuthError::NotLoggedIn)),
            None,
        );
        assert!(auth.contains("❌"));
        let transient = render_state(
            &CoordinatorState::Failed(PollFailure::Transient("HTTP 503".to_string())),
            None,
        );
        assert!(transient.contains("⚠️"));
        assert!(transient.contains("HTTP 503"));
    }
}
