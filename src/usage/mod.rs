//! Usage snapshot model and payload parsing.
//!
//! Every metric group is optional. A missing group means the subscription is
//! not entitled to it, which consumers must keep distinct from zero usage.

pub mod pace;

pub use pace::{PaceStatus, UsagePace};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// One rolling quota window (five-hour session or seven-day week).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageWindow {
    /// Percentage of the window's quota consumed, 0-100. Null while the
    /// server has no figure yet; the reset time is still kept.
    #[serde(default)]
    pub utilization: Option<f64>,
    /// Null while the window has not started.
    #[serde(default)]
    pub resets_at: Option<DateTime<Utc>>,
}

/// Pay-as-you-go credits beyond the subscription quota.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtraUsage {
    #[serde(default)]
    pub is_enabled: bool,
    #[serde(default)]
    pub utilization: Option<f64>,
    /// Cents.
    #[serde(default, deserialize_with = "cents")]
    pub used_credits: Option<i64>,
    /// Cents.
    #[serde(default, deserialize_with = "cents")]
    pub monthly_limit: Option<i64>,
}

impl ExtraUsage {
    /// Used credits in currency units.
    pub fn used_credits_amount(&self) -> Option<f64> {
        self.used_credits.map(|cents| cents as f64 / 100.0)
    }

    /// Monthly limit in currency units.
    pub fn monthly_limit_amount(&self) -> Option<f64> {
        self.monthly_limit.map(|cents| cents as f64 / 100.0)
    }
}

/// Latest usage figures for the account. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageSnapshot {
    pub five_hour: Option<UsageWindow>,
    pub seven_day: Option<UsageWindow>,
    pub seven_day_sonnet: Option<UsageWindow>,
    pub extra_usage: Option<ExtraUsage>,
    /// Present only when `seven_day` carries both utilization and a reset
    /// time.
    pub week_usage_pace: Option<UsagePace>,
    pub fetched_at: DateTime<Utc>,
}

impl UsageSnapshot {
    /// Parse the usage endpoint's JSON object.
    ///
    /// Missing keys become `None`. A group that is present but malformed
    /// (bad timestamp, wrong type) is logged and dropped on its own; it never
    /// invalidates the other groups.
    pub fn from_payload(payload: &serde_json::Value, now: DateTime<Utc>) -> Self {
        let five_hour = parse_group::<UsageWindow>(payload, "five_hour");
        let seven_day = parse_group::<UsageWindow>(payload, "seven_day");
        let seven_day_sonnet = parse_group::<UsageWindow>(payload, "seven_day_sonnet");
        let extra_usage = parse_group::<ExtraUsage>(payload, "extra_usage");

        let week_usage_pace = seven_day
            .as_ref()
            .and_then(|window| Some((window.utilization?, window.resets_at?)))
            .map(|(utilization, resets_at)| {
                UsagePace::compute(utilization, resets_at, pace::week(), now)
            });

        Self {
            five_hour,
            seven_day,
            seven_day_sonnet,
            extra_usage,
            week_usage_pace,
            fetched_at: now,
        }
    }

    /// True when the account reported no metric group at all (free tier).
    pub fn is_empty(&self) -> bool {
        self.five_hour.is_none()
            && self.seven_day.is_none()
            && self.seven_day_sonnet.is_none()
            && self.extra_usage.is_none()
    }
}

fn parse_group<T: DeserializeOwned>(payload: &serde_json::Value, key: &str) -> Option<T> {
    let raw = payload.get(key)?;
    if raw.is_null() || raw.as_object().is_some_and(|obj| obj.is_empty()) {
        return None;
    }
    match serde_json::from_value(raw.clone()) {
        Ok(group) => Some(group),
        Err(err) => {
            tracing::warn!(group = key, error = %err, "ignoring malformed usage group");
            None
        }
    }
}

fn cents<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value.map(|amount| amount.round() as i64))
}
