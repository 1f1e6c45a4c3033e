//! Consumption pace: how far utilization runs ahead of or behind the clock.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use strum::Display;

/// Deltas smaller than this (in percentage points) count as on pace.
pub const ON_PACE_TOLERANCE: f64 = 0.5;

/// Length of the weekly usage window.
pub fn week() -> Duration {
    Duration::days(7)
}

/// Utilization minus the elapsed share of the window, in percentage points.
///
/// Positive means the quota is being consumed faster than the window
/// elapses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UsagePace {
    pub delta_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaceStatus {
    Ahead,
    OnPace,
    Behind,
}

impl UsagePace {
    /// Pace for a window of length `window` that ends at `resets_at`.
    pub fn compute(
        utilization: f64,
        resets_at: DateTime<Utc>,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        let window_secs = window.num_milliseconds() as f64 / 1000.0;
        let remaining_secs = (resets_at - now).num_milliseconds() as f64 / 1000.0;
        let elapsed_percent = if window_secs > 0.0 {
            ((window_secs - remaining_secs) / window_secs * 100.0).clamp(0.0, 100.0)
        } else {
            100.0
        };
        Self {
            delta_percent: round_tenth(utilization - elapsed_percent),
        }
    }

    pub fn status(&self) -> PaceStatus {
        if self.delta_percent.abs() < ON_PACE_TOLERANCE {
            PaceStatus::OnPace
        } else if self.delta_percent > 0.0 {
            PaceStatus::Ahead
        } else {
            PaceStatus::Behind
        }
    }
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
