//! Timeout helper.

use std::future::Future;
use std::time::Duration;

/// Marker error for a bounded wait that ran out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedOut(pub Duration);

impl TimedOut {
    pub fn millis(&self) -> u64 {
        u64::try_from(self.0.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Wrap a fallible future with a timeout.
///
/// The elapsed case is converted into the caller's error type, so every
/// suspension point can share one bound without a dedicated error variant per
/// call site.
pub async fn with_timeout<T, E>(
    duration: Duration,
    future: impl Future<Output = Result<T, E>>,
) -> Result<T, E>
where
    E: From<TimedOut>,
{
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(E::from(TimedOut(duration))),
    }
}
