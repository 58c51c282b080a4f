//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. The intent is to avoid reading process-wide environment variables
//! during request handling, which can lead to inconsistent behaviour in multi-threaded runtimes
//! and test harnesses.

use crate::{CallListError, CallListResult};
use chrono::Duration;

/// Default grace window: completed calls are suppressed for this long.
pub const DEFAULT_GRACE_WINDOW_HOURS: i64 = 8;

/// Default deadline for a single store lock acquisition.
pub const DEFAULT_STORE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    grace_window: Duration,
    store_timeout: std::time::Duration,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`CallListError::InvalidInput`] if the grace window is not
    /// strictly positive or the store timeout is zero.
    pub fn new(grace_window: Duration, store_timeout: std::time::Duration) -> CallListResult<Self> {
        if grace_window <= Duration::zero() {
            return Err(CallListError::InvalidInput(
                "grace_window must be strictly positive".into(),
            ));
        }
        if store_timeout.is_zero() {
            return Err(CallListError::InvalidInput(
                "store_timeout must be non-zero".into(),
            ));
        }

        Ok(Self {
            grace_window,
            store_timeout,
        })
    }

    /// How long a completed call stays off the active worklist, measured from
    /// `called_at` and re-evaluated at every read.
    pub fn grace_window(&self) -> Duration {
        self.grace_window
    }

    /// Deadline applied to each store lock acquisition.
    pub fn store_timeout(&self) -> std::time::Duration {
        self.store_timeout
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            grace_window: Duration::hours(DEFAULT_GRACE_WINDOW_HOURS),
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

/// Parse the grace window from an optional string value, given in whole hours.
///
/// If `value` is `None` or empty/whitespace, returns the default window.
pub fn grace_window_from_env_value(value: Option<String>) -> CallListResult<Duration> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        None => Ok(Duration::hours(DEFAULT_GRACE_WINDOW_HOURS)),
        Some(v) => {
            let hours: i64 = v.parse().map_err(|_| {
                CallListError::InvalidInput(format!(
                    "grace window must be a whole number of hours, got '{v}'"
                ))
            })?;
            if hours <= 0 {
                return Err(CallListError::InvalidInput(
                    "grace window must be at least one hour".into(),
                ));
            }
            Ok(Duration::hours(hours))
        }
    }
}
