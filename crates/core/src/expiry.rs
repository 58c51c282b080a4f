//! Expiry policy.
//!
//! The heart of the lazy time partition: a pure decision function that
//! assigns a (worklist entry, latest call record) pair to a bucket given the
//! current instant. No store consults a timer or background sweeper; every
//! read re-runs `classify` against a freshly sampled clock value, so a
//! completed call "moves" back to the active worklist simply by the clock
//! passing `called_at + grace_window`.

use crate::call_records::CallRecord;
use crate::worklist::WorklistEntry;
use chrono::{DateTime, Duration, Utc};

/// Which view of the call list a patient currently belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    /// Needs a call: on the active worklist.
    Active,
    /// Recently called: suppressed until the grace window elapses.
    Completed,
}

/// Stateless classifier parameterised by the configured grace window.
#[derive(Debug, Clone, Copy)]
pub struct ExpiryPolicy {
    grace_window: Duration,
}

impl ExpiryPolicy {
    pub fn new(grace_window: Duration) -> Self {
        Self { grace_window }
    }

    pub fn grace_window(&self) -> Duration {
        self.grace_window
    }

    /// Classifies a patient's membership at `now`.
    ///
    /// Rules, in order:
    /// 1. no record: nothing to expire, the patient is `Active`;
    /// 2. the record postdates the entry (or there is no entry) and is still
    ///    within the grace window: `Completed`;
    /// 3. otherwise `Active`.
    ///
    /// A record stamped exactly at `added_at` counts as postdating the entry:
    /// outcome logging takes precedence over a simultaneous add.
    pub fn classify(
        &self,
        entry: Option<&WorklistEntry>,
        record: Option<&CallRecord>,
        now: DateTime<Utc>,
    ) -> Bucket {
        let Some(record) = record else {
            return Bucket::Active;
        };

        let record_postdates_entry = match entry {
            None => true,
            Some(entry) => record.called_at >= entry.added_at,
        };

        if record_postdates_entry && self.within_grace_window(record.called_at, now) {
            return Bucket::Completed;
        }

        Bucket::Active
    }

    fn within_grace_window(&self, called_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(called_at) < self.grace_window
    }
}
