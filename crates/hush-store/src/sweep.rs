//! Expiry reaping
//!
//! Unrevealed secrets are only valid for a bounded time. The reaper removes
//! them through the same claim primitive a reveal uses, so a reveal and a
//! sweep racing on one record can never both win.

use std::time::{Duration, SystemTime};

/// When records count as expired or orphaned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepPolicy {
    /// Unclaimed records older than this are destroyed
    pub max_age: Duration,
    /// Claimed records older than this are crash leftovers and destroyed
    pub lock_grace: Duration,
}

impl SweepPolicy {
    pub fn from_secs(max_age_secs: u64, lock_grace_secs: u64) -> Self {
        Self {
            max_age: Duration::from_secs(max_age_secs),
            lock_grace: Duration::from_secs(lock_grace_secs),
        }
    }
}

/// What one sweep pass removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: usize,
    pub orphaned: usize,
    /// Entries that could not be removed this pass
    pub failed: usize,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.expired + self.orphaned
    }
}

/// Age of something stamped at `then`; timestamps from the future count as
/// brand new.
pub(crate) fn age(now: SystemTime, then: SystemTime) -> Duration {
    now.duration_since(then).unwrap_or_default()
}
