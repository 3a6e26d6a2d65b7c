// SPDX-License-Identifier: Apache-2.0

use std::time::{Duration, Instant};

/// Lease-derived timer: a fixed duration checked against a monotonic
/// reference point (the last confirm or last action of a virtual interface).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub(crate) struct LeaseTimer {
    duration: Duration,
}

impl LeaseTimer {
    pub(crate) fn new(secs: u32) -> Self {
        Self {
            duration: Duration::from_secs(secs.into()),
        }
    }

    /// T2 multiplied by the configured expire multiplier.
    pub(crate) fn new_expire(t2_secs: u32, multi: f64) -> Self {
        Self {
            duration: Duration::from_secs_f64(f64::from(t2_secs) * multi),
        }
    }

    pub(crate) fn has_elapsed(&self, since: Instant) -> bool {
        since.elapsed() > self.duration
    }

    pub(crate) fn secs(&self) -> u64 {
        self.duration.as_secs()
    }
}

impl std::fmt::Display for LeaseTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.duration.as_secs())
    }
}
