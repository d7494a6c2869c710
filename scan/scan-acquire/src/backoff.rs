//! Deadline-based exponential backoff.
//!
//! The controller never sleeps. Recovery pauses are expressed as explicit
//! deadlines against the pipeline [`Timestamp`], so tests drive time by hand.

use scan_types::{Duration, Timestamp};
use serde::{Deserialize, Serialize};

/// Backoff schedule parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// First delay.
    pub base: Duration,
    /// Ceiling for the doubled delay.
    pub max: Duration,
    /// Recovery attempts allowed before the controller gives up.
    pub max_retries: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

/// An armable deadline following the doubling schedule of a [`BackoffPolicy`].
///
/// Arming while already armed returns the existing deadline unchanged, so a
/// burst of quality events cannot stretch a pending recovery.
#[derive(Debug, Clone)]
pub struct BackoffTimer {
    policy: BackoffPolicy,
    current: Duration,
    retries: u32,
    deadline: Option<Timestamp>,
}

impl BackoffTimer {
    /// Creates a disarmed timer at the start of the schedule.
    #[must_use]
    pub const fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            current: policy.base,
            retries: 0,
            deadline: None,
        }
    }

    /// Arms the timer if it is disarmed, consuming one retry.
    ///
    /// Returns the active deadline, or `None` when the retry budget is
    /// exhausted. An already armed timer keeps its deadline.
    pub fn arm(&mut self, now: Timestamp) -> Option<Timestamp> {
        if let Some(deadline) = self.deadline {
            return Some(deadline);
        }
        if self.retries >= self.policy.max_retries {
            return None;
        }
        let deadline = now.saturating_add(self.current);
        self.current = self.current.saturating_mul(2).min(self.policy.max);
        self.retries += 1;
        self.deadline = Some(deadline);
        Some(deadline)
    }

    /// True if the timer is armed and the deadline has passed.
    #[must_use]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.deadline.is_some_and(|d| now >= d)
    }

    /// The armed deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Timestamp> {
        self.deadline
    }

    /// Clears the deadline but keeps the schedule position.
    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    /// Returns to the start of the schedule and disarms.
    pub fn reset(&mut self) {
        self.current = self.policy.base;
        self.retries = 0;
        self.deadline = None;
    }

    /// Retries consumed so far.
    #[must_use]
    pub const fn retries(&self) -> u32 {
        self.retries
    }

    /// The delay the next `arm` call would schedule.
    #[must_use]
    pub const fn next_delay(&self) -> Duration {
        self.current
    }
}
