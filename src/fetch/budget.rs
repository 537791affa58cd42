use chrono::{DateTime, Utc};

use crate::config::FetchPolicy;
use crate::utils::time::elapsed_between;

/// Bookkeeping that decides whether another remote call is currently permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchBudget {
    pub count: u32,
    pub window_start: DateTime<Utc>,
    pub last_request_at: Option<DateTime<Utc>>,
}

impl FetchBudget {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            count: 0,
            window_start: now,
            last_request_at: None,
        }
    }

    /// Below the ceiling for the current window and past the minimum spacing.
    pub fn allows(&self, policy: &FetchPolicy, now: DateTime<Utc>) -> bool {
        let used = if self.window_elapsed(policy, now) {
            0
        } else {
            self.count
        };

        let spaced = match self.last_request_at {
            Some(last) => elapsed_between(last, now) >= policy.min_interval,
            None => true,
        };

        used < policy.request_ceiling && spaced
    }

    /// Account for one successful remote call made at `now`.
    pub fn record(&mut self, policy: &FetchPolicy, now: DateTime<Utc>) {
        if self.window_elapsed(policy, now) {
            self.count = 0;
            self.window_start = now;
        }
        self.count = self.count.saturating_add(1);
        self.last_request_at = Some(now);
    }

    pub fn remaining(&self, policy: &FetchPolicy, now: DateTime<Utc>) -> u32 {
        if self.window_elapsed(policy, now) {
            policy.request_ceiling
        } else {
            policy.request_ceiling.saturating_sub(self.count)
        }
    }

    fn window_elapsed(&self, policy: &FetchPolicy, now: DateTime<Utc>) -> bool {
        policy
            .quota_window
            .map(|window| elapsed_between(self.window_start, now) >= window)
            .unwrap_or(false)
    }
}
