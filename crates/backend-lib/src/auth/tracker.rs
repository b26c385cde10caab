// ============================
// crates/backend-lib/src/auth/tracker.rs
// ============================
//! Failed-login tracking and temporary IP blocking.
//!
//! All state for one client address (its recent failures and its block, if
//! any) lives in a single map entry, so every operation on an address runs
//! under that entry's lock. State is per process: a restart, or a second
//! process behind the same load balancer, sees a clean slate.

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use metrics::counter;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::metrics::{LOGIN_FAILED, IP_BLOCKED};

/// Default number of failed attempts before blocking
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default block duration (30 minutes)
pub const DEFAULT_BLOCK_DURATION_SECS: i64 = 30 * 60;

/// Failures older than this no longer count toward the threshold
pub const ATTEMPT_WINDOW_SECS: i64 = 60 * 60;

/// Thresholds applied by [`LoginTracker`]
#[derive(Debug, Clone, Copy)]
pub struct TrackerPolicy {
    pub max_attempts: u32,
    pub block_duration: TimeDelta,
    pub attempt_window: TimeDelta,
}

impl Default for TrackerPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            block_duration: TimeDelta::seconds(DEFAULT_BLOCK_DURATION_SECS),
            attempt_window: TimeDelta::seconds(ATTEMPT_WINDOW_SECS),
        }
    }
}

/// One failed login. The client address is the map key.
#[derive(Debug, Clone)]
pub struct FailedAttempt {
    pub username: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct AddressRecord {
    attempts: Vec<FailedAttempt>,
    blocked_until: Option<DateTime<Utc>>,
}

impl AddressRecord {
    fn prune(&mut self, now: DateTime<Utc>, window: TimeDelta) {
        self.attempts.retain(|a| now - a.at < window);
    }

    fn is_empty(&self) -> bool {
        self.attempts.is_empty() && self.blocked_until.is_none()
    }
}

/// Result of recording a failed login
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureOutcome {
    /// Failures inside the window, including this one
    pub attempts: u32,
    /// Set when this failure (re)established a block
    pub blocked_until: Option<DateTime<Utc>>,
}

/// Tracks failed logins per client address and blocks noisy addresses
#[derive(Debug, Clone)]
pub struct LoginTracker {
    records: Arc<DashMap<IpAddr, AddressRecord>>,
    policy: TrackerPolicy,
    clock: Arc<dyn Clock>,
}

impl Default for LoginTracker {
    fn default() -> Self {
        Self::new(TrackerPolicy::default(), Arc::new(SystemClock))
    }
}

impl LoginTracker {
    pub fn new(policy: TrackerPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Arc::new(DashMap::new()),
            policy,
            clock,
        }
    }

    pub fn policy(&self) -> &TrackerPolicy {
        &self.policy
    }

    /// Record a failed login and block the address once the threshold is hit
    pub fn record_failed_login(&self, ip: IpAddr, username: &str) -> FailureOutcome {
        let now = self.clock.now();

        let outcome = {
            let mut record = self.records.entry(ip).or_default();
            record.attempts.push(FailedAttempt {
                username: username.to_string(),
                at: now,
            });
            record.prune(now, self.policy.attempt_window);

            let attempts = u32::try_from(record.attempts.len()).unwrap_or(u32::MAX);
            let blocked_until = if attempts >= self.policy.max_attempts {
                let until = now
                    .checked_add_signed(self.policy.block_duration)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC);
                record.blocked_until = Some(until);
                Some(until)
            } else {
                None
            };
            FailureOutcome {
                attempts,
                blocked_until,
            }
        };

        counter!(LOGIN_FAILED).increment(1);
        warn!(target: "security", %ip, username, attempts = outcome.attempts, "failed login attempt");
        if let Some(until) = outcome.blocked_until {
            counter!(IP_BLOCKED).increment(1);
            warn!(
                target: "security",
                %ip,
                attempts = outcome.attempts,
                until = %until,
                "address blocked after repeated failed logins"
            );
        }

        outcome
    }

    /// Whether the address is currently blocked. Expired blocks are dropped.
    pub fn is_blocked(&self, ip: IpAddr) -> bool {
        let now = self.clock.now();

        let expired = match self.records.get_mut(&ip) {
            Some(mut record) => {
                let blocked_until = record.blocked_until;
                match blocked_until {
                    Some(until) if now < until => return true,
                    Some(_) => {
                        record.blocked_until = None;
                        true
                    }
                    None => false,
                }
            }
            None => false,
        };

        if expired {
            debug!(target: "security", %ip, "block expired");
            self.records.remove_if(&ip, |_, record| record.is_empty());
        }
        false
    }

    /// Forget all failures for the address (successful login)
    pub fn clear_failed_attempts(&self, ip: IpAddr) {
        if let Some(mut record) = self.records.get_mut(&ip) {
            record.attempts.clear();
        }
        self.records.remove_if(&ip, |_, record| record.is_empty());
    }

    /// Failures for the address inside the rolling window
    pub fn failed_attempt_count(&self, ip: IpAddr) -> u32 {
        let now = self.clock.now();
        match self.records.get_mut(&ip) {
            Some(mut record) => {
                record.prune(now, self.policy.attempt_window);
                u32::try_from(record.attempts.len()).unwrap_or(u32::MAX)
            }
            None => 0,
        }
    }

    /// Drop expired blocks and stale failures
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now();
        let window = self.policy.attempt_window;
        let before = self.records.len();

        self.records.retain(|_, record| {
            record.prune(now, window);
            if record.blocked_until.is_some_and(|until| now >= until) {
                record.blocked_until = None;
            }
            !record.is_empty()
        });

        before.saturating_sub(self.records.len())
    }

    /// Addresses with any tracked state
    pub fn tracked_addresses(&self) -> usize {
        self.records.len()
    }
}
