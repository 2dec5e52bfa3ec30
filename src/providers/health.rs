//! Per-provider health state machine.
//!
//! Generalized from the kill-switch pattern the host uses to gate flaky
//! data sources (`DataSourceKillSwitch` in `main.rs`), but the transition
//! table here follows the upstream provider health model exactly:
//! HEALTHY -> DEGRADED on first failure, -> COOLING at 3 consecutive
//! failures, and a ban-class response (403/429) forces COOLING immediately
//! regardless of the prior streak.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

pub const MAX_CONSECUTIVE_FAILURES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Healthy,
    Degraded,
    Cooling,
    Disabled,
}

#[derive(Debug, Clone, Serialize)]
struct Inner {
    status: Status,
    consecutive_failures: u32,
    last_success_at: Option<DateTime<Utc>>,
    last_failure_at: Option<DateTime<Utc>>,
    cooldown_until: Option<DateTime<Utc>>,
    total_successes: u64,
    total_failures: u64,
}

impl Default for Inner {
    fn default() -> Self {
        Inner {
            status: Status::Healthy,
            consecutive_failures: 0,
            last_success_at: None,
            last_failure_at: None,
            cooldown_until: None,
            total_successes: 0,
            total_failures: 0,
        }
    }
}

/// Thread-safe per-provider health tracker. All mutation goes through
/// `record_success`/`record_failure`/`mark_banned`, which serialize on the
/// inner mutex so callers never observe a torn transition.
#[derive(Debug, Default)]
pub struct ProviderHealth {
    inner: Mutex<Inner>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub status: Status,
    pub consecutive_failures: u32,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub total_successes: u64,
    pub total_failures: u64,
}

impl ProviderHealth {
    pub fn new() -> Self {
        Self::default()
    }

    /// False while COOLING and `now < cooldown_until`; flips back to
    /// HEALTHY with counters reset the instant the cooldown elapses.
    /// Always false when DISABLED.
    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        let mut guard = self.inner.lock();
        if guard.status == Status::Disabled {
            return false;
        }
        if guard.status == Status::Cooling {
            match guard.cooldown_until {
                Some(until) if now >= until => {
                    guard.status = Status::Healthy;
                    guard.consecutive_failures = 0;
                    guard.cooldown_until = None;
                }
                Some(_) => return false,
                None => {
                    guard.status = Status::Healthy;
                    guard.consecutive_failures = 0;
                }
            }
        }
        true
    }

    pub fn record_success(&self, now: DateTime<Utc>) {
        let mut guard = self.inner.lock();
        guard.consecutive_failures = 0;
        guard.last_success_at = Some(now);
        guard.total_successes += 1;
        if guard.status != Status::Disabled {
            guard.status = Status::Healthy;
        }
    }

    pub fn record_failure(&self, now: DateTime<Utc>, cooldown_minutes: i64) {
        let mut guard = self.inner.lock();
        guard.last_failure_at = Some(now);
        guard.total_failures += 1;
        guard.consecutive_failures += 1;

        if guard.status == Status::Disabled {
            return;
        }

        if guard.consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
            guard.status = Status::Cooling;
            guard.cooldown_until = Some(now + chrono::Duration::minutes(cooldown_minutes));
        } else {
            guard.status = Status::Degraded;
        }
    }

    /// 403/429-class response: force COOLING immediately, as if the
    /// provider had already hit the consecutive-failure ceiling.
    pub fn mark_banned(&self, now: DateTime<Utc>, cooldown_minutes: i64) {
        let mut guard = self.inner.lock();
        guard.last_failure_at = Some(now);
        guard.total_failures += 1;
        guard.consecutive_failures = MAX_CONSECUTIVE_FAILURES;
        guard.status = Status::Cooling;
        guard.cooldown_until = Some(now + chrono::Duration::minutes(cooldown_minutes));
    }

    pub fn disable(&self) {
        self.inner.lock().status = Status::Disabled;
    }

    pub fn reset(&self) {
        *self.inner.lock() = Inner::default();
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let guard = self.inner.lock();
        HealthSnapshot {
            status: guard.status,
            consecutive_failures: guard.consecutive_failures,
            last_success_at: guard.last_success_at,
            last_failure_at: guard.last_failure_at,
            cooldown_until: guard.cooldown_until,
            total_successes: guard.total_successes,
            total_failures: guard.total_failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn healthy_until_third_failure() {
        let h = ProviderHealth::new();
        let t0 = Utc::now();
        h.record_failure(t0, 5);
        assert!(h.is_available(t0));
        h.record_failure(t0, 5);
        assert!(h.is_available(t0));
        h.record_failure(t0, 5);
        assert!(!h.is_available(t0));
    }

    #[test]
    fn cooldown_expires_exactly_at_boundary() {
        let h = ProviderHealth::new();
        let t0 = Utc::now();
        h.mark_banned(t0, 5);
        assert!(!h.is_available(t0 + Duration::minutes(4)));
        assert!(h.is_available(t0 + Duration::minutes(5)));
        assert_eq!(h.snapshot().consecutive_failures, 0);
    }

    #[test]
    fn success_clears_degraded() {
        let h = ProviderHealth::new();
        let t0 = Utc::now();
        h.record_failure(t0, 5);
        assert_eq!(h.snapshot().status, Status::Degraded);
        h.record_success(t0);
        assert_eq!(h.snapshot().status, Status::Healthy);
        assert_eq!(h.snapshot().consecutive_failures, 0);
    }

    #[test]
    fn ban_forces_cooling_from_healthy() {
        let h = ProviderHealth::new();
        let t0 = Utc::now();
        h.mark_banned(t0, 5);
        assert_eq!(h.snapshot().status, Status::Cooling);
        assert_eq!(h.snapshot().consecutive_failures, MAX_CONSECUTIVE_FAILURES);
    }
}
