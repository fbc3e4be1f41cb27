//! Per-user (fallback: per-IP) rate limiting with burst allowance.
//!
//! Counters are fixed-window: per-minute, per-hour, per-day, plus a 1-second
//! burst window. Each key's four windows live behind one lock so a charge is
//! atomic across all of them.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;

/// Role used only to look up a per-role override; the limiter itself is
/// role-agnostic.
pub type Role = String;

#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub per_minute: u64,
    pub per_hour: u64,
    pub per_day: u64,
    pub burst: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            per_minute: 60,
            per_hour: 1_000,
            per_day: 10_000,
            burst: 10,
        }
    }
}

struct Window {
    start: Instant,
    count: u64,
    duration: Duration,
    limit: u64,
}

impl Window {
    fn new(duration: Duration, limit: u64) -> Self {
        Self {
            start: Instant::now(),
            count: 0,
            duration,
            limit,
        }
    }

    /// Returns `Ok(())` if the charge was admitted, otherwise the seconds
    /// remaining until this window resets.
    fn charge(&mut self, now: Instant) -> Result<(), u64> {
        if now.duration_since(self.start) >= self.duration {
            self.start = now;
            self.count = 0;
        }
        if self.count >= self.limit {
            let remaining = self.duration.saturating_sub(now.duration_since(self.start));
            return Err(remaining.as_secs().max(1));
        }
        self.count += 1;
        Ok(())
    }
}

struct Buckets {
    burst: Window,
    minute: Window,
    hour: Window,
    day: Window,
}

impl Buckets {
    fn new(limits: Limits) -> Self {
        Self {
            burst: Window::new(Duration::from_secs(1), limits.burst),
            minute: Window::new(Duration::from_secs(60), limits.per_minute),
            hour: Window::new(Duration::from_secs(3600), limits.per_hour),
            day: Window::new(Duration::from_secs(86_400), limits.per_day),
        }
    }

    /// Finest-grained window first: a burst spike should be reported as a
    /// 1-second retry, not the day's reset.
    fn charge(&mut self, now: Instant) -> Result<(), u64> {
        self.burst.charge(now)?;
        self.minute.charge(now)?;
        self.hour.charge(now)?;
        self.day.charge(now)?;
        Ok(())
    }
}

/// The rejection surfaced to the pipeline on exceedance.
#[derive(Debug, Clone, Copy)]
pub struct RateLimited {
    pub retry_after_secs: u64,
}

/// Process-wide rate limiter: one entry per `user_id` (or client address for
/// unauthenticated requests), with optional per-role limit overrides.
pub struct RateLimiter {
    default_limits: Limits,
    role_overrides: DashMap<Role, Limits>,
    buckets: DashMap<String, Mutex<Buckets>>,
}

impl RateLimiter {
    pub fn new(default_limits: Limits) -> Self {
        Self {
            default_limits,
            role_overrides: DashMap::new(),
            buckets: DashMap::new(),
        }
    }

    pub fn set_role_override(&self, role: impl Into<Role>, limits: Limits) {
        self.role_overrides.insert(role.into(), limits);
    }

    fn limits_for(&self, roles: &[String]) -> Limits {
        // Most permissive applicable override wins, so a user holding
        // multiple roles is never penalized by the stricter one.
        roles
            .iter()
            .filter_map(|r| self.role_overrides.get(r).map(|l| *l))
            .max_by_key(|l| l.per_day)
            .unwrap_or(self.default_limits)
    }

    /// Charge one request against `key`'s counters, creating them on first
    /// use. `roles` selects a per-role override if one is configured.
    pub fn charge(&self, key: &str, roles: &[String]) -> Result<(), RateLimited> {
        let limits = self.limits_for(roles);
        let entry = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| Mutex::new(Buckets::new(limits)));
        let mut guard = entry.lock();
        guard
            .charge(Instant::now())
            .map_err(|retry_after_secs| RateLimited { retry_after_secs })
    }

    /// Drop counter entries that have been idle for a full day; called by a
    /// periodic sweep so memory does not grow with one-shot clients forever.
    pub fn sweep_idle(&self, idle_for: Duration) {
        self.buckets.retain(|_, bucket| {
            bucket.lock().day.start.elapsed() < idle_for
        });
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Picks the rate-limit key for a request: the authenticated user id, or
/// the client network address when unauthenticated.
pub fn limiter_key(user_id: Option<&str>, client_addr: &str) -> String {
    match user_id {
        Some(uid) => format!("user:{uid}"),
        None => format!("ip:{client_addr}"),
    }
}
