//! Per-named-dependency circuit breaker.
//!
//! `closed` forwards calls and counts consecutive failures; `open` rejects
//! immediately until `open_timeout` elapses; `half_open` admits a bounded
//! number of concurrent probes and closes again after `success_threshold`
//! consecutive successes, reopening on any failure.

use std::sync::Arc;
use std::time::{Duration, Instant};

use mcp_core::metrics::metrics;
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    fn label(self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }
}

enum Phase {
    Closed,
    Open { since: Instant },
    HalfOpen,
}

struct Inner {
    phase: Phase,
    consecutive_failures: u32,
    consecutive_successes: u32,
    half_open_inflight: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub open_timeout: Duration,
    pub half_open_max: usize,
}

/// A permit returned by [`CircuitBreaker::try_acquire`]; the caller must
/// report the outcome through [`CircuitBreaker::record_success`] or
/// [`CircuitBreaker::record_failure`] exactly once.
pub struct Permit {
    was_half_open_probe: bool,
}

#[derive(Debug, thiserror::Error)]
#[error("dependency '{0}' is unavailable")]
pub struct DependencyUnavailable(pub String);

pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                phase: Phase::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                half_open_inflight: 0,
            }),
        }
    }

    pub fn state(&self) -> BreakerState {
        match self.inner.lock().phase {
            Phase::Closed => BreakerState::Closed,
            Phase::Open { .. } => BreakerState::Open,
            Phase::HalfOpen => BreakerState::HalfOpen,
        }
    }

    fn transition(&self, guard: &mut Inner, to: BreakerState) {
        guard.phase = match to {
            BreakerState::Closed => Phase::Closed,
            BreakerState::Open => Phase::Open {
                since: Instant::now(),
            },
            BreakerState::HalfOpen => Phase::HalfOpen,
        };
        guard.consecutive_failures = 0;
        guard.consecutive_successes = 0;
        if to != BreakerState::HalfOpen {
            guard.half_open_inflight = 0;
        }
        metrics()
            .breaker_state_changes_total
            .with_label_values(&[&self.name, to.label()])
            .inc();
        tracing::info!(dependency = %self.name, state = to.label(), "circuit breaker transitioned");
    }

    /// Admits the call, or rejects with [`DependencyUnavailable`] when the
    /// breaker is open (or half-open and already saturated with probes).
    pub fn try_acquire(&self) -> Result<Permit, DependencyUnavailable> {
        let mut guard = self.inner.lock();
        match guard.phase {
            Phase::Closed => Ok(Permit {
                was_half_open_probe: false,
            }),
            Phase::Open { since } => {
                if since.elapsed() >= self.config.open_timeout {
                    self.transition(&mut guard, BreakerState::HalfOpen);
                    guard.half_open_inflight = 1;
                    Ok(Permit {
                        was_half_open_probe: true,
                    })
                } else {
                    Err(DependencyUnavailable(self.name.clone()))
                }
            }
            Phase::HalfOpen => {
                if guard.half_open_inflight < self.config.half_open_max {
                    guard.half_open_inflight += 1;
                    Ok(Permit {
                        was_half_open_probe: true,
                    })
                } else {
                    Err(DependencyUnavailable(self.name.clone()))
                }
            }
        }
    }

    pub fn record_success(&self, permit: Permit) {
        let mut guard = self.inner.lock();
        if permit.was_half_open_probe && guard.half_open_inflight > 0 {
            guard.half_open_inflight -= 1;
        }
        match guard.phase {
            Phase::Closed => {
                guard.consecutive_failures = 0;
            }
            Phase::HalfOpen => {
                guard.consecutive_successes += 1;
                if guard.consecutive_successes >= self.config.success_threshold {
                    self.transition(&mut guard, BreakerState::Closed);
                }
            }
            Phase::Open { .. } => {}
        }
    }

    pub fn record_failure(&self, permit: Permit) {
        let mut guard = self.inner.lock();
        if permit.was_half_open_probe && guard.half_open_inflight > 0 {
            guard.half_open_inflight -= 1;
        }
        match guard.phase {
            Phase::Closed => {
                guard.consecutive_failures += 1;
                if guard.consecutive_failures >= self.config.failure_threshold {
                    self.transition(&mut guard, BreakerState::Open);
                }
            }
            Phase::HalfOpen => {
                self.transition(&mut guard, BreakerState::Open);
            }
            Phase::Open { .. } => {}
        }
    }

    /// Runs `f` through the breaker: acquires a permit, awaits `f`, and
    /// records the outcome. `is_failure` lets the caller exclude validation
    /// errors from tripping the breaker.
    pub async fn call<F, Fut, T, E>(
        &self,
        is_failure: impl Fn(&E) -> bool,
        f: F,
    ) -> Result<T, BreakerCallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let permit = self
            .try_acquire()
            .map_err(BreakerCallError::Unavailable)?;
        match f().await {
            Ok(value) => {
                self.record_success(permit);
                Ok(value)
            }
            Err(err) => {
                if is_failure(&err) {
                    self.record_failure(permit);
                } else {
                    self.record_success(permit);
                }
                Err(BreakerCallError::Inner(err))
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BreakerCallError<E> {
    #[error(transparent)]
    Unavailable(#[from] DependencyUnavailable),
    #[error(transparent)]
    Inner(E),
}

/// Default read/write breaker configs.
pub fn read_breaker_config() -> BreakerConfig {
    BreakerConfig {
        failure_threshold: 5,
        success_threshold: 2,
        open_timeout: Duration::from_secs(30),
        half_open_max: 1,
    }
}

pub fn write_breaker_config() -> BreakerConfig {
    BreakerConfig {
        failure_threshold: 3,
        success_threshold: 2,
        open_timeout: Duration::from_secs(60),
        half_open_max: 1,
    }
}

/// Convenience holder for the read/write breaker pair a graph client needs.
pub struct BreakerPair {
    pub read: Arc<CircuitBreaker>,
    pub write: Arc<CircuitBreaker>,
}

impl BreakerPair {
    pub fn new(name: &str, read: BreakerConfig, write: BreakerConfig) -> Self {
        Self {
            read: Arc::new(CircuitBreaker::new(format!("{name}:read"), read)),
            write: Arc::new(CircuitBreaker::new(format!("{name}:write"), write)),
        }
    }
}

impl Default for BreakerPair {
    fn default() -> Self {
        Self::new("graph", read_breaker_config(), write_breaker_config())
    }
}
