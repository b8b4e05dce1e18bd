//! Three-state circuit breaker

use fusegraph_core::{Error, Result};
use parking_lot::Mutex;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    /// A trial call was admitted after the reset timeout
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_started_at: Option<Instant>,
}

/// Opens after `failure_threshold` consecutive failures and fails fast while
/// open. With a reset timeout, the first call after it elapses is let through
/// as a trial: success closes the breaker, failure re-opens it. A trial that
/// never reports back (its caller was cancelled) is replaced by a fresh one
/// once another reset timeout has passed.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    reset_timeout: Option<Duration>,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, failure_threshold: u32, reset_timeout: Option<Duration>) -> Self {
        Self {
            name: name.into(),
            failure_threshold: failure_threshold.max(1),
            reset_timeout,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                trial_started_at: None,
            }),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.inner.lock().consecutive_failures
    }

    /// Admit a call or fail fast with [`Error::CircuitOpen`]
    pub fn try_acquire(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::HalfOpen => {
                if self.elapsed_since(inner.trial_started_at) {
                    warn!(breaker = %self.name, "trial never reported back, admitting another");
                    inner.trial_started_at = Some(Instant::now());
                    Ok(())
                } else {
                    Err(Error::CircuitOpen(format!("{}: trial in flight", self.name)))
                }
            }
            CircuitState::Open => {
                if self.elapsed_since(inner.opened_at) {
                    inner.state = CircuitState::HalfOpen;
                    inner.trial_started_at = Some(Instant::now());
                    info!(breaker = %self.name, "circuit half-open, admitting trial");
                    Ok(())
                } else {
                    Err(Error::CircuitOpen(format!(
                        "{}: {} consecutive failures",
                        self.name, inner.consecutive_failures
                    )))
                }
            }
        }
    }

    fn elapsed_since(&self, since: Option<Instant>) -> bool {
        match (self.reset_timeout, since) {
            (Some(timeout), Some(since)) => since.elapsed() >= timeout,
            _ => false,
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        self.close(&mut inner);
    }

    fn close(&self, inner: &mut BreakerInner) {
        if inner.state != CircuitState::Closed {
            info!(breaker = %self.name, "circuit closed");
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.trial_started_at = None;
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        let trip = inner.state == CircuitState::HalfOpen
            || inner.consecutive_failures >= self.failure_threshold;
        if trip && inner.state != CircuitState::Open {
            warn!(
                breaker = %self.name,
                failures = inner.consecutive_failures,
                "circuit opened"
            );
        }
        if trip {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
            inner.trial_started_at = None;
        }
    }

    /// Feed a call result back. Only store failures count; other errors
    /// (validation, tenant violations) say nothing about store health.
    pub fn record<T>(&self, result: &Result<T>) {
        match result {
            Ok(_) => self.record_success(),
            Err(e) if e.is_store_failure() => self.record_failure(),
            Err(_) => {
                // A trial that ended in a non-store error still proved the store reachable
                let mut inner = self.inner.lock();
                if inner.state == CircuitState::HalfOpen {
                    self.close(&mut inner);
                }
            }
        }
    }

    /// Force the breaker closed
    pub fn reset(&self) {
        self.record_success();
    }
}
