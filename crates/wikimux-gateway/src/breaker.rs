//! Circuit breaker - failure isolation for peer calls.
//!
//! Coarse-grained: consecutive-failure counts, not error-rate windows. It
//! protects against a persistently failing peer, not transient blips.
//!
//! closed -> open after `error_threshold` consecutive failures;
//! open -> half-open once `reset_timeout` has elapsed since the last
//! failure; the single half-open trial call decides closed vs open.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

use wikimux_core::Clock;

/// Failures before the breaker opens.
pub const DEFAULT_ERROR_THRESHOLD: u32 = 5;

/// Cooldown before a half-open trial is allowed.
pub const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_secs(30);

/// Breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Error from a breaker-wrapped call.
#[derive(Debug)]
pub enum BreakerError<E> {
    /// Short-circuited without invoking the operation.
    Open { retry_after: Duration },

    /// The operation ran and failed.
    Inner(E),
}

impl<E: std::fmt::Display> std::fmt::Display for BreakerError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open { retry_after } => {
                write!(f, "circuit open; retry in {}s", retry_after.as_secs())
            }
            Self::Inner(error) => error.fmt(f),
        }
    }
}

impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for BreakerError<E> {}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    consecutive_failures: u32,
    last_failure_at: Option<DateTime<Utc>>,
}

enum Admission {
    Normal,
    Trial,
}

/// Failure-isolation wrapper around one outbound dependency.
pub struct CircuitBreaker {
    error_threshold: u32,
    reset_delta: chrono::Duration,
    clock: Arc<dyn Clock>,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_settings(clock, DEFAULT_ERROR_THRESHOLD, DEFAULT_RESET_TIMEOUT)
    }

    pub fn with_settings(
        clock: Arc<dyn Clock>,
        error_threshold: u32,
        reset_timeout: Duration,
    ) -> Self {
        Self {
            error_threshold,
            reset_delta: chrono::Duration::from_std(reset_timeout)
                .unwrap_or(chrono::Duration::MAX),
            clock,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                last_failure_at: None,
            }),
        }
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.inner.lock().consecutive_failures
    }

    /// Run one operation through the breaker.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let admission = {
            let mut inner = self.inner.lock();
            match inner.state {
                BreakerState::Closed => Admission::Normal,
                // A trial call is already in flight; reject until it settles.
                BreakerState::HalfOpen => {
                    return Err(BreakerError::Open {
                        retry_after: Duration::ZERO,
                    })
                }
                BreakerState::Open => {
                    let now = self.clock.now();
                    let since_failure = inner
                        .last_failure_at
                        .map(|t| now.signed_duration_since(t))
                        .unwrap_or(chrono::Duration::zero());

                    if since_failure >= self.reset_delta {
                        inner.state = BreakerState::HalfOpen;
                        debug!("[CircuitBreaker] Reset timeout elapsed, allowing trial call");
                        Admission::Trial
                    } else {
                        let retry_after = (self.reset_delta - since_failure)
                            .to_std()
                            .unwrap_or(Duration::ZERO);
                        return Err(BreakerError::Open { retry_after });
                    }
                }
            }
        };

        let result = operation().await;

        let mut inner = self.inner.lock();
        match result {
            Ok(value) => {
                if matches!(admission, Admission::Trial) {
                    debug!("[CircuitBreaker] Trial call succeeded, closing circuit");
                }
                inner.state = BreakerState::Closed;
                inner.consecutive_failures = 0;
                Ok(value)
            }
            Err(error) => {
                inner.consecutive_failures += 1;
                inner.last_failure_at = Some(self.clock.now());

                match admission {
                    Admission::Trial => {
                        warn!("[CircuitBreaker] Trial call failed, reopening circuit");
                        inner.state = BreakerState::Open;
                    }
                    Admission::Normal => {
                        if inner.consecutive_failures >= self.error_threshold {
                            warn!(
                                consecutive_failures = inner.consecutive_failures,
                                "[CircuitBreaker] Failure threshold reached, opening circuit"
                            );
                            inner.state = BreakerState::Open;
                        }
                    }
                }

                Err(BreakerError::Inner(error))
            }
        }
    }
}
