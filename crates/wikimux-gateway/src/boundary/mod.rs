//! Safety Boundary Engine - policy gate for cross-server operations.
//!
//! Validation order: exclusion list, mode allow list, transient blocks
//! (outgoing only), sliding-window rate limits, batch size cap. Verdicts
//! are plain data; the dispatching layer decides whether a rejection
//! becomes an error. A passing verdict may still carry
//! `requires_confirmation`, which the caller must surface to its human
//! user - the engine informs, it never blocks on confirmation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, warn};

use wikimux_core::{
    BridgeConfig, Clock, Direction, OperationContext, OperationMode, OperationRecord,
};

/// Rate history older than this is pruned on sweeps.
pub const HISTORY_RETENTION: Duration = Duration::from_secs(3600);

/// Outcome of validating one cross-boundary operation.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryVerdict {
    pub allowed: bool,
    pub reason: Option<String>,
    pub requires_confirmation: bool,
    pub rate_limited: bool,
}

impl BoundaryVerdict {
    fn allow(requires_confirmation: bool) -> Self {
        Self {
            allowed: true,
            reason: None,
            requires_confirmation,
            rate_limited: false,
        }
    }

    fn reject(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            requires_confirmation: false,
            rate_limited: false,
        }
    }

    fn rate_limit(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            requires_confirmation: false,
            rate_limited: true,
        }
    }
}

struct BoundaryInner {
    history: Vec<OperationRecord>,
    /// operation name -> block expiry
    blocked: HashMap<String, DateTime<Utc>>,
}

/// Bidirectional policy gate over every operation that crosses the
/// instance or peer boundary.
pub struct SafetyBoundary {
    config: BridgeConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<BoundaryInner>,
}

impl SafetyBoundary {
    pub fn new(config: BridgeConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            inner: Mutex::new(BoundaryInner {
                history: Vec::new(),
                blocked: HashMap::new(),
            }),
        }
    }

    /// Validate one operation crossing the adapter boundary.
    pub fn validate(
        &self,
        direction: Direction,
        operation: &str,
        ctx: &OperationContext,
    ) -> BoundaryVerdict {
        // 1. Explicit exclusion list
        if self.config.excluded(direction).iter().any(|o| o == operation) {
            return BoundaryVerdict::reject(format!(
                "operation '{operation}' is excluded for {direction} calls"
            ));
        }

        // 2. Mode allow list for the direction
        let mode = OperationMode::classify(operation);
        if !self.config.allows(direction, mode) {
            return BoundaryVerdict::reject(format!(
                "{mode} operations are not allowed {direction}"
            ));
        }

        // 3. Transient blocks apply to outgoing dispatch only
        if direction == Direction::Outgoing {
            if let Some(until) = self.blocked_until(operation) {
                return BoundaryVerdict::reject(format!(
                    "operation '{operation}' is temporarily blocked until {}",
                    until.format("%H:%M:%S UTC")
                ));
            }
        }

        // 4. Sliding-window rate limits
        let now = self.clock.now();
        {
            let inner = self.inner.lock();
            let minute_count = count_since(&inner.history, now - chrono::Duration::seconds(60));
            if minute_count >= self.config.operations_per_minute {
                return BoundaryVerdict::rate_limit(format!(
                    "rate limit exceeded: {minute_count} operations in the last minute, \
                     limit is {}",
                    self.config.operations_per_minute
                ));
            }

            let hour_count = count_since(&inner.history, now - chrono::Duration::seconds(3600));
            if hour_count >= self.config.operations_per_hour {
                return BoundaryVerdict::rate_limit(format!(
                    "rate limit exceeded: {hour_count} operations in the last hour, \
                     limit is {}",
                    self.config.operations_per_hour
                ));
            }
        }

        // 5. Batch size cap
        if let Some(batch_size) = ctx.batch_size {
            if batch_size > self.config.max_batch_size {
                return BoundaryVerdict::reject(format!(
                    "batch size {batch_size} exceeds the maximum of {}",
                    self.config.max_batch_size
                ));
            }
        }

        BoundaryVerdict::allow(self.config.confirm_operations.iter().any(|o| o == operation))
    }

    /// Record a successfully dispatched operation for rate accounting.
    pub fn record_operation(&self, operation: &str, ctx: &OperationContext) {
        let record = OperationRecord {
            source: ctx.source.clone(),
            operation: operation.to_string(),
            timestamp: self.clock.now(),
        };
        self.inner.lock().history.push(record);
    }

    /// Temporarily deny an operation name; the entry clears itself after
    /// `duration`. Operation-scoped and coarser than the per-connection
    /// circuit breaker; callers use it to penalize an operation type after
    /// repeated downstream failures.
    pub fn block_operation(&self, operation: &str, duration: Duration) {
        let until = self.clock.now()
            + chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX);
        warn!(
            operation = %operation,
            until = %until,
            "[SafetyBoundary] Operation temporarily blocked"
        );
        self.inner.lock().blocked.insert(operation.to_string(), until);
    }

    fn blocked_until(&self, operation: &str) -> Option<DateTime<Utc>> {
        let mut inner = self.inner.lock();
        match inner.blocked.get(operation) {
            Some(&until) if until > self.clock.now() => Some(until),
            Some(_) => {
                // Expired: self-clears on the next check
                inner.blocked.remove(operation);
                None
            }
            None => None,
        }
    }

    /// Prune rate history beyond retention and expired blocks. Runs from a
    /// periodic task and is safe to call at any time.
    pub fn sweep(&self) {
        let now = self.clock.now();
        let cutoff =
            now - chrono::Duration::from_std(HISTORY_RETENTION).unwrap_or(chrono::Duration::MAX);

        let mut inner = self.inner.lock();
        let before = inner.history.len();
        inner.history.retain(|r| r.timestamp > cutoff);
        inner.blocked.retain(|_, until| *until > now);

        let pruned = before - inner.history.len();
        if pruned > 0 {
            debug!(pruned = pruned, "[SafetyBoundary] Pruned operation history");
        }
    }

    pub fn history_len(&self) -> usize {
        self.inner.lock().history.len()
    }

    pub fn blocked_operations(&self) -> Vec<String> {
        let now = self.clock.now();
        self.inner
            .lock()
            .blocked
            .iter()
            .filter(|(_, until)| **until > now)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

fn count_since(history: &[OperationRecord], cutoff: DateTime<Utc>) -> u32 {
    history.iter().filter(|r| r.timestamp > cutoff).count() as u32
}
